//! Input validation for donation requests. Everything here runs before any network call is made.
use donate_common::{Kes, PhoneNumberError};
use thiserror::Error;

pub const MAX_DONOR_NAME_LENGTH: usize = 100;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid amount. The amount must be a positive number of shillings.")]
    InvalidAmount,
    #[error("The minimum donation is {minimum}.")]
    BelowMinimum { minimum: Kes },
    #[error("The maximum donation is {maximum}.")]
    AboveMaximum { maximum: Kes },
    #[error("Invalid phone number. {0}")]
    InvalidPhone(#[from] PhoneNumberError),
    #[error("{0}")]
    InvalidField(String),
}

/// The smallest and largest amounts a single donation may carry. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DonationLimits {
    pub minimum: Kes,
    pub maximum: Kes,
}

impl Default for DonationLimits {
    fn default() -> Self {
        Self { minimum: Kes::from(1), maximum: Kes::from(1_000_000) }
    }
}

impl DonationLimits {
    pub fn new(minimum: Kes, maximum: Kes) -> Self {
        Self { minimum, maximum }
    }

    /// The limits are usable only if the floor is positive and no larger than the ceiling.
    pub fn is_consistent(&self) -> bool {
        self.minimum.is_positive() && self.minimum <= self.maximum
    }
}

/// Checks a requested amount against `limits` and converts it to whole shillings.
///
/// Non-finite and non-positive values are rejected outright. The ceiling is checked on the raw value, so an amount
/// equal to the ceiling passes. The floor is checked after rounding.
pub fn validate_amount(amount: f64, limits: &DonationLimits) -> Result<Kes, ValidationError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ValidationError::InvalidAmount);
    }
    if amount > limits.maximum.value() as f64 {
        return Err(ValidationError::AboveMaximum { maximum: limits.maximum });
    }
    let kes = Kes::try_from(amount).map_err(|_| ValidationError::InvalidAmount)?;
    if !kes.is_positive() {
        return Err(ValidationError::InvalidAmount);
    }
    if kes < limits.minimum {
        return Err(ValidationError::BelowMinimum { minimum: limits.minimum });
    }
    Ok(kes)
}

/// Trims the donor's display name. Blank names become `None`, and long names are cut to 100 characters.
pub fn sanitize_donor_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().chars().take(MAX_DONOR_NAME_LENGTH).collect::<String>()).filter(|n| !n.is_empty())
}

/// Fails with [`ValidationError::InvalidField`] if `value` is blank.
pub fn require_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::InvalidField(format!("{field} is required")))
    } else {
        Ok(())
    }
}
