use std::{fmt::Display, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Safaricom subscriber numbers in international format, without the `+`.
const MSISDN_PATTERN: &str = r"^254[17]\d{8}$";

fn msisdn_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::unwrap_used)]
    RE.get_or_init(|| Regex::new(MSISDN_PATTERN).unwrap())
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0} is not a valid M-Pesa phone number. Use the format 0712345678 or 254712345678")]
pub struct PhoneNumberError(pub String);

/// A normalized Kenyan mobile number, e.g. `254712345678`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Rewrites the common local formats into the `254XXXXXXXXX` form and validates the result.
    ///
    /// * Anything that is not a digit (`+`, spaces, dashes) is dropped.
    /// * A leading `0` is replaced with `254`.
    /// * A bare 9-digit subscriber number gets the `254` prefix.
    pub fn normalize(raw: &str) -> Result<Self, PhoneNumberError> {
        let digits = raw.chars().filter(char::is_ascii_digit).collect::<String>();
        let candidate = if let Some(rest) = digits.strip_prefix('0') {
            format!("254{rest}")
        } else if digits.starts_with("254") {
            digits
        } else if digits.len() == 9 {
            format!("254{digits}")
        } else {
            digits
        };
        if msisdn_regex().is_match(&candidate) {
            Ok(Self(candidate))
        } else {
            Err(PhoneNumberError(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// A display-safe rendering that hides the middle digits, e.g. `2547****5678`.
    pub fn masked(&self) -> String {
        let (head, tail) = self.0.split_at(4);
        format!("{head}****{}", &tail[tail.len() - 4..])
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::normalize(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}

impl Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
