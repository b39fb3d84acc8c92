pub mod validation;

pub use validation::{require_text, sanitize_donor_name, validate_amount, DonationLimits, ValidationError};
