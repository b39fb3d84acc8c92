mod kes;

pub mod helpers;
pub mod op;
mod phone;
mod secret;

pub use helpers::parse_boolean_flag;
pub use kes::{Kes, KesConversionError, KES_CURRENCY_CODE};
pub use phone::{PhoneNumber, PhoneNumberError};
pub use secret::Secret;
