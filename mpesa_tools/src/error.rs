use thiserror::Error;

use crate::ERROR_CODE_STILL_PROCESSING;

#[derive(Debug, Error)]
pub enum MpesaApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not obtain an access token: {0}")]
    Authentication(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Daraja rejected the request. Error {code}. {message}")]
    Rejected { code: String, message: String },
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
}

impl MpesaApiError {
    /// True if Daraja is telling us that the customer has not responded to the push prompt yet.
    pub fn is_still_processing(&self) -> bool {
        matches!(self, Self::Rejected { code, .. } if code == ERROR_CODE_STILL_PROCESSING)
    }
}
