use chrono::{DateTime, Utc};
use donate_common::{Kes, PhoneNumber};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result code reported by the provider when the customer paid.
pub const RESULT_SUCCESS: i64 = 0;
/// Result code reported by the provider when the customer dismissed the prompt.
pub const RESULT_CANCELLED_BY_USER: i64 = 1032;

/// A push-payment prompt to send to a customer's phone.
#[derive(Debug, Clone, PartialEq)]
pub struct PushRequest {
    pub donation_id: i64,
    pub phone: PhoneNumber,
    pub amount: Kes,
    pub reference: String,
    pub description: String,
}

/// The provider's acknowledgement that a prompt was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushAccepted {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub response_code: String,
    pub response_description: String,
    pub customer_message: String,
}

/// A previously accepted push whose final outcome is being asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPush {
    pub donation_id: i64,
    pub checkout_request_id: String,
    pub amount: Kes,
    pub initiated_at: DateTime<Utc>,
    pub checked_at: DateTime<Utc>,
}

/// What the provider knows about a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProviderStatus {
    Settled { receipt: Option<String> },
    Cancelled { description: String },
    Failed { code: i64, description: String },
    InProgress,
}

impl ProviderStatus {
    /// Interprets a provider result code. `0` is success, `1032` is a user cancellation and anything else is a
    /// failure.
    pub fn from_result_code(code: i64, description: &str, receipt: Option<String>) -> Self {
        match code {
            RESULT_SUCCESS => Self::Settled { receipt },
            RESULT_CANCELLED_BY_USER => Self::Cancelled { description: description.to_string() },
            _ => Self::Failed { code, description: description.to_string() },
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("The payment provider could not be reached. {0}")]
    Unreachable(String),
    #[error("The payment provider rejected our credentials. {0}")]
    Authentication(String),
    #[error("The payment provider rejected the request ({code}). {message}")]
    Rejected { code: String, message: String },
    #[error("The payment provider sent a response we could not understand. {0}")]
    InvalidResponse(String),
}

/// A push-payment provider.
///
/// `initiate_push` sends the payment prompt. `query_push` asks for the outcome of a prompt that was accepted earlier.
/// Implementations must never report a payment as settled unless the provider actually confirmed it.
#[allow(async_fn_in_trait)]
pub trait PaymentProvider {
    fn name(&self) -> &'static str;

    async fn initiate_push(&self, request: &PushRequest) -> Result<PushAccepted, ProviderError>;

    async fn query_push(&self, pending: &PendingPush) -> Result<ProviderStatus, ProviderError>;
}
