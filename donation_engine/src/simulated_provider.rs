//! A stand-in payment provider for demos and development.
//!
//! It accepts every push and answers status queries from the clock alone: a push is in progress until `settle_after`
//! has passed, and settled afterwards. It never talks to the network.
use std::time::Duration;

use chrono::Utc;
use log::*;

use crate::traits::{PaymentProvider, PendingPush, ProviderError, ProviderStatus, PushAccepted, PushRequest};

#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    settle_after: Duration,
}

impl SimulatedProvider {
    pub fn new(settle_after: Duration) -> Self {
        Self { settle_after }
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl PaymentProvider for SimulatedProvider {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn initiate_push(&self, request: &PushRequest) -> Result<PushAccepted, ProviderError> {
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let nonce = rand::random::<u32>() % 1_000_000;
        let accepted = PushAccepted {
            merchant_request_id: format!("SIM-{}-{nonce:06}", request.donation_id),
            checkout_request_id: format!("ws_CO_{stamp}{:06}{nonce:06}", request.donation_id),
            response_code: "0".into(),
            response_description: "Success. Request accepted for processing".into(),
            customer_message: "Success. Request accepted for processing".into(),
        };
        debug!(
            "🔄️ Simulated push of {} to {} for {} accepted",
            request.amount,
            request.phone.masked(),
            request.reference
        );
        Ok(accepted)
    }

    async fn query_push(&self, pending: &PendingPush) -> Result<ProviderStatus, ProviderError> {
        let elapsed = (pending.checked_at - pending.initiated_at).to_std().unwrap_or_default();
        if elapsed < self.settle_after {
            return Ok(ProviderStatus::InProgress);
        }
        let receipt = format!("SIM{}{:04}", pending.checked_at.timestamp(), pending.donation_id % 10_000);
        Ok(ProviderStatus::Settled { receipt: Some(receipt) })
    }
}
