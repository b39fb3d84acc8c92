//! Glue between the M-Pesa (Daraja) client and the donation engine.
//!
//! [`LiveProvider`] implements [`PaymentProvider`] on top of [`MpesaApi`]. [`PaymentBackend`] is the provider the
//! server actually runs with: the live one or the engine's [`SimulatedProvider`], picked once from
//! `DONATE_PAYMENT_MODE`. A failing live call is reported as a failure and never handed to the simulator.
use chrono::Utc;
use donation_engine::{
    donation_objects::PaymentCallback,
    traits::{PaymentProvider, PendingPush, ProviderError, ProviderStatus, PushAccepted, PushRequest},
    SimulatedProvider,
};
use log::*;
use mpesa_tools::{MpesaApi, MpesaApiError, StkCallback, StkPushParams};
use serde::Serialize;

use crate::{
    config::{PaymentMode, ServerConfig},
    errors::ServerError,
};

#[derive(Clone)]
pub struct LiveProvider {
    api: MpesaApi,
}

impl LiveProvider {
    pub fn new(api: MpesaApi) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &MpesaApi {
        &self.api
    }
}

pub fn provider_error(e: MpesaApiError) -> ProviderError {
    match e {
        MpesaApiError::Initialization(s) | MpesaApiError::RestResponseError(s) => ProviderError::Unreachable(s),
        MpesaApiError::Authentication(s) => ProviderError::Authentication(s),
        MpesaApiError::JsonError(s) => ProviderError::InvalidResponse(s),
        MpesaApiError::Rejected { code, message } => ProviderError::Rejected { code, message },
        MpesaApiError::QueryError { status, message } => ProviderError::Rejected { code: status.to_string(), message },
    }
}

impl PaymentProvider for LiveProvider {
    fn name(&self) -> &'static str {
        "mpesa"
    }

    async fn initiate_push(&self, request: &PushRequest) -> Result<PushAccepted, ProviderError> {
        let params = StkPushParams {
            phone: request.phone.clone(),
            amount: request.amount,
            account_reference: request.reference.clone(),
            description: request.description.clone(),
        };
        let response = self.api.stk_push(&params).await.map_err(provider_error)?;
        if !response.is_accepted() {
            warn!(
                "📲️ STK push for donation #{} was not accepted: {} {}",
                request.donation_id, response.response_code, response.response_description
            );
            return Err(ProviderError::Rejected {
                code: response.response_code,
                message: response.response_description,
            });
        }
        Ok(PushAccepted {
            merchant_request_id: response.merchant_request_id,
            checkout_request_id: response.checkout_request_id,
            response_code: response.response_code,
            response_description: response.response_description,
            customer_message: response.customer_message,
        })
    }

    async fn query_push(&self, pending: &PendingPush) -> Result<ProviderStatus, ProviderError> {
        match self.api.stk_query(&pending.checkout_request_id).await {
            Ok(res) => Ok(ProviderStatus::from_result_code(res.result_code, &res.result_desc, res.mpesa_receipt_number)),
            Err(e) if e.is_still_processing() => {
                trace!("📲️ Donation #{} is still waiting on the customer", pending.donation_id);
                Ok(ProviderStatus::InProgress)
            },
            Err(e) => Err(provider_error(e)),
        }
    }
}

/// The payment provider selected at start-up.
#[derive(Clone)]
pub enum PaymentBackend {
    Live(LiveProvider),
    Simulated(SimulatedProvider),
}

impl PaymentBackend {
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        match config.payment_mode {
            PaymentMode::Live => {
                let api = MpesaApi::new(config.mpesa.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
                info!("🪛️ Donations are paid through M-Pesa ({})", config.mpesa.environment);
                Ok(Self::Live(LiveProvider::new(api)))
            },
            PaymentMode::Simulated => {
                warn!(
                    "🪛️ Donations are settled by the simulated provider after {}s. No money moves.",
                    config.reconciliation.settle_after.as_secs()
                );
                Ok(Self::Simulated(SimulatedProvider::new(config.reconciliation.settle_after)))
            },
        }
    }

    pub fn mode(&self) -> PaymentMode {
        match self {
            Self::Live(_) => PaymentMode::Live,
            Self::Simulated(_) => PaymentMode::Simulated,
        }
    }

    /// Checks that the provider credentials work. In live mode this fetches a fresh OAuth token.
    pub async fn check_credentials(&self) -> ProviderCheck {
        match self {
            Self::Live(p) => {
                let environment = p.api().config().environment.to_string();
                match p.api().fetch_access_token().await {
                    Ok(token) => ProviderCheck {
                        mode: PaymentMode::Live.to_string(),
                        environment: Some(environment),
                        success: true,
                        message: format!("Obtained an access token valid for {}s", token.expires_in),
                        checked_at: Utc::now().to_rfc3339(),
                    },
                    Err(e) => {
                        warn!("📲️ M-Pesa credential check failed. {e}");
                        ProviderCheck {
                            mode: PaymentMode::Live.to_string(),
                            environment: Some(environment),
                            success: false,
                            message: e.to_string(),
                            checked_at: Utc::now().to_rfc3339(),
                        }
                    },
                }
            },
            Self::Simulated(_) => ProviderCheck {
                mode: PaymentMode::Simulated.to_string(),
                environment: None,
                success: true,
                message: "The simulated provider is active. No credentials are used.".into(),
                checked_at: Utc::now().to_rfc3339(),
            },
        }
    }
}

impl PaymentProvider for PaymentBackend {
    fn name(&self) -> &'static str {
        match self {
            Self::Live(p) => p.name(),
            Self::Simulated(p) => p.name(),
        }
    }

    async fn initiate_push(&self, request: &PushRequest) -> Result<PushAccepted, ProviderError> {
        match self {
            Self::Live(p) => p.initiate_push(request).await,
            Self::Simulated(p) => p.initiate_push(request).await,
        }
    }

    async fn query_push(&self, pending: &PendingPush) -> Result<ProviderStatus, ProviderError> {
        match self {
            Self::Live(p) => p.query_push(pending).await,
            Self::Simulated(p) => p.query_push(pending).await,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderCheck {
    pub mode: String,
    pub environment: Option<String>,
    pub success: bool,
    pub message: String,
    pub checked_at: String,
}

/// Flattens a Daraja STK callback into the engine's provider-neutral callback.
pub fn payment_callback_from_stk(callback: StkCallback) -> PaymentCallback {
    let metadata = callback.callback_metadata.unwrap_or_default();
    PaymentCallback {
        merchant_request_id: callback.merchant_request_id,
        checkout_request_id: callback.checkout_request_id,
        result_code: callback.result_code,
        result_desc: callback.result_desc,
        receipt: metadata.receipt_number(),
        amount: metadata.amount(),
        phone_number: metadata.phone_number(),
        transaction_date: metadata.transaction_date(),
    }
}
