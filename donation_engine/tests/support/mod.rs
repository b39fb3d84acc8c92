#![allow(dead_code)]
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use donation_engine::{
    db_types::{Kes, NewProject, Project},
    donation_objects::{DonationFlowConfig, NewDonationRequest},
    test_utils::{prepare_test_env, random_db_path},
    traits::{PendingPush, ProviderError, ProviderStatus, PushAccepted, PushRequest},
    DonationFlowApi,
    PaymentProvider,
    ProjectManagement,
    SimulatedProvider,
    SqliteDatabase,
};

pub async fn new_db() -> SqliteDatabase {
    prepare_test_env(&random_db_path()).await
}

pub async fn new_project(db: &SqliteDatabase, title: &str) -> Project {
    let project = NewProject::new(title, "A worthy cause", Kes::from(50_000), "Health & Environment");
    db.insert_project(project).await.expect("Error inserting project")
}

pub fn simulated_flow(db: &SqliteDatabase) -> DonationFlowApi<SqliteDatabase, SimulatedProvider> {
    DonationFlowApi::new(db.clone(), SimulatedProvider::default(), DonationFlowConfig::default())
}

pub fn scripted_flow(db: &SqliteDatabase, provider: ScriptedProvider) -> DonationFlowApi<SqliteDatabase, ScriptedProvider> {
    DonationFlowApi::new(db.clone(), provider, DonationFlowConfig::default())
}

pub fn donation_request(project_id: i64, amount: f64) -> NewDonationRequest {
    NewDonationRequest {
        project_id,
        amount,
        phone_number: "0712345678".into(),
        donor_name: Some("Amina".into()),
        donor_email: Some("amina@example.com".into()),
    }
}

/// A provider whose answers are set by the test.
#[derive(Clone)]
pub struct ScriptedProvider {
    accept: bool,
    push_delay: Option<Duration>,
    status: Arc<Mutex<Result<ProviderStatus, String>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    pub fn accepting(status: ProviderStatus) -> Self {
        Self { accept: true, push_delay: None, status: Arc::new(Mutex::new(Ok(status))), queries: Arc::default() }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            push_delay: None,
            status: Arc::new(Mutex::new(Ok(ProviderStatus::InProgress))),
            queries: Arc::default(),
        }
    }

    /// The push is only answered after `delay`, leaving the donation without a checkout request id meanwhile.
    pub fn with_push_delay(mut self, delay: Duration) -> Self {
        self.push_delay = Some(delay);
        self
    }

    pub fn set_status(&self, status: ProviderStatus) {
        *self.status.lock().unwrap() = Ok(status);
    }

    pub fn set_query_error(&self, message: &str) {
        *self.status.lock().unwrap() = Err(message.to_string());
    }

    /// The checkout request ids that were queried, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl PaymentProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn initiate_push(&self, request: &PushRequest) -> Result<PushAccepted, ProviderError> {
        if let Some(delay) = self.push_delay {
            tokio::time::sleep(delay).await;
        }
        if !self.accept {
            return Err(ProviderError::Rejected { code: "400.002.02".into(), message: "Bad Request - Invalid Amount".into() });
        }
        Ok(PushAccepted {
            merchant_request_id: format!("MR-{}", request.donation_id),
            checkout_request_id: format!("ws_CO_TEST_{}", request.donation_id),
            response_code: "0".into(),
            response_description: "Success. Request accepted for processing".into(),
            customer_message: "Success. Request accepted for processing".into(),
        })
    }

    async fn query_push(&self, pending: &PendingPush) -> Result<ProviderStatus, ProviderError> {
        self.queries.lock().unwrap().push(pending.checkout_request_id.clone());
        self.status.lock().unwrap().clone().map_err(ProviderError::Unreachable)
    }
}
