use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    db_types::{Donation, DonationStatus, Kes},
    helpers::validation::DonationLimits,
};

/// The display name given to donors who did not supply one.
pub const ANONYMOUS_DONOR: &str = "Anonymous";
pub const DEFAULT_DONATION_LIST_LIMIT: i64 = 50;
pub const MAX_DONATION_LIST_LIMIT: i64 = 500;

//--------------------------------------   ReconciliationConfig   ----------------------------------------------------
/// Timing parameters for the status reconciler and its outbox worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationConfig {
    /// How long after the push a donation is reported as `processing` before the provider is asked for an outcome.
    pub settle_after: Duration,
    /// How long after the push an unresolved donation is declared `expired`.
    pub expire_after: Duration,
    /// How often the outbox worker wakes up, and how far an unresolved task is pushed back.
    pub poll_interval: Duration,
    /// Maximum number of outbox entries handled in one tick.
    pub batch_size: i64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            settle_after: Duration::from_secs(30),
            expire_after: Duration::from_secs(300),
            poll_interval: Duration::from_secs(15),
            batch_size: 100,
        }
    }
}

impl ReconciliationConfig {
    pub fn settle_after_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.settle_after).unwrap_or(chrono::Duration::seconds(30))
    }

    pub fn expire_after_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.expire_after).unwrap_or(chrono::Duration::seconds(300))
    }

    pub fn poll_interval_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.poll_interval).unwrap_or(chrono::Duration::seconds(15))
    }
}

/// Everything [`crate::DonationFlowApi`] needs besides its backends.
#[derive(Debug, Clone, Copy, Default)]
pub struct DonationFlowConfig {
    pub reconciliation: ReconciliationConfig,
    /// Used when the `minimum_donation`/`maximum_donation` settings are missing or unreadable.
    pub fallback_limits: DonationLimits,
}

//--------------------------------------   Requests   -----------------------------------------------------------------
/// A donor's request to give to a project. Contact details are used for the payment prompt only and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDonationRequest {
    pub project_id: i64,
    pub amount: f64,
    pub phone_number: String,
    #[serde(default)]
    pub donor_name: Option<String>,
    #[serde(default)]
    pub donor_email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DonationQueryFilter {
    pub project_id: Option<i64>,
    #[serde(default)]
    pub status: Option<Vec<DonationStatus>>,
    pub limit: Option<i64>,
}

impl DonationQueryFilter {
    pub fn with_project_id(mut self, project_id: i64) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_status(mut self, status: DonationStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The requested limit, defaulting to 50 and clamped to `1..=500`.
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_DONATION_LIST_LIMIT).clamp(1, MAX_DONATION_LIST_LIMIT)
    }
}

/// A manual status change made by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualStatusUpdate {
    pub status: DonationStatus,
    #[serde(default)]
    pub mpesa_receipt: Option<String>,
}

/// The provider's asynchronous report of a push outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentCallback {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub result_code: i64,
    pub result_desc: String,
    pub receipt: Option<String>,
    pub amount: Option<f64>,
    pub phone_number: Option<String>,
    pub transaction_date: Option<String>,
}

//--------------------------------------   Responses   ----------------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct DonationWithProject {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub donation: Donation,
    pub project_title: String,
}

/// The anonymized view of a donation shown to the public.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicDonation {
    pub id: i64,
    pub project_id: i64,
    pub project_title: Option<String>,
    pub amount: Kes,
    pub donor_name: String,
    pub donor_email: Option<String>,
    pub phone_number: Option<String>,
    /// Masked. Carries the status in upper case rather than the real receipt number.
    pub mpesa_transaction_id: String,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
}

impl PublicDonation {
    pub fn new(donation: Donation, project_title: Option<String>) -> Self {
        let donor_name = donation
            .donor_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_DONOR.to_string());
        Self {
            id: donation.id,
            project_id: donation.project_id,
            project_title,
            amount: donation.amount,
            donor_name,
            donor_email: None,
            phone_number: None,
            mpesa_transaction_id: donation.status.to_string().to_uppercase(),
            status: donation.status,
            created_at: donation.created_at,
        }
    }
}

impl From<DonationWithProject> for PublicDonation {
    fn from(value: DonationWithProject) -> Self {
        PublicDonation::new(value.donation, Some(value.project_title))
    }
}

impl From<Donation> for PublicDonation {
    fn from(value: Donation) -> Self {
        PublicDonation::new(value, None)
    }
}

/// Returned to the donor once the payment prompt has been sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationInitiated {
    pub donation_id: i64,
    pub status: DonationStatus,
    pub amount: Kes,
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub response_code: String,
    pub response_description: String,
    pub customer_message: String,
}

/// The reconciler's answer to "what happened to my donation?"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusReport {
    pub donation_id: i64,
    pub status: DonationStatus,
    pub amount: Kes,
    /// Seconds until the provider will be asked for an outcome. Only set while `processing`.
    pub remaining_seconds: Option<i64>,
    pub message: String,
}

impl StatusReport {
    pub fn for_donation(donation: &Donation, remaining_seconds: Option<i64>) -> Self {
        let status = match (donation.status, remaining_seconds) {
            (s, _) if s.is_terminal() => s,
            (_, Some(_)) => DonationStatus::Processing,
            _ => DonationStatus::Pending,
        };
        let message = match status {
            DonationStatus::Pending => "Waiting for the payment provider to confirm the payment".to_string(),
            DonationStatus::Processing => "Payment is being processed. Check your phone to authorize it".to_string(),
            DonationStatus::Completed => "Payment completed. Thank you for your donation!".to_string(),
            DonationStatus::Cancelled => "The payment was cancelled".to_string(),
            DonationStatus::Expired => "The payment request expired before it was confirmed".to_string(),
            DonationStatus::Failed => match &donation.result_desc {
                Some(reason) => format!("The payment failed. {reason}"),
                None => "The payment failed".to_string(),
            },
        };
        Self { donation_id: donation.id, status, amount: donation.amount, remaining_seconds, message }
    }
}

/// What a provider callback did to the ledger.
#[derive(Debug, Clone, Serialize)]
pub enum CallbackDisposition {
    /// The callback moved the donation into a terminal state.
    Applied(Donation),
    /// The donation was already terminal. Nothing changed.
    Duplicate(Donation),
    /// No donation carries this correlation id.
    UnknownCheckout(String),
}

/// Per-outcome counts from one drain of the settlement outbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub expired: usize,
    pub still_pending: usize,
    pub errors: usize,
}

impl ReconciliationReport {
    pub fn record(&mut self, status: DonationStatus) {
        match status {
            DonationStatus::Completed => self.completed += 1,
            DonationStatus::Failed => self.failed += 1,
            DonationStatus::Cancelled => self.cancelled += 1,
            DonationStatus::Expired => self.expired += 1,
            DonationStatus::Pending | DonationStatus::Processing => self.still_pending += 1,
        }
    }

    pub fn resolved(&self) -> usize {
        self.completed + self.failed + self.cancelled + self.expired
    }

    pub fn is_empty(&self) -> bool {
        self.resolved() + self.still_pending + self.errors == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn donation(status: DonationStatus, donor_name: Option<&str>) -> Donation {
        Donation {
            id: 7,
            project_id: 1,
            amount: Kes::from(500),
            donor_name: donor_name.map(String::from),
            merchant_request_id: Some("29115-34620561-1".into()),
            checkout_request_id: Some("ws_CO_191220191020363925".into()),
            mpesa_receipt: Some("NLJ7RT61SV".into()),
            result_desc: None,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn public_view_hides_everything_sensitive() {
        let public = PublicDonation::from(DonationWithProject {
            donation: donation(DonationStatus::Completed, Some("  ")),
            project_title: "Clean Water Initiative".into(),
        });
        assert_eq!(public.donor_name, "Anonymous");
        assert_eq!(public.mpesa_transaction_id, "COMPLETED");
        assert!(public.donor_email.is_none());
        assert!(public.phone_number.is_none());
        assert_eq!(public.project_title.as_deref(), Some("Clean Water Initiative"));
        let json = serde_json::to_value(&public).unwrap();
        assert!(json["phone_number"].is_null());
        assert!(!json.to_string().contains("NLJ7RT61SV"));
    }

    #[test]
    fn named_donor_is_kept() {
        let public = PublicDonation::from(donation(DonationStatus::Pending, Some("Wanjiku")));
        assert_eq!(public.donor_name, "Wanjiku");
        assert_eq!(public.mpesa_transaction_id, "PENDING");
    }

    #[test]
    fn list_limits() {
        assert_eq!(DonationQueryFilter::default().effective_limit(), 50);
        assert_eq!(DonationQueryFilter::default().with_limit(10_000).effective_limit(), 500);
        assert_eq!(DonationQueryFilter::default().with_limit(-3).effective_limit(), 1);
    }

    #[test]
    fn status_report_wording() {
        let d = donation(DonationStatus::Pending, None);
        let report = StatusReport::for_donation(&d, Some(12));
        assert_eq!(report.status, DonationStatus::Processing);
        assert_eq!(report.remaining_seconds, Some(12));
        let report = StatusReport::for_donation(&donation(DonationStatus::Expired, None), None);
        assert_eq!(report.status, DonationStatus::Expired);
        assert!(report.remaining_seconds.is_none());
    }
}
