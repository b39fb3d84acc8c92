use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{Donation, DonationStatus, NewDonation, ReconciliationTask},
    donation_api::donation_objects::{DonationQueryFilter, DonationWithProject},
    traits::{ProjectManagement, PushAccepted, Settlement, SettlementOutcome},
};

/// The storage contract behind the donation flow.
///
/// Backends must guarantee that a donation leaves the in-flight states at most once, no matter how many callers
/// race to settle it. The crediting of the owning project and the removal of the donation's outbox entry happen in
/// the same atomic unit as that transition.
#[allow(async_fn_in_trait)]
pub trait DonationLedger: Clone + ProjectManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a brand-new donation in the `pending` state.
    async fn insert_donation(&self, donation: NewDonation) -> Result<Donation, LedgerError>;

    async fn fetch_donation(&self, id: i64) -> Result<Option<Donation>, LedgerError>;

    async fn fetch_donation_by_checkout_id(&self, checkout_request_id: &str) -> Result<Option<Donation>, LedgerError>;

    /// Fetches donations joined with their project's title, newest first.
    async fn search_donations(&self, query: DonationQueryFilter) -> Result<Vec<DonationWithProject>, LedgerError>;

    /// Records the provider's correlation ids against the donation and, in the same transaction, enqueues a
    /// reconciliation task that first becomes due at `next_check_at`.
    ///
    /// A donation that already left the in-flight states is returned unchanged, and no task is enqueued.
    async fn record_push_accepted(
        &self,
        donation_id: i64,
        accepted: &PushAccepted,
        next_check_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Donation, LedgerError>;

    /// Atomically moves an in-flight donation into the terminal state given in `settlement`.
    ///
    /// * If the donation is still `pending`/`processing`, the status is updated, a completed donation's amount is
    ///   added to its project's `current_amount`, and any outbox entry is removed. Returns
    ///   [`SettlementOutcome::Settled`].
    /// * If it is already terminal, nothing is written and [`SettlementOutcome::NoOp`] is returned.
    ///
    /// Returns [`LedgerError::InvalidTransition`] if `settlement.status` is not a terminal state.
    async fn settle_donation(&self, donation_id: i64, settlement: Settlement) -> Result<SettlementOutcome, LedgerError>;

    /// Outbox entries whose `next_check_at` is at or before `now`, oldest first.
    async fn fetch_due_tasks(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ReconciliationTask>, LedgerError>;

    async fn fetch_task_for_donation(&self, donation_id: i64) -> Result<Option<ReconciliationTask>, LedgerError>;

    /// Pushes the next check of a task out to `next_check_at` and bumps its attempt counter.
    async fn reschedule_task(&self, task_id: i64, next_check_at: DateTime<Utc>) -> Result<(), LedgerError>;

    /// Removes the outbox entry for a donation, if there is one. Returns true if a row was deleted.
    async fn delete_task_for_donation(&self, donation_id: i64) -> Result<bool, LedgerError>;
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested donation {0} does not exist")]
    DonationNotFound(i64),
    #[error("The requested project {0} does not exist")]
    ProjectNotFound(i64),
    #[error("A donation cannot move from {from} to {to}")]
    InvalidTransition { from: DonationStatus, to: DonationStatus },
    #[error("The requested change would result in a no-op.")]
    ModificationNoOp,
    #[error("The M-Pesa receipt {0} is already recorded against another donation")]
    DuplicateReceipt(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}
