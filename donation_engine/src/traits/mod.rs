//! # Backend contracts
//!
//! This module defines the behaviour that storage backends and payment providers must expose to be driven by the
//! donation engine APIs.
//!
//! * [`DonationLedger`] is the highest-level storage contract. It owns donation rows, the settlement outbox and the
//!   compare-and-set transitions that move a donation into a terminal state.
//! * [`ProjectManagement`] covers fundraising projects and their accumulated totals.
//! * [`SettingsManagement`] is the typed key/value store for site settings.
//! * [`AdminAuthManagement`] stores admin accounts and their session tokens.
//! * [`DonationStatistics`] provides the aggregate queries behind the dashboard.
//! * [`PaymentProvider`] abstracts the push-payment provider. Exactly one implementation is chosen at start-up.
mod admin_auth_management;
mod data_objects;
mod donation_ledger;
mod donation_statistics;
mod payment_provider;
mod project_management;
mod settings_management;

pub use admin_auth_management::{AdminAuthError, AdminAuthManagement};
pub use data_objects::{Settlement, SettlementOutcome};
pub use donation_ledger::{DonationLedger, LedgerError};
pub use donation_statistics::DonationStatistics;
pub use payment_provider::{
    PaymentProvider,
    PendingPush,
    ProviderError,
    ProviderStatus,
    PushAccepted,
    PushRequest,
    RESULT_CANCELLED_BY_USER,
    RESULT_SUCCESS,
};
pub use project_management::ProjectManagement;
pub use settings_management::{SettingsError, SettingsManagement};
