//! Donation Engine
//!
//! The donation engine holds the core logic of an anonymous donation platform whose donors pay by M-Pesa push
//! payment. It is provider-agnostic: the payment provider is injected through the [`PaymentProvider`] trait.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`mod@traits`] and the SQLite backend). The traits describe what a backend must do. [`SqliteDatabase`]
//!    is the supplied implementation. The data types used in the database are defined in [`mod@db_types`].
//! 2. The public API ([`mod@donation_api`]). Donation flow, projects, settings, admin sessions and statistics.
//! 3. The [`SimulatedProvider`], a clock-driven stand-in for a real payment provider.
//!
//! Donor contact details never reach storage. Project totals only ever grow through the single compare-and-set that
//! moves a donation to `completed`.
pub mod db_types;
pub mod donation_api;
pub mod helpers;
mod simulated_provider;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use donation_api::{
    admin_auth_api::{AdminAuthApi, LoginResponse},
    donation_flow_api::DonationFlowApi,
    donation_objects,
    errors::{DonationFlowError, ProjectApiError, StatsApiError},
    project_api::ProjectApi,
    project_objects,
    settings_api::SettingsApi,
    settings_objects,
    stats_api::StatsApi,
    stats_objects,
};
pub use simulated_provider::SimulatedProvider;
#[cfg(feature = "sqlite")]
pub use sqlite::{db::db_url, SqliteDatabase};
pub use traits::{
    AdminAuthError,
    AdminAuthManagement,
    DonationLedger,
    DonationStatistics,
    LedgerError,
    PaymentProvider,
    ProjectManagement,
    SettingsError,
    SettingsManagement,
};
