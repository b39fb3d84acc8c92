//! # Donation engine public API
//!
//! The `donation_api` module exposes the programmatic API for the donation engine.
//! The API is modular, so that clients of the API can pick and choose the functionality they want.
//!
//! * [`donation_flow_api`] is the primary API. It creates donations, applies provider callbacks, answers status
//!   queries and drains the settlement outbox.
//! * [`project_api`] lists, curates and repairs fundraising projects.
//! * [`settings_api`] gives typed access to the site settings.
//! * [`admin_auth_api`] handles admin logins and bearer sessions.
//! * [`stats_api`] produces the dashboard figures.
//!
//! The other submodules in this module are support types.
//!
//! # API usage
//!
//! The pattern for using all the APIs is the same. An API instance is created by supplying a database backend that
//! implements the specific backend traits required by the API.
//!
//! ```rust,ignore
//! use donation_engine::{ProjectApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements ProjectManagement
//! let api = ProjectApi::new(db);
//! let project = api.fetch_project(1).await?;
//! ```
pub mod admin_auth_api;
pub mod donation_flow_api;
pub mod donation_objects;
pub mod errors;
pub mod project_api;
pub mod project_objects;
pub mod settings_api;
pub mod settings_objects;
pub mod stats_api;
pub mod stats_objects;
