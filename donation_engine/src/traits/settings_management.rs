use thiserror::Error;

use crate::db_types::{NewSetting, SiteSetting};

#[derive(Debug, Clone, Error)]
pub enum SettingsError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid value for setting '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("No settings were provided")]
    EmptyUpdate,
}

impl From<sqlx::Error> for SettingsError {
    fn from(e: sqlx::Error) -> Self {
        SettingsError::DatabaseError(e.to_string())
    }
}

/// A typed key/value store for site-wide settings.
#[allow(async_fn_in_trait)]
pub trait SettingsManagement {
    async fn fetch_settings(&self) -> Result<Vec<SiteSetting>, SettingsError>;

    async fn fetch_setting(&self, key: &str) -> Result<Option<SiteSetting>, SettingsError>;

    /// Inserts or replaces each of the given settings in a single transaction.
    async fn upsert_settings(&self, settings: &[NewSetting]) -> Result<(), SettingsError>;

    /// Deletes every stored setting and replaces them with `defaults`, atomically.
    async fn reset_settings(&self, defaults: &[NewSetting]) -> Result<(), SettingsError>;
}
