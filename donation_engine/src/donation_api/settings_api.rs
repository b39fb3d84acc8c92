use std::fmt::Debug;

use log::*;
use serde_json::{Map, Value};

use crate::{
    db_types::NewSetting,
    donation_api::settings_objects::{default_settings, SiteSettings, MAXIMUM_DONATION_KEY, MINIMUM_DONATION_KEY},
    traits::{SettingsError, SettingsManagement},
};

/// Typed access to the site-wide settings.
pub struct SettingsApi<B> {
    db: B,
}

impl<B> Debug for SettingsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettingsApi")
    }
}

impl<B> SettingsApi<B>
where B: SettingsManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn fetch_settings(&self) -> Result<SiteSettings, SettingsError> {
        let rows = self.db.fetch_settings().await?;
        Ok(SiteSettings::from_rows(&rows))
    }

    /// The typed value of a single setting, if it exists.
    pub async fn fetch_setting(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        let setting = self.db.fetch_setting(key).await?;
        Ok(setting.map(|s| s.typed_value()))
    }

    /// Upserts every key in `values` in one transaction. Each value's stored type follows its JSON type.
    pub async fn update_settings(&self, values: Map<String, Value>) -> Result<SiteSettings, SettingsError> {
        if values.is_empty() {
            return Err(SettingsError::EmptyUpdate);
        }
        let mut settings = Vec::with_capacity(values.len());
        for (key, value) in &values {
            if key.trim().is_empty() {
                return Err(SettingsError::InvalidValue { key: key.clone(), reason: "keys cannot be blank".into() });
            }
            if value.is_null() {
                return Err(SettingsError::InvalidValue { key: key.clone(), reason: "null is not a setting value".into() });
            }
            if [MINIMUM_DONATION_KEY, MAXIMUM_DONATION_KEY].contains(&key.as_str()) &&
                !value.as_f64().map(|v| v > 0.0).unwrap_or(false)
            {
                return Err(SettingsError::InvalidValue { key: key.clone(), reason: "must be a positive number".into() });
            }
            settings.push(NewSetting::from_json(key.as_str(), value));
        }
        self.db.upsert_settings(&settings).await?;
        info!("💻️ Settings updated: {}", values.keys().cloned().collect::<Vec<_>>().join(", "));
        self.fetch_settings().await
    }

    /// Throws away every stored setting and restores the defaults.
    pub async fn reset_settings(&self) -> Result<SiteSettings, SettingsError> {
        self.db.reset_settings(&default_settings()).await?;
        self.fetch_settings().await
    }
}
