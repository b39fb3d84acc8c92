use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db_types::{NewSetting, SettingType, SiteSetting};

pub const MINIMUM_DONATION_KEY: &str = "minimum_donation";
pub const MAXIMUM_DONATION_KEY: &str = "maximum_donation";

/// `(key, value, type, description)` for every setting a fresh installation starts with.
pub const DEFAULT_SETTINGS: [(&str, &str, SettingType, &str); 10] = [
    ("platform_name", "DonateAnon", SettingType::String, "Name of the donation platform"),
    (
        "platform_description",
        "Support meaningful projects while keeping your identity private",
        SettingType::String,
        "Platform description",
    ),
    ("contact_email", "admin@donateanon.com", SettingType::String, "Contact email for support"),
    ("mpesa_business_code", "174379", SettingType::String, "M-Pesa business short code"),
    ("mpesa_environment", "sandbox", SettingType::String, "M-Pesa environment (sandbox/production)"),
    ("enable_notifications", "true", SettingType::Boolean, "Enable email notifications"),
    ("auto_approve_projects", "false", SettingType::Boolean, "Automatically approve new projects"),
    (MINIMUM_DONATION_KEY, "10", SettingType::Number, "Minimum donation amount in KES"),
    (MAXIMUM_DONATION_KEY, "1000000", SettingType::Number, "Maximum donation amount in KES"),
    ("featured_projects_limit", "3", SettingType::Number, "Number of featured projects on homepage"),
];

pub fn default_settings() -> Vec<NewSetting> {
    DEFAULT_SETTINGS
        .iter()
        .map(|(key, value, setting_type, description)| NewSetting {
            key: key.to_string(),
            value: value.to_string(),
            setting_type: *setting_type,
            description: Some(description.to_string()),
        })
        .collect()
}

/// The typed view of all site settings.
///
/// Known keys land in their own fields. Any other stored key is kept in `extra` with its typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub platform_name: String,
    pub platform_description: String,
    pub contact_email: String,
    pub mpesa_business_code: String,
    pub mpesa_environment: String,
    pub enable_notifications: bool,
    pub auto_approve_projects: bool,
    pub minimum_donation: i64,
    pub maximum_donation: i64,
    pub featured_projects_limit: i64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            platform_name: "DonateAnon".into(),
            platform_description: "Support meaningful projects while keeping your identity private".into(),
            contact_email: "admin@donateanon.com".into(),
            mpesa_business_code: "174379".into(),
            mpesa_environment: "sandbox".into(),
            enable_notifications: true,
            auto_approve_projects: false,
            minimum_donation: 10,
            maximum_donation: 1_000_000,
            featured_projects_limit: 3,
            extra: BTreeMap::new(),
        }
    }
}

impl SiteSettings {
    /// Builds the typed view from stored rows. Known keys whose stored value has the wrong type keep their default.
    pub fn from_rows(rows: &[SiteSetting]) -> Self {
        let mut result = Self::default();
        for row in rows {
            let value = row.typed_value();
            match row.setting_key.as_str() {
                "platform_name" => set_string(&mut result.platform_name, value),
                "platform_description" => set_string(&mut result.platform_description, value),
                "contact_email" => set_string(&mut result.contact_email, value),
                "mpesa_business_code" => set_string(&mut result.mpesa_business_code, value),
                "mpesa_environment" => set_string(&mut result.mpesa_environment, value),
                "enable_notifications" => set_bool(&mut result.enable_notifications, value),
                "auto_approve_projects" => set_bool(&mut result.auto_approve_projects, value),
                MINIMUM_DONATION_KEY => set_int(&mut result.minimum_donation, value),
                MAXIMUM_DONATION_KEY => set_int(&mut result.maximum_donation, value),
                "featured_projects_limit" => set_int(&mut result.featured_projects_limit, value),
                key => {
                    result.extra.insert(key.to_string(), value);
                },
            }
        }
        result
    }
}

fn set_string(field: &mut String, value: Value) {
    match value {
        Value::String(s) => *field = s,
        Value::Number(n) => *field = n.to_string(),
        _ => {},
    }
}

fn set_bool(field: &mut bool, value: Value) {
    if let Value::Bool(b) = value {
        *field = b;
    }
}

fn set_int(field: &mut i64, value: Value) {
    if let Some(n) = value.as_i64().or_else(|| value.as_f64().map(|f| f.round() as i64)) {
        *field = n;
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn row(key: &str, value: &str, setting_type: SettingType) -> SiteSetting {
        SiteSetting {
            id: 0,
            setting_key: key.into(),
            setting_value: value.into(),
            setting_type,
            description: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn defaults_match_the_typed_view() {
        let rows = default_settings()
            .into_iter()
            .map(|s| row(&s.key, &s.value, s.setting_type))
            .collect::<Vec<_>>();
        assert_eq!(rows.len(), 10);
        assert_eq!(SiteSettings::from_rows(&rows), SiteSettings::default());
    }

    #[test]
    fn unknown_keys_are_kept() {
        let rows = vec![
            row("minimum_donation", "50", SettingType::Number),
            row("enable_notifications", "false", SettingType::Boolean),
            row("theme", r#"{"primary":"green"}"#, SettingType::Json),
        ];
        let settings = SiteSettings::from_rows(&rows);
        assert_eq!(settings.minimum_donation, 50);
        assert!(!settings.enable_notifications);
        assert_eq!(settings.extra["theme"], json!({"primary": "green"}));
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["theme"]["primary"], "green");
        assert_eq!(json["maximum_donation"], 1_000_000);
    }

    #[test]
    fn wrong_types_keep_defaults() {
        let rows = vec![row("maximum_donation", "lots", SettingType::Number)];
        assert_eq!(SiteSettings::from_rows(&rows).maximum_donation, 1_000_000);
    }
}
