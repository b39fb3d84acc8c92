use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use donate_common::Kes;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------    ProjectStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    /// Accepting donations
    Active,
    /// The campaign has ended
    Completed,
    /// Temporarily not accepting donations
    Paused,
}

impl Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Active => write!(f, "active"),
            ProjectStatus::Completed => write!(f, "completed"),
            ProjectStatus::Paused => write!(f, "paused"),
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "paused" => Ok(Self::Paused),
            s => Err(ConversionError(format!("Invalid project status: {s}. Use active, completed or paused"))),
        }
    }
}

//--------------------------------------    DonationStatus    ---------------------------------------------------------
/// The lifecycle of a donation.
///
/// `Pending` is the only state this crate writes for an in-flight donation. `Processing` is what the status
/// reconciler _reports_ while a donation is still inside its settle window, and rows that happen to hold it are
/// treated exactly like `Pending`.
///
/// The remaining four states are terminal. Once a donation reaches one of them it never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl DonationStatus {
    pub const IN_FLIGHT: [DonationStatus; 2] = [DonationStatus::Pending, DonationStatus::Processing];

    pub fn is_terminal(&self) -> bool {
        !self.is_in_flight()
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Only in-flight donations may move, and only into a terminal state.
    pub fn can_transition_to(&self, next: DonationStatus) -> bool {
        self.is_in_flight() && next.is_terminal()
    }
}

impl Display for DonationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DonationStatus::Pending => write!(f, "pending"),
            DonationStatus::Processing => write!(f, "processing"),
            DonationStatus::Completed => write!(f, "completed"),
            DonationStatus::Failed => write!(f, "failed"),
            DonationStatus::Cancelled => write!(f, "cancelled"),
            DonationStatus::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for DonationStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            s => Err(ConversionError(format!("Invalid donation status: {s}"))),
        }
    }
}

impl From<String> for DonationStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid donation status: {value}. But this conversion cannot fail. Defaulting to Pending");
            DonationStatus::Pending
        })
    }
}

//--------------------------------------        Project        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub target_amount: Kes,
    /// Sum of completed donations. Maintained incrementally, see `recalculate_project_totals` for the repair path.
    pub current_amount: Kes,
    pub image_url: Option<String>,
    pub category: String,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub target_amount: Kes,
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewProject {
    pub fn new<S: Into<String>>(title: S, description: S, target_amount: Kes, category: S) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            target_amount,
            category: category.into(),
            image_url: None,
        }
    }
}

//--------------------------------------        Donation       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Donation {
    pub id: i64,
    pub project_id: i64,
    pub amount: Kes,
    pub donor_name: Option<String>,
    pub merchant_request_id: Option<String>,
    /// The provider's correlation id for the push request
    pub checkout_request_id: Option<String>,
    pub mpesa_receipt: Option<String>,
    /// Provider's explanation for a failed or cancelled payment
    pub result_desc: Option<String>,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDonation {
    pub project_id: i64,
    pub amount: Kes,
    pub donor_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewDonation {
    pub fn new(project_id: i64, amount: Kes, donor_name: Option<String>) -> Self {
        Self { project_id, amount, donor_name, created_at: Utc::now() }
    }
}

//--------------------------------------  ReconciliationTask  ---------------------------------------------------------
/// An entry in the settlement outbox. Exists for as long as its donation is in flight.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReconciliationTask {
    pub id: i64,
    pub donation_id: i64,
    pub checkout_request_id: String,
    pub next_check_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      SiteSetting      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    String,
    Number,
    Boolean,
    Json,
}

impl Display for SettingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingType::String => write!(f, "string"),
            SettingType::Number => write!(f, "number"),
            SettingType::Boolean => write!(f, "boolean"),
            SettingType::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SiteSetting {
    pub id: i64,
    pub setting_key: String,
    pub setting_value: String,
    pub setting_type: SettingType,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SiteSetting {
    /// Interprets the stored string according to its declared type.
    pub fn typed_value(&self) -> serde_json::Value {
        use serde_json::Value;
        let raw = self.setting_value.as_str();
        match self.setting_type {
            SettingType::String => Value::String(raw.to_string()),
            SettingType::Boolean => Value::Bool(raw.trim() == "true"),
            SettingType::Number => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| raw.trim().parse::<f64>().map(Value::from))
                .unwrap_or(Value::Null),
            SettingType::Json => serde_json::from_str(raw).unwrap_or(Value::Null),
        }
    }
}

/// A setting write. The stored type is derived from the JSON value.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSetting {
    pub key: String,
    pub value: String,
    pub setting_type: SettingType,
    pub description: Option<String>,
}

impl NewSetting {
    pub fn from_json<S: Into<String>>(key: S, value: &serde_json::Value) -> Self {
        use serde_json::Value;
        let (value, setting_type) = match value {
            Value::String(s) => (s.clone(), SettingType::String),
            Value::Bool(b) => (b.to_string(), SettingType::Boolean),
            Value::Number(n) => (n.to_string(), SettingType::Number),
            other => (other.to_string(), SettingType::Json),
        };
        Self { key: key.into(), value, setting_type, description: None }
    }
}

//--------------------------------------       Admin       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// The public face of an admin account. Never carries the password hash.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminIdentity {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<AdminUser> for AdminIdentity {
    fn from(user: AdminUser) -> Self {
        Self { id: user.id, username: user.username, email: user.email }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AdminSession {
    pub token: String,
    pub admin_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
