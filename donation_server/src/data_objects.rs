use std::fmt::Display;

use donation_engine::{
    db_types::{DonationStatus, Kes, ProjectStatus},
    donation_objects::DonationQueryFilter,
    project_objects::ProjectUpdate,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The acknowledgement M-Pesa expects for every callback, whatever we made of it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self { result_code: 0, result_desc: "Accepted".into() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// `GET /api/donations/status` query
#[derive(Debug, Clone, Deserialize)]
pub struct StatusQuery {
    pub donation_id: i64,
    pub checkout_request_id: Option<String>,
}

/// `GET /api/donations` query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DonationListQuery {
    pub project_id: Option<i64>,
    pub limit: Option<i64>,
}

impl From<DonationListQuery> for DonationQueryFilter {
    fn from(q: DonationListQuery) -> Self {
        DonationQueryFilter { project_id: q.project_id, status: None, limit: q.limit }
    }
}

/// `GET /api/admin/donations` query. `status` is a comma-separated list of donation statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminDonationQuery {
    pub project_id: Option<i64>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

impl AdminDonationQuery {
    pub fn into_filter(self) -> Result<DonationQueryFilter, String> {
        let status = match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(list) => Some(
                list.split(',')
                    .map(|s| s.trim().to_lowercase().parse::<DonationStatus>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| e.to_string())?,
            ),
            None => None,
        };
        Ok(DonationQueryFilter { project_id: self.project_id, status, limit: self.limit })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmDonationParams {
    #[serde(default)]
    pub mpesa_receipt: Option<String>,
}

/// `PUT /api/admin/projects/{id}` body. Accepts the target as a plain number, as the admin console sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpdateParams {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_amount: Option<i64>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub status: Option<String>,
}

impl ProjectUpdateParams {
    pub fn into_update(self) -> Result<ProjectUpdate, String> {
        let status = self.status.map(|s| s.trim().parse::<ProjectStatus>()).transpose().map_err(|e| e.to_string())?;
        Ok(ProjectUpdate {
            title: self.title,
            description: self.description,
            target_amount: self.target_amount.map(Kes::from),
            category: self.category,
            image_url: self.image_url,
            status,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsUpdate {
    pub settings: Map<String, Value>,
}
