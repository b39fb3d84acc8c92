use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{db_types::Kes, donation_api::donation_objects::PublicDonation};

#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformTotals {
    pub total_projects: i64,
    pub active_projects: i64,
    pub total_donations: i64,
    pub total_amount_raised: Kes,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryTotal {
    pub category: String,
    pub donation_count: i64,
    pub total_amount: Kes,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthlyTrend {
    /// `YYYY-MM`
    pub month: String,
    pub donation_count: i64,
    pub total_amount: Kes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformStats {
    #[serde(flatten)]
    pub totals: PlatformTotals,
    pub recent_donations: Vec<PublicDonation>,
    pub donations_by_category: Vec<CategoryTotal>,
    pub monthly_trends: Vec<MonthlyTrend>,
}
