use chrono::{DateTime, Utc};

use crate::{
    donation_api::{
        donation_objects::DonationWithProject,
        stats_objects::{CategoryTotal, MonthlyTrend, PlatformTotals},
    },
    traits::LedgerError,
};

/// Aggregate queries behind the public dashboard. Only completed donations count towards any total.
#[allow(async_fn_in_trait)]
pub trait DonationStatistics {
    async fn fetch_platform_totals(&self) -> Result<PlatformTotals, LedgerError>;

    async fn fetch_recent_completed_donations(&self, limit: i64) -> Result<Vec<DonationWithProject>, LedgerError>;

    async fn fetch_category_totals(&self) -> Result<Vec<CategoryTotal>, LedgerError>;

    /// Completed donations per calendar month (`YYYY-MM`) since `since`, oldest month first.
    async fn fetch_monthly_trends(&self, since: DateTime<Utc>) -> Result<Vec<MonthlyTrend>, LedgerError>;
}
