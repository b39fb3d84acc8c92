use std::fmt::Debug;

use chrono::{DateTime, Months, Utc};

use crate::{
    donation_api::{
        donation_objects::PublicDonation,
        errors::StatsApiError,
        stats_objects::PlatformStats,
    },
    traits::DonationStatistics,
};

pub const RECENT_DONATIONS_IN_STATS: i64 = 10;
pub const TREND_MONTHS: u32 = 6;

pub struct StatsApi<B> {
    db: B,
}

impl<B> Debug for StatsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StatsApi")
    }
}

impl<B> StatsApi<B>
where B: DonationStatistics
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn fetch_stats(&self) -> Result<PlatformStats, StatsApiError> {
        self.fetch_stats_at(Utc::now()).await
    }

    /// Dashboard figures. Only completed donations count. Monthly trends cover the six months before `now`.
    pub async fn fetch_stats_at(&self, now: DateTime<Utc>) -> Result<PlatformStats, StatsApiError> {
        let totals = self.db.fetch_platform_totals().await?;
        let recent_donations = self
            .db
            .fetch_recent_completed_donations(RECENT_DONATIONS_IN_STATS)
            .await?
            .into_iter()
            .map(PublicDonation::from)
            .collect();
        let donations_by_category = self.db.fetch_category_totals().await?;
        let since = now.checked_sub_months(Months::new(TREND_MONTHS)).unwrap_or(now);
        let monthly_trends = self.db.fetch_monthly_trends(since).await?;
        Ok(PlatformStats { totals, recent_donations, donations_by_category, monthly_trends })
    }
}
