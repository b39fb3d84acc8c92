//! `SqliteDatabase` is a concrete implementation of a donation engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{admin, db_url, donations, new_pool, projects, settings, stats, tasks};
use crate::{
    db_types::{
        AdminIdentity,
        AdminSession,
        AdminUser,
        Donation,
        DonationStatus,
        NewDonation,
        NewProject,
        NewSetting,
        Project,
        ReconciliationTask,
        SiteSetting,
    },
    donation_api::{
        donation_objects::{DonationQueryFilter, DonationWithProject},
        project_objects::{ProjectQueryFilter, ProjectSummary, ProjectTotalDrift, ProjectUpdate},
        stats_objects::{CategoryTotal, MonthlyTrend, PlatformTotals},
    },
    traits::{
        AdminAuthError,
        AdminAuthManagement,
        DonationLedger,
        DonationStatistics,
        LedgerError,
        ProjectManagement,
        PushAccepted,
        Settlement,
        SettlementOutcome,
        SettingsError,
        SettingsManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl DonationLedger for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_donation(&self, donation: NewDonation) -> Result<Donation, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        donations::insert_donation(donation, &mut conn).await
    }

    async fn fetch_donation(&self, id: i64) -> Result<Option<Donation>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let donation = donations::fetch_donation(id, &mut conn).await?;
        Ok(donation)
    }

    async fn fetch_donation_by_checkout_id(&self, checkout_request_id: &str) -> Result<Option<Donation>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let donation = donations::fetch_donation_by_checkout_id(checkout_request_id, &mut conn).await?;
        Ok(donation)
    }

    async fn search_donations(&self, query: DonationQueryFilter) -> Result<Vec<DonationWithProject>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let result = donations::search_donations(query, &mut conn).await?;
        Ok(result)
    }

    async fn record_push_accepted(
        &self,
        donation_id: i64,
        accepted: &PushAccepted,
        next_check_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Donation, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let Some(donation) = donations::record_correlation_ids(donation_id, accepted, &mut tx).await? else {
            let current = donations::fetch_donation(donation_id, &mut tx)
                .await?
                .ok_or(LedgerError::DonationNotFound(donation_id))?;
            tx.rollback().await?;
            warn!(
                "🗃️ Donation #{donation_id} is already {}. Checkout request {} was not recorded",
                current.status, accepted.checkout_request_id
            );
            return Ok(current);
        };
        tasks::upsert_task(donation_id, &accepted.checkout_request_id, next_check_at, expires_at, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Donation #{donation_id} linked to checkout request {}. Reconciliation due at {next_check_at}",
            accepted.checkout_request_id
        );
        Ok(donation)
    }

    /// In a single atomic transaction,
    /// * moves the donation to its terminal state, provided it is still in flight,
    /// * credits the project if, and only if, this call made the donation `completed`,
    /// * removes the donation's outbox entry.
    ///
    /// The compare-and-set is the first statement of the transaction, so concurrent settlers queue on SQLite's write
    /// lock instead of failing with `SQLITE_BUSY` on a lock upgrade.
    async fn settle_donation(&self, donation_id: i64, settlement: Settlement) -> Result<SettlementOutcome, LedgerError> {
        if !settlement.status.is_terminal() {
            let mut conn = self.pool.acquire().await?;
            let current = donations::fetch_donation(donation_id, &mut conn)
                .await?
                .ok_or(LedgerError::DonationNotFound(donation_id))?;
            return Err(LedgerError::InvalidTransition { from: current.status, to: settlement.status });
        }
        let mut tx = self.pool.begin().await?;
        let updated = donations::compare_and_set_terminal(donation_id, &settlement, &mut tx).await.map_err(|e| {
            let duplicate = e.as_database_error().is_some_and(|db_err| db_err.is_unique_violation());
            match settlement.receipt.as_deref() {
                Some(receipt) if duplicate => {
                    warn!("🗃️ Receipt {receipt} already belongs to another donation. #{donation_id} not settled");
                    LedgerError::DuplicateReceipt(receipt.to_string())
                },
                _ => LedgerError::from(e),
            }
        })?;
        if let Some(donation) = updated {
            if donation.status == DonationStatus::Completed {
                projects::credit_project(donation.project_id, donation.amount, &mut tx).await?;
            }
            tasks::delete_task_for_donation(donation_id, &mut tx).await?;
            tx.commit().await?;
            debug!("🗃️ Donation #{donation_id} settled as {}", donation.status);
            return Ok(SettlementOutcome::Settled(donation));
        }
        tx.rollback().await?;
        let mut conn = self.pool.acquire().await?;
        let donation =
            donations::fetch_donation(donation_id, &mut conn).await?.ok_or(LedgerError::DonationNotFound(donation_id))?;
        debug!("🗃️ Donation #{donation_id} is already {}. Settlement as {} ignored", donation.status, settlement.status);
        Ok(SettlementOutcome::NoOp(donation))
    }

    async fn fetch_due_tasks(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ReconciliationTask>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let tasks = tasks::fetch_due_tasks(now, limit, &mut conn).await?;
        Ok(tasks)
    }

    async fn fetch_task_for_donation(&self, donation_id: i64) -> Result<Option<ReconciliationTask>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let task = tasks::fetch_task_for_donation(donation_id, &mut conn).await?;
        Ok(task)
    }

    async fn reschedule_task(&self, task_id: i64, next_check_at: DateTime<Utc>) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        if !tasks::reschedule_task(task_id, next_check_at, &mut conn).await? {
            trace!("🗃️ Reconciliation task #{task_id} vanished before it could be rescheduled");
        }
        Ok(())
    }

    async fn delete_task_for_donation(&self, donation_id: i64) -> Result<bool, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let deleted = tasks::delete_task_for_donation(donation_id, &mut conn).await?;
        Ok(deleted)
    }
}

impl ProjectManagement for SqliteDatabase {
    async fn fetch_project(&self, id: i64) -> Result<Option<Project>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let project = projects::fetch_project(id, &mut conn).await?;
        Ok(project)
    }

    async fn fetch_projects(&self, query: ProjectQueryFilter) -> Result<Vec<ProjectSummary>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        projects::search_projects(query, &mut conn).await
    }

    async fn count_completed_donations(&self, project_id: i64) -> Result<i64, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let count = projects::count_completed_donations(project_id, &mut conn).await?;
        Ok(count)
    }

    async fn fetch_recent_donations_for_project(
        &self,
        project_id: i64,
        limit: i64,
    ) -> Result<Vec<Donation>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let donations = projects::fetch_recent_completed_donations(project_id, limit, &mut conn).await?;
        Ok(donations)
    }

    async fn count_projects(&self) -> Result<i64, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let count = projects::count_projects(&mut conn).await?;
        Ok(count)
    }

    async fn insert_project(&self, project: NewProject) -> Result<Project, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        projects::insert_project(project, &mut conn).await
    }

    async fn update_project(&self, id: i64, update: ProjectUpdate) -> Result<Option<Project>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        projects::update_project(id, update, &mut conn).await
    }

    async fn delete_project(&self, id: i64) -> Result<bool, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let deleted = projects::delete_project(id, &mut conn).await?;
        Ok(deleted)
    }

    async fn recalculate_project_totals(&self) -> Result<Vec<ProjectTotalDrift>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let drift = projects::fetch_total_drift(&mut conn).await?;
        if !drift.is_empty() {
            // A single statement, so it is atomic on its own
            projects::recalculate_totals(&mut conn).await?;
        }
        Ok(drift)
    }
}

impl SettingsManagement for SqliteDatabase {
    async fn fetch_settings(&self) -> Result<Vec<SiteSetting>, SettingsError> {
        let mut conn = self.pool.acquire().await?;
        let settings = settings::fetch_settings(&mut conn).await?;
        Ok(settings)
    }

    async fn fetch_setting(&self, key: &str) -> Result<Option<SiteSetting>, SettingsError> {
        let mut conn = self.pool.acquire().await?;
        let setting = settings::fetch_setting(key, &mut conn).await?;
        Ok(setting)
    }

    async fn upsert_settings(&self, new_settings: &[NewSetting]) -> Result<(), SettingsError> {
        let mut tx = self.pool.begin().await?;
        for setting in new_settings {
            settings::upsert_setting(setting, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ {} settings saved", new_settings.len());
        Ok(())
    }

    async fn reset_settings(&self, defaults: &[NewSetting]) -> Result<(), SettingsError> {
        let mut tx = self.pool.begin().await?;
        let removed = settings::delete_all_settings(&mut tx).await?;
        for setting in defaults {
            settings::upsert_setting(setting, &mut tx).await?;
        }
        tx.commit().await?;
        info!("🗃️ Site settings reset. {removed} settings replaced with {} defaults", defaults.len());
        Ok(())
    }
}

impl AdminAuthManagement for SqliteDatabase {
    async fn fetch_admin_by_username(&self, username: &str) -> Result<Option<AdminUser>, AdminAuthError> {
        let mut conn = self.pool.acquire().await?;
        let user = admin::fetch_admin_by_username(username, &mut conn).await?;
        Ok(user)
    }

    async fn count_admins(&self) -> Result<i64, AdminAuthError> {
        let mut conn = self.pool.acquire().await?;
        let count = admin::count_admins(&mut conn).await?;
        Ok(count)
    }

    async fn insert_admin(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<AdminIdentity, AdminAuthError> {
        let mut conn = self.pool.acquire().await?;
        let admin = admin::insert_admin(username, email, password_hash, &mut conn).await?;
        Ok(admin)
    }

    async fn insert_session(
        &self,
        admin_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<AdminSession, AdminAuthError> {
        let mut conn = self.pool.acquire().await?;
        let session = admin::insert_session(admin_id, token, expires_at, &mut conn).await?;
        Ok(session)
    }

    async fn fetch_session_identity(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AdminIdentity>, AdminAuthError> {
        let mut conn = self.pool.acquire().await?;
        let identity = admin::fetch_session_identity(token, now, &mut conn).await?;
        Ok(identity)
    }

    async fn delete_session(&self, token: &str) -> Result<bool, AdminAuthError> {
        let mut conn = self.pool.acquire().await?;
        let deleted = admin::delete_session(token, &mut conn).await?;
        Ok(deleted)
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AdminAuthError> {
        let mut conn = self.pool.acquire().await?;
        let purged = admin::purge_expired_sessions(now, &mut conn).await?;
        Ok(purged)
    }
}

impl DonationStatistics for SqliteDatabase {
    async fn fetch_platform_totals(&self) -> Result<PlatformTotals, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let totals = stats::fetch_platform_totals(&mut conn).await?;
        Ok(totals)
    }

    async fn fetch_recent_completed_donations(&self, limit: i64) -> Result<Vec<DonationWithProject>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let donations = stats::fetch_recent_completed_donations(limit, &mut conn).await?;
        Ok(donations)
    }

    async fn fetch_category_totals(&self) -> Result<Vec<CategoryTotal>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let totals = stats::fetch_category_totals(&mut conn).await?;
        Ok(totals)
    }

    async fn fetch_monthly_trends(&self, since: DateTime<Utc>) -> Result<Vec<MonthlyTrend>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let trends = stats::fetch_monthly_trends(since, &mut conn).await?;
        Ok(trends)
    }
}
