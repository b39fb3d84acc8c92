use chrono::Utc;
use donation_engine::{
    donation_objects::{DonationFlowConfig, ReconciliationReport},
    DonationFlowApi,
    ProjectApi,
    SqliteDatabase,
};
use log::*;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::integrations::mpesa::PaymentBackend;

/// Starts the reconciliation worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `poll_interval` the worker drains the due entries of the settlement outbox and then repairs any project
/// totals that have drifted from their completed donations.
pub fn start_reconciliation_worker(
    db: SqliteDatabase,
    provider: PaymentBackend,
    config: DonationFlowConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(config.reconciliation.poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let flow_api = DonationFlowApi::new(db.clone(), provider, config);
        let project_api = ProjectApi::new(db);
        info!(
            "🕰️ Reconciliation worker started. Checking the outbox every {}s",
            config.reconciliation.poll_interval.as_secs()
        );
        loop {
            timer.tick().await;
            trace!("🕰️ Running reconciliation job");
            match flow_api.reconcile_due(Utc::now()).await {
                Ok(report) if report.is_empty() => trace!("🕰️ Nothing to reconcile"),
                Ok(report) => info!("🕰️ Reconciliation: {}", report_summary(&report)),
                Err(e) => error!("🕰️ Error running reconciliation job: {e}"),
            }
            match project_api.recalculate_project_totals().await {
                Ok(drift) if drift.is_empty() => {},
                Ok(drift) => warn!("🕰️ Repaired the totals of {} projects", drift.len()),
                Err(e) => error!("🕰️ Error recalculating project totals: {e}"),
            }
        }
    })
}

fn report_summary(report: &ReconciliationReport) -> String {
    format!(
        "{} completed, {} failed, {} cancelled, {} expired, {} still pending, {} errors",
        report.completed, report.failed, report.cancelled, report.expired, report.still_pending, report.errors
    )
}
