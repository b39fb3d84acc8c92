use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::ReconciliationTask;

/// Adds a donation to the settlement outbox. A donation has at most one task, so a second insert just refreshes it.
pub async fn upsert_task(
    donation_id: i64,
    checkout_request_id: &str,
    next_check_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ReconciliationTask, sqlx::Error> {
    let task: ReconciliationTask = sqlx::query_as(
        r#"
        INSERT INTO reconciliation_tasks (donation_id, checkout_request_id, next_check_at, expires_at, created_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (donation_id) DO UPDATE SET
            checkout_request_id = excluded.checkout_request_id,
            next_check_at = excluded.next_check_at,
            expires_at = excluded.expires_at
        RETURNING *
        "#,
    )
    .bind(donation_id)
    .bind(checkout_request_id)
    .bind(next_check_at)
    .bind(expires_at)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Reconciliation task #{} queued for donation #{donation_id}", task.id);
    Ok(task)
}

pub async fn fetch_due_tasks(
    now: DateTime<Utc>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ReconciliationTask>, sqlx::Error> {
    let tasks = sqlx::query_as(
        r#"SELECT * FROM reconciliation_tasks
        WHERE julianday(next_check_at) <= julianday($1)
        ORDER BY julianday(next_check_at) ASC, id ASC
        LIMIT $2"#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(tasks)
}

pub async fn fetch_task_for_donation(
    donation_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ReconciliationTask>, sqlx::Error> {
    let task = sqlx::query_as("SELECT * FROM reconciliation_tasks WHERE donation_id = $1")
        .bind(donation_id)
        .fetch_optional(conn)
        .await?;
    Ok(task)
}

pub async fn reschedule_task(
    task_id: i64,
    next_check_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE reconciliation_tasks SET next_check_at = $1, attempts = attempts + 1 WHERE id = $2")
            .bind(next_check_at)
            .bind(task_id)
            .execute(conn)
            .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_task_for_donation(donation_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM reconciliation_tasks WHERE donation_id = $1").bind(donation_id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}
