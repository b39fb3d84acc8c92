use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::donation_api::{
    donation_objects::DonationWithProject,
    stats_objects::{CategoryTotal, MonthlyTrend, PlatformTotals},
};

pub async fn fetch_platform_totals(conn: &mut SqliteConnection) -> Result<PlatformTotals, sqlx::Error> {
    let totals = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM projects) AS total_projects,
            (SELECT COUNT(*) FROM projects WHERE status = 'active') AS active_projects,
            (SELECT COUNT(*) FROM donations WHERE status = 'completed') AS total_donations,
            (SELECT COALESCE(SUM(amount), 0) FROM donations WHERE status = 'completed') AS total_amount_raised
        "#,
    )
    .fetch_one(conn)
    .await?;
    Ok(totals)
}

pub async fn fetch_recent_completed_donations(
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<DonationWithProject>, sqlx::Error> {
    let donations = sqlx::query_as(
        r#"
        SELECT d.*, p.title AS project_title FROM donations d
        JOIN projects p ON p.id = d.project_id
        WHERE d.status = 'completed'
        ORDER BY julianday(d.created_at) DESC, d.id DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(donations)
}

pub async fn fetch_category_totals(conn: &mut SqliteConnection) -> Result<Vec<CategoryTotal>, sqlx::Error> {
    let totals = sqlx::query_as(
        r#"
        SELECT p.category AS category,
            COUNT(d.id) AS donation_count,
            COALESCE(SUM(d.amount), 0) AS total_amount
        FROM projects p
        LEFT JOIN donations d ON d.project_id = p.id AND d.status = 'completed'
        GROUP BY p.category
        ORDER BY total_amount DESC, category ASC
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(totals)
}

pub async fn fetch_monthly_trends(
    since: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<MonthlyTrend>, sqlx::Error> {
    let trends = sqlx::query_as(
        r#"
        SELECT strftime('%Y-%m', created_at) AS month,
            COUNT(*) AS donation_count,
            COALESCE(SUM(amount), 0) AS total_amount
        FROM donations
        WHERE status = 'completed' AND julianday(created_at) >= julianday($1)
        GROUP BY month
        ORDER BY month DESC
        "#,
    )
    .bind(since)
    .fetch_all(conn)
    .await?;
    Ok(trends)
}
