use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Donation, Kes, NewProject, Project},
    donation_api::project_objects::{
        ProjectQueryFilter,
        ProjectStatusFilter,
        ProjectSummary,
        ProjectTotalDrift,
        ProjectUpdate,
    },
    traits::LedgerError,
};

const PROJECT_SUMMARY_SELECT: &str = r#"
    SELECT p.*,
        (SELECT COUNT(*) FROM donations d WHERE d.project_id = p.id AND d.status = 'completed') AS donation_count
    FROM projects p
    "#;

pub async fn insert_project(project: NewProject, conn: &mut SqliteConnection) -> Result<Project, LedgerError> {
    let project: Project = sqlx::query_as(
        r#"
            INSERT INTO projects (title, description, target_amount, category, image_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(project.title)
    .bind(project.description)
    .bind(project.target_amount)
    .bind(project.category)
    .bind(project.image_url)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Project #{} ({}) created", project.id, project.title);
    Ok(project)
}

pub async fn fetch_project(id: i64, conn: &mut SqliteConnection) -> Result<Option<Project>, sqlx::Error> {
    let project = sqlx::query_as("SELECT * FROM projects WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(project)
}

pub async fn count_projects(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects").fetch_one(conn).await?;
    Ok(count)
}

pub async fn count_completed_donations(project_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM donations WHERE project_id = $1 AND status = 'completed'")
            .bind(project_id)
            .fetch_one(conn)
            .await?;
    Ok(count)
}

pub async fn fetch_recent_completed_donations(
    project_id: i64,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Donation>, sqlx::Error> {
    let donations = sqlx::query_as(
        r#"SELECT * FROM donations
        WHERE project_id = $1 AND status = 'completed'
        ORDER BY julianday(created_at) DESC, id DESC
        LIMIT $2"#,
    )
    .bind(project_id)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(donations)
}

/// Fetches projects according to the criteria in the `ProjectQueryFilter`, newest first.
///
/// The caller is expected to have validated the status filter already. An unparseable status is reported as a
/// `DatabaseError`.
pub async fn search_projects(
    query: ProjectQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<ProjectSummary>, LedgerError> {
    let status = query.status_filter().map_err(LedgerError::DatabaseError)?;
    let mut builder = QueryBuilder::new(PROJECT_SUMMARY_SELECT);
    let mut has_where = false;
    if let ProjectStatusFilter::Only(status) = status {
        builder.push(" WHERE p.status = ");
        builder.push_bind(status.to_string());
        has_where = true;
    }
    if let Some(category) = query.category.as_ref().filter(|c| !c.trim().is_empty()) {
        builder.push(if has_where { " AND " } else { " WHERE " });
        builder.push("p.category = ");
        builder.push_bind(category.clone());
    }
    builder.push(" ORDER BY julianday(p.created_at) DESC, p.id DESC");
    if let Some(limit) = query.effective_limit() {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }
    trace!("🗃️ Executing query: {}", builder.sql());
    let projects = builder.build_query_as::<ProjectSummary>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_projects: {}", projects.len());
    Ok(projects)
}

pub async fn update_project(
    id: i64,
    update: ProjectUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Project>, LedgerError> {
    if update.is_empty() {
        debug!("🗃️ No fields to update for project {id}. Update request skipped.");
        return Err(LedgerError::ModificationNoOp);
    }
    let mut builder = QueryBuilder::new("UPDATE projects SET updated_at = CURRENT_TIMESTAMP, ");
    let mut set_clause = builder.separated(", ");
    if let Some(title) = update.title {
        set_clause.push("title = ");
        set_clause.push_bind_unseparated(title);
    }
    if let Some(description) = update.description {
        set_clause.push("description = ");
        set_clause.push_bind_unseparated(description);
    }
    if let Some(target) = update.target_amount {
        set_clause.push("target_amount = ");
        set_clause.push_bind_unseparated(target);
    }
    if let Some(category) = update.category {
        set_clause.push("category = ");
        set_clause.push_bind_unseparated(category);
    }
    if let Some(image_url) = update.image_url {
        set_clause.push("image_url = ");
        set_clause.push_bind_unseparated(image_url);
    }
    if let Some(status) = update.status {
        set_clause.push("status = ");
        set_clause.push_bind_unseparated(status.to_string());
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let project = builder.build_query_as::<Project>().fetch_optional(conn).await?;
    Ok(project)
}

pub async fn delete_project(id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1").bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

/// Adds `amount` to the project's running total. Only ever called by the winner of a settlement.
pub async fn credit_project(project_id: i64, amount: Kes, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    let result = sqlx::query(
        "UPDATE projects SET current_amount = current_amount + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
    )
    .bind(amount)
    .bind(project_id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::ProjectNotFound(project_id));
    }
    trace!("🗃️ Project #{project_id} credited with {amount}");
    Ok(())
}

/// Projects whose stored total disagrees with the sum of their completed donations.
pub async fn fetch_total_drift(conn: &mut SqliteConnection) -> Result<Vec<ProjectTotalDrift>, sqlx::Error> {
    let drift = sqlx::query_as(
        r#"
        SELECT * FROM (
            SELECT p.id AS project_id,
                p.title AS title,
                p.current_amount AS stored_amount,
                COALESCE((SELECT SUM(d.amount) FROM donations d
                    WHERE d.project_id = p.id AND d.status = 'completed'), 0) AS computed_amount
            FROM projects p
        ) WHERE stored_amount != computed_amount
        ORDER BY project_id
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(drift)
}

/// Sets every project's total to the sum of its completed donations.
pub async fn recalculate_totals(conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE projects SET current_amount = COALESCE((
            SELECT SUM(d.amount) FROM donations d WHERE d.project_id = projects.id AND d.status = 'completed'
        ), 0)
        "#,
    )
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
