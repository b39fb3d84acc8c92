use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{AdminIdentity, AdminSession, AdminUser};

pub async fn fetch_admin_by_username(
    username: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<AdminUser>, sqlx::Error> {
    let user =
        sqlx::query_as("SELECT * FROM admin_users WHERE username = $1").bind(username).fetch_optional(conn).await?;
    Ok(user)
}

pub async fn count_admins(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM admin_users").fetch_one(conn).await?;
    Ok(count)
}

pub async fn insert_admin(
    username: &str,
    email: &str,
    password_hash: &str,
    conn: &mut SqliteConnection,
) -> Result<AdminIdentity, sqlx::Error> {
    let admin: AdminIdentity = sqlx::query_as(
        r#"INSERT INTO admin_users (username, email, password_hash, created_at) VALUES ($1, $2, $3, $4)
        RETURNING id, username, email"#,
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Admin account #{} ({}) created", admin.id, admin.username);
    Ok(admin)
}

pub async fn insert_session(
    admin_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<AdminSession, sqlx::Error> {
    let session = sqlx::query_as(
        "INSERT INTO admin_sessions (token, admin_id, expires_at, created_at) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(token)
    .bind(admin_id)
    .bind(expires_at)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(session)
}

pub async fn fetch_session_identity(
    token: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<AdminIdentity>, sqlx::Error> {
    let identity = sqlx::query_as(
        r#"SELECT u.id, u.username, u.email FROM admin_sessions s
        JOIN admin_users u ON u.id = s.admin_id
        WHERE s.token = $1 AND julianday(s.expires_at) > julianday($2)"#,
    )
    .bind(token)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(identity)
}

pub async fn delete_session(token: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM admin_sessions WHERE token = $1").bind(token).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn purge_expired_sessions(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM admin_sessions WHERE julianday(expires_at) <= julianday($1)")
        .bind(now)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
