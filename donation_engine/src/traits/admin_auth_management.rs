use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{AdminIdentity, AdminSession, AdminUser};

#[derive(Debug, Clone, Error)]
pub enum AdminAuthError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("The session token is invalid or has expired")]
    InvalidSession,
    #[error("Could not hash or verify the password. {0}")]
    HashingError(String),
    #[error("{0}")]
    ValidationError(String),
}

impl From<sqlx::Error> for AdminAuthError {
    fn from(e: sqlx::Error) -> Self {
        AdminAuthError::DatabaseError(e.to_string())
    }
}

/// Storage for admin accounts and their bearer sessions.
#[allow(async_fn_in_trait)]
pub trait AdminAuthManagement {
    async fn fetch_admin_by_username(&self, username: &str) -> Result<Option<AdminUser>, AdminAuthError>;

    async fn count_admins(&self) -> Result<i64, AdminAuthError>;

    async fn insert_admin(&self, username: &str, email: &str, password_hash: &str)
        -> Result<AdminIdentity, AdminAuthError>;

    async fn insert_session(
        &self,
        admin_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<AdminSession, AdminAuthError>;

    /// Returns the admin that owns `token`, provided the session has not expired as of `now`.
    async fn fetch_session_identity(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AdminIdentity>, AdminAuthError>;

    async fn delete_session(&self, token: &str) -> Result<bool, AdminAuthError>;

    /// Removes all sessions that expired before `now`. Returns the number removed.
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AdminAuthError>;
}
