use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::AdminIdentity,
    traits::{AdminAuthError, AdminAuthManagement},
};

pub const SESSION_TOKEN_LENGTH: usize = 48;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub admin: AdminIdentity,
}

/// Password login and bearer sessions for the admin console.
#[derive(Clone)]
pub struct AdminAuthApi<B> {
    db: B,
    session_lifetime: Duration,
    hash_cost: u32,
}

impl<B> Debug for AdminAuthApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AdminAuthApi (sessions last {}h)", self.session_lifetime.num_hours())
    }
}

impl<B> AdminAuthApi<B>
where B: AdminAuthManagement
{
    pub fn new(db: B, session_lifetime: Duration) -> Self {
        Self { db, session_lifetime, hash_cost: bcrypt::DEFAULT_COST }
    }

    /// Sets the bcrypt work factor used for new password hashes.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Checks the password and opens a new session. Expired sessions are purged along the way.
    ///
    /// An unknown user and a wrong password produce the same error.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AdminAuthError> {
        let user = self.db.fetch_admin_by_username(username.trim()).await?;
        let Some(user) = user else {
            debug!("🔐️ Login attempt for unknown admin '{username}'");
            return Err(AdminAuthError::InvalidCredentials);
        };
        if !verify_password(password, &user.password_hash).await? {
            debug!("🔐️ Wrong password for admin '{username}'");
            return Err(AdminAuthError::InvalidCredentials);
        }
        let now = Utc::now();
        let purged = self.db.purge_expired_sessions(now).await?;
        if purged > 0 {
            debug!("🔐️ {purged} expired admin sessions purged");
        }
        let token = new_session_token();
        let expires_at = now + self.session_lifetime;
        self.db.insert_session(user.id, &token, expires_at).await?;
        info!("🔐️ Admin '{}' logged in. Session valid until {expires_at}", user.username);
        Ok(LoginResponse { token, expires_at, admin: AdminIdentity::from(user) })
    }

    pub async fn validate_session(&self, token: &str) -> Result<AdminIdentity, AdminAuthError> {
        if token.is_empty() {
            return Err(AdminAuthError::InvalidSession);
        }
        self.db.fetch_session_identity(token, Utc::now()).await?.ok_or(AdminAuthError::InvalidSession)
    }

    pub async fn logout(&self, token: &str) -> Result<(), AdminAuthError> {
        if self.db.delete_session(token).await? {
            debug!("🔐️ Admin session ended");
        }
        Ok(())
    }

    /// Creates the bootstrap admin account if there are no admins yet. Returns the new identity, if one was created.
    pub async fn ensure_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Option<AdminIdentity>, AdminAuthError> {
        if self.db.count_admins().await? > 0 {
            return Ok(None);
        }
        if username.trim().is_empty() || email.trim().is_empty() {
            return Err(AdminAuthError::ValidationError("The admin username and email are required".into()));
        }
        if password.len() < 8 {
            return Err(AdminAuthError::ValidationError("The admin password must be at least 8 characters".into()));
        }
        let hash = hash_password(password, self.hash_cost).await?;
        let admin = self.db.insert_admin(username.trim(), email.trim(), &hash).await?;
        info!("🔐️ Bootstrap admin '{}' created", admin.username);
        Ok(Some(admin))
    }
}

pub fn new_session_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(SESSION_TOKEN_LENGTH).map(char::from).collect()
}

/// bcrypt is deliberately slow, so it runs on the blocking pool.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AdminAuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AdminAuthError::HashingError(e.to_string()))?
        .map_err(|e| AdminAuthError::HashingError(e.to_string()))
}

pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AdminAuthError> {
    let password = password.to_string();
    let hash = hash.to_string();
    let result = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AdminAuthError::HashingError(e.to_string()))?;
    match result {
        Ok(valid) => Ok(valid),
        Err(e) => {
            warn!("🔐️ Stored password hash could not be checked. {e}");
            Ok(false)
        },
    }
}
