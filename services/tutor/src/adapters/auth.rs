//! services/tutor/src/adapters/auth.rs
//!
//! Email/password authentication backed by the `users` and `auth_sessions`
//! tables. Passwords are hashed with Argon2; the session id doubles as the
//! access token and is kept in the local store so a restart resumes it.
//!
//! When confirmation is required, sign-up stores a one-time token on the user
//! row. The shell has no mail transport, so the token is logged; redeeming it
//! with `confirm <token>` stands in for following the emailed link.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tutor_core::domain::{ProfileDefaults, Session, SignUpOutcome};
use tutor_core::ports::{AuthService, KeyValueStore, PortError, PortResult};
use uuid::Uuid;

/// Local-store key of the persisted access token.
pub const ACCESS_TOKEN_KEY: &str = "auth_access_token";
const SESSION_LIFETIME_DAYS: i64 = 30;

pub fn hash_password(password: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            PortError::Unexpected("Failed to hash password".to_string())
        })
}

pub fn verify_password(password: &str, hashed: &str) -> PortResult<bool> {
    let parsed = PasswordHash::new(hashed).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        PortError::Unexpected("Authentication error".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
    email_confirmed: bool,
}

#[derive(FromRow)]
struct ConfirmedRecord {
    user_id: Uuid,
    email: String,
}

#[derive(FromRow)]
struct SessionRecord {
    id: String,
    user_id: Uuid,
    email: String,
    expires_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> Session {
        Session {
            user_id: self.user_id,
            email: self.email,
            access_token: self.id,
            expires_at: self.expires_at,
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct PgAuthService {
    pool: PgPool,
    local: Arc<dyn KeyValueStore>,
    sessions: watch::Sender<Option<Session>>,
    require_email_confirmation: bool,
}

impl PgAuthService {
    pub fn new(pool: PgPool, local: Arc<dyn KeyValueStore>, require_email_confirmation: bool) -> Self {
        let (sessions, _) = watch::channel(None);
        Self {
            pool,
            local,
            sessions,
            require_email_confirmation,
        }
    }

    async fn create_session(&self, user_id: Uuid, email: String) -> PortResult<Session> {
        let session = Session {
            user_id,
            email,
            access_token: Uuid::new_v4().to_string(),
            expires_at: Utc::now() + Duration::days(SESSION_LIFETIME_DAYS),
        };
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.access_token)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if let Err(e) = self.local.set(ACCESS_TOKEN_KEY, &session.access_token) {
            warn!("Could not persist access token: {}", e);
        }
        self.sessions.send_replace(Some(session.clone()));
        Ok(session)
    }

    fn forget_token(&self) {
        if let Err(e) = self.local.remove(ACCESS_TOKEN_KEY) {
            warn!("Could not clear access token: {}", e);
        }
    }
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for PgAuthService {
    async fn current_session(&self) -> PortResult<Option<Session>> {
        let Some(token) = self.local.get::<String>(ACCESS_TOKEN_KEY)? else {
            return Ok(None);
        };

        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT s.id, s.user_id, u.email, s.expires_at \
             FROM auth_sessions s JOIN users u ON u.user_id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > NOW()",
        )
        .bind(&token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let session = match record {
            Some(record) => Some(record.to_domain()),
            None => {
                info!("Stored access token is no longer valid.");
                self.forget_token();
                None
            }
        };
        self.sessions.send_replace(session.clone());
        Ok(session)
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.sessions.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<Session> {
        let creds = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password, email_confirmed FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .ok_or_else(|| PortError::Unauthorized("Invalid login credentials".to_string()))?;

        if !verify_password(password, &creds.hashed_password)? {
            return Err(PortError::Unauthorized("Invalid login credentials".to_string()));
        }
        if self.require_email_confirmation && !creds.email_confirmed {
            return Err(PortError::Unauthorized("Email not confirmed".to_string()));
        }

        let session = self.create_session(creds.user_id, creds.email).await?;
        info!("User {} signed in.", session.user_id);
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &ProfileDefaults,
    ) -> PortResult<SignUpOutcome> {
        let password_hash = hash_password(password)?;
        let user_id = Uuid::new_v4();
        let confirmation_token = self
            .require_email_confirmation
            .then(|| Uuid::new_v4().simple().to_string());

        sqlx::query(
            "INSERT INTO users (user_id, email, hashed_password, name, level, email_confirmed, confirmation_token) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user_id)
        .bind(email)
        .bind(&password_hash)
        .bind(&profile.name)
        .bind(&profile.level)
        .bind(confirmation_token.is_none())
        .bind(&confirmation_token)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Unauthorized("User already registered".to_string())
            }
            e => PortError::Unexpected(e.to_string()),
        })?;
        info!("Created account {} for {}.", user_id, email);

        if let Some(token) = confirmation_token {
            info!("Confirmation token for {}: {}", email, token);
            return Ok(SignUpOutcome::ConfirmationPending);
        }
        let session = self.create_session(user_id, email.to_string()).await?;
        Ok(SignUpOutcome::SignedIn(session))
    }

    async fn confirm_email(&self, token: &str) -> PortResult<Session> {
        let confirmed = sqlx::query_as::<_, ConfirmedRecord>(
            "UPDATE users SET email_confirmed = TRUE, confirmation_token = NULL \
             WHERE confirmation_token = $1 \
             RETURNING user_id, email",
        )
        .bind(token.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .ok_or_else(|| PortError::Unauthorized("Invalid or expired confirmation link".to_string()))?;

        info!("User {} confirmed their email.", confirmed.user_id);
        self.create_session(confirmed.user_id, confirmed.email).await
    }

    async fn sign_out(&self) -> PortResult<()> {
        let token = self.local.get::<String>(ACCESS_TOKEN_KEY)?;
        if let Some(token) = token {
            sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
                .bind(&token)
                .execute(&self.pool)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }
        self.forget_token();
        self.sessions.send_replace(None);
        info!("Signed out.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("correct horse").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-hash").is_err());
    }
}
