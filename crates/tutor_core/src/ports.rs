//! crates/tutor_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the client's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the hosted auth/database backend, the LLM endpoint,
//! and the device-local store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::{
    Article, ChatTurn, ContentCategory, Essay, NewEssay, ProfileDefaults, QuizAttempt,
    QuizHistoryEntry, RecommendedArticle, Session, SignUpOutcome,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// The service has no credentials or endpoint configured.
    #[error("Service not configured: {0}")]
    NotConfigured(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Returns the session restored from a previous run, if it is still valid.
    async fn current_session(&self) -> PortResult<Option<Session>>;

    /// Subscribes to session transitions. The receiver always holds the latest value.
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<Session>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &ProfileDefaults,
    ) -> PortResult<SignUpOutcome>;

    /// Redeems the token from a confirmation email and signs the account in.
    async fn confirm_email(&self, token: &str) -> PortResult<Session>;

    async fn sign_out(&self) -> PortResult<()>;
}

/// Which delivery-flag rows a recommended-content query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFilter {
    Delivered,
    Undelivered,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    // --- Reading ---
    async fn insert_article(&self, article: &Article, level: &str) -> PortResult<Uuid>;

    async fn insert_quiz_attempt(&self, attempt: &QuizAttempt) -> PortResult<()>;

    /// Newest first.
    async fn quiz_history(&self, user_id: Uuid) -> PortResult<Vec<QuizHistoryEntry>>;

    // --- Writing ---
    async fn insert_essay(&self, essay: &NewEssay) -> PortResult<Uuid>;

    /// Newest first.
    async fn list_essays(&self, user_id: Uuid) -> PortResult<Vec<Essay>>;

    // --- Recommended Content ---
    async fn fetch_recommended(
        &self,
        category: ContentCategory,
        filter: DeliveryFilter,
        limit: u32,
    ) -> PortResult<Vec<RecommendedArticle>>;

    /// Flags one item as delivered. Marking an already delivered item is a no-op.
    async fn mark_delivered(&self, id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Runs one chat completion and returns the text of the first choice.
    async fn complete(&self, system_prompt: &str, turns: &[ChatTurn]) -> PortResult<String>;
}

/// A device-local store of JSON values.
pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> PortResult<Option<serde_json::Value>>;

    fn set_raw(&self, key: &str, value: serde_json::Value) -> PortResult<()>;

    fn remove(&self, key: &str) -> PortResult<()>;
}

impl dyn KeyValueStore {
    /// Reads and decodes a value. An undecodable value reads as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> PortResult<Option<T>> {
        match self.get_raw(key)? {
            Some(value) => match serde_json::from_value(value) {
                Ok(decoded) => Ok(Some(decoded)),
                Err(e) => {
                    tracing::warn!("Discarding undecodable local value '{}': {}", key, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> PortResult<()> {
        let value =
            serde_json::to_value(value).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.set_raw(key, value)
    }
}

/// A source of the current time, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
