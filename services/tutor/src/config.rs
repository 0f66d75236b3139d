//! services/tutor/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::Level;
use tutor_core::recommended::{DeliveryPolicy, DEFAULT_ITEMS_PER_CATEGORY};

const DEFAULT_API_BASE: &str = "https://api.deepseek.com";
const DEFAULT_MODEL: &str = "deepseek-chat";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub log_level: Level,
    pub llm_api_key: Option<String>,
    pub llm_api_base: String,
    pub llm_model: String,
    pub local_store_path: PathBuf,
    pub auth_settle_timeout: Duration,
    pub recommended_limit: u32,
    pub recommended_delivery: DeliveryPolicy,
    pub require_email_confirmation: bool,
    pub lesson_level: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Database ---
        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Language model (the key is optional) ---
        let non_blank = |name: &str| var(name).filter(|key| !key.trim().is_empty());
        let llm_api_key = non_blank("LLM_API_KEY").or_else(|| non_blank("DEEPSEEK_API_KEY"));
        let llm_api_base = var("LLM_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let llm_model = var("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        // --- Client behaviour ---
        let local_store_path = var("LOCAL_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.tutor/local.json"));
        let auth_settle_timeout =
            Duration::from_millis(parse_or("AUTH_SETTLE_TIMEOUT_MS", var("AUTH_SETTLE_TIMEOUT_MS"), 2000)?);
        let recommended_limit = parse_or(
            "RECOMMENDED_LIMIT",
            var("RECOMMENDED_LIMIT"),
            DEFAULT_ITEMS_PER_CATEGORY,
        )?;
        let recommended_delivery = parse_or(
            "RECOMMENDED_DELIVERY",
            var("RECOMMENDED_DELIVERY"),
            DeliveryPolicy::default(),
        )?;
        let require_email_confirmation = parse_or(
            "REQUIRE_EMAIL_CONFIRMATION",
            var("REQUIRE_EMAIL_CONFIRMATION"),
            false,
        )?;
        let lesson_level = var("LESSON_LEVEL").unwrap_or_else(|| "B2".to_string());

        Ok(Self {
            database_url,
            log_level,
            llm_api_key,
            llm_api_base,
            llm_model,
            local_store_path,
            auth_settle_timeout,
            recommended_limit,
            recommended_delivery,
            require_email_confirmation,
            lesson_level,
        })
    }
}

fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_database_is_set() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/tutor")])).unwrap();

        assert_eq!(config.llm_api_key, None);
        assert_eq!(config.llm_api_base, "https://api.deepseek.com");
        assert_eq!(config.llm_model, "deepseek-chat");
        assert_eq!(config.auth_settle_timeout, Duration::from_secs(2));
        assert_eq!(config.recommended_limit, 3);
        assert_eq!(config.recommended_delivery, DeliveryPolicy::PushedOnly);
        assert!(!config.require_email_confirmation);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(name) if name == "DATABASE_URL"));
    }

    #[test]
    fn deepseek_key_is_accepted_and_blank_keys_ignored() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/tutor"),
            ("DEEPSEEK_API_KEY", "sk-test"),
        ]))
        .unwrap();
        assert_eq!(config.llm_api_key.as_deref(), Some("sk-test"));

        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/tutor"),
            ("LLM_API_KEY", "  "),
        ]))
        .unwrap();
        assert_eq!(config.llm_api_key, None);
    }

    #[test]
    fn blank_llm_key_falls_back_to_deepseek_key() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/tutor"),
            ("LLM_API_KEY", ""),
            ("DEEPSEEK_API_KEY", "sk-deepseek"),
        ]))
        .unwrap();

        assert_eq!(config.llm_api_key.as_deref(), Some("sk-deepseek"));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/tutor"),
            ("RECOMMENDED_DELIVERY", "sometimes"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "RECOMMENDED_DELIVERY"));
    }
}
