//! services/tutor/src/error.rs
//!
//! Defines the primary error type for the tutor shell.

use crate::config::ConfigError;
use tutor_core::ports::PortError;
use tutor_core::writing_coach::CoachError;

/// The primary error type for the `tutor` service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// A writing-coach precondition or persistence failure.
    #[error("{0}")]
    Coach(#[from] CoachError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., reading the terminal).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
