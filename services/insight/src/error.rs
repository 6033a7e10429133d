//! services/insight/src/error.rs
//!
//! Defines the primary error type for the insight service.

use crate::config::ConfigError;
use erp_insight_core::ports::PortError;

/// The primary error type for the `insight` service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error from the HTTP client used for the inference server.
    #[error("HTTP Error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., reading the console).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
