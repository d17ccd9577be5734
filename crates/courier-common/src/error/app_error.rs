//! Application error types
//!
//! Top-level error taxonomy for the producer process. Component crates
//! define their own error enums and convert into this one at the boundary.

use crate::config::ConfigError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Startup errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Not enough sessions remaining to start: need {needed}, have {remaining}")]
    NotEnoughSessions { needed: u32, remaining: u32 },

    // Infrastructure errors
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    // External service errors
    #[error("External service error: {0}")]
    ExternalService(String),
}

impl AppError {
    /// Check whether this error should abort startup rather than be retried
    #[must_use]
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::InvalidToken | Self::NotEnoughSessions { .. }
        )
    }

    /// Create a cache error from any error
    pub fn cache(err: impl std::fmt::Display) -> Self {
        Self::Cache(err.to_string())
    }

    /// Create a gateway error from any error
    pub fn gateway(err: impl std::fmt::Display) -> Self {
        Self::Gateway(err.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
