//! Error types for the scheduler

use thiserror::Error;

/// Result type alias for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors raised by the scheduler and its adapters
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Storage operation failed
    #[error("Repository error: {0}")]
    Repository(#[from] lw_core::Error),

    /// Fetching candidates for a task failed
    #[error("Fetch failed: {message}")]
    Fetch {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Delivering a notification failed
    #[error("Notification failed: {message}")]
    Notify {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Adapter misconfiguration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SchedulerError {
    /// Create a Fetch error
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Fetch error with source
    pub fn fetch_with_source(message: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Fetch {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a Notify error
    pub fn notify(message: impl Into<String>) -> Self {
        Self::Notify {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Notify error with source
    pub fn notify_with_source(message: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Notify {
            message: message.into(),
            source: Some(source),
        }
    }
}
