//! Error taxonomy for a notification run.
//!
//! Which variants are fatal depends on where they surface: configuration
//! and bucket resolution abort the whole run, upstream failures only abort
//! the keyword being processed, and data errors are recovered in place.

use reqwest::StatusCode;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum NotifierError {
    /// A required setting is missing from the settings sheet
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A value is present but malformed (e.g. the messaging token)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Non-200 response from the events API or the messaging webhook
    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: StatusCode,
        body: String,
    },

    /// A stored row could not be interpreted
    #[error("Data error: {0}")]
    Data(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl NotifierError {
    /// Create a configuration error for a missing settings field
    pub fn missing_setting(field: &str, cell: &str) -> Self {
        NotifierError::Configuration(format!("{} is not set (cell {})", field, cell))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        NotifierError::Validation(message.into())
    }

    pub fn upstream(service: &'static str, status: StatusCode, body: impl Into<String>) -> Self {
        NotifierError::Upstream {
            service,
            status,
            body: body.into(),
        }
    }

    pub fn data(message: impl Into<String>) -> Self {
        NotifierError::Data(message.into())
    }
}

/// Result type alias for notifier operations
pub type NotifierResult<T> = Result<T, NotifierError>;
