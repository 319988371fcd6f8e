//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::calendar::CalendarProviderKind;

/// Main error type for Trellis
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum TrellisError {
    /// Missing or expired credentials; the user must re-authenticate.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A provider fetch failed (network, non-2xx status, or malformed
    /// payload). Carries the provider and, when known, the upstream
    /// HTTP status.
    #[error("Provider fetch error ({provider}): {message}")]
    ProviderFetch {
        provider: CalendarProviderKind,
        status: Option<u16>,
        message: String,
    },

    /// Malformed request input (inverted time range, missing user id).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Failure reading from or writing to the database.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Trellis operations
pub type Result<T> = std::result::Result<T, TrellisError>;

impl TrellisError {
    /// Helper for building a provider fetch error without a status code.
    pub fn provider_fetch(provider: CalendarProviderKind, message: impl Into<String>) -> Self {
        TrellisError::ProviderFetch { provider, status: None, message: message.into() }
    }
}
