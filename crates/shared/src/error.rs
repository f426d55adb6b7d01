//! Error types for hsadmin

use thiserror::Error;

/// Errors surfaced by the admin API client.
///
/// `Auth` is fatal for a session. `NotFound`, `Remote` and `InvalidResponse`
/// are reported per item and never stop a batch. `Network` is retried once
/// before it reaches the caller.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote error (HTTP {status}): {message}")]
    Remote {
        status: u16,
        /// Machine-readable code from the error object, e.g. `M_FORBIDDEN`
        errcode: Option<String>,
        message: String,
        /// Raw response body, kept for operator diagnosis
        body: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl AdminError {
    /// Returns true if this error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, AdminError::Network(_))
    }

    /// Returns true if the session can no longer continue
    pub fn is_fatal(&self) -> bool {
        matches!(self, AdminError::Auth(_))
    }

    /// Raw server payload, when the failure came with one
    pub fn payload(&self) -> Option<&str> {
        match self {
            AdminError::Remote { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }
}

pub type AdminResult<T> = Result<T, AdminError>;
