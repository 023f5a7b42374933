//! Identity client error types.

use thiserror::Error;

/// Errors returned by the identity service client.
///
/// None of these are retried internally; the reconciliation loop owns retry policy.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("identity service error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("identity service rejected {operation}: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },

    #[error("malformed {operation} response: {message}")]
    Malformed {
        operation: &'static str,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}
