//! RipDrive Graph - Microsoft Graph adapters
//!
//! Provides async adapters for:
//! - Paginated children listing with field selection
//! - Short-lived download URL lookup
//! - Parallel, throttled byte-range downloads
//! - Bearer token sources (static or keyring-backed)
//!
//! ## Modules
//!
//! - [`auth`] - Token providers implementing `IAuthProvider`
//! - [`client`] - Microsoft Graph API HTTP client
//! - [`children`] - Children listing and item metadata
//! - [`provider`] - `IRemoteDrive` implementation
//! - [`rate_limit`] - Byte-rate throttle for downloads
//! - [`transfer`] - `IChunkedTransport` implementation over HTTP ranges

pub mod auth;
pub mod children;
pub mod client;
pub mod provider;
pub mod rate_limit;
pub mod transfer;

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when communicating with the Microsoft Graph API
#[derive(Debug, Error)]
pub enum GraphError {
    /// Authentication credentials are invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded; retry after the specified duration
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration to wait before retrying
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The OAuth2 token has expired and must be refreshed
    #[error("Token expired")]
    TokenExpired,

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GraphError {
    /// Classifies a non-success HTTP status
    pub fn from_status(status: StatusCode, body: String) -> Self {
        let detail = if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {body}")
        };
        match status {
            StatusCode::UNAUTHORIZED => GraphError::Unauthorized(detail),
            StatusCode::FORBIDDEN => GraphError::Forbidden(detail),
            StatusCode::NOT_FOUND => GraphError::NotFound(detail),
            StatusCode::TOO_MANY_REQUESTS => GraphError::TooManyRequests {
                retry_after: Duration::from_secs(30),
            },
            s if s.is_server_error() => GraphError::ServerError(detail),
            _ => GraphError::InvalidResponse(detail),
        }
    }
}
