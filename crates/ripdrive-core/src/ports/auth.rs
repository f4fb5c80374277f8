//! Authentication port
//!
//! Credential acquisition and refresh live outside the mirroring engine.
//! The engine only needs a working bearer token, obtained once before the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OAuth tokens as stored by the interactive login tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for refreshing the access token without user interaction
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Port trait for the bearer credential source
#[async_trait::async_trait]
pub trait IAuthProvider: Send + Sync {
    /// Returns a bearer token usable by the remote API client
    ///
    /// # Errors
    /// Missing, unreadable or expired credentials. This is a configuration
    /// problem surfaced before the engine starts.
    async fn access_token(&self) -> anyhow::Result<String>;
}
