//! Bearer credential sources for Microsoft Graph
//!
//! The mirror never runs an interactive login. It consumes a token that was
//! either handed to it directly or stored in the system keyring by the
//! login tooling.
//!
//! ## Components
//!
//! - [`StaticTokenProvider`] - A token supplied on the command line or environment
//! - [`KeyringTokenStorage`] - Secure token storage using the system keyring
//! - [`KeyringTokenProvider`] - [`IAuthProvider`] reading from [`KeyringTokenStorage`]

use anyhow::{Context, Result};
use tracing::{debug, info};

use ripdrive_core::ports::{IAuthProvider, Tokens};

/// Keyring service name for storing tokens
const KEYRING_SERVICE: &str = "ripdrive";

// ============================================================================
// StaticTokenProvider
// ============================================================================

/// Hands out a fixed access token
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Creates a provider for the given token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl IAuthProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let token = self.token.trim();
        if token.is_empty() {
            anyhow::bail!("Access token is empty");
        }
        Ok(token.to_string())
    }
}

// ============================================================================
// KeyringTokenStorage
// ============================================================================

/// Stores and retrieves OAuth tokens from the system keyring
///
/// Uses the `keyring` crate to store tokens securely in the OS credential
/// store (e.g., GNOME Keyring, KDE Wallet, macOS Keychain).
/// Tokens are serialized as JSON with the service name "ripdrive" and the
/// account name as the username.
pub struct KeyringTokenStorage;

impl KeyringTokenStorage {
    /// Stores tokens in the system keyring for the given account
    pub fn store(account: &str, tokens: &Tokens) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, account)
            .context("Failed to create keyring entry")?;

        let json = serde_json::to_string(tokens).context("Failed to serialize tokens")?;

        entry
            .set_password(&json)
            .context("Failed to store tokens in keyring")?;

        debug!("Stored tokens in keyring for account: {}", account);
        Ok(())
    }

    /// Loads tokens from the system keyring for the given account
    ///
    /// # Returns
    /// `Some(Tokens)` if found, `None` if no entry exists
    pub fn load(account: &str) -> Result<Option<Tokens>> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, account)
            .context("Failed to create keyring entry")?;

        match entry.get_password() {
            Ok(json) => {
                let tokens: Tokens = serde_json::from_str(&json)
                    .context("Failed to deserialize tokens from keyring")?;
                debug!("Loaded tokens from keyring for account: {}", account);
                Ok(Some(tokens))
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No tokens found in keyring for account: {}", account);
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    /// Removes tokens from the system keyring for the given account
    pub fn clear(account: &str) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, account)
            .context("Failed to create keyring entry")?;

        match entry.delete_credential() {
            Ok(()) => {
                info!("Cleared tokens from keyring for account: {}", account);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No tokens to clear for account: {}", account);
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

// ============================================================================
// KeyringTokenProvider
// ============================================================================

/// Reads the access token stored for an account
///
/// Expired tokens are rejected rather than refreshed; renewing them is the
/// login tooling's job.
pub struct KeyringTokenProvider {
    account: String,
}

impl KeyringTokenProvider {
    /// Creates a provider for the given keyring account
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    /// Returns the keyring account name
    pub fn account(&self) -> &str {
        &self.account
    }
}

/// Extracts a usable access token from stored tokens
fn usable_token(account: &str, tokens: Option<Tokens>) -> Result<String> {
    let tokens = tokens.with_context(|| format!("No stored tokens for account '{account}'"))?;
    if tokens.is_expired() {
        anyhow::bail!(
            "Stored token for account '{}' expired at {}; log in again",
            account,
            tokens.expires_at
        );
    }
    Ok(tokens.access_token)
}

#[async_trait::async_trait]
impl IAuthProvider for KeyringTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let account = self.account.clone();
        let tokens = tokio::task::spawn_blocking(move || KeyringTokenStorage::load(&account))
            .await
            .context("Keyring lookup task failed")??;
        usable_token(&self.account, tokens)
    }
}
