//! Microsoft Graph API client
//!
//! Thin wrapper over `reqwest` that adds the bearer token, resolves
//! relative API paths and continuation links, and waits out 429s.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use reqwest::Method;
//! use ripdrive_graph::client::GraphClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = GraphClient::new("access-token-here");
//! let response = client.execute_with_retry(Method::GET, "/me/drive/root").await?;
//! println!("status: {}", response.status());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, info, warn};

use crate::GraphError;

const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Wait used when a 429 carries no usable `Retry-After`
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

const DEFAULT_MAX_RETRIES: u32 = 5;

/// Longest Retry-After honoured, in seconds
const MAX_RETRY_AFTER_SECS: u64 = 3600;

/// Authenticated Graph endpoint access for one mirror run
///
/// The bearer token is fixed for the client's lifetime; a run never
/// re-authenticates.
pub struct GraphClient {
    http: Client,
    base_url: String,
    token: String,
    max_retries: u32,
}

impl GraphClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, GRAPH_BASE_URL)
    }

    /// Points the client at another endpoint (a mock server in tests)
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: access_token.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Overrides how many 429 responses are retried
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// The connection pool, for pre-authorized download URLs that must not
    /// carry the token
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Resolves `path` against the base URL
    ///
    /// Absolute URLs (e.g. `@odata.nextLink` values) are used as they are.
    pub fn url_for(&self, path: &str) -> String {
        match url::Url::parse(path) {
            Ok(absolute) if matches!(absolute.scheme(), "http" | "https") => absolute.into(),
            _ => format!("{}{}", self.base_url, path),
        }
    }

    /// Request builder for `path` with the Authorization header set
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url_for(path))
            .bearer_auth(&self.token)
    }

    /// Sends the request, sleeping through 429 responses
    ///
    /// Every other status, success or not, is handed back to the caller.
    /// Gives up with [`GraphError::TooManyRequests`] once `max_retries`
    /// throttled responses have been seen.
    pub async fn execute_with_retry(&self, method: Method, path: &str) -> Result<Response> {
        let mut attempt = 0;
        loop {
            let response = self
                .request(method.clone(), path)
                .send()
                .await
                .map_err(GraphError::from)
                .with_context(|| format!("Failed to send {method} {path}"))?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                if attempt > 0 {
                    info!(path, attempt, "Throttled request went through");
                }
                return Ok(response);
            }

            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map_or(DEFAULT_RETRY_AFTER, |v| {
                    parse_retry_after(v, DEFAULT_RETRY_AFTER)
                });

            if attempt >= self.max_retries {
                warn!(path, attempts = attempt + 1, "Still throttled, giving up");
                return Err(GraphError::TooManyRequests { retry_after }.into());
            }

            info!(
                path,
                attempt,
                retry_after_ms = retry_after.as_millis(),
                "Throttled by Graph, waiting"
            );
            tokio::time::sleep(retry_after).await;
            attempt += 1;
        }
    }

    /// GET that maps non-success statuses to [`GraphError`]
    pub async fn get_checked(&self, path: &str) -> Result<Response> {
        let response = self.execute_with_retry(Method::GET, path).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(path, %status, "Graph request failed");
        Err(GraphError::from_status(status, body).into())
    }
}

/// Parses a `Retry-After` header value (seconds or HTTP-date)
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    // Integer seconds are by far the most common for Graph
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds.min(MAX_RETRY_AFTER_SECS));
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let now = chrono::Utc::now();
        let target = date.with_timezone(&chrono::Utc);
        if target > now {
            let diff = target - now;
            if let Some(secs) = diff
                .num_seconds()
                .try_into()
                .ok()
                .filter(|&s: &u64| s <= MAX_RETRY_AFTER_SECS)
            {
                return Duration::from_secs(secs);
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
