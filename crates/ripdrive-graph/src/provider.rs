//! GraphDriveProvider - IRemoteDrive implementation for Microsoft Graph API
//!
//! Wraps the [`GraphClient`] and delegates to the [`children`] module to
//! fulfil the [`IRemoteDrive`] port contract.
//!
//! ## Design Notes
//!
//! - The access token is fixed for the lifetime of the provider. Refreshing
//!   credentials is the job of whoever builds the client.
//! - Content transfer does not go through this provider; see
//!   [`crate::transfer::HttpChunkedTransport`].

use anyhow::Result;
use tracing::debug;

use ripdrive_core::domain::RemoteId;
use ripdrive_core::ports::{ChildrenPage, IRemoteDrive};

use crate::children;
use crate::client::GraphClient;

/// Remote drive implementation that delegates to the Microsoft Graph API
pub struct GraphDriveProvider {
    client: GraphClient,
}

impl GraphDriveProvider {
    /// Creates a new `GraphDriveProvider` wrapping the given [`GraphClient`]
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl IRemoteDrive for GraphDriveProvider {
    /// Lists one page of children of `container`
    ///
    /// Delegates to [`children::list_children_page`].
    async fn list_children_page(
        &self,
        container: &RemoteId,
        continuation: Option<&str>,
    ) -> Result<ChildrenPage> {
        debug!(container = %container, "GraphDriveProvider::list_children_page");
        children::list_children_page(&self.client, container, continuation).await
    }

    /// Fetches a fresh pre-authorized download URL
    ///
    /// Delegates to [`children::get_download_url`].
    async fn get_download_url(&self, id: &RemoteId) -> Result<Option<String>> {
        debug!(id = %id, "GraphDriveProvider::get_download_url");
        children::get_download_url(&self.client, id).await
    }
}
