//! Remote drive port (driven/secondary port)
//!
//! This module defines the interface the tree walker uses to enumerate the
//! remote namespace and the coordinator uses to obtain short-lived content
//! URLs. The primary implementation targets OneDrive via the Microsoft
//! Graph API.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific.
//! - [`RemoteEntry`] is a port-level DTO, not a domain entity: every field
//!   the provider may omit is optional. The walker is responsible for
//!   turning entries into [`RemoteItem`](crate::domain::RemoteItem)s.

use crate::domain::newtypes::RemoteId;
use crate::domain::remote_item::ContentHash;

/// A single entry from a children listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Provider-specific item identifier
    pub id: Option<String>,
    /// Item name
    pub name: Option<String>,
    /// Size in bytes
    pub size: Option<u64>,
    /// Whether the entry carries the provider's directory marker
    pub is_directory: bool,
    /// Whether the entry carries a file facet at all
    pub has_file_facet: bool,
    /// Content hashes from the file facet (`None` if the facet has no hash set)
    pub hashes: Option<Vec<ContentHash>>,
    /// Provider-encoded path of the containing directory
    pub parent_path: Option<String>,
}

/// One page of a children listing
#[derive(Debug, Clone, Default)]
pub struct ChildrenPage {
    /// Entries on this page
    pub entries: Vec<RemoteEntry>,
    /// Continuation link for the next page (None on the last page)
    pub next_link: Option<String>,
}

/// Port trait for the remote drive
#[async_trait::async_trait]
pub trait IRemoteDrive: Send + Sync {
    /// Lists one page of the children of `container`
    ///
    /// Pass `continuation = None` for the first page and the previous page's
    /// `next_link` for the following ones.
    ///
    /// # Errors
    /// Network errors, invalid container ids and permission failures.
    async fn list_children_page(
        &self,
        container: &RemoteId,
        continuation: Option<&str>,
    ) -> anyhow::Result<ChildrenPage>;

    /// Fetches the pre-authorized download URL for a file
    ///
    /// Called immediately before a transfer because the URL is short-lived.
    /// Returns `Ok(None)` when the provider cannot serve the content directly.
    async fn get_download_url(&self, id: &RemoteId) -> anyhow::Result<Option<String>>;
}
