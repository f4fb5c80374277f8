//! Microsoft Graph children listing and item lookups
//!
//! Lists the children of a drive item one page at a time and converts the
//! raw DriveItem JSON into port-level [`RemoteEntry`] values.
//!
//! ## Listing Flow
//!
//! 1. **First page**: `GET /me/drive/items/{id}/children?$select=...`
//! 2. **Next pages**: follow `@odata.nextLink` (an absolute URL) verbatim
//! 3. **Last page**: no `@odata.nextLink` in the response
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ripdrive_core::domain::RemoteId;
//! use ripdrive_graph::children;
//! use ripdrive_graph::client::GraphClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = GraphClient::new("access-token");
//! let page = children::list_children_page(&client, &RemoteId::root(), None).await?;
//! println!("Got {} entries", page.entries.len());
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use ripdrive_core::domain::{ContentHash, HashKind, RemoteId};
use ripdrive_core::ports::{ChildrenPage, RemoteEntry};

use crate::client::GraphClient;

/// Fields requested for every listed child
pub const CHILDREN_SELECT: &str =
    "id,name,size,file,folder,parentReference,@microsoft.graph.downloadUrl";

// ============================================================================
// Microsoft Graph API response types (JSON deserialization)
// ============================================================================

/// Raw response from `GET /me/drive/items/{id}/children`
#[derive(Debug, Deserialize)]
struct GraphChildrenResponse {
    /// Children on this page
    #[serde(default)]
    value: Vec<GraphDriveItem>,

    /// URL for the next page of results (present when more pages exist)
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// A drive item as returned by the children and item endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDriveItem {
    /// Unique identifier of the item within the drive
    id: Option<String>,

    /// Name of the item (filename or folder name)
    name: Option<String>,

    /// Size of the item in bytes
    size: Option<u64>,

    /// Reference to the parent item
    parent_reference: Option<GraphParentReference>,

    /// File facet (present if the item is a file)
    file: Option<GraphFileFacet>,

    /// Folder facet (present if the item is a folder)
    folder: Option<serde_json::Value>,

    /// Pre-authorized content URL. Listed for field selection parity only;
    /// URLs are always fetched fresh before a transfer.
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    #[allow(dead_code)]
    download_url: Option<String>,
}

/// Parent reference information for a drive item
#[derive(Debug, Deserialize)]
struct GraphParentReference {
    /// Percent-encoded path of the parent, e.g. `/drive/root:/Docs`
    path: Option<String>,
}

/// File facet indicating the item is a file
#[derive(Debug, Deserialize)]
struct GraphFileFacet {
    /// Content hashes for integrity verification
    hashes: Option<GraphHashes>,
}

/// Hash values for a file
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphHashes {
    /// SHA-256 of the content (hex)
    sha256_hash: Option<String>,
    /// SHA-1 of the content (hex)
    sha1_hash: Option<String>,
    /// QuickXorHash of the content (Base64)
    quick_xor_hash: Option<String>,
}

/// Response from `GET /me/drive/items/{id}` when only the URL matters
#[derive(Debug, Deserialize)]
struct GraphDownloadUrlItem {
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    download_url: Option<String>,
}

// ============================================================================
// Conversion
// ============================================================================

fn parse_hashes(hashes: GraphHashes) -> Vec<ContentHash> {
    [
        (HashKind::Sha256, hashes.sha256_hash),
        (HashKind::Sha1, hashes.sha1_hash),
        (HashKind::QuickXor, hashes.quick_xor_hash),
    ]
    .into_iter()
    .filter_map(|(kind, value)| {
        let value = value?;
        match ContentHash::new(kind, value) {
            Ok(hash) => Some(hash),
            Err(err) => {
                warn!(%kind, %err, "Ignoring malformed hash from Graph");
                None
            }
        }
    })
    .collect()
}

fn parse_item(item: GraphDriveItem) -> RemoteEntry {
    let has_file_facet = item.file.is_some();
    let hashes = item.file.and_then(|f| f.hashes).map(parse_hashes);

    RemoteEntry {
        id: item.id,
        name: item.name,
        size: item.size,
        is_directory: item.folder.is_some(),
        has_file_facet,
        hashes,
        parent_path: item.parent_reference.and_then(|p| p.path),
    }
}

fn parse_response(response: GraphChildrenResponse) -> ChildrenPage {
    ChildrenPage {
        entries: response.value.into_iter().map(parse_item).collect(),
        next_link: response.next_link,
    }
}

/// Relative path of the first children page of `container`
pub fn children_path(container: &RemoteId) -> String {
    format!(
        "/me/drive/items/{}/children?$select={}",
        container.as_str(),
        CHILDREN_SELECT
    )
}

// ============================================================================
// Requests
// ============================================================================

/// Fetches one page of children of `container`
///
/// Pass the previous page's `next_link` as `continuation` to continue.
///
/// # Errors
///
/// Returns an error if the HTTP request fails, Graph answers with an error
/// status, or the response cannot be parsed.
pub async fn list_children_page(
    client: &GraphClient,
    container: &RemoteId,
    continuation: Option<&str>,
) -> Result<ChildrenPage> {
    let path = match continuation {
        Some(next_link) => next_link.to_string(),
        None => children_path(container),
    };
    debug!(container = %container, continued = continuation.is_some(), "Listing children");

    let raw: GraphChildrenResponse = client
        .get_checked(&path)
        .await
        .with_context(|| format!("Failed to list children of {container}"))?
        .json()
        .await
        .context("Failed to parse children response JSON")?;

    let page = parse_response(raw);
    debug!(
        container = %container,
        entries = page.entries.len(),
        has_next = page.next_link.is_some(),
        "Children page received"
    );
    Ok(page)
}

/// Fetches the short-lived download URL of a file
///
/// Returns `None` for items the API cannot serve directly (e.g. notebooks).
pub async fn get_download_url(client: &GraphClient, id: &RemoteId) -> Result<Option<String>> {
    let path = format!("/me/drive/items/{}", id.as_str());
    let item: GraphDownloadUrlItem = client
        .get_checked(&path)
        .await
        .with_context(|| format!("Could not get the file information for id {id}"))?
        .json()
        .await
        .context("Failed to parse item response JSON")?;

    debug!(id = %id, has_url = item.download_url.is_some(), "Download URL lookup");
    Ok(item.download_url.filter(|url| !url.is_empty()))
}

// ============================================================================
// Tests
// ============================================================================
