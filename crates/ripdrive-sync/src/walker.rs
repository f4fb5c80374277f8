//! Paginated remote tree enumeration
//!
//! [`RemoteTreeWalker::list_children`] lists one container, follows every
//! continuation link and merges all pages into a single [`TraversalFrame`].
//! The coordinator owns the work-stack of frames; the walker is stateless.

use std::collections::HashSet;
use std::sync::Arc;

use ripdrive_core::domain::{FileMetadata, RemoteId, RemoteItem};
use ripdrive_core::ports::{IRemoteDrive, RemoteEntry};
use tracing::{debug, instrument, warn};

use crate::MirrorError;

/// Classified children of one remote container
#[derive(Debug, Clone, Default)]
pub struct TraversalFrame {
    /// Files in listing order
    pub files: Vec<RemoteItem>,
    /// Subdirectories in listing order
    pub directories: Vec<RemoteItem>,
    /// Entries that could not be classified because their id or name is missing
    pub rejected: Vec<String>,
}

impl TraversalFrame {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty()
    }
}

/// Lists remote containers through an [`IRemoteDrive`]
pub struct RemoteTreeWalker {
    drive: Arc<dyn IRemoteDrive>,
}

impl RemoteTreeWalker {
    pub fn new(drive: Arc<dyn IRemoteDrive>) -> Self {
        Self { drive }
    }

    /// Lists every child of `container`, across all pages
    ///
    /// # Errors
    /// Returns [`MirrorError::Enumeration`] if any page request fails. No
    /// partial frame is returned in that case.
    #[instrument(skip(self), fields(container = %container))]
    pub async fn list_children(&self, container: &RemoteId) -> Result<TraversalFrame, MirrorError> {
        let mut frame = TraversalFrame::default();
        let mut continuation: Option<String> = None;
        let mut seen_links: HashSet<String> = HashSet::new();
        let mut pages = 0usize;

        loop {
            let page = self
                .drive
                .list_children_page(container, continuation.as_deref())
                .await
                .map_err(|err| MirrorError::Enumeration {
                    container: container.to_string(),
                    reason: format!("{err:#}"),
                })?;
            pages += 1;

            for entry in page.entries {
                match classify(entry) {
                    Ok(item) if item.is_directory() => frame.directories.push(item),
                    Ok(item) => frame.files.push(item),
                    Err(detail) => {
                        warn!(%detail, "Skipping entry without identity");
                        frame.rejected.push(detail);
                    }
                }
            }

            match page.next_link {
                Some(next) if !seen_links.insert(next.clone()) => {
                    return Err(MirrorError::Enumeration {
                        container: container.to_string(),
                        reason: format!("continuation link was already followed: {next}"),
                    });
                }
                Some(next) => continuation = Some(next),
                None => break,
            }
        }

        debug!(
            pages,
            files = frame.files.len(),
            directories = frame.directories.len(),
            rejected = frame.rejected.len(),
            "Listed container"
        );
        Ok(frame)
    }
}

/// Turns a listing entry into a [`RemoteItem`]
///
/// Entries with the directory marker become directories; everything else is
/// a file, whose metadata is present only when the entry has a file facet.
fn classify(entry: RemoteEntry) -> Result<RemoteItem, String> {
    let name = match entry.name {
        Some(name) if !name.is_empty() => name,
        _ => {
            return Err(match entry.id {
                Some(id) => format!("entry {id} has no name"),
                None => "entry has neither id nor name".to_string(),
            })
        }
    };
    let id = match entry.id {
        Some(id) => RemoteId::new(id).map_err(|err| format!("{name}: {err}"))?,
        None => return Err(format!("{name} has no id")),
    };

    if entry.is_directory {
        return Ok(RemoteItem::directory(id, name, entry.parent_path));
    }

    let metadata = entry.has_file_facet.then(|| match entry.hashes {
        Some(hashes) => FileMetadata::with_hashes(hashes),
        None => FileMetadata::default(),
    });
    Ok(RemoteItem::file(
        id,
        name,
        entry.parent_path,
        entry.size,
        metadata,
    ))
}
