//! Remote tree nodes
//!
//! [`RemoteItem`] is the plain value snapshot of one node in the remote
//! drive. It decouples the traversal and verification logic from any
//! provider SDK object model: adapters build `RemoteItem`s, the engine only
//! ever reads them.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::RemoteId;

// ============================================================================
// HashKind / ContentHash
// ============================================================================

/// Digest algorithms the provider may attach to file metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashKind {
    /// SHA-256, hex encoded
    Sha256,
    /// SHA-1, hex encoded
    Sha1,
    /// OneDrive quickXorHash, Base64 encoded (20 raw bytes)
    QuickXor,
}

impl HashKind {
    /// Order in which digests are checked during verification
    pub const VERIFICATION_ORDER: [HashKind; 3] =
        [HashKind::Sha256, HashKind::Sha1, HashKind::QuickXor];

    /// Returns true if values of this kind are hex strings
    #[must_use]
    pub fn is_hex(self) -> bool {
        matches!(self, HashKind::Sha256 | HashKind::Sha1)
    }

    /// Length of the encoded value in characters
    #[must_use]
    pub fn encoded_len(self) -> usize {
        match self {
            HashKind::Sha256 => 64,
            HashKind::Sha1 => 40,
            HashKind::QuickXor => 28,
        }
    }

    /// Position of this kind in [`Self::VERIFICATION_ORDER`]
    fn rank(self) -> usize {
        match self {
            HashKind::Sha256 => 0,
            HashKind::Sha1 => 1,
            HashKind::QuickXor => 2,
        }
    }
}

impl Display for HashKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashKind::Sha256 => "SHA256",
            HashKind::Sha1 => "SHA1",
            HashKind::QuickXor => "QuickXorHash",
        };
        f.write_str(name)
    }
}

/// A named digest value supplied by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHash {
    kind: HashKind,
    value: String,
}

impl ContentHash {
    /// Create a validated content hash
    ///
    /// # Errors
    /// Returns `DomainError::InvalidHash` if the value has the wrong length
    /// or alphabet for its kind.
    pub fn new(kind: HashKind, value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();

        if value.len() != kind.encoded_len() {
            return Err(DomainError::InvalidHash(format!(
                "{kind} must be {} characters, got {}",
                kind.encoded_len(),
                value.len()
            )));
        }

        let valid_alphabet = if kind.is_hex() {
            value.chars().all(|c| c.is_ascii_hexdigit())
        } else {
            value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
        };
        if !valid_alphabet {
            return Err(DomainError::InvalidHash(format!(
                "{kind} contains invalid characters: {value}"
            )));
        }

        Ok(Self { kind, value })
    }

    /// The digest algorithm
    #[must_use]
    pub fn kind(&self) -> HashKind {
        self.kind
    }

    /// The encoded digest value as supplied by the provider
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Compares an encoded digest against this expected value
    ///
    /// Hex digests compare ASCII case-insensitively; Base64 digests compare exactly.
    #[must_use]
    pub fn matches(&self, actual: &str) -> bool {
        if self.kind.is_hex() {
            self.value.eq_ignore_ascii_case(actual)
        } else {
            self.value == actual
        }
    }
}

// ============================================================================
// ItemKind / FileMetadata
// ============================================================================

/// File facet of a remote item
///
/// `hashes` is `None` when the provider attached a file facet without any
/// hash set; such files are unverifiable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Digests in verification order
    pub hashes: Option<Vec<ContentHash>>,
}

impl FileMetadata {
    /// Builds metadata from digests in any order, sorting them into
    /// [`HashKind::VERIFICATION_ORDER`]
    #[must_use]
    pub fn with_hashes(mut hashes: Vec<ContentHash>) -> Self {
        hashes.sort_by_key(|h| h.kind().rank());
        Self {
            hashes: Some(hashes),
        }
    }
}

/// Whether a node is a file or a directory (never both)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    /// A container whose children can be listed
    Directory,
    /// A file with optional size and optional file facet
    File {
        /// Content size in bytes
        size: Option<u64>,
        /// File facet; absent for provider-specific documents (e.g. notebooks)
        metadata: Option<FileMetadata>,
    },
}

// ============================================================================
// RemoteItem
// ============================================================================

/// Immutable snapshot of one node in the remote tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    id: RemoteId,
    name: String,
    kind: ItemKind,
    parent_path: Option<String>,
}

impl RemoteItem {
    /// Create a directory node
    #[must_use]
    pub fn directory(id: RemoteId, name: impl Into<String>, parent_path: Option<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ItemKind::Directory,
            parent_path,
        }
    }

    /// Create a file node
    #[must_use]
    pub fn file(
        id: RemoteId,
        name: impl Into<String>,
        parent_path: Option<String>,
        size: Option<u64>,
        metadata: Option<FileMetadata>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ItemKind::File { size, metadata },
            parent_path,
        }
    }

    /// Provider-assigned id
    #[must_use]
    pub fn id(&self) -> &RemoteId {
        &self.id
    }

    /// Display name, used verbatim as the local leaf name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node kind
    #[must_use]
    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    /// Provider-encoded path of the containing directory (absent only for the root)
    #[must_use]
    pub fn parent_path(&self) -> Option<&str> {
        self.parent_path.as_deref()
    }

    /// Returns true for directory nodes
    #[must_use]
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, ItemKind::Directory)
    }

    /// Returns true for file nodes
    #[must_use]
    pub fn is_file(&self) -> bool {
        matches!(self.kind, ItemKind::File { .. })
    }

    /// Content size in bytes, if known
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        match &self.kind {
            ItemKind::File { size, .. } => *size,
            ItemKind::Directory => None,
        }
    }

    /// File facet, if this is a file that carries one
    #[must_use]
    pub fn file_metadata(&self) -> Option<&FileMetadata> {
        match &self.kind {
            ItemKind::File { metadata, .. } => metadata.as_ref(),
            ItemKind::Directory => None,
        }
    }
}
