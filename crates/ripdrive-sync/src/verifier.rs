//! Content verification against provider digests
//!
//! The local file is read once; every digest kind the provider supplied is
//! computed in the same pass. Expected values are then checked in
//! [`HashKind::VERIFICATION_ORDER`] and the first mismatch wins.

use std::path::Path;

use ripdrive_core::domain::{ContentHash, FileMetadata, HashKind};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument, warn};

use crate::quick_xor::QuickXorHash;
use crate::MirrorError;

/// Largest read buffer used while hashing
const MAX_READ_BUFFER: usize = 1024 * 1024;

/// Result of verifying one local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// Every supplied digest matched
    Verified,
    /// A digest did not match; the local file has been deleted
    Mismatch {
        kind: HashKind,
        expected: String,
        actual: String,
    },
    /// No file facet, no hash set, or no recognized digest
    Unverifiable,
}

impl VerifyResult {
    #[must_use]
    pub fn is_mismatch(&self) -> bool {
        matches!(self, VerifyResult::Mismatch { .. })
    }
}

enum Digester {
    Sha256(Sha256),
    Sha1(Sha1),
    QuickXor(QuickXorHash),
}

impl Digester {
    fn for_kind(kind: HashKind) -> Self {
        match kind {
            HashKind::Sha256 => Digester::Sha256(Sha256::new()),
            HashKind::Sha1 => Digester::Sha1(Sha1::new()),
            HashKind::QuickXor => Digester::QuickXor(QuickXorHash::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Digester::Sha256(h) => h.update(data),
            Digester::Sha1(h) => h.update(data),
            Digester::QuickXor(h) => h.update(data),
        }
    }

    /// Encoded the same way the provider encodes this kind
    fn finish(self) -> String {
        match self {
            Digester::Sha256(h) => hex::encode_upper(h.finalize()),
            Digester::Sha1(h) => hex::encode_upper(h.finalize()),
            Digester::QuickXor(h) => h.finalize_base64(),
        }
    }
}

/// Verifies local files against [`FileMetadata`] digests
#[derive(Debug, Clone)]
pub struct IntegrityVerifier {
    read_buffer: usize,
}

impl IntegrityVerifier {
    /// Creates a verifier whose read buffer never exceeds `buffer_size_bytes`
    pub fn new(buffer_size_bytes: usize) -> Self {
        Self {
            read_buffer: buffer_size_bytes.clamp(1, MAX_READ_BUFFER),
        }
    }

    /// Verifies the file at `path`
    ///
    /// A mismatch deletes the file before returning. Missing metadata or
    /// hashes yield [`VerifyResult::Unverifiable`] with a warning; the file
    /// is left untouched.
    ///
    /// # Errors
    /// Returns [`MirrorError::Io`] if the file cannot be read.
    #[instrument(skip(self, metadata), fields(path = %path.display()))]
    pub async fn verify(
        &self,
        path: &Path,
        metadata: Option<&FileMetadata>,
    ) -> Result<VerifyResult, MirrorError> {
        let Some(metadata) = metadata else {
            warn!("File has no file metadata, this download cannot be verified");
            return Ok(VerifyResult::Unverifiable);
        };
        let Some(expected) = metadata.hashes.as_deref() else {
            warn!("File has no hashes, this download cannot be verified");
            return Ok(VerifyResult::Unverifiable);
        };
        if expected.is_empty() {
            warn!("File has no recognized hash kind, this download cannot be verified");
            return Ok(VerifyResult::Unverifiable);
        }

        let actual = self.compute(path, expected).await?;

        for (hash, actual) in expected.iter().zip(actual) {
            debug!(kind = %hash.kind(), "Checking hash");
            if !hash.matches(&actual) {
                warn!(
                    kind = %hash.kind(),
                    expected = hash.value(),
                    actual = %actual,
                    "Hashes do not match, deleting local file"
                );
                if let Err(err) = tokio::fs::remove_file(path).await {
                    warn!(%err, "Failed to delete mismatched file");
                }
                return Ok(VerifyResult::Mismatch {
                    kind: hash.kind(),
                    expected: hash.value().to_string(),
                    actual,
                });
            }
        }

        debug!("All hashes match");
        Ok(VerifyResult::Verified)
    }

    /// Computes every expected digest kind in one read of the file,
    /// returned in the same order as `expected`
    async fn compute(&self, path: &Path, expected: &[ContentHash]) -> Result<Vec<String>, MirrorError> {
        let mut digesters: Vec<Digester> = expected
            .iter()
            .map(|hash| Digester::for_kind(hash.kind()))
            .collect();

        let mut file = tokio::fs::File::open(path).await?;
        let mut buffer = vec![0u8; self.read_buffer];
        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            for digester in &mut digesters {
                digester.update(&buffer[..read]);
            }
        }

        Ok(digesters.into_iter().map(Digester::finish).collect())
    }
}
