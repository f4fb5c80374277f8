//! Remote parent paths to local path fragments
//!
//! The provider reports a node's container as an opaque string such as
//! `/drive/root:/Docs/My%20Files`. The first [`SCHEME_MARKER_LEN`]
//! characters are a scheme marker; the rest is percent-encoded, except that
//! the provider leaves a handful of reserved characters literal. Those are
//! escaped first so that decoding treats them as data.

use std::path::{Path, PathBuf, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};

use ripdrive_core::domain::RemoteItem;
use tracing::debug;

/// Length of the provider's scheme marker (`/drive/root:/`)
pub const SCHEME_MARKER_LEN: usize = 13;

/// Characters the provider leaves unescaped, with their percent encoding
const PRE_ESCAPES: [(char, &str); 7] = [
    ('+', "%2B"),
    ('!', "%21"),
    ('"', "%22"),
    ('#', "%23"),
    ('$', "%24"),
    ('&', "%26"),
    ('\'', "%27"),
];

/// Maps remote items onto paths below a local mirror root
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Creates a resolver for the given mirror root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The mirror root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decodes a provider parent path into a relative local fragment
    ///
    /// Returns the empty string when the path is absent, consists of the
    /// scheme marker only, fails to decode, or contains `.`/`..` segments.
    /// A non-empty result ends with exactly one [`MAIN_SEPARATOR`].
    pub fn resolve(&self, parent_path: Option<&str>) -> String {
        parent_path.map(decode_fragment).unwrap_or_default()
    }

    /// Local destination of `item`: root, decoded parent fragment, then name
    pub fn local_path(&self, item: &RemoteItem) -> PathBuf {
        let fragment = self.resolve(item.parent_path());
        let mut path = self.root.clone();
        if !fragment.is_empty() {
            path.push(fragment);
        }
        path.push(item.name());
        path
    }
}

fn decode_fragment(parent_path: &str) -> String {
    let Some(encoded) = parent_path.get(SCHEME_MARKER_LEN..) else {
        return String::new();
    };

    let mut escaped = String::with_capacity(encoded.len());
    for c in encoded.chars() {
        match PRE_ESCAPES.iter().find(|(literal, _)| *literal == c) {
            Some((_, replacement)) => escaped.push_str(replacement),
            None => escaped.push(c),
        }
    }

    let decoded = match urlencoding::decode(&escaped) {
        Ok(decoded) => decoded,
        Err(err) => {
            debug!(parent_path, %err, "Parent path is not valid UTF-8 once decoded");
            return String::new();
        }
    };

    let segments: Vec<&str> = decoded.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return String::new();
    }
    if segments.iter().any(|s| *s == "." || *s == "..") {
        debug!(parent_path, "Parent path escapes the mirror root");
        return String::new();
    }

    let mut fragment = segments.join(MAIN_SEPARATOR_STR);
    fragment.push(MAIN_SEPARATOR);
    fragment
}
