//! Run-scoped error log
//!
//! One file per run, opened once in append mode. Each unrecoverable
//! per-item error becomes one timestamped line.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::MirrorError;

/// Append-only error log for one mirroring run
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    file: Option<File>,
    entries: usize,
}

impl ErrorLog {
    /// Opens (creating if needed) the log at `path`
    ///
    /// A log that cannot be opened does not stop the run: entries are then
    /// only emitted as tracing events.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = match Self::open_file(&path).await {
            Ok(file) => Some(file),
            Err(err) => {
                warn!(path = %path.display(), %err, "Cannot open error log");
                None
            }
        };
        Self {
            path,
            file,
            entries: 0,
        }
    }

    async fn open_file(path: &Path) -> std::io::Result<File> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        OpenOptions::new().create(true).append(true).open(path).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries written during this run
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Appends one line for `error`
    pub async fn append(&mut self, error: &MirrorError) {
        self.entries += 1;
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let line = format!(
            "{} {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            error
        );
        if let Err(err) = file.write_all(line.as_bytes()).await {
            warn!(path = %self.path.display(), %err, "Cannot write to error log");
            return;
        }
        if let Err(err) = file.flush().await {
            warn!(path = %self.path.display(), %err, "Cannot flush error log");
        }
    }
}
