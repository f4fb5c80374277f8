//! Configuration module for RipDrive.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//!
//! The engine itself never reads this module's types directly: the CLI turns a
//! validated [`Config`] into a [`MirrorOptions`] value which is handed to the
//! coordinator at construction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Name of the per-run error log file, suffixed with the process id.
const ERROR_LOG_PREFIX: &str = "ripdrive-errors";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for RipDrive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mirror: MirrorConfig,
    pub download: DownloadConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
}

/// Mirror destination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Root directory of the local mirror.
    pub root: PathBuf,
    /// Directory receiving the per-run error log.
    pub error_log_dir: PathBuf,
    /// Milliseconds to wait between two file downloads.
    pub pause_between_files_ms: u64,
}

/// Download and verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Maximum byte-range requests in flight for a single file.
    pub max_parallel_chunks: usize,
    /// Global throughput cap in bytes per second (0 = unlimited).
    pub throughput_cap_bytes_per_sec: u64,
    /// Failover attempts per byte range inside the transport.
    pub max_retries: u32,
    /// Upper bound on in-memory buffering, in bytes.
    pub buffer_size_bytes: usize,
    /// Files smaller than this are fetched with a single request.
    pub min_chunk_size_bytes: u64,
    /// Re-verify files that already exist locally.
    pub verify_on_existing: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Authentication settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Keyring account whose stored tokens are used. `None` means a token
    /// must be supplied on the command line.
    pub account: Option<String>,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/ripdrive/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("ripdrive")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("OneDriveMirror"),
            error_log_dir: std::env::temp_dir().join("ripdrive"),
            pause_between_files_ms: 1000,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_parallel_chunks: std::thread::available_parallelism()
                .map(|n| n.get().min(MAX_PARALLEL_CHUNKS))
                .unwrap_or(4),
            throughput_cap_bytes_per_sec: 0,
            max_retries: 5,
            buffer_size_bytes: 50 * 1024 * 1024,
            min_chunk_size_bytes: 1024,
            verify_on_existing: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"download.max_parallel_chunks"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for `download.max_parallel_chunks`.
const MAX_PARALLEL_CHUNKS: usize = 64;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- mirror ---
        if self.mirror.root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "mirror.root".into(),
                message: "must not be empty".into(),
            });
        }
        if self.mirror.root.exists() && !self.mirror.root.is_dir() {
            errors.push(ValidationError {
                field: "mirror.root".into(),
                message: format!("not a directory: {}", self.mirror.root.display()),
            });
        }
        if self.mirror.error_log_dir.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "mirror.error_log_dir".into(),
                message: "must not be empty".into(),
            });
        }

        // --- download ---
        if self.download.max_parallel_chunks == 0
            || self.download.max_parallel_chunks > MAX_PARALLEL_CHUNKS
        {
            errors.push(ValidationError {
                field: "download.max_parallel_chunks".into(),
                message: format!("must be in range 1..={MAX_PARALLEL_CHUNKS}"),
            });
        }
        if self.download.buffer_size_bytes == 0 {
            errors.push(ValidationError {
                field: "download.buffer_size_bytes".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.download.min_chunk_size_bytes == 0 {
            errors.push(ValidationError {
                field: "download.min_chunk_size_bytes".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.download.throughput_cap_bytes_per_sec != 0
            && self.download.throughput_cap_bytes_per_sec < self.download.min_chunk_size_bytes
        {
            errors.push(ValidationError {
                field: "download.throughput_cap_bytes_per_sec".into(),
                message: format!(
                    "throughput cap ({}) must be 0 or at least min_chunk_size_bytes ({})",
                    self.download.throughput_cap_bytes_per_sec, self.download.min_chunk_size_bytes
                ),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        // --- auth ---
        if let Some(account) = &self.auth.account {
            if account.trim().is_empty() {
                errors.push(ValidationError {
                    field: "auth.account".into(),
                    message: "must not be blank when set".into(),
                });
            }
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use ripdrive_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .mirror_root(PathBuf::from("/home/user/OneDriveMirror"))
///     .download_max_parallel_chunks(8)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an existing configuration, e.g. one loaded from disk.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- mirror ---

    pub fn mirror_root(mut self, root: PathBuf) -> Self {
        self.config.mirror.root = root;
        self
    }

    pub fn mirror_error_log_dir(mut self, dir: PathBuf) -> Self {
        self.config.mirror.error_log_dir = dir;
        self
    }

    pub fn mirror_pause_between_files_ms(mut self, ms: u64) -> Self {
        self.config.mirror.pause_between_files_ms = ms;
        self
    }

    // --- download ---

    pub fn download_max_parallel_chunks(mut self, n: usize) -> Self {
        self.config.download.max_parallel_chunks = n;
        self
    }

    pub fn download_throughput_cap_bytes_per_sec(mut self, bytes: u64) -> Self {
        self.config.download.throughput_cap_bytes_per_sec = bytes;
        self
    }

    pub fn download_max_retries(mut self, n: u32) -> Self {
        self.config.download.max_retries = n;
        self
    }

    pub fn download_buffer_size_bytes(mut self, bytes: usize) -> Self {
        self.config.download.buffer_size_bytes = bytes;
        self
    }

    pub fn download_min_chunk_size_bytes(mut self, bytes: u64) -> Self {
        self.config.download.min_chunk_size_bytes = bytes;
        self
    }

    pub fn download_verify_on_existing(mut self, verify: bool) -> Self {
        self.config.download.verify_on_existing = verify;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- auth ---

    pub fn auth_account(mut self, account: impl Into<String>) -> Self {
        self.config.auth.account = Some(account.into());
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// MirrorOptions
// ---------------------------------------------------------------------------

/// Explicit run configuration handed to the download coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorOptions {
    pub root: PathBuf,
    /// Full path of this run's error log (process id suffixed).
    pub error_log_path: PathBuf,
    pub max_parallel_chunks: usize,
    pub throughput_cap_bytes_per_sec: u64,
    pub max_retries: u32,
    pub buffer_size_bytes: usize,
    pub verify_on_existing: bool,
    pub pause_between_files: Duration,
}

impl MirrorOptions {
    /// Derive run options from a configuration for the current process.
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.mirror.root.clone(),
            error_log_path: error_log_path(&config.mirror.error_log_dir, std::process::id()),
            max_parallel_chunks: config.download.max_parallel_chunks,
            throughput_cap_bytes_per_sec: config.download.throughput_cap_bytes_per_sec,
            max_retries: config.download.max_retries,
            buffer_size_bytes: config.download.buffer_size_bytes,
            verify_on_existing: config.download.verify_on_existing,
            pause_between_files: Duration::from_millis(config.mirror.pause_between_files_ms),
        }
    }
}

/// Error log file path for a given directory and process id.
pub fn error_log_path(dir: &Path, pid: u32) -> PathBuf {
    dir.join(format!("{ERROR_LOG_PREFIX}-{pid}.log"))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
