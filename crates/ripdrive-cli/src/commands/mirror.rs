//! Mirror command - Download a OneDrive tree into a local directory
//!
//! Provides the `ripdrive mirror` CLI command which:
//! 1. Loads configuration and applies command-line overrides
//! 2. Obtains a bearer token (flag or system keyring)
//! 3. Creates the Graph adapters and the download coordinator
//! 4. Runs the mirror, cancelling cleanly on Ctrl-C, and reports the summary

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use ripdrive_core::config::{Config, ConfigBuilder, MirrorOptions};
use ripdrive_core::ports::{IAuthProvider, IChunkedTransport, IRemoteDrive};
use ripdrive_graph::auth::{KeyringTokenProvider, StaticTokenProvider};
use ripdrive_graph::client::GraphClient;
use ripdrive_graph::provider::GraphDriveProvider;
use ripdrive_graph::transfer::HttpChunkedTransport;
use ripdrive_sync::coordinator::{DownloadCoordinator, MirrorSummary};
use ripdrive_sync::humanize::format_size;
use ripdrive_sync::MirrorError;

use super::{CliContext, CommandStatus};
use crate::output::{plural, OutputFormatter};

/// Mirror command with clap options
#[derive(Debug, Args)]
pub struct MirrorCommand {
    /// Local directory to mirror into (defaults to mirror.root)
    pub root: Option<PathBuf>,

    /// Bearer token to use instead of stored credentials
    #[arg(long, conflicts_with = "account")]
    pub token: Option<String>,

    /// Keyring account whose stored token is used (defaults to auth.account)
    #[arg(long)]
    pub account: Option<String>,

    /// Do not re-verify files that already exist locally
    #[arg(long)]
    pub no_verify: bool,

    /// Maximum byte ranges in flight per file
    #[arg(long, value_name = "N")]
    pub max_chunks: Option<usize>,

    /// Global throughput cap in bytes per second (0 = unlimited)
    #[arg(long, value_name = "BYTES")]
    pub throughput_cap: Option<u64>,

    /// Pause between file downloads in milliseconds
    #[arg(long, value_name = "MS")]
    pub pause_ms: Option<u64>,
}

impl MirrorCommand {
    /// Applies command-line overrides on top of the loaded configuration
    fn effective_config(&self, config: Config) -> ConfigBuilder {
        let mut builder = ConfigBuilder::from_config(config);
        if let Some(root) = &self.root {
            builder = builder.mirror_root(root.clone());
        }
        if let Some(account) = &self.account {
            builder = builder.auth_account(account.clone());
        }
        if self.no_verify {
            builder = builder.download_verify_on_existing(false);
        }
        if let Some(n) = self.max_chunks {
            builder = builder.download_max_parallel_chunks(n);
        }
        if let Some(cap) = self.throughput_cap {
            builder = builder.download_throughput_cap_bytes_per_sec(cap);
        }
        if let Some(ms) = self.pause_ms {
            builder = builder.mirror_pause_between_files_ms(ms);
        }
        builder
    }

    fn auth_provider(&self, config: &Config) -> Result<Box<dyn IAuthProvider>> {
        if let Some(token) = &self.token {
            return Ok(Box::new(StaticTokenProvider::new(token.clone())));
        }
        match &config.auth.account {
            Some(account) => Ok(Box::new(KeyringTokenProvider::new(account.clone()))),
            None => anyhow::bail!(
                "No credentials: pass --token or --account, or set auth.account in the configuration"
            ),
        }
    }

    /// Execute the mirror command
    pub async fn execute(&self, ctx: &CliContext) -> Result<CommandStatus> {
        let formatter = ctx.formatter();

        // Step 1: Configuration
        let config = match self.effective_config(ctx.load_config()).build_validated() {
            Ok(config) => config,
            Err(errors) => {
                formatter.error(&format!(
                    "Invalid configuration ({} error{})",
                    errors.len(),
                    plural(errors.len())
                ));
                for error in &errors {
                    formatter.info(&format!("  {} - {}", error.field, error.message));
                }
                return Ok(CommandStatus::Failure);
            }
        };
        info!(config_path = %ctx.config_path.display(), "Loaded configuration");

        // Step 2: Credentials
        let access_token = self
            .auth_provider(&config)?
            .access_token()
            .await
            .context("Failed to obtain an access token")?;

        // Step 3: Adapters
        let graph = GraphClient::new(access_token);
        let transport: Arc<dyn IChunkedTransport> = Arc::new(HttpChunkedTransport::with_client(
            graph.http().clone(),
            config.download.min_chunk_size_bytes,
        ));
        let drive: Arc<dyn IRemoteDrive> = Arc::new(GraphDriveProvider::new(graph));
        let options = MirrorOptions::from_config(&config);

        formatter.info(&format!("Mirroring OneDrive into {}", options.root.display()));

        let coordinator = DownloadCoordinator::new(drive, transport, options);

        // Step 4: Ctrl-C cancels the in-flight transfer and stops the walk
        let cancel = coordinator.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling mirror run");
                cancel.cancel();
            }
        });

        // Step 5: Run and report
        let result = coordinator.run().await;
        match &result {
            Ok(summary) => report(formatter.as_ref(), ctx.format.is_json(), summary),
            Err(e) if ctx.format.is_json() => formatter.print_json(&serde_json::json!({
                "success": false,
                "error": e.to_string(),
            })),
            Err(e) => formatter.error(&e.to_string()),
        }
        Ok(run_status(&result))
    }
}

/// Exit status of a finished run; only a fatal error escapes `run`
fn run_status(result: &Result<MirrorSummary, MirrorError>) -> CommandStatus {
    match result {
        Ok(summary) => CommandStatus::from_success(summary.is_success()),
        Err(_) => CommandStatus::Fatal,
    }
}

fn summary_json(summary: &MirrorSummary) -> serde_json::Value {
    serde_json::json!({
        "success": summary.is_success(),
        "failures": summary.failures,
        "error_log": summary.error_log.display().to_string(),
        "directories_created": summary.directories_created,
        "files_downloaded": summary.files_downloaded,
        "files_verified": summary.files_verified,
        "files_skipped": summary.files_skipped,
        "retries": summary.retries,
        "bytes_downloaded": summary.bytes_downloaded,
        "cancelled": summary.cancelled,
        "duration_ms": summary.duration_ms,
        "errors": summary.errors,
    })
}

fn duration_display(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

fn report(formatter: &dyn OutputFormatter, json: bool, summary: &MirrorSummary) {
    if json {
        formatter.print_json(&summary_json(summary));
        return;
    }

    if summary.cancelled {
        formatter.warn("Mirror run was cancelled before it finished");
    } else {
        formatter.success(&format!(
            "Mirror completed in {}",
            duration_display(summary.duration_ms)
        ));
    }

    formatter.field(
        "Downloaded",
        &format!(
            "{} file{} ({})",
            summary.files_downloaded,
            plural(summary.files_downloaded),
            format_size(summary.bytes_downloaded)
        ),
    );
    if summary.files_verified > 0 {
        formatter.field(
            "Verified",
            &format!(
                "{} existing file{}",
                summary.files_verified,
                plural(summary.files_verified)
            ),
        );
    }
    if summary.files_skipped > 0 {
        formatter.field(
            "Skipped",
            &format!(
                "{} file{}",
                summary.files_skipped,
                plural(summary.files_skipped)
            ),
        );
    }
    if summary.directories_created > 0 {
        formatter.field(
            "Folders",
            &format!("{} created", summary.directories_created),
        );
    }
    if summary.retries > 0 {
        formatter.field("Retried", &summary.retries.to_string());
    }

    if summary.failures > 0 {
        formatter.error(&format!(
            "Finished with {} error{}. Details were written to {}",
            summary.failures,
            plural(summary.failures),
            summary.error_log.display()
        ));
        for error in summary.errors.iter().take(10) {
            formatter.info(&format!("  - {}", error));
        }
        if summary.errors.len() > 10 {
            formatter.info(&format!("  ... and {} more", summary.errors.len() - 10));
        }
    }
}
