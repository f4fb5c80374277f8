//! Config command - View and manage RipDrive configuration
//!
//! Provides the `ripdrive config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Prints the configuration file path

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use ripdrive_core::config::Config;

use super::{CliContext, CommandStatus};

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "download.max_parallel_chunks")
        key: String,
        /// New value
        value: String,
    },
    /// Validate the configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

/// Keys accepted by `config set`, with a short description
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("mirror.root", "Local mirror directory"),
    ("mirror.error_log_dir", "Directory for per-run error logs"),
    ("mirror.pause_between_files_ms", "Pause between file downloads (ms)"),
    ("download.max_parallel_chunks", "Byte ranges in flight per file"),
    ("download.throughput_cap_bytes_per_sec", "Global cap, 0 = unlimited"),
    ("download.max_retries", "Attempts per byte range"),
    ("download.buffer_size_bytes", "In-memory buffer bound"),
    ("download.min_chunk_size_bytes", "Smallest file split into ranges"),
    ("download.verify_on_existing", "true|false"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("auth.account", "Keyring account, or 'none'"),
];

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, ctx: &CliContext) -> Result<CommandStatus> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Set { key, value } => self.execute_set(ctx, key, value),
            ConfigCommand::Validate => self.execute_validate(ctx),
            ConfigCommand::Path => self.execute_path(ctx),
        }
    }

    fn execute_show(&self, ctx: &CliContext) -> Result<CommandStatus> {
        let formatter = ctx.formatter();
        let config = ctx.load_config();

        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if ctx.format.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;

            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(CommandStatus::Success)
    }

    fn execute_set(&self, ctx: &CliContext, key: &str, value: &str) -> Result<CommandStatus> {
        let formatter = ctx.formatter();
        let mut config = ctx.load_config();

        info!(key = %key, value = %value, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{}': {}", key, e));
                formatter.info("");
                formatter.info("Supported keys:");
                for (name, description) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {:<40} - {}", name, description));
                }
            }
            return Ok(CommandStatus::Failure);
        }

        // The mirror root is created on the first run
        let errors: Vec<String> = config
            .validate()
            .iter()
            .filter(|e| e.field != "mirror.root")
            .map(|e| e.to_string())
            .collect();
        if !errors.is_empty() {
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "errors": errors,
                }));
            } else {
                formatter.error(&format!("Invalid value for '{}': {}", key, errors.join("; ")));
            }
            return Ok(CommandStatus::Failure);
        }

        if let Some(parent) = ctx.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
        }
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
        std::fs::write(&ctx.config_path, yaml).context("Failed to write configuration file")?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": ctx.config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {} = {}", key, value));
            formatter.info(&format!("Saved to {}", ctx.config_path.display()));
        }

        Ok(CommandStatus::Success)
    }

    fn execute_validate(&self, ctx: &CliContext) -> Result<CommandStatus> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;

        // Load explicitly so that parse errors are reported
        let config = match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(_) if !config_path.exists() => {
                if ctx.format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": true,
                        "config_path": config_path.display().to_string(),
                        "errors": [],
                        "defaults": true,
                    }));
                } else {
                    formatter.info(&format!(
                        "Configuration file not found at {}",
                        config_path.display()
                    ));
                    formatter.info(
                        "Using default configuration. Run 'ripdrive config set <key> <value>' to create one.",
                    );
                }
                return Ok(CommandStatus::Success);
            }
            Err(e) => {
                if ctx.format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [format!("Failed to parse configuration: {}", e)],
                    }));
                } else {
                    formatter.error(&format!("Failed to parse configuration: {}", e));
                    formatter.info(&format!("File: {}", config_path.display()));
                }
                return Ok(CommandStatus::Failure);
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");

        let errors = config.validate();

        if ctx.format.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                crate::output::plural(errors.len())
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        Ok(if errors.is_empty() {
            CommandStatus::Success
        } else {
            CommandStatus::Failure
        })
    }

    fn execute_path(&self, ctx: &CliContext) -> Result<CommandStatus> {
        if ctx.format.is_json() {
            ctx.formatter().print_json(&serde_json::json!({
                "config_path": ctx.config_path.display().to_string(),
                "exists": ctx.config_path.exists(),
            }));
        } else {
            println!("{}", ctx.config_path.display());
        }
        Ok(CommandStatus::Success)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .with_context(|| format!("Expected a non-negative integer for {key}"))
}

/// Apply a dot-notation key/value pair to a Config struct
///
/// See [`SUPPORTED_KEYS`] for the accepted keys.
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- mirror ---
        "mirror.root" => config.mirror.root = PathBuf::from(value),
        "mirror.error_log_dir" => config.mirror.error_log_dir = PathBuf::from(value),
        "mirror.pause_between_files_ms" => {
            config.mirror.pause_between_files_ms = parse_number(key, value)?;
        }

        // --- download ---
        "download.max_parallel_chunks" => {
            config.download.max_parallel_chunks = parse_number(key, value)?;
        }
        "download.throughput_cap_bytes_per_sec" => {
            config.download.throughput_cap_bytes_per_sec = parse_number(key, value)?;
        }
        "download.max_retries" => config.download.max_retries = parse_number(key, value)?,
        "download.buffer_size_bytes" => {
            config.download.buffer_size_bytes = parse_number(key, value)?;
        }
        "download.min_chunk_size_bytes" => {
            config.download.min_chunk_size_bytes = parse_number(key, value)?;
        }
        "download.verify_on_existing" => {
            config.download.verify_on_existing = value
                .parse::<bool>()
                .context("Expected true or false for download.verify_on_existing")?;
        }

        // --- logging ---
        "logging.level" => config.logging.level = value.to_string(),

        // --- auth ---
        "auth.account" => {
            config.auth.account = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.to_string())
            };
        }

        _ => anyhow::bail!("Unknown configuration key: '{}'", key),
    }

    Ok(())
}
