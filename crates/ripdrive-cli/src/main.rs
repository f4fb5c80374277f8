//! RipDrive CLI - Command-line interface for RipDrive
//!
//! Provides commands for:
//! - Mirroring a OneDrive tree into a local directory
//! - Viewing, editing and validating configuration

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{config::ConfigCommand, mirror::MirrorCommand, CliContext, CommandStatus};
use output::{get_formatter, OutputFormat};
use ripdrive_core::config::Config;

#[derive(Debug, Parser)]
#[command(
    name = "ripdrive",
    version,
    about = "Mirror a OneDrive tree into a local directory"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download the remote tree into the local mirror root
    Mirror(MirrorCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Default tracing directive for the given flags and configured level
fn log_directive(verbose: u8, quiet: bool, configured: &str) -> String {
    match (quiet, verbose) {
        (true, _) => "warn".to_string(),
        (false, 0) => configured.to_string(),
        (false, 1) => "debug".to_string(),
        (false, _) => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let configured_level = Config::load_or_default(&config_path).logging.level;

    // Setup tracing; RUST_LOG wins over flags and configuration
    let directive = log_directive(cli.verbose, cli.quiet, &configured_level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = CliContext {
        config_path,
        format,
        quiet: cli.quiet,
    };

    let result = match &cli.command {
        Commands::Mirror(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    };

    match result {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(e) => {
            get_formatter(format, cli.quiet).error(&format!("{e:#}"));
            ExitCode::from(CommandStatus::Fatal.exit_code())
        }
    }
}
