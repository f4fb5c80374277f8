//! CLI subcommands

pub mod config;
pub mod mirror;

use std::path::PathBuf;

use ripdrive_core::config::Config;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Global options shared by every subcommand
#[derive(Debug, Clone)]
pub struct CliContext {
    /// Configuration file in use (`--config` or the default path)
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl CliContext {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    /// Loads the configuration file, falling back to defaults
    pub fn load_config(&self) -> Config {
        Config::load_or_default(&self.config_path)
    }
}

/// How a command finished, mapped onto the process exit status by `main`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    /// The command ran but reported failures (invalid config, failed items)
    Failure,
    /// The command could not do its work at all (e.g. the root listing failed)
    Fatal,
}

impl CommandStatus {
    /// Process exit status: 0 clean, 1 failures, 2 fatal
    pub fn exit_code(self) -> u8 {
        match self {
            CommandStatus::Success => 0,
            CommandStatus::Failure => 1,
            CommandStatus::Fatal => 2,
        }
    }

    pub fn from_success(success: bool) -> Self {
        if success {
            CommandStatus::Success
        } else {
            CommandStatus::Failure
        }
    }
}
