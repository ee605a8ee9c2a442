//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};
use restcall_common_config::{apply_env_overrides, ConfigLoader, Environment, RestcallConfig};

use crate::commands::SendCommand;
use crate::error::CliError;

/// restcall - single-transaction HTTP client with retries
#[derive(Debug, Parser)]
#[command(
    name = "restcall",
    author,
    version,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "RESTCALL_CONFIG_PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "text", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send one request, retrying transport failures
    Send(SendCommand),
}

impl Cli {
    /// Load the configuration file, then apply `.env` and `RESTCALL_*` overrides.
    pub fn load_config(&self) -> Result<RestcallConfig, CliError> {
        Environment::init().map_err(CliError::config)?;

        let loader = match &self.config {
            Some(path) => ConfigLoader::from_path(path),
            None => ConfigLoader::default(),
        };
        let mut config = loader.load().map_err(|e| {
            CliError::config(e).with_hint(format!("checked {}", loader.path().display()))
        })?;

        apply_env_overrides(&mut config).map_err(CliError::config)?;
        Ok(config)
    }

    /// Execute the selected command.
    pub async fn execute(self, config: RestcallConfig) -> Result<(), CliError> {
        match self.command {
            Command::Send(cmd) => cmd.run(config, self.format).await,
        }
    }
}
