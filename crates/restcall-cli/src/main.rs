//! restcall - single-transaction HTTP client with retries
//!
//! Main entry point for the `restcall` binary.

use std::process::ExitCode;

use clap::Parser;
use restcall_common_log::{LogConfig, LogLevel};
use tracing::error;

mod cli;
mod commands;
mod error;

use cli::Cli;
use error::CliError;

/// Application exit codes
#[repr(u8)]
#[derive(Debug)]
pub enum Exit {
    Success = 0,
    GeneralError = 1,
    ConfigError = 2,
    NetworkError = 4,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("warning: {e}");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to create Tokio runtime: {e}");
            return Exit::GeneralError.into();
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => Exit::Success.into(),
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            if let Some(hint) = e.hint() {
                eprintln!("  hint: {hint}");
            }
            e.exit_code().into()
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.load_config()?;
    cli.execute(config).await
}

/// Environment settings first, then `-v`/`-q` on top.
fn init_logging(cli: &Cli) -> Result<(), restcall_common_log::LogError> {
    let mut config = LogConfig::from_env();
    config.level = match cli.verbose {
        0 if cli.quiet => LogLevel::Error,
        0 => match std::env::var(restcall_common_log::vars::RESTCALL_LOG_LEVEL) {
            Ok(_) => config.level,
            Err(_) => LogLevel::Warn,
        },
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    restcall_common_log::init(config)
}
