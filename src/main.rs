//! dscheduler - recurring cron job management
//!
//! Main entry point for the dscheduler CLI.

mod cli;
mod commands;
mod listener;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use crate::cli::{Cli, Commands};
use crate::commands::{handle_command, load_config};
use crate::logging::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // dropped on return, which flushes the log file
    let _log_guard = match init_tracing() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let command = cli.command.unwrap_or(Commands::Run { seed: false });
    match handle_command(command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
