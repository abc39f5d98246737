//! Configuration CLI commands.
//!
//! Provides `config show` and `config path` for inspecting the navigation
//! settings the other commands will use.

use std::io::{self, Write};

use clap::Subcommand;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective navigation settings as INI
    Show,

    /// Show the settings file path
    Path,
}

/// Run a config subcommand.
pub fn run(runner: &CliRunner, command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(runner),
        ConfigCommands::Path => run_path(runner),
    }
}

/// Print the effective settings.
fn run_show(runner: &CliRunner) -> Result<(), CliError> {
    let io_error = |error| CliError::Io {
        path: "<stdout>".to_string(),
        error,
    };
    let mut out = io::stdout().lock();
    runner.constants().to_ini().write_to(&mut out).map_err(io_error)?;
    out.flush().map_err(io_error)
}

/// Show the settings file path and whether it exists.
fn run_path(runner: &CliRunner) -> Result<(), CliError> {
    let path = runner.config_path();
    if path.exists() {
        println!("{}", path.display());
    } else {
        println!("{} (not found, using defaults)", path.display());
    }
    Ok(())
}
