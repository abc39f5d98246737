//! WayGuide CLI - Command-line interface
//!
//! Replays recorded walks through live guidance, previews routes step by
//! step, and verifies route bundles offline.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use commands::check::CheckArgs;
use commands::config::ConfigCommands;
use commands::preview::PreviewArgs;
use commands::replay::ReplayArgs;
use error::CliError;
use runner::{CliRunner, GlobalOptions};

#[derive(Parser)]
#[command(name = "wayguide")]
#[command(version = wayguide::VERSION)]
#[command(about = "Route guidance for blind pedestrians", long_about = None)]
struct Cli {
    /// Navigation settings file (default: <config dir>/wayguide/navigation.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the log file
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded fix log and print guidance events as JSON lines
    Replay {
        /// Route bundle (JSON graph plus route)
        #[arg(long)]
        bundle: PathBuf,

        /// Fix log, one JSON object per line
        #[arg(long)]
        fixes: PathBuf,

        /// Pace fixes at their recorded times
        #[arg(long)]
        realtime: bool,
    },

    /// Preview a route, reading commands from stdin
    Preview {
        /// Route bundle (JSON graph plus route)
        #[arg(long)]
        bundle: PathBuf,

        /// Auto-step timer period in milliseconds
        #[arg(long, default_value = "100")]
        tick_ms: u64,
    },

    /// Check that a route can be walked from source to destination
    Check {
        /// Route bundle (JSON graph plus route)
        #[arg(long)]
        bundle: PathBuf,
    },

    /// Inspect navigation settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    let options = GlobalOptions {
        config: cli.config,
        log_dir: cli.log_dir,
        debug: cli.debug,
    };

    if let Err(e) = run(&options, cli.command) {
        e.exit();
    }
}

fn run(options: &GlobalOptions, command: Commands) -> Result<(), CliError> {
    let runner = CliRunner::new(options)?;

    match command {
        Commands::Replay {
            bundle,
            fixes,
            realtime,
        } => commands::replay::run(
            &runner,
            ReplayArgs {
                bundle,
                fixes,
                realtime,
            },
        ),
        Commands::Preview { bundle, tick_ms } => commands::preview::run(
            &runner,
            PreviewArgs {
                bundle,
                tick: Duration::from_millis(tick_ms.max(1)),
            },
        ),
        Commands::Check { bundle } => commands::check::run(&runner, CheckArgs { bundle }),
        Commands::Config { command } => commands::config::run(&runner, command),
    }
}
