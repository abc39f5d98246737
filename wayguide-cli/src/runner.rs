//! CLI runner for common setup.
//!
//! Initializes logging and resolves the navigation settings once so each
//! command handler starts from the same state.

use std::path::{Path, PathBuf};

use tracing::info;
use wayguide::logging::{default_log_dir, default_log_file, init_logging, LoggingGuard};
use wayguide::navigation::NavigatorConstants;

use crate::commands::common::{config_file_path, load_constants};
use crate::error::CliError;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub debug: bool,
}

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps the file writer alive while the runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    constants: NavigatorConstants,
    config_path: PathBuf,
}

impl CliRunner {
    /// Initialize logging and load the navigation settings.
    pub fn new(options: &GlobalOptions) -> Result<Self, CliError> {
        let log_dir = options
            .log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_log_dir()));
        let level = if options.debug { "debug" } else { "info" };
        let logging_guard = init_logging(&log_dir, default_log_file(), level)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        let config_path = options.config.clone().unwrap_or_else(config_file_path);
        let constants = load_constants(&config_path, options.config.is_some())?;

        Ok(Self {
            logging_guard,
            constants,
            config_path,
        })
    }

    pub fn constants(&self) -> &NavigatorConstants {
        &self.constants
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("WayGuide v{}", wayguide::VERSION);
        info!(config = %self.config_path.display(), "WayGuide CLI: {} command", command);
    }
}
