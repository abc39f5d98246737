//! CLI error handling with user-friendly messages.
//!
//! Every command returns [`CliError`]; `main` prints it and exits non-zero.

use std::fmt;
use std::path::PathBuf;
use std::process;

use wayguide::graph::{BundleError, GraphError};
use wayguide::navigation::ConfigError;
use wayguide::preview::WalkError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Invalid or unreadable navigation settings
    Config { path: PathBuf, error: ConfigError },
    /// Route bundle could not be loaded
    Bundle(BundleError),
    /// Route ids do not form a walkable sequence
    Route(GraphError),
    /// The route fails the offline walk
    Walk(WalkError),
    /// A fix log line could not be parsed
    FixLog {
        path: PathBuf,
        line: usize,
        message: String,
    },
    /// Reading input or writing output failed
    Io { path: String, error: std::io::Error },
    /// Runtime or signal handler setup failed
    Runtime(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config { path, .. } => {
                eprintln!();
                eprintln!("Settings are read from the [navigation] section of {}", path.display());
                eprintln!("Run 'wayguide config show' to print every key with its default.");
            }
            CliError::FixLog { .. } => {
                eprintln!();
                eprintln!("Each line of a fix log is one JSON object, for example:");
                eprintln!(
                    r#"  {{"t": 0.0, "status": "stable", "location": {{"lat": 35.0, "lng": 139.0, "orientation": 90.0}}}}"#
                );
            }
            CliError::Walk(WalkError::OneWay { .. }) => {
                eprintln!();
                eprintln!("Check the link direction in the bundle or reverse the route.");
            }
            _ => {}
        }

        process::exit(match self {
            CliError::Walk(_) => 2,
            _ => 1,
        })
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config { path, error } => {
                write!(f, "Invalid settings in '{}': {}", path.display(), error)
            }
            CliError::Bundle(e) => write!(f, "Failed to load route bundle: {}", e),
            CliError::Route(e) => write!(f, "Invalid route: {}", e),
            CliError::Walk(e) => write!(f, "Route is not walkable: {}", e),
            CliError::FixLog {
                path,
                line,
                message,
            } => write!(f, "{}:{}: {}", path.display(), line, message),
            CliError::Io { path, error } => write!(f, "I/O error on '{}': {}", path, error),
            CliError::Runtime(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config { error, .. } => Some(error),
            CliError::Bundle(e) => Some(e),
            CliError::Route(e) => Some(e),
            CliError::Walk(e) => Some(e),
            CliError::Io { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<BundleError> for CliError {
    fn from(e: BundleError) -> Self {
        CliError::Bundle(e)
    }
}

impl From<GraphError> for CliError {
    fn from(e: GraphError) -> Self {
        CliError::Route(e)
    }
}

impl From<WalkError> for CliError {
    fn from(e: WalkError) -> Self {
        CliError::Walk(e)
    }
}
