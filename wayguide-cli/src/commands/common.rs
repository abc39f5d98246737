//! Common types and utilities shared across CLI commands.

use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wayguide::geo::{Location, LocationStatus};
use wayguide::graph::{LinkId, RouteBundle, RouteGraph};
use wayguide::navigation::NavigatorConstants;

use crate::error::CliError;

/// Default settings file: `<config dir>/wayguide/navigation.ini`.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wayguide")
        .join("navigation.ini")
}

/// Load navigation settings from `path`.
///
/// A missing file falls back to the defaults unless it was named
/// explicitly.
pub fn load_constants(path: &Path, explicit: bool) -> Result<NavigatorConstants, CliError> {
    if !explicit && !path.exists() {
        debug!(path = %path.display(), "No settings file, using defaults");
        return Ok(NavigatorConstants::default());
    }
    NavigatorConstants::from_ini_file(path).map_err(|error| CliError::Config {
        path: path.to_path_buf(),
        error,
    })
}

/// Load a bundle and build its graph.
pub fn load_bundle(path: &Path) -> Result<(Arc<RouteGraph>, Vec<LinkId>), CliError> {
    let (graph, route) = RouteBundle::load(path)?.into_graph()?;
    info!(
        path = %path.display(),
        nodes = graph.node_count(),
        links = graph.links().len(),
        route_links = route.len(),
        "Bundle loaded"
    );
    Ok((Arc::new(graph), route))
}

/// One line of a recorded fix log.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FixRecord {
    /// Seconds since the start of the recording.
    pub t: f64,
    /// Provider status, applied before the fix when present.
    #[serde(default)]
    pub status: Option<LocationStatus>,
    pub location: Location,
}

/// Latest accepted fix time, ten years into the walk.
pub const MAX_FIX_TIME_SECS: f64 = 10.0 * 365.0 * 24.0 * 3600.0;

/// Parse a JSON-lines fix log. Blank lines are ignored; timestamps must be
/// finite, non-negative and at most [`MAX_FIX_TIME_SECS`].
pub fn parse_fixes(path: &Path, reader: impl BufRead) -> Result<Vec<FixRecord>, CliError> {
    let mut fixes = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|error| CliError::Io {
            path: path.display().to_string(),
            error,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let fix_error = |message: String| CliError::FixLog {
            path: path.to_path_buf(),
            line: index + 1,
            message,
        };
        let record: FixRecord =
            serde_json::from_str(&line).map_err(|e| fix_error(e.to_string()))?;
        if !record.t.is_finite() || record.t < 0.0 || record.t > MAX_FIX_TIME_SECS {
            return Err(fix_error(format!("invalid timestamp {}", record.t)));
        }
        fixes.push(record);
    }
    Ok(fixes)
}

/// Read a fix log from disk.
pub fn read_fixes(path: &Path) -> Result<Vec<FixRecord>, CliError> {
    let file = fs::File::open(path).map_err(|error| CliError::Io {
        path: path.display().to_string(),
        error,
    })?;
    parse_fixes(path, BufReader::new(file))
}

/// Write `value` as one JSON line.
pub fn write_json_line<T: Serialize>(out: &mut impl Write, value: &T) -> Result<(), CliError> {
    let io_error = |error| CliError::Io {
        path: "<stdout>".to_string(),
        error,
    };
    serde_json::to_writer(&mut *out, value).map_err(|e| io_error(io::Error::from(e)))?;
    writeln!(out).map_err(io_error)
}
