//! Replay command - feed a recorded fix log through the live evaluator.
//!
//! Events are written to stdout as JSON lines, each tagged with the fix
//! time that produced it.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};
use wayguide::navigation::{GuidanceEvent, Navigator};

use super::common::{load_bundle, read_fixes, write_json_line};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the replay command.
pub struct ReplayArgs {
    pub bundle: PathBuf,
    pub fixes: PathBuf,
    /// Sleep between fixes to match the recording.
    pub realtime: bool,
}

/// An event with the fix time that produced it.
#[derive(Serialize)]
struct ReplayLine<'a> {
    t: f64,
    #[serde(flatten)]
    event: &'a GuidanceEvent,
}

/// Run the replay command.
pub fn run(runner: &CliRunner, args: ReplayArgs) -> Result<(), CliError> {
    runner.log_startup("replay");
    let (graph, route) = load_bundle(&args.bundle)?;
    let fixes = read_fixes(&args.fixes)?;
    info!(fixes = fixes.len(), "Fix log loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    if args.realtime {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .map_err(|e| CliError::Runtime(format!("Failed to set signal handler: {}", e)))?;
    }

    let mut navigator = Navigator::new(graph, runner.constants().clone(), Vec::new());
    let stdout = io::stdout();
    let mut out = stdout.lock();

    // Start events carry the time of the first fix
    let first_t = fixes.first().map_or(0.0, |f| f.t);
    let started = navigator.start(&route);
    flush_events(&mut out, first_t, navigator.sink_mut())?;
    started?;

    let t0 = Instant::now();
    for fix in &fixes {
        if shutdown.load(Ordering::SeqCst) {
            warn!("Replay interrupted");
            break;
        }
        let at = Duration::try_from_secs_f64(fix.t)
            .ok()
            .and_then(|offset| t0.checked_add(offset))
            .ok_or_else(|| CliError::Runtime(format!("Fix time {} is out of range", fix.t)))?;
        if args.realtime {
            std::thread::sleep(at.saturating_duration_since(Instant::now()));
        }
        if let Some(status) = fix.status {
            navigator.set_location_status(status);
        }
        navigator.update_at(fix.location, at);
        flush_events(&mut out, fix.t, navigator.sink_mut())?;
    }

    info!(phase = navigator.phase().as_str(), "Replay finished");
    navigator.stop();
    let last_t = fixes.last().map_or(0.0, |f| f.t);
    flush_events(&mut out, last_t, navigator.sink_mut())?;
    out.flush().map_err(|error| CliError::Io {
        path: "<stdout>".to_string(),
        error,
    })
}

fn flush_events(
    out: &mut impl Write,
    t: f64,
    events: &mut Vec<GuidanceEvent>,
) -> Result<(), CliError> {
    for event in events.drain(..) {
        write_json_line(out, &ReplayLine { t, event: &event })?;
    }
    Ok(())
}
