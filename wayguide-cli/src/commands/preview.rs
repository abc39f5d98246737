//! Preview command - step through a route interactively.
//!
//! Reads one command per line from stdin and writes every preview notice
//! to stdout as a JSON line. Auto-step runs on a background timer while
//! stdin is idle.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wayguide::geo::Location;
use wayguide::preview::{AutoStepper, PreviewConfig, PreviewNotice, PreviewSink, Previewer};

use super::common::{load_bundle, write_json_line};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the preview command.
pub struct PreviewArgs {
    pub bundle: PathBuf,
    /// Auto-step timer period.
    pub tick: Duration,
}

/// A line of preview input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PreviewCommand {
    Start,
    StartAt { lat: f64, lng: f64, floor: f64 },
    Stop,
    Begin,
    End,
    Forward,
    Backward,
    JumpForward,
    JumpBackward,
    Right,
    Left,
    Faster,
    Slower,
    Pause,
    Quit,
}

impl FromStr for PreviewCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let Some(name) = words.next() else {
            return Err("empty command".to_string());
        };
        let command = match name.to_lowercase().as_str() {
            "start" => PreviewCommand::Start,
            "start-at" => {
                let mut number = |what: &str| -> Result<Option<f64>, String> {
                    words
                        .next()
                        .map(|w| w.parse::<f64>().map_err(|_| format!("invalid {}: {}", what, w)))
                        .transpose()
                };
                let lat = number("latitude")?.ok_or("start-at needs a latitude")?;
                let lng = number("longitude")?.ok_or("start-at needs a longitude")?;
                let floor = number("floor")?.unwrap_or(0.0);
                PreviewCommand::StartAt { lat, lng, floor }
            }
            "stop" => PreviewCommand::Stop,
            "begin" => PreviewCommand::Begin,
            "end" => PreviewCommand::End,
            "forward" | "f" => PreviewCommand::Forward,
            "backward" | "b" => PreviewCommand::Backward,
            "jump-forward" | "jf" => PreviewCommand::JumpForward,
            "jump-backward" | "jb" => PreviewCommand::JumpBackward,
            "right" | "r" => PreviewCommand::Right,
            "left" | "l" => PreviewCommand::Left,
            "faster" | "+" => PreviewCommand::Faster,
            "slower" | "-" => PreviewCommand::Slower,
            "pause" => PreviewCommand::Pause,
            "quit" | "q" => PreviewCommand::Quit,
            other => return Err(format!("unknown command: {}", other)),
        };
        if words.next().is_some() {
            return Err(format!("unexpected arguments after {}", name));
        }
        Ok(command)
    }
}

/// Apply one command. `Quit` is handled by the caller.
pub fn apply<S: PreviewSink>(previewer: &mut Previewer<S>, command: PreviewCommand) {
    debug!(?command, "Preview command");
    match command {
        PreviewCommand::Start => {
            previewer.start();
        }
        PreviewCommand::StartAt { lat, lng, floor } => {
            previewer.start_at(&Location::with_floor(lat, lng, floor));
        }
        PreviewCommand::Stop => previewer.stop(),
        PreviewCommand::Begin => previewer.goto_begin(),
        PreviewCommand::End => previewer.goto_end(),
        PreviewCommand::Forward => previewer.step_forward(),
        PreviewCommand::Backward => previewer.step_backward(),
        PreviewCommand::JumpForward => previewer.jump_forward(),
        PreviewCommand::JumpBackward => previewer.jump_backward(),
        PreviewCommand::Right => previewer.face_right(),
        PreviewCommand::Left => previewer.face_left(),
        PreviewCommand::Faster => previewer.auto_step_forward_up(),
        PreviewCommand::Slower => previewer.auto_step_forward_down(),
        PreviewCommand::Pause => previewer.auto_step_forward_stop(),
        PreviewCommand::Quit => {}
    }
}

type SharedPreviewer = Arc<Mutex<Previewer<mpsc::UnboundedSender<PreviewNotice>>>>;

/// Spawn a stepper unless one is already running for an active preview.
fn ensure_stepper(
    runtime: &Runtime,
    stepper: &mut Option<AutoStepper>,
    previewer: &SharedPreviewer,
    tick: Duration,
) {
    let running = stepper.as_ref().is_some_and(AutoStepper::is_running);
    if running || !previewer.lock().is_active() {
        return;
    }
    let _guard = runtime.enter();
    *stepper = Some(AutoStepper::spawn(Arc::clone(previewer), tick));
}

/// Run the preview command.
pub fn run(runner: &CliRunner, args: PreviewArgs) -> Result<(), CliError> {
    runner.log_startup("preview");
    let (graph, route) = load_bundle(&args.bundle)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_time()
        .build()
        .map_err(|e| CliError::Runtime(format!("Failed to start runtime: {}", e)))?;

    let (tx, mut rx) = mpsc::unbounded_channel::<PreviewNotice>();
    let previewer: SharedPreviewer = Arc::new(Mutex::new(Previewer::new(
        graph,
        &route,
        PreviewConfig::default(),
        tx,
    )?));

    let printer = runtime.spawn(async move {
        while let Some(notice) = rx.recv().await {
            let mut out = io::stdout().lock();
            let written = write_json_line(&mut out, &notice).and_then(|_| {
                out.flush().map_err(|error| CliError::Io {
                    path: "<stdout>".to_string(),
                    error,
                })
            });
            if let Err(e) = written {
                warn!(error = %e, "Stopped writing preview output");
                break;
            }
        }
    });

    previewer.lock().start();
    let mut stepper = None;
    ensure_stepper(&runtime, &mut stepper, &previewer, args.tick);

    for line in io::stdin().lock().lines() {
        let line = line.map_err(|error| CliError::Io {
            path: "<stdin>".to_string(),
            error,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<PreviewCommand>() {
            Ok(PreviewCommand::Quit) => break,
            Ok(command) => {
                apply(&mut *previewer.lock(), command);
                ensure_stepper(&runtime, &mut stepper, &previewer, args.tick);
            }
            Err(message) => warn!(input = %line, "{}", message),
        }
    }

    previewer.lock().stop();
    if let Some(stepper) = stepper {
        runtime.block_on(stepper.shutdown());
    }
    // Dropping the last handle closes the notice channel
    drop(previewer);
    runtime
        .block_on(printer)
        .map_err(|e| CliError::Runtime(format!("Preview output task failed: {}", e)))?;
    info!("Preview finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("forward".parse(), Ok(PreviewCommand::Forward));
        assert_eq!(" R ".parse(), Ok(PreviewCommand::Right));
        assert_eq!("jb".parse(), Ok(PreviewCommand::JumpBackward));
        assert_eq!("+".parse(), Ok(PreviewCommand::Faster));
        assert_eq!("q".parse(), Ok(PreviewCommand::Quit));
    }

    #[test]
    fn test_parse_start_at() {
        assert_eq!(
            "start-at 35.5 139.25".parse(),
            Ok(PreviewCommand::StartAt {
                lat: 35.5,
                lng: 139.25,
                floor: 0.0
            })
        );
        assert_eq!(
            "start-at 35.5 139.25 -1".parse(),
            Ok(PreviewCommand::StartAt {
                lat: 35.5,
                lng: 139.25,
                floor: -1.0
            })
        );
        assert!("start-at 35.5".parse::<PreviewCommand>().is_err());
        assert!("start-at north 139".parse::<PreviewCommand>().is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_and_extra_words() {
        assert!("sideways".parse::<PreviewCommand>().is_err());
        assert!("forward twice".parse::<PreviewCommand>().is_err());
        assert!("".parse::<PreviewCommand>().is_err());
    }

    #[test]
    fn test_apply_moves_previewer() {
        use wayguide::graph::{GraphBuilder, LinkId, LinkRecord};

        let a = Location::new(35.0, 139.0);
        let graph = GraphBuilder::new()
            .node("a", a)
            .node("b", a.offset(10.0, 90.0))
            .link(LinkRecord::new("ab", "a", "b"))
            .build()
            .unwrap();
        let route: Vec<LinkId> = vec!["ab".into()];
        let mut p =
            Previewer::new(Arc::new(graph), &route, PreviewConfig::default(), Vec::new()).unwrap();

        apply(&mut p, PreviewCommand::Start);
        apply(&mut p, PreviewCommand::Forward);
        assert!(p.is_arrived());
        apply(&mut p, PreviewCommand::Begin);
        assert_eq!(p.event().unwrap().node, "a");
        apply(&mut p, PreviewCommand::Stop);
        assert!(!p.is_active());
    }
}
