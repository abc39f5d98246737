//! Timer driving a previewer's auto-step.
//!
//! [`AutoStepper`] spawns a tokio task that calls [`Previewer::tick`] at a
//! fixed period until cancelled. Speed and on/off state stay on the
//! previewer; the task only supplies elapsed time, so
//! `auto_step_forward_stop` takes effect on the very next tick.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::previewer::{PreviewSink, Previewer};

/// Default tick period.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(100);

/// Cancelable repeating timer over a shared previewer.
pub struct AutoStepper {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl AutoStepper {
    /// Start ticking `previewer` every `period`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S>(previewer: Arc<Mutex<Previewer<S>>>, period: Duration) -> Self
    where
        S: PreviewSink + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    biased;

                    _ = token.cancelled() => {
                        debug!("Auto stepper cancelled");
                        break;
                    }

                    _ = interval.tick() => {
                        let mut previewer = previewer.lock();
                        if !previewer.is_active() {
                            debug!("Auto stepper finished: preview stopped");
                            break;
                        }
                        previewer.tick(period);
                    }
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Request cancellation; no tick runs after this returns.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for AutoStepper {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
