//! Route preview.
//!
//! The [`Previewer`] walks a route node by node from explicit commands
//! instead of position fixes. It shares the read-only [`RouteGraph`] with
//! the live navigator and never touches its state.
//!
//! [`AutoStepper`] repeats forward steps on a timer, and
//! [`verify_walkability`] uses the previewer to check a route offline.
//!
//! [`RouteGraph`]: crate::graph::RouteGraph

mod auto_step;
mod event;
mod previewer;
mod walkability;

pub use auto_step::{AutoStepper, DEFAULT_TICK_PERIOD};
pub use event::{PreviewEvent, PreviewHistory, PreviewTargets};
pub use previewer::{PreviewConfig, PreviewNotice, PreviewSink, Previewer};
pub use walkability::{verify_walkability, WalkError, WalkReport};
