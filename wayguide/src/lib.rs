//! WayGuide - turn-by-turn route guidance for blind pedestrians
//!
//! This library turns a stream of position/orientation fixes into spoken
//! guidance events while a user walks a precomputed route over a pedestrian
//! network graph.
//!
//! # High-Level API
//!
//! [`navigation::Navigator`] is the live evaluator; [`preview::Previewer`]
//! walks the same route node by node without any location input:
//!
//! ```ignore
//! use std::sync::Arc;
//! use wayguide::graph::RouteBundle;
//! use wayguide::navigation::{Navigator, NavigatorConstants};
//!
//! let (graph, route) = RouteBundle::load("route.json")?.into_graph()?;
//! let mut navigator = Navigator::new(Arc::new(graph), NavigatorConstants::default(), Vec::new());
//! navigator.start(&route)?;
//! navigator.update(fix);
//! ```

pub mod geo;
pub mod graph;
pub mod logging;
pub mod navigation;
pub mod preview;

/// Version of the WayGuide library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
