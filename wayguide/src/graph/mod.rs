//! Route graph model.
//!
//! Nodes, links and POIs of the pedestrian network, the resolved [`Route`]
//! a user walks, and [`GuideLink`] stretches that group collinear links.
//!
//! A [`RouteGraph`] is immutable after [`RouteGraph::build`]; both evaluators
//! borrow it through an `Arc`.

mod bundle;
mod combined;
mod error;
mod network;
mod poi;
mod types;

pub use bundle::{BundleError, RouteBundle};
pub use combined::{
    should_be_combined, GuideLink, COMBINE_BEARING_TOLERANCE_DEG, COMBINE_WIDTH_TOLERANCE_M,
};
pub use error::{GraphError, GraphResult};
pub use network::{GraphBuilder, Route, RouteGraph};
pub use poi::{ElevatorButtons, ElevatorEquipments, Poi, PoiCategory, PoiFlags};
pub use types::{
    BrailleBlock, Direction, EscalatorFlags, Link, LinkId, LinkRecord, LinkType, Node, NodeId,
};
