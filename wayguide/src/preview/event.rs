//! Preview cursor snapshots and their history.

use serde::Serialize;

use crate::geo::Location;
use crate::graph::{LinkId, NodeId};

/// What lies ahead of the cursor along the faced link.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreviewTargets {
    /// The other end of the faced link.
    pub target_node: Option<NodeId>,
    /// First intersection, dead end or destination ahead.
    pub target_intersection: Option<NodeId>,
    /// Distance to `target_intersection` (meters).
    pub distance: f64,
    /// POIs next to the links up to `target_intersection`.
    pub target_pois: Vec<String>,
    /// Links at the cursor's node, clockwise from north.
    pub intersection_links: Vec<LinkId>,
}

/// Immutable snapshot of the preview cursor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewEvent {
    /// Position in the owning [`PreviewHistory`].
    pub index: usize,
    /// Event this one was derived from.
    pub prev: Option<usize>,
    pub node: NodeId,
    /// Link the cursor faces; `None` at a dead end or the destination.
    pub link: Option<LinkId>,
    /// Link walked to reach `node`.
    pub came_from: Option<LinkId>,
    /// Route link matching the faced link, if it belongs to the route.
    pub route_link: Option<LinkId>,
    /// Position of `node` in the route's node sequence.
    pub route_position: Option<usize>,
    /// Node location carrying the cursor's orientation.
    pub location: Location,
    pub orientation: f64,
    pub distance_moved: f64,
    pub targets: PreviewTargets,
    pub is_on_route: bool,
    pub is_going_to_be_off_route: bool,
    pub is_going_backward: bool,
    pub is_arrived: bool,
}

impl PreviewEvent {
    /// Whether the cursor's node joins more than two links.
    pub fn is_at_intersection(&self) -> bool {
        self.targets.intersection_links.len() > 2
    }

    /// Same position and heading as `other`, ignoring history and movement.
    pub fn same_place(&self, other: &PreviewEvent) -> bool {
        self.node == other.node
            && self.link == other.link
            && self.came_from == other.came_from
            && self.location == other.location
            && self.orientation.to_bits() == other.orientation.to_bits()
    }
}

/// Append-only arena of preview events.
///
/// `prev` links are indices into this arena, so the history forms a chain
/// without shared ownership.
#[derive(Debug, Clone, Default)]
pub struct PreviewHistory {
    events: Vec<PreviewEvent>,
}

impl PreviewHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `event`, assigning its index.
    pub fn push(&mut self, mut event: PreviewEvent) -> usize {
        let index = self.events.len();
        event.index = index;
        self.events.push(event);
        index
    }

    pub fn get(&self, index: usize) -> Option<&PreviewEvent> {
        self.events.get(index)
    }

    pub fn last(&self) -> Option<&PreviewEvent> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &PreviewEvent> {
        self.events.iter()
    }

    /// Follow `prev` links back from `index`.
    pub fn chain(&self, index: usize) -> impl Iterator<Item = &PreviewEvent> {
        std::iter::successors(self.get(index), move |e| e.prev.and_then(|p| self.get(p)))
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
