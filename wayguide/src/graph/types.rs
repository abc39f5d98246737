//! Nodes and links of the pedestrian network.

use serde::{Deserialize, Serialize};

use crate::geo::{bearing, final_bearing, Location};

/// Node identifier.
pub type NodeId = String;

/// Link identifier.
pub type LinkId = String;

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────────────

/// Which way a link may be walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Both,
    SourceToTarget,
    TargetToSource,
    Unknown,
}

impl Direction {
    /// Direction as seen when the link is walked target to source.
    pub fn reversed(self) -> Self {
        match self {
            Direction::SourceToTarget => Direction::TargetToSource,
            Direction::TargetToSource => Direction::SourceToTarget,
            other => other,
        }
    }

    /// Map the numeric codes used by network exports (0, 1, 2, 9).
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Direction::Both),
            1 => Some(Direction::SourceToTarget),
            2 => Some(Direction::TargetToSource),
            9 => Some(Direction::Unknown),
            _ => None,
        }
    }
}

/// Physical kind of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    #[default]
    Sidewalk,
    PedestrianRoad,
    GardenPath,
    FreeWalkway,
    Crossing,
    Railroad,
    Elevator,
    Escalator,
    Stairway,
    Slope,
    MovingWalkway,
    Ramp,
    Corridor,
    Unknown,
}

impl LinkType {
    /// Map the numeric codes used by network exports (1-13, 99).
    pub fn from_code(code: i32) -> Option<Self> {
        let t = match code {
            1 => LinkType::Sidewalk,
            2 => LinkType::PedestrianRoad,
            3 => LinkType::GardenPath,
            4 => LinkType::FreeWalkway,
            5 => LinkType::Crossing,
            6 => LinkType::Railroad,
            7 => LinkType::Elevator,
            8 => LinkType::Escalator,
            9 => LinkType::Stairway,
            10 => LinkType::Slope,
            11 => LinkType::MovingWalkway,
            12 => LinkType::Ramp,
            13 => LinkType::Corridor,
            99 => LinkType::Unknown,
            _ => return None,
        };
        Some(t)
    }

    /// Links that change floor.
    pub fn is_vertical(self) -> bool {
        matches!(
            self,
            LinkType::Elevator | LinkType::Escalator | LinkType::Stairway
        )
    }

    /// Links a blind pedestrian can follow without special handling.
    pub fn is_safe(self) -> bool {
        !matches!(
            self,
            LinkType::Railroad | LinkType::FreeWalkway | LinkType::Unknown
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkType::Sidewalk => "sidewalk",
            LinkType::PedestrianRoad => "pedestrian_road",
            LinkType::GardenPath => "garden_path",
            LinkType::FreeWalkway => "free_walkway",
            LinkType::Crossing => "crossing",
            LinkType::Railroad => "railroad",
            LinkType::Elevator => "elevator",
            LinkType::Escalator => "escalator",
            LinkType::Stairway => "stairway",
            LinkType::Slope => "slope",
            LinkType::MovingWalkway => "moving_walkway",
            LinkType::Ramp => "ramp",
            LinkType::Corridor => "corridor",
            LinkType::Unknown => "unknown",
        }
    }
}

/// Tactile paving along a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrailleBlock {
    #[default]
    None,
    Available,
    Unknown,
}

/// Escalator attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalatorFlags {
    pub upward: bool,
    pub downward: bool,
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Node
// ─────────────────────────────────────────────────────────────────────────────

/// A network vertex. `connected_links` is filled in when the graph is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connected_links: Vec<LinkId>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, location: Location) -> Self {
        Self {
            id: id.into(),
            location,
            connected_links: Vec::new(),
        }
    }

    /// A dead end.
    pub fn is_leaf(&self) -> bool {
        self.connected_links.len() <= 1
    }

    /// More than two links meet here.
    pub fn is_intersection(&self) -> bool {
        self.connected_links.len() > 2
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Link
// ─────────────────────────────────────────────────────────────────────────────

/// Link as it appears in graph data, before node references are resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: LinkId,
    pub source_node: NodeId,
    pub target_node: NodeId,
    /// Declared length; measured from the node locations when absent.
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub link_type: LinkType,
    /// Floor at the source end; the source node's floor when absent.
    #[serde(default)]
    pub source_height: Option<f64>,
    #[serde(default)]
    pub target_height: Option<f64>,
    #[serde(default)]
    pub minimum_width: f64,
    #[serde(default)]
    pub braille_block: BrailleBlock,
    #[serde(default)]
    pub escalator_flags: Option<EscalatorFlags>,
    #[serde(default)]
    pub street_name: Option<String>,
}

impl LinkRecord {
    pub fn new(
        id: impl Into<LinkId>,
        source_node: impl Into<NodeId>,
        target_node: impl Into<NodeId>,
    ) -> Self {
        Self {
            id: id.into(),
            source_node: source_node.into(),
            target_node: target_node.into(),
            length: None,
            direction: Direction::Both,
            link_type: LinkType::Sidewalk,
            source_height: None,
            target_height: None,
            minimum_width: 0.0,
            braille_block: BrailleBlock::None,
            escalator_flags: None,
            street_name: None,
        }
    }

    pub fn with_type(mut self, link_type: LinkType) -> Self {
        self.link_type = link_type;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_width(mut self, minimum_width: f64) -> Self {
        self.minimum_width = minimum_width;
        self
    }

    pub fn with_heights(mut self, source: f64, target: f64) -> Self {
        self.source_height = Some(source);
        self.target_height = Some(target);
        self
    }

    pub fn with_braille_block(mut self, braille_block: BrailleBlock) -> Self {
        self.braille_block = braille_block;
        self
    }

    pub fn with_street_name(mut self, name: impl Into<String>) -> Self {
        self.street_name = Some(name.into());
        self
    }

    /// Resolve node references into a [`Link`].
    pub(crate) fn resolve(self, source: &Node, target: &Node) -> Link {
        let source_height = self.source_height.unwrap_or(source.location.floor());
        let target_height = self.target_height.unwrap_or(target.location.floor());
        let source_location = Location::with_floor(
            source.location.lat(),
            source.location.lng(),
            source_height,
        );
        let target_location = Location::with_floor(
            target.location.lat(),
            target.location.lng(),
            target_height,
        );
        let geometric_length = source_location.distance_to(&target_location);
        let length = match self.length {
            Some(l) if l.is_finite() && l > 0.0 => l,
            _ => geometric_length,
        };

        Link {
            id: self.id,
            source_node: self.source_node,
            target_node: self.target_node,
            length,
            geometric_length,
            direction: self.direction,
            link_type: self.link_type,
            source_height,
            target_height,
            minimum_width: self.minimum_width,
            braille_block: self.braille_block,
            escalator_flags: self.escalator_flags,
            street_name: self.street_name,
            source_location,
            target_location,
        }
    }
}

/// A resolved, directed edge between two nodes.
///
/// Links are immutable once the graph is built. Walking a link target to
/// source is expressed by [`Link::reversed`], which yields a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    id: LinkId,
    source_node: NodeId,
    target_node: NodeId,
    length: f64,
    geometric_length: f64,
    direction: Direction,
    link_type: LinkType,
    source_height: f64,
    target_height: f64,
    minimum_width: f64,
    braille_block: BrailleBlock,
    escalator_flags: Option<EscalatorFlags>,
    street_name: Option<String>,
    source_location: Location,
    target_location: Location,
}

impl Link {
    pub fn id(&self) -> &LinkId {
        &self.id
    }

    pub fn source_node(&self) -> &NodeId {
        &self.source_node
    }

    pub fn target_node(&self) -> &NodeId {
        &self.target_node
    }

    /// Declared length (meters).
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Distance between the endpoint locations (meters).
    pub fn geometric_length(&self) -> f64 {
        self.geometric_length
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    pub fn source_height(&self) -> f64 {
        self.source_height
    }

    pub fn target_height(&self) -> f64 {
        self.target_height
    }

    pub fn minimum_width(&self) -> f64 {
        self.minimum_width
    }

    pub fn braille_block(&self) -> BrailleBlock {
        self.braille_block
    }

    pub fn escalator_flags(&self) -> Option<EscalatorFlags> {
        self.escalator_flags
    }

    pub fn street_name(&self) -> Option<&str> {
        self.street_name.as_deref()
    }

    pub fn source_location(&self) -> &Location {
        &self.source_location
    }

    pub fn target_location(&self) -> &Location {
        &self.target_location
    }

    pub fn is_vertical(&self) -> bool {
        self.link_type.is_vertical()
    }

    pub fn is_safe_link_type(&self) -> bool {
        self.link_type.is_safe()
    }

    /// Bearing when leaving the source node.
    pub fn initial_bearing_from_source(&self) -> f64 {
        bearing(
            self.source_location.lat(),
            self.source_location.lng(),
            self.target_location.lat(),
            self.target_location.lng(),
        )
    }

    /// Bearing when arriving at the target node.
    pub fn last_bearing_for_target(&self) -> f64 {
        final_bearing(
            self.source_location.lat(),
            self.source_location.lng(),
            self.target_location.lat(),
            self.target_location.lng(),
        )
    }

    /// Bearing when leaving the target node toward the source.
    pub fn initial_bearing_from_target(&self) -> f64 {
        bearing(
            self.target_location.lat(),
            self.target_location.lng(),
            self.source_location.lat(),
            self.source_location.lng(),
        )
    }

    /// Bearing when leaving `node` along this link.
    pub fn initial_bearing_from(&self, node: &str) -> Option<f64> {
        if node == self.source_node {
            Some(self.initial_bearing_from_source())
        } else if node == self.target_node {
            Some(self.initial_bearing_from_target())
        } else {
            None
        }
    }

    /// The node at the opposite end from `node`.
    pub fn other_end(&self, node: &str) -> Option<&NodeId> {
        if node == self.source_node {
            Some(&self.target_node)
        } else if node == self.target_node {
            Some(&self.source_node)
        } else {
            None
        }
    }

    pub fn touches(&self, node: &str) -> bool {
        node == self.source_node || node == self.target_node
    }

    /// Whether the link may be entered at `node`.
    pub fn allows_traversal_from(&self, node: &str) -> bool {
        match self.direction {
            Direction::SourceToTarget => node == self.source_node,
            Direction::TargetToSource => node == self.target_node,
            Direction::Both | Direction::Unknown => self.touches(node),
        }
    }

    /// The same link walked target to source.
    pub fn reversed(&self) -> Link {
        Link {
            source_node: self.target_node.clone(),
            target_node: self.source_node.clone(),
            direction: self.direction.reversed(),
            source_height: self.target_height,
            target_height: self.source_height,
            source_location: self.target_location,
            target_location: self.source_location,
            ..self.clone()
        }
    }

    /// Closest point on the link to `location`.
    pub fn nearest_location_to(&self, location: &Location) -> Location {
        location.nearest_location_to_line(&self.source_location, &self.target_location)
    }

    /// Perpendicular distance from `location` to the link (meters).
    pub fn distance_to(&self, location: &Location) -> f64 {
        location.distance_to(&self.nearest_location_to(location))
    }

    /// Whether `location` is on a floor this link spans.
    pub fn is_on_floor_of(&self, location: &Location) -> bool {
        let low = self.source_height.min(self.target_height) - 0.5;
        let high = self.source_height.max(self.target_height) + 0.5;
        (low..=high).contains(&location.floor())
    }
}
