//! Guidance events and the sink they are delivered to.
//!
//! Events are a closed enum; each variant carries the properties a speech
//! layer needs to phrase it. The navigator delivers them synchronously, in
//! priority order, to a single [`GuidanceSink`].

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::geo::Location;
use crate::graph::{LinkId, LinkType, NodeId, PoiCategory, PoiFlags};

/// Why navigation could not start.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StartFailure {
    /// The route could not be resolved over the graph.
    InvalidRoute { message: String },
    /// The user is too far from the first leg.
    TooFarFromRoute { distance: f64, limit: f64 },
}

/// Where a POI lies relative to the direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiSide {
    Front,
    Left,
    Right,
    Behind,
}

impl PoiSide {
    /// Classify a signed angle (degrees, positive clockwise) from the travel
    /// bearing to the POI.
    pub fn from_relative_bearing(angle: f64) -> Self {
        let a = crate::geo::normalize_degree(angle);
        if a.abs() <= 45.0 {
            PoiSide::Front
        } else if a > 45.0 && a <= 135.0 {
            PoiSide::Right
        } else if a < -45.0 && a >= -135.0 {
            PoiSide::Left
        } else {
            PoiSide::Behind
        }
    }
}

/// How a POI is announced on the leg it is attached to.
///
/// Roles are assigned when the plan is built, from the POI's category and
/// its position on the leg.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoiRoles {
    /// Doors and elevators; announced even inside the POI interval.
    pub requires_user_action: bool,
    /// Near the leg's source; announced as the user sets off.
    pub for_before_start: bool,
    /// Floor and elevator information; announced at close range.
    pub for_floor: bool,
    /// Corner features; announced from any direction.
    pub for_corner: bool,
    /// Signs; announced only to users in front of them.
    pub for_sign: bool,
    /// Near the leg's target; announced with the approach to it.
    pub for_before_end: bool,
    /// Near the route's destination.
    pub is_destination: bool,
}

impl PoiRoles {
    /// Whether a leaving notice follows the approach.
    pub fn announces_leaving(&self) -> bool {
        !(self.for_before_start
            || self.for_floor
            || self.for_sign
            || self.for_before_end
            || self.is_destination)
    }
}

/// POI properties carried by POI events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoiNotice {
    pub poi_id: String,
    pub category: PoiCategory,
    pub name: Option<String>,
    pub long_description: Option<String>,
    pub flags: PoiFlags,
    pub roles: PoiRoles,
    /// Distance from the user's snapped position (meters).
    pub distance: f64,
    pub side: PoiSide,
}

/// A nearby non-route link the user may have wandered onto.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffRouteAlternate {
    pub link: LinkId,
    pub link_type: LinkType,
    /// Distance from the user to the link (meters).
    pub distance: f64,
    /// Route node this link leads back to, if any.
    pub rejoins_route_at: Option<NodeId>,
}

/// Outbound guidance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum GuidanceEvent {
    CouldNotStartNavigation {
        reason: StartFailure,
    },
    NavigationStarted {
        total_length: f64,
        leg_count: usize,
        distance_to_route: f64,
        /// The user is near, but not on, the start of the route.
        caution: bool,
    },
    NavigationFinished {
        distance_to_destination: f64,
    },
    UserNeedsToChangeHeading {
        /// Signed rotation to face the leg (degrees, positive = right).
        diff_heading: f64,
        threshold: f64,
    },
    UserAdjustedHeading {
        diff_heading: f64,
    },
    RemainingDistanceToTarget {
        leg: usize,
        distance: f64,
        /// Distance to the destination through the remaining legs.
        route_remaining: f64,
    },
    UserIsApproachingToTarget {
        leg: usize,
        distance: f64,
        /// Turn at the target (degrees, positive = right); absent at the
        /// destination.
        next_turn_angle: Option<f64>,
        next_link_type: Option<LinkType>,
        is_destination: bool,
    },
    UserNeedsToTakeAction {
        leg: usize,
        turn_angle: f64,
        next_link_type: LinkType,
        /// A repeat of an earlier instruction the user has not followed.
        repeated: bool,
    },
    UserNeedsToWalk {
        leg: usize,
        distance: f64,
        route_remaining: f64,
        link_type: LinkType,
        minimum_width: f64,
        street_name: Option<String>,
        is_first_leg: bool,
    },
    UserMaybeGoingBackward {
        distance_back: f64,
        diff_heading: f64,
    },
    UserMaybeOffRoute {
        distance_from_route: f64,
        /// Bearing from the user back to the route.
        bearing_to_route: f64,
        snapped: Location,
        alternate: Option<OffRouteAlternate>,
        needs_reroute: bool,
    },
    UserMayGetBackOnRoute {
        distance_from_route: f64,
    },
    UserShouldAdjustBearing {
        diff_bearing: f64,
    },
    UserIsApproachingToPoi {
        poi: PoiNotice,
    },
    UserIsLeavingFromPoi {
        poi: PoiNotice,
    },
    ActiveStatusChanged {
        active: bool,
    },
}

impl GuidanceEvent {
    /// Emission rank within a single fix; lower is delivered first.
    pub fn priority(&self) -> u8 {
        match self {
            GuidanceEvent::ActiveStatusChanged { active: true } => 0,
            GuidanceEvent::CouldNotStartNavigation { .. } => 1,
            GuidanceEvent::NavigationStarted { .. } => 2,
            GuidanceEvent::NavigationFinished { .. } => 3,
            GuidanceEvent::UserMaybeOffRoute { .. } => 4,
            GuidanceEvent::UserMayGetBackOnRoute { .. } => 5,
            GuidanceEvent::UserMaybeGoingBackward { .. } => 6,
            GuidanceEvent::UserNeedsToTakeAction { .. } => 7,
            GuidanceEvent::UserIsApproachingToTarget { .. } => 8,
            GuidanceEvent::UserIsApproachingToPoi { .. } => 9,
            GuidanceEvent::UserIsLeavingFromPoi { .. } => 10,
            GuidanceEvent::UserShouldAdjustBearing { .. } => 11,
            GuidanceEvent::UserNeedsToChangeHeading { .. } => 12,
            GuidanceEvent::UserAdjustedHeading { .. } => 13,
            GuidanceEvent::UserNeedsToWalk { .. } => 14,
            GuidanceEvent::RemainingDistanceToTarget { .. } => 15,
            GuidanceEvent::ActiveStatusChanged { active: false } => 16,
        }
    }

    /// Stable kebab-case name for logs and output.
    pub fn name(&self) -> &'static str {
        match self {
            GuidanceEvent::CouldNotStartNavigation { .. } => "navigation-could-not-start",
            GuidanceEvent::NavigationStarted { .. } => "navigation-started",
            GuidanceEvent::NavigationFinished { .. } => "navigation-finished",
            GuidanceEvent::UserNeedsToChangeHeading { .. } => "user-needs-to-change-heading",
            GuidanceEvent::UserAdjustedHeading { .. } => "user-adjusted-heading",
            GuidanceEvent::RemainingDistanceToTarget { .. } => "remaining-distance-to-target",
            GuidanceEvent::UserIsApproachingToTarget { .. } => "user-is-approaching-to-target",
            GuidanceEvent::UserNeedsToTakeAction { .. } => "user-needs-to-take-action",
            GuidanceEvent::UserNeedsToWalk { .. } => "user-needs-to-walk",
            GuidanceEvent::UserMaybeGoingBackward { .. } => "user-maybe-going-backward",
            GuidanceEvent::UserMaybeOffRoute { .. } => "user-maybe-off-route",
            GuidanceEvent::UserMayGetBackOnRoute { .. } => "user-may-get-back-on-route",
            GuidanceEvent::UserShouldAdjustBearing { .. } => "user-should-adjust-bearing",
            GuidanceEvent::UserIsApproachingToPoi { .. } => "user-is-approaching-to-poi",
            GuidanceEvent::UserIsLeavingFromPoi { .. } => "user-is-leaving-from-poi",
            GuidanceEvent::ActiveStatusChanged { .. } => "active-status-changed",
        }
    }
}

/// Receiver of guidance events.
///
/// Called synchronously on the navigator's thread; implementations must
/// not block.
pub trait GuidanceSink {
    fn handle(&mut self, event: &GuidanceEvent);
}

impl GuidanceSink for Vec<GuidanceEvent> {
    fn handle(&mut self, event: &GuidanceEvent) {
        self.push(event.clone());
    }
}

impl GuidanceSink for UnboundedSender<GuidanceEvent> {
    fn handle(&mut self, event: &GuidanceEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.send(event.clone());
    }
}

impl<S: GuidanceSink + ?Sized> GuidanceSink for &mut S {
    fn handle(&mut self, event: &GuidanceEvent) {
        (**self).handle(event);
    }
}

impl<S: GuidanceSink + ?Sized> GuidanceSink for Box<S> {
    fn handle(&mut self, event: &GuidanceEvent) {
        (**self).handle(event);
    }
}

/// Adapts a closure into a sink.
///
/// ```
/// use wayguide::navigation::{FnSink, GuidanceEvent, GuidanceSink};
///
/// let mut count = 0;
/// let mut sink = FnSink(|_: &GuidanceEvent| count += 1);
/// sink.handle(&GuidanceEvent::ActiveStatusChanged { active: true });
/// drop(sink);
/// assert_eq!(count, 1);
/// ```
pub struct FnSink<F>(pub F);

impl<F: FnMut(&GuidanceEvent)> GuidanceSink for FnSink<F> {
    fn handle(&mut self, event: &GuidanceEvent) {
        (self.0)(event)
    }
}
