//! Progress tracking along the active leg.
//!
//! A [`LinkProgress`] owns the state for one leg instance. Each fix
//! recomputes [`LinkMetrics`] and evaluates every condition once; a flag
//! fires on its first crossing and stays set for the rest of the leg.
//!
//! # State Machine
//!
//! ```text
//! (new) --first fix--> Activated --+--> Approaching --> WaitingForAction
//!                                  |
//!  orthogonal:  Clear --[distance > off_route]--> Excursion
//!               Excursion --[distance <= off_route]--> Clear
//! ```
//!
//! The state record is replaced wholesale on every update, so observers can
//! diff the previous and current [`LinkProgressState`].

use std::time::{Duration, Instant};

use tracing::debug;

use crate::geo::{angle_difference, Location};
use crate::graph::RouteGraph;

use super::config::NavigatorConstants;
use super::events::{GuidanceEvent, OffRouteAlternate};
use super::plan::{Leg, NavigationPlan};
use super::poi_tracker::{PoiFix, PoiTracker};

/// Height used to express floor differences as distances on vertical legs.
pub const FLOOR_HEIGHT_M: f64 = 4.0;

// ─────────────────────────────────────────────────────────────────────────────
// Context and metrics
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a tracker reads but does not own.
#[derive(Debug, Clone, Copy)]
pub struct TrackerContext<'a> {
    pub graph: &'a RouteGraph,
    pub plan: &'a NavigationPlan,
    /// Must index a leg of `plan`.
    pub leg_index: usize,
    pub constants: &'a NavigatorConstants,
}

impl<'a> TrackerContext<'a> {
    pub fn leg(&self) -> &'a Leg {
        &self.plan.legs()[self.leg_index]
    }

    pub fn next_leg(&self) -> Option<&'a Leg> {
        self.plan.leg(self.leg_index + 1)
    }

    pub fn is_final(&self) -> bool {
        self.plan.is_final(self.leg_index)
    }
}

/// Geometry of a fix relative to the active leg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkMetrics {
    /// Closest point on the leg, carrying the user's orientation.
    pub snapped: Location,
    pub distance_to_user_from_link: f64,
    pub distance_to_target_from_user: f64,
    pub distance_to_target_from_snapped: f64,
    pub distance_to_source_from_snapped: f64,
    /// Leg bearing at the snapped point.
    pub link_bearing: f64,
    /// Signed rotation from the user's orientation to the leg bearing.
    pub diff_bearing_at_user: f64,
    /// Bearing from the user to the snapped point.
    pub bearing_to_snapped: f64,
    /// Turn from this leg onto the next one, when both are walked.
    pub next_turn_angle: Option<f64>,
    /// Signed rotation from the user's orientation to the next leg.
    pub diff_next_bearing: Option<f64>,
    pub floor_in_transition: bool,
}

impl LinkMetrics {
    /// Measure `location` against the context's leg.
    ///
    /// Returns `None` when any derived value is not finite; such fixes must
    /// not move any flag.
    pub fn measure(ctx: &TrackerContext<'_>, location: &Location) -> Option<Self> {
        let leg = ctx.leg();
        let metrics = if leg.is_vertical() {
            Self::measure_vertical(leg, location, ctx.constants)
        } else {
            Self::measure_walk(ctx, leg, location)
        };
        metrics.is_finite().then_some(metrics)
    }

    fn measure_walk(ctx: &TrackerContext<'_>, leg: &Leg, location: &Location) -> Self {
        let link = &leg.link;
        let snapped = link.nearest_location_to(location);
        let (walked, remaining) = link.progress_of(location);
        let link_bearing = link.bearing_at(location);

        let next = ctx.next_leg().filter(|n| !n.is_vertical());
        let next_turn_angle = next.map(|n| {
            angle_difference(
                n.link.initial_bearing_from_source(),
                link.last_bearing_for_target(),
            )
        });
        let diff_next_bearing = next.map(|n| {
            angle_difference(n.link.initial_bearing_from_source(), location.orientation())
        });

        Self {
            snapped,
            distance_to_user_from_link: location.distance_to(&snapped),
            distance_to_target_from_user: location.distance_to(link.target_location()),
            distance_to_target_from_snapped: remaining,
            distance_to_source_from_snapped: walked,
            link_bearing,
            diff_bearing_at_user: angle_difference(link_bearing, location.orientation()),
            bearing_to_snapped: location.bearing_to(&snapped),
            next_turn_angle,
            diff_next_bearing,
            floor_in_transition: location
                .is_floor_in_transition(ctx.constants.floor_diff_threshold),
        }
    }

    fn measure_vertical(leg: &Leg, location: &Location, c: &NavigatorConstants) -> Self {
        let target = leg.link.target_location();
        let source = leg.link.source_location();
        let floors_left = (location.floor() - target.floor()).abs();
        let floors_total = (target.floor() - source.floor()).abs();

        let remaining = if floors_left < c.floor_diff_threshold {
            0.0
        } else {
            floors_left * FLOOR_HEIGHT_M
        };
        let walked = (floors_total - floors_left).max(0.0) * FLOOR_HEIGHT_M;
        let snapped = Location::with_floor(target.lat(), target.lng(), location.floor())
            .with_orientation(location.orientation());

        Self {
            snapped,
            distance_to_user_from_link: location.distance_to(&snapped),
            distance_to_target_from_user: remaining,
            distance_to_target_from_snapped: remaining,
            distance_to_source_from_snapped: walked,
            link_bearing: location.orientation(),
            diff_bearing_at_user: 0.0,
            bearing_to_snapped: location.bearing_to(&snapped),
            next_turn_angle: None,
            diff_next_bearing: None,
            floor_in_transition: location.is_floor_in_transition(c.floor_diff_threshold),
        }
    }

    fn is_finite(&self) -> bool {
        self.snapped.is_valid()
            && self.distance_to_user_from_link.is_finite()
            && self.distance_to_target_from_user.is_finite()
            && self.distance_to_target_from_snapped.is_finite()
            && self.distance_to_source_from_snapped.is_finite()
            && self.link_bearing.is_finite()
            && self.diff_bearing_at_user.is_finite()
            && self.next_turn_angle.map_or(true, f64::is_finite)
            && self.diff_next_bearing.map_or(true, f64::is_finite)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// One-shot flags of a leg instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkFlags {
    pub activated: bool,
    pub heading_requested: bool,
    pub heading_adjusted: bool,
    pub bearing_corrected: bool,
    pub approaching: bool,
    pub waiting_for_action: bool,
    pub backward_detected: bool,
    pub off_route_detected: bool,
}

/// Off-route sub-state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum OffRoute {
    #[default]
    Clear,
    Excursion {
        since: Instant,
    },
}

/// Where the user was first seen facing backward.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BackMark {
    location: Location,
    distance_to_target: f64,
}

/// Complete state of a leg instance after the latest fix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkProgressState {
    pub flags: LinkFlags,
    pub metrics: Option<LinkMetrics>,
    pub off_route: OffRoute,
    /// Nearest non-route link while off route.
    pub alternate: Option<OffRouteAlternate>,
    back_mark: Option<BackMark>,
    next_remaining_mark: f64,
    last_action_at: Option<Instant>,
    last_off_route_at: Option<Instant>,
    last_back_at: Option<Instant>,
    last_poi_at: Option<Instant>,
    last_update: Option<Instant>,
}

fn interval_elapsed(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    last.map_or(true, |t| now.saturating_duration_since(t) >= interval)
}

/// Distances this close to a mark count as on it.
const MARK_EPSILON_M: f64 = 1e-6;

/// Next remaining-distance mark strictly below `distance`.
fn next_remaining_mark(distance: f64, interval: f64) -> f64 {
    ((((distance - MARK_EPSILON_M) / interval).ceil() - 1.0) * interval).max(0.0)
}

impl LinkProgressState {
    pub fn is_off_route(&self) -> bool {
        matches!(self.off_route, OffRoute::Excursion { .. })
    }

    pub fn back_detected_location(&self) -> Option<&Location> {
        self.back_mark.as_ref().map(|m| &m.location)
    }

    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    /// Evaluate a fix, returning the successor state and the events that
    /// fired.
    fn evaluate(
        &self,
        ctx: &TrackerContext<'_>,
        m: &LinkMetrics,
        location: &Location,
        now: Instant,
    ) -> (Self, Vec<GuidanceEvent>) {
        let c = ctx.constants;
        let vertical = ctx.leg().is_vertical();
        let was_active = self.flags.activated;

        let mut s = self.clone();
        let mut events = Vec::new();
        s.metrics = Some(*m);
        s.last_update = Some(now);

        if !was_active {
            s.flags.activated = true;
            s.next_remaining_mark =
                next_remaining_mark(m.distance_to_target_from_snapped, c.remaining_distance_interval);
            if !vertical {
                if m.diff_bearing_at_user.abs() > c.change_heading_threshold {
                    s.flags.heading_requested = true;
                    events.push(GuidanceEvent::UserNeedsToChangeHeading {
                        diff_heading: m.diff_bearing_at_user,
                        threshold: c.change_heading_threshold,
                    });
                } else {
                    events.push(walk_event(ctx, m));
                }
            }
        } else if s.flags.heading_requested
            && !s.flags.heading_adjusted
            && m.diff_bearing_at_user.abs() < c.change_heading_threshold - c.adjust_heading_margin
        {
            s.flags.heading_adjusted = true;
            events.push(GuidanceEvent::UserAdjustedHeading {
                diff_heading: m.diff_bearing_at_user,
            });
            events.push(walk_event(ctx, m));
        }

        if !vertical && !m.floor_in_transition {
            s.evaluate_off_route(ctx, m, location, now, &mut events);
            s.evaluate_backward(c, m, now, &mut events);
        }

        if vertical || s.is_off_route() {
            return (s, events);
        }

        // Approaching the target; silent on short legs
        if !s.flags.approaching
            && m.distance_to_target_from_user <= c.approaching_distance_threshold
            && target_is_ahead(ctx.leg(), location, c)
        {
            s.flags.approaching = true;
            let next = ctx.next_leg();
            if ctx.leg().link.length() >= c.no_approaching_distance_threshold {
                events.push(GuidanceEvent::UserIsApproachingToTarget {
                    leg: ctx.leg_index,
                    distance: m.distance_to_target_from_user,
                    next_turn_angle: m.next_turn_angle,
                    next_link_type: next.map(|n| n.link.link_type()),
                    is_destination: next.is_none(),
                });
            }
        }

        // Turn or floor change at the target
        if let Some(next) = ctx.next_leg() {
            let turn = m.next_turn_angle.unwrap_or(0.0);
            let needs_action = turn.abs() > c.change_heading_threshold || next.is_vertical();
            if needs_action && m.distance_to_target_from_user <= c.no_and_turn_distance_threshold {
                let turned = m.diff_next_bearing.is_some_and(|d| {
                    d.abs() < c.change_heading_threshold - c.adjust_heading_margin
                });
                let repeat = s.flags.waiting_for_action
                    && !turned
                    && interval_elapsed(s.last_action_at, now, c.repeat_action_interval);
                if !s.flags.waiting_for_action || repeat {
                    events.push(GuidanceEvent::UserNeedsToTakeAction {
                        leg: ctx.leg_index,
                        turn_angle: turn,
                        next_link_type: next.link.link_type(),
                        repeated: s.flags.waiting_for_action,
                    });
                    s.flags.waiting_for_action = true;
                    s.last_action_at = Some(now);
                }
            }
        }

        // Drift from the leg bearing while walking
        let diff = m.diff_bearing_at_user.abs();
        if was_active
            && !s.flags.bearing_corrected
            && !s.flags.approaching
            && !s.flags.waiting_for_action
            && (!s.flags.heading_requested || s.flags.heading_adjusted)
            && diff > c.off_route_bearing_threshold
            && diff <= c.back_detection_heading_threshold
            && m.distance_to_target_from_user > c.approaching_distance_threshold
        {
            s.flags.bearing_corrected = true;
            events.push(GuidanceEvent::UserShouldAdjustBearing {
                diff_bearing: m.diff_bearing_at_user,
            });
        }

        // Remaining distance at interval marks
        if !s.flags.approaching {
            let d = m.distance_to_target_from_snapped;
            let first_meters =
                m.distance_to_source_from_snapped < c.prevent_remaining_distance_first_meters;
            let final_tail = ctx.is_final() && d <= c.prevent_remaining_distance_first_meters;
            if (!first_meters || final_tail)
                && d < s.next_remaining_mark
                && d > c.approaching_distance_threshold
            {
                events.push(GuidanceEvent::RemainingDistanceToTarget {
                    leg: ctx.leg_index,
                    distance: d,
                    route_remaining: d + ctx.leg().remaining_after,
                });
                s.next_remaining_mark = next_remaining_mark(d, c.remaining_distance_interval);
            }
        }

        (s, events)
    }

    fn evaluate_off_route(
        &mut self,
        ctx: &TrackerContext<'_>,
        m: &LinkMetrics,
        location: &Location,
        now: Instant,
        events: &mut Vec<GuidanceEvent>,
    ) {
        let c = ctx.constants;
        let distance = m.distance_to_user_from_link;
        match self.off_route {
            OffRoute::Clear => {
                if distance > c.off_route_threshold
                    && interval_elapsed(
                        self.last_off_route_at,
                        now,
                        c.off_route_announce_min_interval,
                    )
                {
                    self.off_route = OffRoute::Excursion { since: now };
                    self.flags.off_route_detected = true;
                    self.last_off_route_at = Some(now);
                    self.alternate = find_alternate(ctx, location);
                    debug!(distance, leg = ctx.leg_index, "Off route");
                    events.push(GuidanceEvent::UserMaybeOffRoute {
                        distance_from_route: distance,
                        bearing_to_route: m.bearing_to_snapped,
                        snapped: m.snapped,
                        alternate: self.alternate.clone(),
                        needs_reroute: needs_reroute(ctx, location),
                    });
                }
            }
            OffRoute::Excursion { .. } => {
                if distance <= c.off_route_threshold {
                    self.off_route = OffRoute::Clear;
                    self.alternate = None;
                    debug!(distance, leg = ctx.leg_index, "Back on route");
                    events.push(GuidanceEvent::UserMayGetBackOnRoute {
                        distance_from_route: distance,
                    });
                } else {
                    self.alternate = find_alternate(ctx, location);
                }
            }
        }
    }

    fn evaluate_backward(
        &mut self,
        c: &NavigatorConstants,
        m: &LinkMetrics,
        now: Instant,
        events: &mut Vec<GuidanceEvent>,
    ) {
        if m.diff_bearing_at_user.abs() <= c.back_detection_heading_threshold {
            self.back_mark = None;
            return;
        }

        let here = BackMark {
            location: m.snapped,
            distance_to_target: m.distance_to_target_from_snapped,
        };
        let Some(mark) = self.back_mark else {
            self.back_mark = Some(here);
            return;
        };

        let moved_back = here.distance_to_target - mark.distance_to_target;
        if moved_back >= c.back_detection_threshold
            && interval_elapsed(self.last_back_at, now, c.back_announce_min_interval)
        {
            self.flags.backward_detected = true;
            self.last_back_at = Some(now);
            self.back_mark = Some(here);
            events.push(GuidanceEvent::UserMaybeGoingBackward {
                distance_back: moved_back,
                diff_heading: m.diff_bearing_at_user,
            });
        }
    }
}

fn walk_event(ctx: &TrackerContext<'_>, m: &LinkMetrics) -> GuidanceEvent {
    let leg = ctx.leg();
    GuidanceEvent::UserNeedsToWalk {
        leg: ctx.leg_index,
        distance: m.distance_to_target_from_snapped,
        route_remaining: m.distance_to_target_from_snapped + leg.remaining_after,
        link_type: leg.link.link_type(),
        minimum_width: leg.link.minimum_width(),
        street_name: leg.link.first().street_name().map(str::to_string),
        is_first_leg: ctx.leg_index == 0,
    }
}

/// Whether the leg's target lies ahead of the user rather than behind.
fn target_is_ahead(leg: &Leg, location: &Location, c: &NavigatorConstants) -> bool {
    let target = leg.link.target_location();
    if location.distance_to(target) < 0.5 {
        return true;
    }
    angle_difference(location.bearing_to(target), leg.link.last_bearing_for_target()).abs()
        <= c.approaching_bearing_limit
}

fn find_alternate(ctx: &TrackerContext<'_>, location: &Location) -> Option<OffRouteAlternate> {
    let (link, distance) = ctx.graph.nearest_link(
        location,
        ctx.constants.off_route_ext_link_threshold,
        |l| ctx.plan.contains_link(l.id()),
    )?;
    let rejoins_route_at = [link.source_node(), link.target_node()]
        .into_iter()
        .find(|n| ctx.plan.contains_node(n))
        .cloned();
    Some(OffRouteAlternate {
        link: link.id().clone(),
        link_type: link.link_type(),
        distance,
        rejoins_route_at,
    })
}

/// The user is farther than the reroute distance from every remaining leg.
fn needs_reroute(ctx: &TrackerContext<'_>, location: &Location) -> bool {
    ctx.plan.legs()[ctx.leg_index..]
        .iter()
        .map(|leg| leg.link.distance_to(location))
        .fold(f64::INFINITY, f64::min)
        > ctx.constants.reroute_distance_threshold
}

// ─────────────────────────────────────────────────────────────────────────────
// Tracker
// ─────────────────────────────────────────────────────────────────────────────

/// Progress along one leg, with the trackers of the leg's POIs.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkProgress {
    leg_index: usize,
    state: LinkProgressState,
    pois: Vec<PoiTracker>,
}

impl LinkProgress {
    pub fn new(leg: &Leg) -> Self {
        Self {
            leg_index: leg.index,
            state: LinkProgressState::default(),
            pois: leg
                .pois
                .iter()
                .map(|p| PoiTracker::new(p.poi.clone(), p.roles))
                .collect(),
        }
    }

    pub fn leg_index(&self) -> usize {
        self.leg_index
    }

    pub fn state(&self) -> &LinkProgressState {
        &self.state
    }

    pub fn flags(&self) -> LinkFlags {
        self.state.flags
    }

    pub fn metrics(&self) -> Option<&LinkMetrics> {
        self.state.metrics.as_ref()
    }

    pub fn pois(&self) -> &[PoiTracker] {
        &self.pois
    }

    /// Evaluate a fix and return the events that fired, unsorted.
    pub fn update(
        &mut self,
        ctx: &TrackerContext<'_>,
        location: &Location,
        now: Instant,
    ) -> Vec<GuidanceEvent> {
        let Some(m) = LinkMetrics::measure(ctx, location) else {
            debug!(leg = self.leg_index, "Fix skipped: degenerate geometry");
            return Vec::new();
        };

        let (mut state, mut events) = self.state.evaluate(ctx, &m, location, now);

        if !state.is_off_route() && !ctx.leg().is_vertical() {
            let c = ctx.constants;
            let fix = PoiFix {
                snapped: &m.snapped,
                user: location,
                travel_bearing: m.link_bearing,
                distance_from_source: m.distance_to_source_from_snapped,
                distance_to_target: m.distance_to_target_from_user,
            };
            let mut pois = self.pois.clone();
            for poi in &mut pois {
                let can_announce =
                    interval_elapsed(state.last_poi_at, now, c.poi_announce_min_interval);
                if let Some(event) = poi.update(&fix, c, now, can_announce) {
                    if matches!(event, GuidanceEvent::UserIsApproachingToPoi { .. }) {
                        state.last_poi_at = Some(now);
                    }
                    events.push(event);
                }
            }
            self.pois = pois;
        }

        self.state = state;
        events
    }
}
