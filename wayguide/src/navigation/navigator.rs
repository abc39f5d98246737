//! Live guidance evaluator.
//!
//! [`Navigator`] consumes position fixes while the user walks a route and
//! delivers [`GuidanceEvent`]s to its sink.
//!
//! # Lifecycle
//!
//! ```text
//! Inactive --start--> Pending --fix near first leg--> Navigating(0)
//! Navigating(i) --leg end / skip ahead--> Navigating(j)
//! Navigating(last) --target reached--> Arrived
//! any --stop--> Inactive
//! ```
//!
//! The navigator is single-writer: callers feed fixes from one task and
//! events are delivered synchronously before `update` returns.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::geo::{Location, LocationStatus};
use crate::graph::{GraphResult, LinkId, Route, RouteGraph};

use super::config::NavigatorConstants;
use super::events::{GuidanceEvent, GuidanceSink, StartFailure};
use super::link_tracker::{LinkMetrics, LinkProgress, TrackerContext};
use super::plan::{Leg, NavigationPlan};

/// Snapped distances below this count as the end of a leg (meters).
const LEG_END_EPSILON_M: f64 = 0.01;

/// Externally visible lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationPhase {
    Inactive,
    /// Route loaded, waiting for a fix near the start.
    Pending,
    Navigating {
        leg: usize,
    },
    Arrived,
}

impl NavigationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationPhase::Inactive => "inactive",
            NavigationPhase::Pending => "pending",
            NavigationPhase::Navigating { .. } => "navigating",
            NavigationPhase::Arrived => "arrived",
        }
    }
}

#[derive(Debug)]
enum SessionPhase {
    Pending,
    Navigating(LinkProgress),
    Arrived,
}

/// One route being navigated.
#[derive(Debug)]
struct Session {
    route: Route,
    plan: NavigationPlan,
    phase: SessionPhase,
    start_refused: bool,
    last_fix: Option<(Location, Instant)>,
}

impl Session {
    fn new(route: Route, plan: NavigationPlan) -> Self {
        Self {
            route,
            plan,
            phase: SessionPhase::Pending,
            start_refused: false,
            last_fix: None,
        }
    }

    fn phase(&self) -> NavigationPhase {
        match &self.phase {
            SessionPhase::Pending => NavigationPhase::Pending,
            SessionPhase::Navigating(p) => NavigationPhase::Navigating { leg: p.leg_index() },
            SessionPhase::Arrived => NavigationPhase::Arrived,
        }
    }

    fn is_active(&self) -> bool {
        !matches!(self.phase, SessionPhase::Arrived)
    }

    fn restart(&mut self) {
        self.phase = SessionPhase::Pending;
        self.start_refused = false;
        self.last_fix = None;
    }

    fn handle_fix(
        &mut self,
        graph: &RouteGraph,
        c: &NavigatorConstants,
        location: &Location,
        now: Instant,
    ) -> Vec<GuidanceEvent> {
        match self.phase() {
            NavigationPhase::Pending => self.begin(graph, c, location, now),
            NavigationPhase::Navigating { leg } => self.track(graph, c, leg, location, now),
            NavigationPhase::Inactive | NavigationPhase::Arrived => Vec::new(),
        }
    }

    fn begin(
        &mut self,
        graph: &RouteGraph,
        c: &NavigatorConstants,
        location: &Location,
        now: Instant,
    ) -> Vec<GuidanceEvent> {
        let Some(first) = self.plan.leg(0) else {
            return Vec::new();
        };
        let distance = first.link.distance_to(location);
        let on_floor = first
            .link
            .links()
            .iter()
            .any(|l| l.is_on_floor_of(location));

        if on_floor && distance <= c.navigation_start_distance_limit {
            let caution = distance > c.navigation_start_caution_distance_limit;
            info!(
                distance,
                caution,
                legs = self.plan.len(),
                "Navigation started"
            );
            let mut events = vec![GuidanceEvent::NavigationStarted {
                total_length: self.plan.total_length(),
                leg_count: self.plan.len(),
                distance_to_route: distance,
                caution,
            }];
            events.extend(self.enter_leg(graph, c, 0, location, now));
            return events;
        }

        if self.start_refused {
            return Vec::new();
        }
        self.start_refused = true;
        info!(distance, on_floor, "Navigation could not start: too far from route");
        vec![GuidanceEvent::CouldNotStartNavigation {
            reason: StartFailure::TooFarFromRoute {
                distance,
                limit: c.navigation_start_distance_limit,
            },
        }]
    }

    fn enter_leg(
        &mut self,
        graph: &RouteGraph,
        c: &NavigatorConstants,
        index: usize,
        location: &Location,
        now: Instant,
    ) -> Vec<GuidanceEvent> {
        let Some(leg) = self.plan.leg(index) else {
            return Vec::new();
        };
        debug!(leg = index, link = %leg.link.id(), "Entering leg");
        let mut progress = LinkProgress::new(leg);
        let ctx = TrackerContext {
            graph,
            plan: &self.plan,
            leg_index: index,
            constants: c,
        };
        let events = progress.update(&ctx, location, now);
        self.phase = SessionPhase::Navigating(progress);
        events
    }

    fn track(
        &mut self,
        graph: &RouteGraph,
        c: &NavigatorConstants,
        index: usize,
        location: &Location,
        now: Instant,
    ) -> Vec<GuidanceEvent> {
        let ctx = TrackerContext {
            graph,
            plan: &self.plan,
            leg_index: index,
            constants: c,
        };
        let Some(m) = LinkMetrics::measure(&ctx, location) else {
            debug!(leg = index, "Fix skipped: degenerate geometry");
            return Vec::new();
        };

        if ctx.is_final() && m.distance_to_target_from_snapped <= c.approached_distance_threshold
        {
            info!(leg = index, "Navigation finished");
            self.phase = SessionPhase::Arrived;
            return vec![
                GuidanceEvent::NavigationFinished {
                    distance_to_destination: m.distance_to_target_from_user,
                },
                GuidanceEvent::ActiveStatusChanged { active: false },
            ];
        }

        if let Some(next) = advance_target(&ctx, &m, location) {
            debug!(from = index, to = next, "Advancing leg");
            return self.enter_leg(graph, c, next, location, now);
        }

        match &mut self.phase {
            SessionPhase::Navigating(progress) => progress.update(&ctx, location, now),
            _ => Vec::new(),
        }
    }
}

/// Leg the user has moved on to, if any.
///
/// The next leg is taken once the snapped point reaches the end of the
/// current one, or when the user is nearer to one of the next few legs than
/// to the current one.
fn advance_target(ctx: &TrackerContext<'_>, m: &LinkMetrics, location: &Location) -> Option<usize> {
    let c = ctx.constants;
    let index = ctx.leg_index;
    ctx.next_leg()?;

    if m.distance_to_target_from_snapped <= LEG_END_EPSILON_M {
        return Some(index + 1);
    }

    let last = (index + c.num_of_links_to_check).min(ctx.plan.len() - 1);
    for j in index + 1..=last {
        let leg = &ctx.plan.legs()[j];

        if leg.is_vertical() {
            let changed_floor = (location.floor() - leg.link.source_location().floor()).abs()
                > c.floor_diff_threshold;
            if changed_floor && leg.link.distance_to(location) <= c.off_route_threshold {
                return Some(j);
            }
            continue;
        }

        if !leg.link.links().iter().any(|l| l.is_on_floor_of(location)) {
            continue;
        }
        let d = leg.link.distance_to(location);
        if d > c.off_route_threshold || d >= m.distance_to_user_from_link {
            continue;
        }
        let near_junction = j == index + 1
            && m.distance_to_target_from_user <= c.approaching_distance_threshold;
        let left_current = m.distance_to_user_from_link > c.off_route_threshold;
        if near_junction || left_current {
            return Some(j);
        }
    }
    None
}

/// Live guidance evaluator.
///
/// Owns its state exclusively; share the graph between evaluators through
/// the `Arc`.
pub struct Navigator<S: GuidanceSink> {
    graph: Arc<RouteGraph>,
    constants: NavigatorConstants,
    sink: S,
    status: LocationStatus,
    session: Option<Session>,
}

impl<S: GuidanceSink> Navigator<S> {
    pub fn new(graph: Arc<RouteGraph>, constants: NavigatorConstants, sink: S) -> Self {
        Self {
            graph,
            constants,
            sink,
            status: LocationStatus::Unknown,
            session: None,
        }
    }

    pub fn graph(&self) -> &Arc<RouteGraph> {
        &self.graph
    }

    pub fn constants(&self) -> &NavigatorConstants {
        &self.constants
    }

    /// Load a route and wait for the first usable fix.
    ///
    /// An unresolvable route emits `CouldNotStartNavigation` and returns the
    /// graph error; the previous session, if any, is left untouched.
    pub fn start(&mut self, route: &[LinkId]) -> GraphResult<()> {
        let resolved = match self.graph.resolve_route(route) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Route could not be resolved");
                self.emit(vec![GuidanceEvent::CouldNotStartNavigation {
                    reason: StartFailure::InvalidRoute {
                        message: e.to_string(),
                    },
                }]);
                return Err(e);
            }
        };

        let was_active = self.is_active();
        let plan = NavigationPlan::build(&self.graph, &resolved, &self.constants);
        info!(
            links = resolved.links().len(),
            legs = plan.len(),
            length = plan.total_length(),
            "Route loaded"
        );
        self.session = Some(Session::new(resolved, plan));
        if !was_active {
            self.emit(vec![GuidanceEvent::ActiveStatusChanged { active: true }]);
        }
        Ok(())
    }

    /// Abandon the current route.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            info!(phase = session.phase().as_str(), "Navigation stopped");
            if session.is_active() {
                self.emit(vec![GuidanceEvent::ActiveStatusChanged { active: false }]);
            }
        }
    }

    /// Restart the current route from the beginning.
    pub fn reset(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let was_active = session.is_active();
        session.restart();
        info!("Navigation reset");
        if !was_active {
            self.emit(vec![GuidanceEvent::ActiveStatusChanged { active: true }]);
        }
    }

    pub fn set_location_status(&mut self, status: LocationStatus) {
        if status != self.status {
            info!(from = %self.status, to = %status, "Location status changed");
            self.status = status;
        }
    }

    pub fn location_status(&self) -> LocationStatus {
        self.status
    }

    /// Evaluate a fix taken now.
    pub fn update(&mut self, location: Location) {
        self.update_at(location, Instant::now());
    }

    /// Evaluate a fix taken at `now`.
    ///
    /// Fixes are skipped while the location status is lost or background,
    /// when invalid, when older than the previous fix, or when identical to
    /// it. Skipped fixes leave all state unchanged.
    pub fn update_at(&mut self, location: Location, now: Instant) {
        if !self.status.accepts_fixes() {
            debug!(status = %self.status, "Fix skipped: location status");
            return;
        }
        if !location.is_valid() {
            debug!("Fix skipped: invalid coordinates");
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_active() {
            return;
        }
        if let Some((previous, at)) = &session.last_fix {
            if now < *at {
                debug!("Fix skipped: older than previous fix");
                return;
            }
            if *previous == location {
                debug!("Fix skipped: unchanged");
                return;
            }
        }
        session.last_fix = Some((location, now));

        let events = session.handle_fix(&self.graph, &self.constants, &location, now);
        self.emit(events);
    }

    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_active)
    }

    pub fn phase(&self) -> NavigationPhase {
        self.session
            .as_ref()
            .map_or(NavigationPhase::Inactive, Session::phase)
    }

    pub fn route(&self) -> Option<&Route> {
        self.session.as_ref().map(|s| &s.route)
    }

    pub fn plan(&self) -> Option<&NavigationPlan> {
        self.session.as_ref().map(|s| &s.plan)
    }

    /// The leg being walked.
    pub fn current_leg(&self) -> Option<&Leg> {
        let session = self.session.as_ref()?;
        match &session.phase {
            SessionPhase::Navigating(p) => session.plan.leg(p.leg_index()),
            _ => None,
        }
    }

    pub fn current_progress(&self) -> Option<&LinkProgress> {
        match &self.session.as_ref()?.phase {
            SessionPhase::Navigating(p) => Some(p),
            _ => None,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn emit(&mut self, mut events: Vec<GuidanceEvent>) {
        events.sort_by_key(GuidanceEvent::priority);
        for event in &events {
            debug!(event = event.name(), "Guidance event");
            self.sink.handle(event);
        }
    }
}
