//! Command-driven traversal of a route.
//!
//! The [`Previewer`] keeps a cursor on a node of the graph, facing one of
//! the links that meet there. Commands move or rotate the cursor; every
//! transition appends a new [`PreviewEvent`] to the history and notifies the
//! sink. No location input is involved.
//!
//! # Facing rules
//!
//! After moving onto a node the cursor faces:
//!
//! - the next route link, when the node is on the route and the cursor
//!   arrived forward along the route or from off the route
//! - the previous route link, when it arrived walking the route in reverse
//! - otherwise the link closest to straight ahead
//!
//! Reaching the route's destination is terminal: forward commands there
//! leave the cursor where it is.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::geo::{angle_difference, normalize_heading, Location};
use crate::graph::{GraphResult, Link, LinkId, NodeId, Route, RouteGraph};
use crate::navigation::FnSink;

use super::event::{PreviewEvent, PreviewHistory, PreviewTargets};

// ─────────────────────────────────────────────────────────────────────────────
// Notices and sink
// ─────────────────────────────────────────────────────────────────────────────

/// Outbound preview notifications.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "notice")]
pub enum PreviewNotice {
    Started(PreviewEvent),
    Updated(PreviewEvent),
    /// The cursor moved this far with the last command (meters).
    UserMoved { distance: f64 },
    /// Interpolated position while auto-stepping along a link.
    UserLocation { location: Location },
    /// Distance left to the destination along the route (meters).
    RemainingDistance { distance: f64 },
    /// The command could not move or turn the cursor.
    NoStep,
    Stopped,
}

/// Receiver of preview notices.
pub trait PreviewSink {
    fn handle(&mut self, notice: &PreviewNotice);
}

impl PreviewSink for Vec<PreviewNotice> {
    fn handle(&mut self, notice: &PreviewNotice) {
        self.push(notice.clone());
    }
}

impl PreviewSink for UnboundedSender<PreviewNotice> {
    fn handle(&mut self, notice: &PreviewNotice) {
        let _ = self.send(notice.clone());
    }
}

impl<S: PreviewSink + ?Sized> PreviewSink for &mut S {
    fn handle(&mut self, notice: &PreviewNotice) {
        (**self).handle(notice);
    }
}

impl<F: FnMut(&PreviewNotice)> PreviewSink for FnSink<F> {
    fn handle(&mut self, notice: &PreviewNotice) {
        (self.0)(notice)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Preview tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewConfig {
    /// POIs within this distance of a link ahead are listed as targets
    /// (meters).
    pub poi_distance: f64,
    /// Auto-step speed when first enabled (m/s).
    pub auto_step_speed: f64,
    /// Change per speed up/down command (m/s).
    pub auto_step_speed_delta: f64,
    pub min_auto_step_speed: f64,
    pub max_auto_step_speed: f64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            poi_distance: 5.0,
            auto_step_speed: 1.0,
            auto_step_speed_delta: 0.5,
            min_auto_step_speed: 0.5,
            max_auto_step_speed: 5.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cursor
// ─────────────────────────────────────────────────────────────────────────────

/// Position and heading before derived data is computed.
#[derive(Debug, Clone)]
struct Cursor {
    node: NodeId,
    location: Location,
    link: Option<LinkId>,
    came_from: Option<LinkId>,
    /// Heading used when no link is faced.
    orientation: f64,
}

impl From<&PreviewEvent> for Cursor {
    fn from(e: &PreviewEvent) -> Self {
        Self {
            node: e.node.clone(),
            location: e.location,
            link: e.link.clone(),
            came_from: e.came_from.clone(),
            orientation: e.orientation,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct AutoStep {
    speed: f64,
    /// Distance covered along the faced link (meters).
    progress: f64,
}

/// Links at `node` with their bearing leaving it, clockwise from north.
fn links_clockwise<'g>(graph: &'g RouteGraph, node: &str) -> Vec<(&'g Link, f64)> {
    let mut links: Vec<(&Link, f64)> = graph
        .links_at(node)
        .into_iter()
        .filter_map(|l| l.initial_bearing_from(node).map(|b| (l, normalize_heading(b))))
        .collect();
    links.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.id().cmp(b.0.id())));
    links
}

/// Heading when arriving at `node` along `link`.
fn arrival_heading(link: &Link, node: &str) -> Option<f64> {
    link.initial_bearing_from(node)
        .map(|b| normalize_heading(b + 180.0))
}

/// The link to face after reaching `node`.
fn continuation(
    graph: &RouteGraph,
    route: &Route,
    node: &str,
    came_from: Option<&str>,
    heading: f64,
) -> Option<LinkId> {
    if let Some(p) = route.position_of(node) {
        let links = route.links();
        let forward = links.get(p).map(Link::id);
        let backward = p.checked_sub(1).and_then(|i| links.get(i)).map(Link::id);
        return match came_from {
            Some(c) if forward.is_some_and(|f| f == c) => backward.cloned(),
            _ => forward.cloned(),
        };
    }

    links_clockwise(graph, node)
        .into_iter()
        .filter(|(l, _)| came_from != Some(l.id().as_str()))
        .min_by(|a, b| {
            angle_difference(a.1, heading)
                .abs()
                .total_cmp(&angle_difference(b.1, heading).abs())
        })
        .map(|(l, _)| l.id().clone())
}

// ─────────────────────────────────────────────────────────────────────────────
// Previewer
// ─────────────────────────────────────────────────────────────────────────────

/// Discrete traversal evaluator.
pub struct Previewer<S: PreviewSink> {
    graph: Arc<RouteGraph>,
    route: Route,
    config: PreviewConfig,
    sink: S,
    history: PreviewHistory,
    current: Option<usize>,
    auto: Option<AutoStep>,
}

impl<S: PreviewSink> Previewer<S> {
    /// Preview the route given by `links`.
    pub fn new(
        graph: Arc<RouteGraph>,
        links: &[LinkId],
        config: PreviewConfig,
        sink: S,
    ) -> GraphResult<Self> {
        let route = graph.resolve_route(links)?;
        Ok(Self::with_route(graph, route, config, sink))
    }

    pub fn with_route(graph: Arc<RouteGraph>, route: Route, config: PreviewConfig, sink: S) -> Self {
        Self {
            graph,
            route,
            config,
            sink,
            history: PreviewHistory::new(),
            current: None,
            auto: None,
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Place the cursor at the start of the route.
    pub fn start(&mut self) -> bool {
        match self.begin_cursor() {
            Some(cursor) => {
                self.launch(cursor);
                true
            }
            None => false,
        }
    }

    /// Place the cursor at the node nearest to `location` on its floor.
    pub fn start_at(&mut self, location: &Location) -> bool {
        let Some((node, distance)) = self.graph.nearest_node(location) else {
            debug!("No node on the location's floor");
            return false;
        };
        let link = continuation(
            &self.graph,
            &self.route,
            &node.id,
            None,
            location.orientation(),
        );
        debug!(node = %node.id, distance, "Preview starting at nearest node");
        let cursor = Cursor {
            node: node.id.clone(),
            location: node.location,
            link,
            came_from: None,
            orientation: location.orientation(),
        };
        self.launch(cursor);
        true
    }

    pub fn stop(&mut self) {
        if self.current.take().is_some() {
            self.auto = None;
            info!(events = self.history.len(), "Preview stopped");
            self.sink.handle(&PreviewNotice::Stopped);
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    fn launch(&mut self, cursor: Cursor) {
        self.history.clear();
        self.auto = None;
        let event = self.materialize(cursor, 0.0, None);
        let index = self.history.push(event);
        self.current = Some(index);
        if let Some(event) = self.history.get(index).cloned() {
            info!(node = %event.node, on_route = event.is_on_route, "Preview started");
            self.sink.handle(&PreviewNotice::Started(event.clone()));
            self.notify_remaining(&event);
        }
    }

    // ── Movement ────────────────────────────────────────────────────────────

    pub fn goto_begin(&mut self) {
        if !self.is_active() {
            return;
        }
        match self.begin_cursor() {
            Some(cursor) => self.advance(cursor, 0.0),
            None => self.no_step(),
        }
    }

    pub fn goto_end(&mut self) {
        if !self.is_active() {
            return;
        }
        let Some(last) = self.route.links().last() else {
            return self.no_step();
        };
        let destination = self.route.destination_node();
        let Some(node) = self.graph.node(destination) else {
            return self.no_step();
        };
        let cursor = Cursor {
            node: destination.clone(),
            location: node.location,
            link: None,
            came_from: Some(last.id().clone()),
            orientation: normalize_heading(last.last_bearing_for_target()),
        };
        self.advance(cursor, 0.0);
    }

    pub fn step_forward(&mut self) {
        let Some(cursor) = self.current_cursor() else {
            return;
        };
        match self.forward_from(&cursor) {
            Some((next, moved)) => self.advance(next, moved),
            None => self.no_step(),
        }
    }

    pub fn step_backward(&mut self) {
        let Some(cursor) = self.current_cursor() else {
            return;
        };
        match self.backward_from(&cursor) {
            Some((next, moved)) => self.advance(next, moved),
            None => self.no_step(),
        }
    }

    /// Move forward to the next intersection, dead end or destination.
    pub fn jump_forward(&mut self) {
        let Some(mut cursor) = self.current_cursor() else {
            return;
        };
        let limit = self.graph.links().len().max(1);
        let mut moved = 0.0;
        let mut steps = 0;
        while let Some((next, d)) = self.forward_from(&cursor) {
            cursor = next;
            moved += d;
            steps += 1;
            if steps >= limit || self.is_stop(&cursor) {
                break;
            }
        }
        if steps == 0 {
            self.no_step();
        } else {
            debug!(steps, moved, "Jumped forward");
            self.advance(cursor, moved);
        }
    }

    /// Move backward to the previous intersection or the route's start.
    pub fn jump_backward(&mut self) {
        let Some(mut cursor) = self.current_cursor() else {
            return;
        };
        let limit = self.graph.links().len().max(1);
        let mut moved = 0.0;
        let mut steps = 0;
        while let Some((next, d)) = self.backward_from(&cursor) {
            cursor = next;
            moved += d;
            steps += 1;
            let at_source = cursor.node == *self.route.source_node();
            if steps >= limit || at_source || self.is_stop(&cursor) {
                break;
            }
        }
        if steps == 0 {
            self.no_step();
        } else {
            debug!(steps, moved, "Jumped backward");
            self.advance(cursor, moved);
        }
    }

    /// Face the next link clockwise.
    pub fn face_right(&mut self) {
        self.face(true);
    }

    /// Face the next link counter-clockwise.
    pub fn face_left(&mut self) {
        self.face(false);
    }

    fn face(&mut self, clockwise: bool) {
        let Some(cursor) = self.current_cursor() else {
            return;
        };
        if let Some(before) = self.undone_turn(&cursor, clockwise) {
            self.advance(before, 0.0);
            return;
        }
        match self.turn_candidate(&cursor, clockwise) {
            Some(link) => {
                let next = Cursor {
                    link: Some(link),
                    ..cursor
                };
                self.advance(next, 0.0);
            }
            None => self.no_step(),
        }
    }

    // ── Auto-stepping ───────────────────────────────────────────────────────

    /// Start auto-stepping, or speed it up.
    pub fn auto_step_forward_up(&mut self) {
        if !self.is_active() || self.is_arrived() {
            return;
        }
        let c = self.config;
        let auto = match self.auto {
            None => AutoStep {
                speed: c.auto_step_speed,
                progress: 0.0,
            },
            Some(a) => AutoStep {
                speed: (a.speed + c.auto_step_speed_delta).min(c.max_auto_step_speed),
                ..a
            },
        };
        debug!(speed = auto.speed, "Auto step speed");
        self.auto = Some(auto);
    }

    pub fn auto_step_forward_down(&mut self) {
        let c = self.config;
        if let Some(a) = self.auto.as_mut() {
            a.speed = (a.speed - c.auto_step_speed_delta).max(c.min_auto_step_speed);
            debug!(speed = a.speed, "Auto step speed");
        }
    }

    pub fn auto_step_forward_stop(&mut self) {
        if self.auto.take().is_some() {
            debug!("Auto step stopped");
        }
    }

    pub fn auto_step_speed(&self) -> Option<f64> {
        self.auto.map(|a| a.speed)
    }

    pub fn is_auto_stepping(&self) -> bool {
        self.auto.is_some()
    }

    /// Advance the auto-stepper by `elapsed`.
    ///
    /// Crossing the end of the faced link steps forward; otherwise the
    /// interpolated position is reported.
    pub fn tick(&mut self, elapsed: Duration) {
        let Some(mut auto) = self.auto else {
            return;
        };
        auto.progress += auto.speed * elapsed.as_secs_f64();

        for _ in 0..=self.graph.links().len() {
            let Some(cursor) = self.current_cursor() else {
                self.auto = None;
                return;
            };
            let Some((next, length)) = self.forward_from(&cursor) else {
                debug!(node = %cursor.node, "Auto step halted: no way forward");
                self.auto = None;
                self.no_step();
                return;
            };
            if auto.progress < length {
                self.auto = Some(auto);
                let location = cursor.location.offset(auto.progress, cursor.orientation);
                self.sink.handle(&PreviewNotice::UserLocation { location });
                return;
            }
            auto.progress -= length;
            self.auto = Some(auto);
            self.advance(next, length);
            if self.auto.is_none() {
                return;
            }
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn event(&self) -> Option<&PreviewEvent> {
        self.current.and_then(|i| self.history.get(i))
    }

    pub fn history(&self) -> &PreviewHistory {
        &self.history
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn is_on_route(&self) -> bool {
        self.event().is_some_and(|e| e.is_on_route)
    }

    pub fn is_going_to_be_off_route(&self) -> bool {
        self.event().is_some_and(|e| e.is_going_to_be_off_route)
    }

    pub fn is_going_backward(&self) -> bool {
        self.event().is_some_and(|e| e.is_going_backward)
    }

    pub fn is_arrived(&self) -> bool {
        self.event().is_some_and(|e| e.is_arrived)
    }

    /// Link `face_right` would turn to.
    pub fn right_link(&self) -> Option<LinkId> {
        let cursor = self.current_cursor()?;
        self.turn_candidate(&cursor, true)
    }

    /// Link `face_left` would turn to.
    pub fn left_link(&self) -> Option<LinkId> {
        let cursor = self.current_cursor()?;
        self.turn_candidate(&cursor, false)
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

    // ── Internals ───────────────────────────────────────────────────────────

    fn current_cursor(&self) -> Option<Cursor> {
        self.event().map(Cursor::from)
    }

    fn begin_cursor(&self) -> Option<Cursor> {
        let first = self.route.links().first()?;
        let source = self.route.source_node();
        let node = self.graph.node(source)?;
        Some(Cursor {
            node: source.clone(),
            location: node.location,
            link: Some(first.id().clone()),
            came_from: None,
            orientation: normalize_heading(first.initial_bearing_from_source()),
        })
    }

    fn forward_from(&self, cursor: &Cursor) -> Option<(Cursor, f64)> {
        if cursor.node == *self.route.destination_node() {
            return None;
        }
        let link = self.graph.link(cursor.link.as_deref()?)?;
        let next = link.other_end(&cursor.node)?;
        let node = self.graph.node(next)?;
        let heading = arrival_heading(link, next)?;
        let facing = continuation(
            &self.graph,
            &self.route,
            next,
            Some(link.id().as_str()),
            heading,
        );
        Some((
            Cursor {
                node: next.clone(),
                location: node.location,
                link: facing,
                came_from: Some(link.id().clone()),
                orientation: heading,
            },
            link.length(),
        ))
    }

    fn backward_from(&self, cursor: &Cursor) -> Option<(Cursor, f64)> {
        let back = cursor.came_from.clone().or_else(|| {
            let p = self.route.position_of(&cursor.node)?;
            let link = self.route.links().get(p.checked_sub(1)?)?;
            Some(link.id().clone())
        })?;
        let link = self.graph.link(&back)?;
        let previous = link.other_end(&cursor.node)?;

        // Restore the cursor last seen there facing this link
        if let Some(e) = self
            .history
            .iter()
            .rev()
            .find(|e| e.node == *previous && e.link.as_deref() == Some(back.as_str()))
        {
            return Some((Cursor::from(e), link.length()));
        }

        let node = self.graph.node(previous)?;
        let came_from = self
            .route
            .position_of(previous)
            .and_then(|p| p.checked_sub(1))
            .and_then(|i| self.route.links().get(i))
            .map(|l| l.id().clone())
            .filter(|id| *id != back);
        Some((
            Cursor {
                node: previous.clone(),
                location: node.location,
                orientation: link.initial_bearing_from(previous).map_or(0.0, normalize_heading),
                link: Some(back),
                came_from,
            },
            link.length(),
        ))
    }

    /// The cursor a turn returns to when the current one was reached by
    /// turning the other way at the same node.
    ///
    /// With no faced link the clockwise and counter-clockwise candidates are
    /// not inverses, so the previous snapshot is restored instead.
    fn undone_turn(&self, cursor: &Cursor, clockwise: bool) -> Option<Cursor> {
        let prev = self.event()?.prev.and_then(|i| self.history.get(i))?;
        let before = Cursor::from(prev);
        if before.node != cursor.node
            || before.came_from != cursor.came_from
            || before.link == cursor.link
        {
            return None;
        }
        (self.turn_candidate(&before, !clockwise) == cursor.link).then_some(before)
    }

    fn turn_candidate(&self, cursor: &Cursor, clockwise: bool) -> Option<LinkId> {
        let links = links_clockwise(&self.graph, &cursor.node);
        let n = links.len();
        if n == 0 {
            return None;
        }
        let current = cursor
            .link
            .as_deref()
            .and_then(|id| links.iter().position(|(l, _)| l.id() == id));
        let index = match current {
            Some(i) if clockwise => (i + 1) % n,
            Some(i) => (i + n - 1) % n,
            None if clockwise => links
                .iter()
                .position(|(_, b)| *b > cursor.orientation)
                .unwrap_or(0),
            None => links
                .iter()
                .rposition(|(_, b)| *b < cursor.orientation)
                .unwrap_or(n - 1),
        };
        if Some(index) == current {
            return None;
        }
        Some(links[index].0.id().clone())
    }

    /// Intersections and dead ends end a jump.
    fn is_stop(&self, cursor: &Cursor) -> bool {
        cursor.link.is_none()
            || cursor.node == *self.route.destination_node()
            || self
                .graph
                .node(&cursor.node)
                .map_or(true, |n| n.is_intersection() || n.is_leaf())
    }

    fn advance(&mut self, cursor: Cursor, moved: f64) {
        let event = self.materialize(cursor, moved, self.current);
        let index = self.history.push(event);
        self.current = Some(index);
        let Some(event) = self.history.get(index).cloned() else {
            return;
        };
        debug!(
            index,
            node = %event.node,
            link = event.link.as_deref().unwrap_or("-"),
            moved,
            "Preview updated"
        );

        if moved > 0.0 {
            self.sink.handle(&PreviewNotice::UserMoved { distance: moved });
        }
        self.sink.handle(&PreviewNotice::Updated(event.clone()));
        self.notify_remaining(&event);

        if event.is_arrived {
            info!(node = %event.node, "Preview reached the destination");
            self.auto = None;
        }
    }

    fn no_step(&mut self) {
        debug!("Preview command had no effect");
        self.sink.handle(&PreviewNotice::NoStep);
    }

    fn notify_remaining(&mut self, event: &PreviewEvent) {
        if !event.is_on_route {
            return;
        }
        if let Some(p) = event.route_position {
            let distance = self.route.links()[p..].iter().map(Link::length).sum();
            self.sink.handle(&PreviewNotice::RemainingDistance { distance });
        }
    }

    fn materialize(&self, cursor: Cursor, moved: f64, prev: Option<usize>) -> PreviewEvent {
        let orientation = cursor
            .link
            .as_deref()
            .and_then(|id| self.graph.link(id))
            .and_then(|l| l.initial_bearing_from(&cursor.node))
            .unwrap_or(cursor.orientation);
        let location = cursor.location.with_orientation(orientation);

        let route_position = self.route.position_of(&cursor.node);
        let route_link = cursor
            .link
            .clone()
            .filter(|id| self.route.contains_link(id));
        let is_going_backward = self.route.links().iter().any(|l| {
            cursor.link.as_deref() == Some(l.id().as_str()) && *l.target_node() == cursor.node
        });
        let is_going_to_be_off_route = cursor.link.is_some() && route_link.is_none();

        PreviewEvent {
            index: 0,
            prev,
            targets: self.targets(&cursor),
            is_on_route: route_position.is_some() && !is_going_to_be_off_route,
            is_going_to_be_off_route,
            is_going_backward,
            is_arrived: cursor.node == *self.route.destination_node(),
            node: cursor.node,
            link: cursor.link,
            came_from: cursor.came_from,
            route_link,
            route_position,
            orientation: location.orientation(),
            location,
            distance_moved: moved,
        }
    }

    fn targets(&self, cursor: &Cursor) -> PreviewTargets {
        let mut targets = PreviewTargets {
            intersection_links: links_clockwise(&self.graph, &cursor.node)
                .into_iter()
                .map(|(l, _)| l.id().clone())
                .collect(),
            ..PreviewTargets::default()
        };
        let Some(mut link) = cursor.link.as_deref().and_then(|id| self.graph.link(id)) else {
            return targets;
        };

        let mut node = cursor.node.clone();
        let mut path: Vec<&Link> = Vec::new();
        for _ in 0..=self.graph.links().len() {
            let Some(next) = link.other_end(&node).cloned() else {
                break;
            };
            targets.distance += link.length();
            path.push(link);
            if targets.target_node.is_none() {
                targets.target_node = Some(next.clone());
            }
            node = next;

            let reached = Cursor {
                node: node.clone(),
                location: cursor.location,
                link: Some(link.id().clone()),
                came_from: None,
                orientation: 0.0,
            };
            if self.is_stop(&reached) {
                break;
            }
            let heading = arrival_heading(link, &node).unwrap_or(0.0);
            let following = continuation(
                &self.graph,
                &self.route,
                &node,
                Some(link.id().as_str()),
                heading,
            );
            let Some(following) = following.and_then(|id| self.graph.link(&id)) else {
                break;
            };
            link = following;
        }

        if !path.is_empty() {
            targets.target_intersection = Some(node);
        }
        targets.target_pois = self
            .graph
            .pois()
            .iter()
            .filter(|p| {
                path.iter().any(|l| {
                    l.is_on_floor_of(&p.location)
                        && l.distance_to(&p.location) <= self.config.poi_distance
                })
            })
            .map(|p| p.id.clone())
            .collect();
        targets
    }
}
