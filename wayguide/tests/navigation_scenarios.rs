//! Integration tests for live guidance.
//!
//! These tests drive a [`Navigator`] with scripted fix streams over small
//! graphs and check the emitted event sequence:
//! - approach and arrival announcements
//! - off-route hysteresis and re-announcement cooldown
//! - stability under lateral noise
//! - POIs announced at the start and end of a leg
//! - delivery through a channel sink
//!
//! Run with: `cargo test --test navigation_scenarios`

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use wayguide::geo::Location;
use wayguide::graph::{GraphBuilder, LinkId, LinkRecord, Poi, PoiCategory, RouteGraph};
use wayguide::navigation::{GuidanceEvent, NavigationPhase, Navigator, NavigatorConstants};

// ============================================================================
// Helper Functions
// ============================================================================

fn origin() -> Location {
    Location::new(35.681, 139.767)
}

/// Offset `distance` meters along `bearing`, accepting negative distances.
fn shift(from: Location, distance: f64, bearing: f64) -> Location {
    if distance >= 0.0 {
        from.offset(distance, bearing)
    } else {
        from.offset(-distance, bearing + 180.0)
    }
}

/// Single straight link a -> b, 40m east.
fn straight() -> (Arc<RouteGraph>, Vec<LinkId>) {
    let a = origin();
    let graph = GraphBuilder::new()
        .node("a", a)
        .node("b", a.offset(40.0, 90.0))
        .link(LinkRecord::new("ab", "a", "b"))
        .build()
        .unwrap();
    (Arc::new(graph), vec!["ab".into()])
}

/// L-shaped route: a -> b 60m east, then b -> c 30m north.
fn l_route() -> (Arc<RouteGraph>, Vec<LinkId>) {
    let a = origin();
    let b = a.offset(60.0, 90.0);
    let graph = GraphBuilder::new()
        .node("a", a)
        .node("b", b)
        .node("c", b.offset(30.0, 0.0))
        .link(LinkRecord::new("ab", "a", "b"))
        .link(LinkRecord::new("bc", "b", "c"))
        .build()
        .unwrap();
    (Arc::new(graph), vec!["ab".into(), "bc".into()])
}

/// A fix `along` meters east of a, `north` meters off the first leg.
fn east_fix(along: f64, north: f64) -> Location {
    shift(shift(origin(), along, 90.0), north, 0.0).with_orientation(90.0)
}

/// A fix `s` meters along the L route with `lateral` meters of offset to
/// the right of travel, facing the travel direction plus `skew` degrees.
fn l_fix(s: f64, lateral: f64, skew: f64) -> Location {
    if s <= 60.0 {
        let p = shift(shift(origin(), s, 90.0), lateral, 180.0);
        p.with_orientation(90.0 + skew)
    } else {
        let b = origin().offset(60.0, 90.0);
        let p = shift(shift(b, s - 60.0, 0.0), lateral, 90.0);
        p.with_orientation(skew)
    }
}

struct Session {
    navigator: Navigator<Vec<GuidanceEvent>>,
    t0: Instant,
}

impl Session {
    fn new(graph: Arc<RouteGraph>, route: &[LinkId], constants: NavigatorConstants) -> Self {
        let mut navigator = Navigator::new(graph, constants, Vec::new());
        navigator.start(route).unwrap();
        Self {
            navigator,
            t0: Instant::now(),
        }
    }

    /// Feed a fix at `secs` and return the events it produced.
    fn fix(&mut self, secs: f64, location: Location) -> Vec<GuidanceEvent> {
        let before = self.navigator.sink().len();
        self.navigator
            .update_at(location, self.t0 + Duration::from_secs_f64(secs));
        self.navigator.sink()[before..].to_vec()
    }

    fn count(&self, name: &str) -> usize {
        self.navigator
            .sink()
            .iter()
            .filter(|e| e.name() == name)
            .count()
    }
}

fn count(events: &[GuidanceEvent], name: &str) -> usize {
    events.iter().filter(|e| e.name() == name).count()
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Two meters from the target the approach fires once; closer fixes do not
/// repeat it.
#[test]
fn test_approach_fires_once() {
    let (graph, route) = straight();
    let mut s = Session::new(graph, &route, NavigatorConstants::default());

    s.fix(0.0, east_fix(1.0, 0.0));
    let events = s.fix(10.0, east_fix(30.0, 0.0));
    assert_eq!(count(&events, "user-is-approaching-to-target"), 0);

    let events = s.fix(20.0, east_fix(38.0, 0.0));
    assert_eq!(count(&events, "user-is-approaching-to-target"), 1);
    match events
        .iter()
        .find(|e| e.name() == "user-is-approaching-to-target")
    {
        Some(GuidanceEvent::UserIsApproachingToTarget {
            distance,
            is_destination,
            next_turn_angle,
            ..
        }) => {
            assert!((distance - 2.0).abs() < 0.05);
            assert!(*is_destination);
            assert!(next_turn_angle.is_none());
        }
        other => panic!("unexpected {other:?}"),
    }

    let events = s.fix(21.0, east_fix(38.5, 0.0));
    assert_eq!(count(&events, "user-is-approaching-to-target"), 0);
    assert_eq!(s.navigator.phase(), NavigationPhase::Navigating { leg: 0 });
}

/// With an 8m threshold, 12m off the link reports off-route once and the
/// return reports back-on-route once.
#[test]
fn test_off_route_and_back_once() {
    let constants = NavigatorConstants::from_ini_str(
        "[navigation]\noff_route_threshold = 8\nreroute_distance_threshold = 20\n",
    )
    .unwrap();
    assert_eq!(constants.off_route_threshold, 8.0);

    let (graph, route) = l_route();
    let mut s = Session::new(graph, &route, constants);
    s.fix(0.0, east_fix(2.0, 0.0));
    s.fix(1.0, east_fix(10.0, 0.0));

    let events = s.fix(2.0, east_fix(20.0, -12.0));
    assert_eq!(count(&events, "user-maybe-off-route"), 1);
    match &events[0] {
        GuidanceEvent::UserMaybeOffRoute {
            distance_from_route,
            needs_reroute,
            ..
        } => {
            assert!((distance_from_route - 12.0).abs() < 0.05);
            assert!(!*needs_reroute);
        }
        other => panic!("unexpected {other:?}"),
    }

    assert!(s.fix(3.0, east_fix(22.0, -12.5)).is_empty());

    let events = s.fix(4.0, east_fix(24.0, -3.0));
    assert_eq!(count(&events, "user-may-get-back-on-route"), 1);
    let events = s.fix(5.0, east_fix(26.0, -2.0));
    assert_eq!(count(&events, "user-may-get-back-on-route"), 0);

    assert_eq!(s.count("user-maybe-off-route"), 1);
    assert_eq!(s.count("user-may-get-back-on-route"), 1);
}

/// Distance flapping around the threshold does not re-announce within the
/// cooldown.
#[test]
fn test_off_route_does_not_flap() {
    let (graph, route) = l_route();
    let mut s = Session::new(graph, &route, NavigatorConstants::default());
    s.fix(0.0, east_fix(2.0, 0.0));

    let offsets = [-5.5, -4.8, -5.6, -4.9, -5.7, -4.7, -5.8];
    for (i, north) in offsets.iter().enumerate() {
        s.fix(1.0 + i as f64, east_fix(10.0 + i as f64, *north));
    }
    assert_eq!(s.count("user-maybe-off-route"), 1);
    assert_eq!(s.count("user-may-get-back-on-route"), 1);

    // Past the cooldown the next excursion is announced again
    let events = s.fix(15.0, east_fix(20.0, -6.0));
    assert_eq!(count(&events, "user-maybe-off-route"), 1);
}

/// Fixes that stay within the threshold of the centerline never report
/// off-route, and the walk ends with arrival.
#[test]
fn test_lateral_noise_never_reports_off_route() {
    let (graph, route) = l_route();
    let mut s = Session::new(graph, &route, NavigatorConstants::default());
    let mut rng = StdRng::seed_from_u64(0x5eed);

    let mut t = 0.0;
    let mut along = 0.0;
    while along <= 90.0 {
        let lateral = rng.random_range(-3.0..3.0);
        let skew = rng.random_range(-10.0..10.0);
        s.fix(t, l_fix(along, lateral, skew));
        t += 1.0;
        along += 1.0;
    }
    s.fix(t, l_fix(90.0, 0.0, 0.0));

    assert_eq!(s.count("user-maybe-off-route"), 0);
    assert_eq!(s.count("user-maybe-going-backward"), 0);
    assert_eq!(s.count("navigation-finished"), 1);
    assert_eq!(s.navigator.phase(), NavigationPhase::Arrived);
}

/// The corner turn is announced and the final fix finishes navigation.
#[test]
fn test_turn_and_arrival_sequence() {
    let (graph, route) = l_route();
    let mut s = Session::new(graph, &route, NavigatorConstants::default());

    let first = s.fix(0.0, l_fix(1.0, 0.0, 0.0));
    let names: Vec<_> = first.iter().map(GuidanceEvent::name).collect();
    assert_eq!(names, vec!["navigation-started", "user-needs-to-walk"]);

    s.fix(20.0, l_fix(56.0, 0.0, 0.0));
    let events = s.fix(25.0, l_fix(58.5, 0.0, 0.0));
    match events
        .iter()
        .find(|e| e.name() == "user-needs-to-take-action")
    {
        Some(GuidanceEvent::UserNeedsToTakeAction { turn_angle, .. }) => {
            assert!((turn_angle + 90.0).abs() < 1.0);
        }
        other => panic!("expected a turn, got {other:?}"),
    }

    s.fix(30.0, l_fix(61.0, 0.0, 0.0));
    assert_eq!(s.navigator.phase(), NavigationPhase::Navigating { leg: 1 });

    s.fix(45.0, l_fix(75.0, 0.0, 0.0));
    let events = s.fix(60.0, l_fix(89.5, 0.0, 0.0));
    let names: Vec<_> = events.iter().map(GuidanceEvent::name).collect();
    assert_eq!(names, vec!["navigation-finished", "active-status-changed"]);
    assert!(!s.navigator.is_active());
}

/// A door by the start is announced as the user sets off, and a POI at the
/// destination together with the final approach.
#[test]
fn test_start_and_destination_pois() {
    let a = origin();
    let b = a.offset(40.0, 90.0);
    let graph = GraphBuilder::new()
        .node("a", a)
        .node("b", b)
        .link(LinkRecord::new("ab", "a", "b"))
        .poi(Poi::new("gate", PoiCategory::Door, a.offset(2.0, 90.0).offset(1.0, 0.0)))
        .poi(Poi::new("exit", PoiCategory::Info, b.offset(1.0, 0.0)))
        .build()
        .unwrap();
    let route: Vec<LinkId> = vec!["ab".into()];
    let mut s = Session::new(Arc::new(graph), &route, NavigatorConstants::default());

    let first = s.fix(0.0, east_fix(1.0, 0.0));
    match first
        .iter()
        .find(|e| e.name() == "user-is-approaching-to-poi")
    {
        Some(GuidanceEvent::UserIsApproachingToPoi { poi }) => {
            assert_eq!(poi.poi_id, "gate");
            assert!(poi.roles.for_before_start);
            assert!(poi.roles.requires_user_action);
        }
        other => panic!("expected the gate, got {other:?}"),
    }

    let middle = s.fix(15.0, east_fix(20.0, 0.0));
    assert_eq!(count(&middle, "user-is-approaching-to-poi"), 0);
    assert_eq!(count(&middle, "user-is-leaving-from-poi"), 0);

    let near_end = s.fix(30.0, east_fix(35.0, 0.0));
    assert_eq!(count(&near_end, "user-is-approaching-to-target"), 1);
    match near_end
        .iter()
        .find(|e| e.name() == "user-is-approaching-to-poi")
    {
        Some(GuidanceEvent::UserIsApproachingToPoi { poi }) => {
            assert_eq!(poi.poi_id, "exit");
            assert!(poi.roles.is_destination);
        }
        other => panic!("expected the exit, got {other:?}"),
    }

    s.fix(40.0, east_fix(39.5, 0.0));
    assert!(!s.navigator.is_active());
    assert_eq!(s.count("user-is-leaving-from-poi"), 0);
}

/// Events reach a channel sink in priority order.
#[tokio::test]
async fn test_channel_sink_receives_ordered_events() {
    let (graph, route) = straight();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut navigator = Navigator::new(graph, NavigatorConstants::default(), tx);
    navigator.start(&route).unwrap();
    navigator.update(east_fix(1.0, 0.0));
    drop(navigator);

    let mut names = Vec::new();
    while let Some(event) = rx.recv().await {
        names.push(event.name());
    }
    assert_eq!(
        names,
        vec![
            "active-status-changed",
            "navigation-started",
            "user-needs-to-walk"
        ]
    );
}

/// A route that cannot be resolved is refused with an event.
#[test]
fn test_invalid_route_refused() {
    let (graph, _) = l_route();
    let mut navigator = Navigator::new(graph, NavigatorConstants::default(), Vec::new());
    let err = navigator.start(&["bc".into(), "missing".into()]);
    assert!(err.is_err());
    assert!(matches!(
        navigator.sink().as_slice(),
        [GuidanceEvent::CouldNotStartNavigation { .. }]
    ));
    assert_eq!(navigator.phase(), NavigationPhase::Inactive);
}
