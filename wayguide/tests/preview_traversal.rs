//! Integration tests for discrete route preview.
//!
//! Walks a small cross-shaped network with a [`Previewer`]:
//! - rotating through every link at an intersection
//! - stepping to the destination and retracing to the source
//! - timer-driven auto-step through [`AutoStepper`]
//! - offline walkability checks on a JSON bundle
//!
//! Run with: `cargo test --test preview_traversal`

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use wayguide::geo::Location;
use wayguide::graph::{
    GraphBuilder, GraphError, LinkId, LinkRecord, Poi, PoiCategory, RouteBundle, RouteGraph,
};
use wayguide::preview::{
    verify_walkability, AutoStepper, PreviewConfig, PreviewEvent, PreviewNotice, Previewer,
    WalkError, DEFAULT_TICK_PERIOD,
};

// ============================================================================
// Helper Functions
// ============================================================================

//          x
//          |
//          n
//          |
//   w ---- o ---- e
//          |
//          s
fn cross() -> Arc<RouteGraph> {
    let o = Location::new(35.6895, 139.6917);
    let n = o.offset(15.0, 0.0);
    let x = n.offset(12.0, 0.0);
    let graph = GraphBuilder::new()
        .node("o", o)
        .node("w", o.offset(15.0, 270.0))
        .node("n", n)
        .node("e", o.offset(15.0, 90.0))
        .node("s", o.offset(15.0, 180.0))
        .node("x", x)
        .link(LinkRecord::new("wo", "w", "o"))
        .link(LinkRecord::new("on", "o", "n"))
        .link(LinkRecord::new("nx", "n", "x"))
        .link(LinkRecord::new("oe", "o", "e"))
        .link(LinkRecord::new("os", "o", "s"))
        .poi(Poi::new(
            "kiosk",
            PoiCategory::Info,
            n.offset(6.0, 0.0).offset(2.0, 90.0),
        ))
        .build()
        .unwrap();
    Arc::new(graph)
}

fn route() -> Vec<LinkId> {
    vec!["wo".into(), "on".into(), "nx".into()]
}

fn started() -> Previewer<Vec<PreviewNotice>> {
    let mut p = Previewer::new(cross(), &route(), PreviewConfig::default(), Vec::new()).unwrap();
    assert!(p.start());
    p
}

fn current(p: &Previewer<Vec<PreviewNotice>>) -> PreviewEvent {
    p.event().cloned().expect("preview is active")
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Four right turns at a four-way intersection face the original link again.
#[test]
fn test_full_rotation_at_intersection() {
    let mut p = started();
    p.step_forward();
    let at_o = current(&p);
    assert_eq!(at_o.node, "o");
    assert_eq!(at_o.link.as_deref(), Some("on"));

    let mut faced = Vec::new();
    for _ in 0..4 {
        p.face_right();
        faced.push(current(&p).link.unwrap_or_default());
    }
    assert_eq!(faced, vec!["oe", "os", "wo", "on"]);
    assert!(current(&p).same_place(&at_o));

    // Left undoes right
    p.face_right();
    p.face_left();
    assert!(current(&p).same_place(&at_o));
}

/// The facing flags follow the faced link.
#[test]
fn test_facing_flags_at_intersection() {
    let mut p = started();
    p.step_forward();

    p.face_right();
    assert!(p.is_going_to_be_off_route());
    assert!(!p.is_going_backward());

    p.face_right();
    p.face_right();
    assert_eq!(current(&p).link.as_deref(), Some("wo"));
    assert!(p.is_going_backward());
    assert!(!p.is_going_to_be_off_route());
    assert!(p.is_on_route());
}

/// Stepping to the destination and back visits the same places in reverse.
#[test]
fn test_walk_to_destination_and_retrace() {
    let mut p = started();
    let mut forward = vec![current(&p)];
    while !p.is_arrived() {
        p.step_forward();
        forward.push(current(&p));
    }
    let nodes: Vec<_> = forward.iter().map(|e| e.node.as_str()).collect();
    assert_eq!(nodes, vec!["w", "o", "n", "x"]);
    assert!(forward.last().is_some_and(|e| e.link.is_none()));

    for expected in forward.iter().rev().skip(1) {
        p.step_backward();
        let e = current(&p);
        assert!(
            e.same_place(expected),
            "expected {} facing {:?}, got {} facing {:?}",
            expected.node,
            expected.link,
            e.node,
            e.link
        );
    }

    let before = p.history().len();
    p.step_backward();
    assert_eq!(p.history().len(), before);
    assert!(matches!(p.sink().last(), Some(PreviewNotice::NoStep)));
}

/// Jumps stop at the intersection, then run through to the destination.
#[test]
fn test_jumps_and_targets() {
    let mut p = started();
    p.jump_forward();
    let at_o = current(&p);
    assert_eq!(at_o.node, "o");
    assert!(at_o.is_at_intersection());
    assert_eq!(at_o.targets.target_intersection.as_deref(), Some("x"));
    assert!((at_o.targets.distance - 27.0).abs() < 0.01);
    assert_eq!(at_o.targets.target_pois, vec!["kiosk".to_string()]);

    p.jump_forward();
    let end = current(&p);
    assert!(end.is_arrived);
    assert!((end.distance_moved - 27.0).abs() < 0.01);

    p.goto_begin();
    assert_eq!(current(&p).node, "w");
    assert!(matches!(
        p.sink().last(),
        Some(PreviewNotice::RemainingDistance { distance }) if (distance - 42.0).abs() < 0.01
    ));
}

/// A spawned stepper walks the whole route and reports each move.
#[tokio::test(start_paused = true)]
async fn test_auto_stepper_walks_route() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let previewer = Previewer::new(cross(), &route(), PreviewConfig::default(), tx).unwrap();
    let previewer = Arc::new(Mutex::new(previewer));
    {
        let mut p = previewer.lock();
        p.start();
        p.auto_step_forward_up();
        p.auto_step_forward_up();
    }
    assert_eq!(previewer.lock().auto_step_speed(), Some(1.5));

    let stepper = AutoStepper::spawn(Arc::clone(&previewer), DEFAULT_TICK_PERIOD);
    tokio::time::sleep(Duration::from_secs(40)).await;
    assert!(previewer.lock().is_arrived());
    assert!(!previewer.lock().is_auto_stepping());
    stepper.shutdown().await;

    let mut moved = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        if let PreviewNotice::UserMoved { distance } = notice {
            moved.push(distance);
        }
    }
    assert_eq!(moved.len(), 3);
    assert!((moved.iter().sum::<f64>() - 42.0).abs() < 0.01);
}

/// Bundles load into a graph whose route can be verified offline; walking
/// a one-way link backward is refused.
#[test]
fn test_walkability_of_bundle() {
    let bundle = RouteBundle::from_json_str(
        r#"{
            "nodes": [
                {"id": "a", "location": {"lat": 35.0, "lng": 139.0}},
                {"id": "b", "location": {"lat": 35.0, "lng": 139.0002}},
                {"id": "c", "location": {"lat": 35.0002, "lng": 139.0002}}
            ],
            "links": [
                {"id": "ab", "source_node": "a", "target_node": "b"},
                {"id": "bc", "source_node": "b", "target_node": "c",
                 "link_type": "crossing", "direction": "source_to_target"}
            ],
            "route": ["ab", "bc"]
        }"#,
    )
    .unwrap();
    let (graph, route) = bundle.into_graph().unwrap();
    let graph = Arc::new(graph);

    let report = verify_walkability(Arc::clone(&graph), &route).unwrap();
    assert_eq!(report.steps, 2);
    assert_eq!(report.unsafe_links, vec!["bc".to_string()]);

    let reversed: Vec<LinkId> = vec!["bc".into(), "ab".into()];
    let err = verify_walkability(Arc::clone(&graph), &reversed).unwrap_err();
    assert_eq!(
        err,
        WalkError::OneWay {
            link: "bc".into(),
            node: "c".into()
        }
    );

    let gap: Vec<LinkId> = vec!["ab".into(), "zz".into()];
    let err = verify_walkability(graph, &gap).unwrap_err();
    assert_eq!(err, WalkError::Route(GraphError::UnknownLink("zz".into())));
}
