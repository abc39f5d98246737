//! Offline route verification.
//!
//! Walks a route link by link with a [`Previewer`] and reports either a
//! summary of the walk or the first step that would strand a user.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::graph::{GraphError, LinkId, NodeId, RouteGraph};

use super::previewer::{PreviewConfig, PreviewNotice, Previewer};

/// Why a route cannot be walked.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalkError {
    #[error(transparent)]
    Route(#[from] GraphError),

    #[error("link {link} is one-way and cannot be entered from node {node}")]
    OneWay { link: LinkId, node: NodeId },

    #[error("step {step} at node {node} does not continue along the route")]
    LeftRoute { step: usize, node: NodeId },

    #[error("walk ended at node {node} before reaching the destination")]
    DidNotArrive { node: NodeId },
}

/// Summary of a successful walk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalkReport {
    pub steps: usize,
    /// Declared length walked (meters).
    pub distance: f64,
    /// Intersections passed, including the start.
    pub intersections: usize,
    /// POIs announced along the way, in order of first appearance.
    pub pois: Vec<String>,
    /// Crossings and other links without a protected walkway.
    pub unsafe_links: Vec<LinkId>,
}

/// Walk `route` from source to destination.
pub fn verify_walkability(
    graph: Arc<RouteGraph>,
    route: &[LinkId],
) -> Result<WalkReport, WalkError> {
    let resolved = graph.resolve_route(route)?;

    for link in resolved.links() {
        let entered_at = link.source_node();
        let allowed = graph
            .link(link.id())
            .is_some_and(|original| original.allows_traversal_from(entered_at));
        if !allowed {
            return Err(WalkError::OneWay {
                link: link.id().clone(),
                node: entered_at.clone(),
            });
        }
    }

    let expected: Vec<LinkId> = resolved.link_ids().cloned().collect();
    let source = resolved.source_node().clone();
    let unsafe_links = resolved
        .links()
        .iter()
        .filter(|l| !l.is_safe_link_type())
        .map(|l| l.id().clone())
        .collect();
    let mut previewer: Previewer<Vec<PreviewNotice>> =
        Previewer::with_route(graph, resolved, PreviewConfig::default(), Vec::new());
    previewer.start();

    let mut report = WalkReport {
        unsafe_links,
        ..WalkReport::default()
    };
    for (step, link) in expected.iter().enumerate() {
        let Some(event) = previewer.event() else {
            break;
        };
        if event.link.as_ref() != Some(link) {
            return Err(WalkError::LeftRoute {
                step,
                node: event.node.clone(),
            });
        }
        if event.is_at_intersection() {
            report.intersections += 1;
        }
        for poi in &event.targets.target_pois {
            if !report.pois.contains(poi) {
                report.pois.push(poi.clone());
            }
        }

        let before = event.index;
        previewer.step_forward();
        match previewer.event() {
            Some(next) if next.index != before => {
                report.steps += 1;
                report.distance += next.distance_moved;
            }
            _ => break,
        }
    }

    match previewer.event() {
        Some(last) if last.is_arrived => {}
        last => {
            return Err(WalkError::DidNotArrive {
                node: last.map_or(source, |e| e.node.clone()),
            })
        }
    }
    debug!(steps = report.steps, "Walk reached the destination");
    info!(
        steps = report.steps,
        distance = report.distance,
        intersections = report.intersections,
        "Route is walkable"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Location;
    use crate::graph::{Direction, GraphBuilder, LinkRecord, LinkType};

    // a -- b -- c, with b -- x as a side branch
    fn graph(bc_direction: Direction) -> Arc<RouteGraph> {
        let a = Location::new(35.0, 139.0);
        let b = a.offset(10.0, 90.0);
        let c = b.offset(15.0, 90.0);
        let graph = GraphBuilder::new()
            .node("a", a)
            .node("b", b)
            .node("c", c)
            .node("x", b.offset(10.0, 0.0))
            .link(LinkRecord::new("ab", "a", "b"))
            .link(
                LinkRecord::new("bc", "b", "c")
                    .with_type(LinkType::Crossing)
                    .with_direction(bc_direction),
            )
            .link(LinkRecord::new("bx", "b", "x"))
            .build()
            .unwrap();
        Arc::new(graph)
    }

    #[test]
    fn test_walkable_route() {
        let route: Vec<LinkId> = vec!["ab".into(), "bc".into()];
        let report = verify_walkability(graph(Direction::Both), &route).unwrap();
        assert_eq!(report.steps, 2);
        assert!((report.distance - 25.0).abs() < 0.01);
        assert_eq!(report.intersections, 1);
        assert_eq!(report.unsafe_links, vec!["bc".to_string()]);
    }

    #[test]
    fn test_one_way_against_direction() {
        let route: Vec<LinkId> = vec!["ab".into(), "bc".into()];
        let err = verify_walkability(graph(Direction::TargetToSource), &route).unwrap_err();
        assert_eq!(
            err,
            WalkError::OneWay {
                link: "bc".into(),
                node: "b".into()
            }
        );
    }

    #[test]
    fn test_disconnected_route() {
        let route: Vec<LinkId> = vec!["ab".into(), "bx".into(), "bc".into()];
        let err = verify_walkability(graph(Direction::Both), &route).unwrap_err();
        assert!(matches!(err, WalkError::Route(GraphError::Disconnected { .. })));
    }

    #[test]
    fn test_unknown_link() {
        let err = verify_walkability(graph(Direction::Both), &["zz".into()]).unwrap_err();
        assert_eq!(err, WalkError::Route(GraphError::UnknownLink("zz".into())));
    }
}
