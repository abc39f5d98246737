//! The route graph and resolved routes.

use std::collections::HashMap;

use tracing::debug;

use crate::geo::Location;

use super::combined::GuideLink;
use super::error::{GraphError, GraphResult};
use super::poi::Poi;
use super::types::{Direction, Link, LinkId, LinkRecord, Node, NodeId};

/// Immutable pedestrian network.
///
/// Built once and then shared (`Arc<RouteGraph>`) between evaluators; nothing
/// mutates it afterwards.
#[derive(Debug, Clone, Default)]
pub struct RouteGraph {
    nodes: Vec<Node>,
    links: Vec<Link>,
    pois: Vec<Poi>,
    node_index: HashMap<NodeId, usize>,
    link_index: HashMap<LinkId, usize>,
}

impl RouteGraph {
    /// Build a graph, resolving every link's node references.
    pub fn build(nodes: Vec<Node>, links: Vec<LinkRecord>, pois: Vec<Poi>) -> GraphResult<Self> {
        let mut node_index = HashMap::with_capacity(nodes.len());
        let mut nodes = nodes;
        for (i, node) in nodes.iter_mut().enumerate() {
            node.connected_links.clear();
            if node_index.insert(node.id.clone(), i).is_some() {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }

        let mut link_index = HashMap::with_capacity(links.len());
        let mut resolved = Vec::with_capacity(links.len());
        for record in links {
            let source = *node_index
                .get(&record.source_node)
                .ok_or_else(|| GraphError::MissingNode {
                    link: record.id.clone(),
                    node: record.source_node.clone(),
                })?;
            let target = *node_index
                .get(&record.target_node)
                .ok_or_else(|| GraphError::MissingNode {
                    link: record.id.clone(),
                    node: record.target_node.clone(),
                })?;
            if link_index.contains_key(&record.id) {
                return Err(GraphError::DuplicateLink(record.id));
            }

            let link = record.resolve(&nodes[source], &nodes[target]);
            link_index.insert(link.id().clone(), resolved.len());
            nodes[source].connected_links.push(link.id().clone());
            if target != source {
                nodes[target].connected_links.push(link.id().clone());
            }
            resolved.push(link);
        }

        debug!(
            nodes = nodes.len(),
            links = resolved.len(),
            pois = pois.len(),
            "Route graph built"
        );

        Ok(Self {
            nodes,
            links: resolved,
            pois,
            node_index,
            link_index,
        })
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn link(&self, id: &str) -> Option<&Link> {
        self.link_index.get(id).map(|&i| &self.links[i])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn pois(&self) -> &[Poi] {
        &self.pois
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Links meeting at `node`, in graph order.
    pub fn links_at(&self, node: &str) -> Vec<&Link> {
        self.node(node)
            .map(|n| {
                n.connected_links
                    .iter()
                    .filter_map(|id| self.link(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nearest link on the user's floor within `max_distance`, skipping
    /// links for which `exclude` returns true.
    pub fn nearest_link<F>(
        &self,
        location: &Location,
        max_distance: f64,
        exclude: F,
    ) -> Option<(&Link, f64)>
    where
        F: Fn(&Link) -> bool,
    {
        self.links
            .iter()
            .filter(|l| !exclude(*l) && l.is_on_floor_of(location))
            .map(|l| (l, l.distance_to(location)))
            .filter(|(_, d)| d.is_finite() && *d <= max_distance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Nearest node on the user's floor.
    pub fn nearest_node(&self, location: &Location) -> Option<(&Node, f64)> {
        self.nodes
            .iter()
            .filter(|n| (n.location.floor() - location.floor()).abs() < 0.5)
            .map(|n| (n, n.location.distance_to(location)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Resolve a sequence of link ids into an oriented route.
    ///
    /// Each link is flipped as needed so the route reads source to
    /// destination. A single-link route follows the link's own direction.
    pub fn resolve_route(&self, ids: &[LinkId]) -> GraphResult<Route> {
        let links = ids
            .iter()
            .map(|id| {
                self.link(id)
                    .ok_or_else(|| GraphError::UnknownLink(id.clone()))
            })
            .collect::<GraphResult<Vec<&Link>>>()?;

        let first = *links.first().ok_or(GraphError::EmptyRoute)?;

        let first = match links.get(1) {
            Some(second) if !second.touches(first.target_node()) => first.reversed(),
            Some(_) => first.clone(),
            None if first.direction() == Direction::TargetToSource => first.reversed(),
            None => first.clone(),
        };

        let mut oriented = Vec::with_capacity(links.len());
        let mut nodes = vec![first.source_node().clone(), first.target_node().clone()];
        oriented.push(first);

        for (index, link) in links.iter().enumerate().skip(1) {
            let at = &nodes[nodes.len() - 1];
            let next = if link.source_node() == at {
                (*link).clone()
            } else if link.target_node() == at {
                link.reversed()
            } else {
                return Err(GraphError::Disconnected {
                    index,
                    link: link.id().clone(),
                    node: at.clone(),
                });
            };
            nodes.push(next.target_node().clone());
            oriented.push(next);
        }

        Ok(Route {
            links: oriented,
            nodes,
        })
    }
}

/// Convenience builder for graphs assembled in code.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    links: Vec<LinkRecord>,
    pois: Vec<Poi>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, id: impl Into<NodeId>, location: Location) -> Self {
        self.nodes.push(Node::new(id, location));
        self
    }

    pub fn link(mut self, record: LinkRecord) -> Self {
        self.links.push(record);
        self
    }

    pub fn poi(mut self, poi: Poi) -> Self {
        self.pois.push(poi);
        self
    }

    pub fn build(self) -> GraphResult<RouteGraph> {
        RouteGraph::build(self.nodes, self.links, self.pois)
    }
}

/// An ordered, oriented link sequence from a source node to a destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    links: Vec<Link>,
    /// `links.len() + 1` nodes; `nodes[i]` is the source of `links[i]`.
    nodes: Vec<NodeId>,
}

impl Route {
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn source_node(&self) -> &NodeId {
        &self.nodes[0]
    }

    pub fn destination_node(&self) -> &NodeId {
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn link_ids(&self) -> impl Iterator<Item = &LinkId> {
        self.links.iter().map(Link::id)
    }

    pub fn contains_link(&self, id: &str) -> bool {
        self.links.iter().any(|l| l.id() == id)
    }

    /// Position of `node` in the node sequence.
    pub fn position_of(&self, node: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n == node)
    }

    /// Total declared length (meters).
    pub fn length(&self) -> f64 {
        self.links.iter().map(Link::length).sum()
    }

    /// The route grouped into guide links.
    pub fn guide_links(&self) -> Vec<GuideLink> {
        GuideLink::combine(&self.links)
    }
}
