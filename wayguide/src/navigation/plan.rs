//! Navigation plan: the route as a sequence of guided legs with POIs.

use std::collections::HashSet;

use tracing::debug;

use crate::graph::{GuideLink, LinkId, NodeId, Poi, PoiCategory, Route, RouteGraph};

use super::config::NavigatorConstants;
use super::events::PoiRoles;

/// A POI attached to a leg, with the roles it plays there.
#[derive(Debug, Clone, PartialEq)]
pub struct LegPoi {
    pub poi: Poi,
    pub roles: PoiRoles,
}

/// One guided stretch of the route.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub index: usize,
    pub link: GuideLink,
    /// POIs announced while walking this leg.
    pub pois: Vec<LegPoi>,
    /// Declared length of all legs after this one (meters).
    pub remaining_after: f64,
}

impl Leg {
    pub fn is_vertical(&self) -> bool {
        self.link.is_vertical()
    }
}

/// Legs derived from a resolved route.
#[derive(Debug, Clone)]
pub struct NavigationPlan {
    legs: Vec<Leg>,
    route_links: HashSet<LinkId>,
    route_nodes: HashSet<NodeId>,
}

impl NavigationPlan {
    /// Group the route into legs, drop negligible first/last stretches and
    /// attach nearby POIs.
    pub fn build(graph: &RouteGraph, route: &Route, constants: &NavigatorConstants) -> Self {
        let mut guide = route.guide_links();

        if guide.len() > 1 {
            if let Some(first) = guide.first() {
                if !first.is_vertical()
                    && first.length() < constants.ignore_first_link_length_threshold
                {
                    debug!(link = %first.id(), length = first.length(), "Ignoring short first link");
                    guide.remove(0);
                }
            }
        }
        if guide.len() > 1 {
            if let Some(last) = guide.last() {
                if !last.is_vertical() && last.length() < constants.ignore_last_link_length_threshold
                {
                    debug!(link = %last.id(), length = last.length(), "Ignoring short last link");
                    guide.pop();
                }
            }
        }

        let mut pois: Vec<Vec<LegPoi>> = vec![Vec::new(); guide.len()];
        for poi in graph.pois() {
            let nearest = guide
                .iter()
                .enumerate()
                .filter(|(_, g)| g.links().iter().any(|l| l.is_on_floor_of(&poi.location)))
                .map(|(i, g)| (i, g.distance_to(&poi.location)))
                .filter(|(_, d)| d.is_finite() && *d <= constants.poi_distance_min_threshold)
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((i, _)) = nearest {
                let roles = classify(poi, &guide[i], i + 1 == guide.len(), constants);
                debug!(poi = %poi.id, leg = i, ?roles, "POI attached");
                pois[i].push(LegPoi {
                    poi: poi.clone(),
                    roles,
                });
            }
        }

        let lengths: Vec<f64> = guide.iter().map(GuideLink::length).collect();
        let legs = guide
            .into_iter()
            .zip(pois)
            .enumerate()
            .map(|(index, (link, pois))| Leg {
                index,
                link,
                pois,
                remaining_after: lengths[index + 1..].iter().sum(),
            })
            .collect();

        Self {
            legs,
            route_links: route.link_ids().cloned().collect(),
            route_nodes: route.nodes().iter().cloned().collect(),
        }
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn leg(&self, index: usize) -> Option<&Leg> {
        self.legs.get(index)
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    pub fn is_final(&self, index: usize) -> bool {
        index + 1 == self.legs.len()
    }

    /// Declared length of the whole plan (meters).
    pub fn total_length(&self) -> f64 {
        self.legs.iter().map(|l| l.link.length()).sum()
    }

    /// Whether `link` belongs to the route.
    pub fn contains_link(&self, link: &str) -> bool {
        self.route_links.contains(link)
    }

    /// Whether `node` lies on the route.
    pub fn contains_node(&self, node: &str) -> bool {
        self.route_nodes.contains(node)
    }
}

/// Roles of `poi` on the leg walking `link`.
///
/// A POI near both ends of a short leg belongs to the end.
fn classify(poi: &Poi, link: &GuideLink, is_final: bool, c: &NavigatorConstants) -> PoiRoles {
    let for_floor = matches!(
        poi.category,
        PoiCategory::Floor | PoiCategory::Elevator | PoiCategory::ElevatorEquipments
    );
    let near_source =
        poi.location.distance_to(link.source_location()) <= c.poi_start_info_distance_threshold;
    let near_target =
        poi.location.distance_to(link.target_location()) <= c.poi_target_distance_threshold;
    let for_before_end = near_target && !for_floor;

    PoiRoles {
        requires_user_action: matches!(poi.category, PoiCategory::Door | PoiCategory::Elevator),
        for_before_start: near_source && !for_before_end && !for_floor,
        for_floor,
        for_corner: matches!(
            poi.category,
            PoiCategory::CornerEnd | PoiCategory::CornerWarningBlock | PoiCategory::CornerLandmark
        ),
        for_sign: poi.category == PoiCategory::Sign,
        for_before_end,
        is_destination: for_before_end && is_final,
    }
}
