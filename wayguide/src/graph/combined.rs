//! Guide links: a single link, or a run of collinear links guided as one.
//!
//! Short consecutive links of the same kind that continue straight through a
//! node read as one stretch to a pedestrian, so they are announced once.

use crate::geo::{angle_difference, Location};

use super::types::{Link, LinkType, NodeId};

/// Maximum width difference for links to be guided together (meters).
pub const COMBINE_WIDTH_TOLERANCE_M: f64 = 0.5;

/// Maximum bearing change through the shared node (degrees).
pub const COMBINE_BEARING_TOLERANCE_DEG: f64 = 15.0;

/// Whether `next` may be folded into the stretch ending with `prev`.
pub fn should_be_combined(prev: &Link, next: &Link) -> bool {
    prev.target_node() == next.source_node()
        && prev.link_type() == next.link_type()
        && !prev.is_vertical()
        && prev.braille_block() == next.braille_block()
        && (prev.minimum_width() - next.minimum_width()).abs() < COMBINE_WIDTH_TOLERANCE_M
        && angle_difference(
            next.initial_bearing_from_source(),
            prev.last_bearing_for_target(),
        )
        .abs()
            < COMBINE_BEARING_TOLERANCE_DEG
}

/// One stretch of guidance.
#[derive(Debug, Clone, PartialEq)]
pub enum GuideLink {
    Simple(Link),
    /// Two or more consecutive links; never empty.
    Combined(Vec<Link>),
}

impl GuideLink {
    /// Group oriented route links into guide links.
    pub fn combine(links: &[Link]) -> Vec<GuideLink> {
        let mut groups: Vec<Vec<Link>> = Vec::new();
        for link in links {
            match groups.last_mut() {
                Some(group)
                    if group
                        .last()
                        .is_some_and(|prev| should_be_combined(prev, link)) =>
                {
                    group.push(link.clone());
                }
                _ => groups.push(vec![link.clone()]),
            }
        }

        groups
            .into_iter()
            .map(|mut group| {
                if group.len() == 1 {
                    GuideLink::Simple(group.remove(0))
                } else {
                    GuideLink::Combined(group)
                }
            })
            .collect()
    }

    pub fn links(&self) -> &[Link] {
        match self {
            GuideLink::Simple(link) => std::slice::from_ref(link),
            GuideLink::Combined(links) => links,
        }
    }

    pub fn first(&self) -> &Link {
        &self.links()[0]
    }

    pub fn last(&self) -> &Link {
        let links = self.links();
        &links[links.len() - 1]
    }

    /// Identifier, `+`-joined for combined stretches.
    pub fn id(&self) -> String {
        match self {
            GuideLink::Simple(link) => link.id().clone(),
            GuideLink::Combined(links) => links
                .iter()
                .map(|l| l.id().as_str())
                .collect::<Vec<_>>()
                .join("+"),
        }
    }

    pub fn is_combined(&self) -> bool {
        matches!(self, GuideLink::Combined(_))
    }

    /// Declared length (meters).
    pub fn length(&self) -> f64 {
        self.links().iter().map(Link::length).sum()
    }

    fn geometric_length(&self) -> f64 {
        self.links().iter().map(Link::geometric_length).sum()
    }

    pub fn source_node(&self) -> &NodeId {
        self.first().source_node()
    }

    pub fn target_node(&self) -> &NodeId {
        self.last().target_node()
    }

    pub fn source_location(&self) -> &Location {
        self.first().source_location()
    }

    pub fn target_location(&self) -> &Location {
        self.last().target_location()
    }

    pub fn link_type(&self) -> LinkType {
        self.first().link_type()
    }

    pub fn minimum_width(&self) -> f64 {
        self.links()
            .iter()
            .map(Link::minimum_width)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn is_vertical(&self) -> bool {
        self.first().is_vertical()
    }

    pub fn is_safe_link_type(&self) -> bool {
        self.links().iter().all(Link::is_safe_link_type)
    }

    pub fn initial_bearing_from_source(&self) -> f64 {
        self.first().initial_bearing_from_source()
    }

    pub fn last_bearing_for_target(&self) -> f64 {
        self.last().last_bearing_for_target()
    }

    /// Index of the member link closest to `location`, with the snapped point.
    fn nearest_member(&self, location: &Location) -> (usize, Location) {
        let mut best = (0, self.first().nearest_location_to(location), f64::INFINITY);
        for (i, link) in self.links().iter().enumerate() {
            let snapped = link.nearest_location_to(location);
            let d = location.distance_to(&snapped);
            if d < best.2 {
                best = (i, snapped, d);
            }
        }
        (best.0, best.1)
    }

    /// Closest point on the stretch to `location`.
    pub fn nearest_location_to(&self, location: &Location) -> Location {
        self.nearest_member(location).1
    }

    /// Perpendicular distance from `location` to the stretch (meters).
    pub fn distance_to(&self, location: &Location) -> f64 {
        location.distance_to(&self.nearest_location_to(location))
    }

    /// Link bearing at the point of the stretch nearest `location`.
    pub fn bearing_at(&self, location: &Location) -> f64 {
        let (i, _) = self.nearest_member(location);
        self.links()[i].initial_bearing_from_source()
    }

    /// Distance walked along the stretch to reach the point nearest
    /// `location`, and the distance still to walk to the target.
    pub fn progress_of(&self, location: &Location) -> (f64, f64) {
        let (i, snapped) = self.nearest_member(location);
        let before: f64 = self.links()[..i]
            .iter()
            .map(Link::geometric_length)
            .sum();
        let walked = before + self.links()[i].source_location().distance_to(&snapped);
        let total = self.geometric_length();
        (walked, (total - walked).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{LinkRecord, Node};

    fn straight_links(bearings: &[f64], len: f64) -> Vec<Link> {
        let mut nodes = vec![Node::new("n0", Location::new(35.0, 139.0))];
        for (i, b) in bearings.iter().enumerate() {
            let next = nodes[i].location.offset(len, *b);
            nodes.push(Node::new(format!("n{}", i + 1), Location::new(next.lat(), next.lng())));
        }
        (0..bearings.len())
            .map(|i| {
                LinkRecord::new(format!("l{i}"), format!("n{i}"), format!("n{}", i + 1))
                    .resolve(&nodes[i], &nodes[i + 1])
            })
            .collect()
    }

    #[test]
    fn test_collinear_links_combined() {
        let links = straight_links(&[90.0, 90.0, 90.0], 10.0);
        let guide = GuideLink::combine(&links);
        assert_eq!(guide.len(), 1);
        assert!(guide[0].is_combined());
        assert_eq!(guide[0].id(), "l0+l1+l2");
        assert!((guide[0].length() - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_turn_breaks_combination() {
        let links = straight_links(&[90.0, 90.0, 0.0], 10.0);
        let guide = GuideLink::combine(&links);
        assert_eq!(guide.len(), 2);
        assert!(guide[0].is_combined());
        assert_eq!(guide[1], GuideLink::Simple(links[2].clone()));
    }

    #[test]
    fn test_type_change_breaks_combination() {
        let mut links = straight_links(&[90.0, 90.0], 10.0);
        let nodes = [
            Node::new("n1", *links[1].source_location()),
            Node::new("n2", *links[1].target_location()),
        ];
        links[1] = LinkRecord::new("l1", "n1", "n2")
            .with_type(LinkType::Crossing)
            .resolve(&nodes[0], &nodes[1]);
        assert_eq!(GuideLink::combine(&links).len(), 2);
    }

    #[test]
    fn test_progress_across_members() {
        let links = straight_links(&[90.0, 90.0], 10.0);
        let guide = GuideLink::Combined(links.clone());
        let point = links[1].source_location().offset(4.0, 90.0).offset(1.0, 0.0);
        let (walked, remaining) = guide.progress_of(&point);
        assert!((walked - 14.0).abs() < 0.01, "walked={walked}");
        assert!((remaining - 6.0).abs() < 0.01, "remaining={remaining}");
        assert!((guide.distance_to(&point) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_simple_accessors() {
        let links = straight_links(&[0.0], 12.0);
        let guide = GuideLink::Simple(links[0].clone());
        assert_eq!(guide.links().len(), 1);
        assert_eq!(guide.source_node(), "n0");
        assert_eq!(guide.target_node(), "n1");
        assert!((guide.initial_bearing_from_source() - 0.0).abs() < 1e-6);
    }
}
