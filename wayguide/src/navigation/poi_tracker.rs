//! Per-POI proximity tracking within one leg.
//!
//! # State Machine
//!
//! ```text
//! Pending --[in range for its role, interval elapsed]--> Approached
//! Approached --[distance > announce + end_info]--> Left
//! ```
//!
//! Both transitions happen at most once per leg instance. The range depends
//! on the POI's [`PoiRoles`]:
//!
//! - before start: the user is within the start-info distance of the source
//! - before end: the user is within the approaching distance of the target
//! - floor: the POI is within the floor distance of the user
//! - sign: announce distance, facing, and the user in front of the sign
//! - corner: announce distance from any direction
//! - otherwise: announce distance while facing the POI
//!
//! Only POIs without a positional role or sign role are "left". POIs that
//! require a user action skip the interval gate.

use std::time::Instant;

use crate::geo::{angle_difference, Location};
use crate::graph::Poi;

use super::config::NavigatorConstants;
use super::events::{GuidanceEvent, PoiNotice, PoiRoles, PoiSide};

/// POIs closer than this to the snapped point are treated as straight ahead.
const POI_SIDE_MIN_DISTANCE_M: f64 = 0.5;

/// Distances and angles measured on the latest fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoiMetrics {
    pub distance_from_snapped: f64,
    pub distance_from_user: f64,
    /// Signed angle from the user's orientation to the POI heading.
    pub diff_angle_from_user_orientation: f64,
}

/// The user's position on the leg for one fix.
#[derive(Debug, Clone, Copy)]
pub struct PoiFix<'a> {
    pub snapped: &'a Location,
    pub user: &'a Location,
    /// Direction of the leg at the user's position.
    pub travel_bearing: f64,
    /// Distance along the leg from its source to the snapped point.
    pub distance_from_source: f64,
    /// Distance from the user to the leg's target.
    pub distance_to_target: f64,
}

/// Announcement state of one POI.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoiState {
    pub approached: bool,
    pub approached_at: Option<Instant>,
    pub left: bool,
    pub left_at: Option<Instant>,
}

/// Tracks one POI attached to the active leg.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiTracker {
    poi: Poi,
    roles: PoiRoles,
    state: PoiState,
    metrics: Option<PoiMetrics>,
}

impl PoiTracker {
    pub fn new(poi: Poi, roles: PoiRoles) -> Self {
        Self {
            poi,
            roles,
            state: PoiState::default(),
            metrics: None,
        }
    }

    pub fn poi(&self) -> &Poi {
        &self.poi
    }

    pub fn roles(&self) -> PoiRoles {
        self.roles
    }

    pub fn state(&self) -> PoiState {
        self.state
    }

    pub fn metrics(&self) -> Option<PoiMetrics> {
        self.metrics
    }

    /// Evaluate a fix.
    ///
    /// `can_announce` is false while another POI on the leg was announced
    /// within the minimum interval.
    pub fn update(
        &mut self,
        fix: &PoiFix<'_>,
        constants: &NavigatorConstants,
        now: Instant,
        can_announce: bool,
    ) -> Option<GuidanceEvent> {
        let metrics = PoiMetrics {
            distance_from_snapped: self.poi.location.distance_to(fix.snapped),
            distance_from_user: self.poi.location.distance_to(fix.user),
            diff_angle_from_user_orientation: angle_difference(
                self.poi.heading,
                fix.user.orientation(),
            ),
        };
        if !(metrics.distance_from_snapped.is_finite() && metrics.distance_from_user.is_finite()) {
            return None;
        }
        self.metrics = Some(metrics);

        let distance = metrics.distance_from_snapped;
        if !self.state.approached {
            if (can_announce || self.roles.requires_user_action)
                && self.in_range(fix, &metrics, constants)
            {
                self.state.approached = true;
                self.state.approached_at = Some(now);
                let side = self.side(fix.snapped, fix.travel_bearing);
                return Some(GuidanceEvent::UserIsApproachingToPoi {
                    poi: self.notice(distance, side),
                });
            }
        } else if !self.state.left
            && self.roles.announces_leaving()
            && distance
                > constants.poi_announce_distance + constants.poi_end_info_distance_threshold
        {
            self.state.left = true;
            self.state.left_at = Some(now);
            let side = self.side(fix.snapped, fix.travel_bearing);
            return Some(GuidanceEvent::UserIsLeavingFromPoi {
                poi: self.notice(distance, side),
            });
        }
        None
    }

    fn in_range(&self, fix: &PoiFix<'_>, m: &PoiMetrics, c: &NavigatorConstants) -> bool {
        let r = self.roles;
        let near = m.distance_from_snapped <= c.poi_announce_distance;
        if r.for_before_start {
            fix.distance_from_source <= c.poi_start_info_distance_threshold
        } else if r.for_before_end {
            fix.distance_to_target <= c.approaching_distance_threshold
        } else if r.for_floor {
            m.distance_from_user <= c.poi_floor_distance_threshold
        } else if r.for_sign {
            near && self.poi.is_facing(fix.travel_bearing) && self.poi.is_on_front(fix.user)
        } else if r.for_corner {
            near
        } else {
            near && self.poi.is_facing(fix.travel_bearing)
        }
    }

    fn side(&self, snapped: &Location, travel_bearing: f64) -> PoiSide {
        if snapped.distance_to(&self.poi.location) < POI_SIDE_MIN_DISTANCE_M {
            return PoiSide::Front;
        }
        PoiSide::from_relative_bearing(angle_difference(
            snapped.bearing_to(&self.poi.location),
            travel_bearing,
        ))
    }

    fn notice(&self, distance: f64, side: PoiSide) -> PoiNotice {
        PoiNotice {
            poi_id: self.poi.id.clone(),
            category: self.poi.category,
            name: self.poi.name.clone(),
            long_description: self.poi.long_description.clone(),
            flags: self.poi.flags,
            roles: self.roles,
            distance,
            side,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PoiCategory;
    use std::time::Duration;

    const LEG_M: f64 = 40.0;

    fn origin() -> Location {
        Location::new(35.0, 139.0)
    }

    fn along(m: f64) -> Location {
        origin().offset(m, 90.0)
    }

    // User walks a 40m leg east along lat 35; the POI sits 3m north of the
    // 20m mark.
    fn tracker() -> PoiTracker {
        let poi_at = along(20.0).offset(3.0, 0.0);
        PoiTracker::new(
            Poi::new("p", PoiCategory::Info, poi_at).with_name("Kiosk"),
            PoiRoles::default(),
        )
    }

    fn with_roles(poi: Poi, roles: PoiRoles) -> PoiTracker {
        PoiTracker::new(poi, roles)
    }

    /// Update `t` with the user on the leg `m` meters from its source.
    fn step(
        t: &mut PoiTracker,
        m: f64,
        travel_bearing: f64,
        now: Instant,
        can_announce: bool,
    ) -> Option<GuidanceEvent> {
        let here = along(m);
        let fix = PoiFix {
            snapped: &here,
            user: &here,
            travel_bearing,
            distance_from_source: m,
            distance_to_target: LEG_M - m,
        };
        t.update(&fix, &NavigatorConstants::default(), now, can_announce)
    }

    #[test]
    fn test_approach_then_leave_once() {
        let t0 = Instant::now();
        let mut t = tracker();

        assert!(step(&mut t, 12.0, 90.0, t0, true).is_none());

        let ev = step(&mut t, 19.0, 90.0, t0 + Duration::from_secs(5), true).expect("approach");
        match ev {
            GuidanceEvent::UserIsApproachingToPoi { poi } => {
                assert_eq!(poi.poi_id, "p");
                assert_eq!(poi.side, PoiSide::Left);
                assert_eq!(poi.name.as_deref(), Some("Kiosk"));
                assert_eq!(poi.roles, PoiRoles::default());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(t.state().approached);

        // Still close: nothing new
        assert!(step(&mut t, 21.0, 90.0, t0, true).is_none());

        let ev = step(&mut t, 28.0, 90.0, t0, true);
        assert!(matches!(ev, Some(GuidanceEvent::UserIsLeavingFromPoi { .. })));
        assert!(t.state().left);

        // Terminal
        assert!(step(&mut t, 39.0, 90.0, t0, true).is_none());
        assert!(step(&mut t, 19.0, 90.0, t0, true).is_none());
    }

    #[test]
    fn test_interval_gate_defers_approach() {
        let t0 = Instant::now();
        let mut t = tracker();
        assert!(step(&mut t, 19.0, 90.0, t0, false).is_none());
        assert!(!t.state().approached);
        assert!(step(&mut t, 19.5, 90.0, t0, true).is_some());
    }

    #[test]
    fn test_sector_blocks_wrong_direction() {
        let poi_at = along(20.0).offset(3.0, 0.0);
        // Faces west: only announced to users walking east
        let mut t = tracker_for(Poi::new("door", PoiCategory::Door, poi_at).with_sector(270.0, 45.0));
        assert!(step(&mut t, 19.0, 270.0, Instant::now(), true).is_none());
        assert!(step(&mut t, 19.0, 90.0, Instant::now(), true).is_some());
    }

    fn tracker_for(poi: Poi) -> PoiTracker {
        with_roles(poi, PoiRoles::default())
    }

    #[test]
    fn test_metrics_recorded() {
        let mut t = tracker();
        let snapped = along(20.0);
        let user = snapped.offset(1.0, 0.0);
        let fix = PoiFix {
            snapped: &snapped,
            user: &user,
            travel_bearing: 90.0,
            distance_from_source: 20.0,
            distance_to_target: 20.0,
        };
        t.update(&fix, &NavigatorConstants::default(), Instant::now(), true);
        let m = t.metrics().unwrap();
        assert!((m.distance_from_snapped - 3.0).abs() < 0.01);
        assert!((m.distance_from_user - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_before_start_only_at_set_off() {
        let roles = PoiRoles {
            for_before_start: true,
            ..PoiRoles::default()
        };
        let poi = Poi::new("gate", PoiCategory::Info, along(2.0).offset(1.0, 0.0));

        let mut t = with_roles(poi.clone(), roles);
        let ev = step(&mut t, 1.0, 90.0, Instant::now(), true);
        match ev {
            Some(GuidanceEvent::UserIsApproachingToPoi { poi }) => {
                assert!(poi.roles.for_before_start);
            }
            other => panic!("unexpected {other:?}"),
        }
        // No leaving notice for start information
        assert!(step(&mut t, 30.0, 90.0, Instant::now(), true).is_none());
        assert!(!t.state().left);

        // Joined the leg past its start: never announced
        let mut late = with_roles(poi, roles);
        assert!(step(&mut late, 4.0, 90.0, Instant::now(), true).is_none());
        assert!(step(&mut late, 5.0, 90.0, Instant::now(), true).is_none());
    }

    #[test]
    fn test_before_end_with_target_approach() {
        let roles = PoiRoles {
            for_before_end: true,
            is_destination: true,
            ..PoiRoles::default()
        };
        let poi = Poi::new("exit", PoiCategory::Info, along(LEG_M).offset(1.0, 0.0));
        let mut t = with_roles(poi, roles);

        assert!(step(&mut t, 30.0, 90.0, Instant::now(), true).is_none());
        match step(&mut t, 35.0, 90.0, Instant::now(), true) {
            Some(GuidanceEvent::UserIsApproachingToPoi { poi }) => {
                assert!(poi.roles.is_destination);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_floor_poi_at_close_range() {
        let roles = PoiRoles {
            for_floor: true,
            ..PoiRoles::default()
        };
        let poi = Poi::new("floor", PoiCategory::Floor, along(20.0).offset(1.5, 0.0));
        let mut t = with_roles(poi, roles);

        // Inside the announce distance but beyond the floor distance
        assert!(step(&mut t, 17.0, 90.0, Instant::now(), true).is_none());
        assert!(step(&mut t, 20.0, 90.0, Instant::now(), true).is_some());
    }

    #[test]
    fn test_sign_needs_user_in_front() {
        let roles = PoiRoles {
            for_sign: true,
            ..PoiRoles::default()
        };
        // Faces west toward users walking east
        let poi = Poi::new("board", PoiCategory::Sign, along(20.0).offset(1.0, 0.0))
            .with_sector(270.0, 45.0);

        let mut passed = with_roles(poi.clone(), roles);
        assert!(step(&mut passed, 22.0, 90.0, Instant::now(), true).is_none());

        let mut t = with_roles(poi, roles);
        assert!(step(&mut t, 17.0, 90.0, Instant::now(), true).is_some());
        assert!(step(&mut t, 35.0, 90.0, Instant::now(), true).is_none());
        assert!(!t.state().left);
    }

    #[test]
    fn test_corner_ignores_sector() {
        let roles = PoiRoles {
            for_corner: true,
            ..PoiRoles::default()
        };
        let poi = Poi::new("corner", PoiCategory::CornerEnd, along(20.0).offset(2.0, 0.0))
            .with_sector(270.0, 45.0);
        let mut t = with_roles(poi, roles);
        assert!(step(&mut t, 21.0, 270.0, Instant::now(), true).is_some());
    }

    #[test]
    fn test_user_action_skips_interval() {
        let roles = PoiRoles {
            requires_user_action: true,
            ..PoiRoles::default()
        };
        let poi = Poi::new("door", PoiCategory::Door, along(20.0).offset(2.0, 0.0));
        let mut t = with_roles(poi, roles);
        assert!(step(&mut t, 19.0, 90.0, Instant::now(), false).is_some());
    }
}
