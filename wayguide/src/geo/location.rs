//! Position/orientation fixes as delivered by the localization provider.

use serde::{Deserialize, Serialize};

use super::{
    bearing, destination, distance, fast_distance, nearest_point_on_segment, normalize_heading,
};

/// Coarse status reported by the localization provider alongside fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationStatus {
    /// Fixes are reliable.
    Stable,
    /// The provider is converging; fixes are usable but noisy.
    Locating,
    /// Signal lost - fixes must not drive guidance.
    Lost,
    /// App in background - fixes must not drive guidance.
    Background,
    /// No status reported yet.
    #[default]
    Unknown,
}

impl LocationStatus {
    /// Whether fixes delivered under this status may be evaluated.
    pub fn accepts_fixes(&self) -> bool {
        !matches!(self, LocationStatus::Lost | LocationStatus::Background)
    }

    /// Human-readable name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationStatus::Stable => "stable",
            LocationStatus::Locating => "locating",
            LocationStatus::Lost => "lost",
            LocationStatus::Background => "background",
            LocationStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for LocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wire form of a location; orientation is normalized on conversion.
#[derive(Debug, Clone, Copy, Deserialize)]
struct LocationRecord {
    lat: f64,
    lng: f64,
    #[serde(default)]
    accuracy: f64,
    #[serde(default)]
    floor: f64,
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    orientation: f64,
    #[serde(default)]
    orientation_accuracy: f64,
}

impl From<LocationRecord> for Location {
    fn from(r: LocationRecord) -> Self {
        Location {
            lat: r.lat,
            lng: r.lng,
            accuracy: r.accuracy,
            floor: r.floor,
            speed: r.speed,
            orientation: normalize_heading(r.orientation),
            orientation_accuracy: r.orientation_accuracy,
        }
    }
}

/// An immutable position/orientation snapshot.
///
/// Orientation is always held in `[0, 360)`. Derived locations (snapped,
/// offset) are new values; nothing mutates a location in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "LocationRecord")]
pub struct Location {
    lat: f64,
    lng: f64,
    accuracy: f64,
    floor: f64,
    speed: f64,
    orientation: f64,
    orientation_accuracy: f64,
}

impl Location {
    /// Create a location on floor 0 with no orientation.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self::with_floor(lat, lng, 0.0)
    }

    /// Create a location on the given floor.
    pub fn with_floor(lat: f64, lng: f64, floor: f64) -> Self {
        Self {
            lat,
            lng,
            accuracy: 0.0,
            floor,
            speed: 0.0,
            orientation: 0.0,
            orientation_accuracy: 0.0,
        }
    }

    /// Create a fully specified fix.
    #[allow(clippy::too_many_arguments)]
    pub fn fix(
        lat: f64,
        lng: f64,
        accuracy: f64,
        floor: f64,
        speed: f64,
        orientation: f64,
        orientation_accuracy: f64,
    ) -> Self {
        Self {
            lat,
            lng,
            accuracy,
            floor,
            speed,
            orientation: normalize_heading(orientation),
            orientation_accuracy,
        }
    }

    /// Copy with a new orientation.
    pub fn with_orientation(mut self, orientation: f64) -> Self {
        self.orientation = normalize_heading(orientation);
        self
    }

    /// Copy with a new position, keeping floor and orientation.
    pub fn with_position(mut self, lat: f64, lng: f64) -> Self {
        self.lat = lat;
        self.lng = lng;
        self
    }

    /// Copy with a new accuracy radius.
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Copy with a new speed.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Compass orientation in `[0, 360)`.
    pub fn orientation(&self) -> f64 {
        self.orientation
    }

    pub fn orientation_accuracy(&self) -> f64 {
        self.orientation_accuracy
    }

    /// Whether coordinates and orientation are finite and within range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.floor.is_finite()
            && self.orientation.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Whether the floor value denotes an in-between (transition) state.
    pub fn is_floor_in_transition(&self, threshold: f64) -> bool {
        (self.floor - self.floor.round()).abs() > threshold
    }

    /// Great-circle distance to another location (meters).
    pub fn distance_to(&self, to: &Location) -> f64 {
        distance(self.lat, self.lng, to.lat, to.lng)
    }

    /// Planar approximation of [`Location::distance_to`].
    pub fn fast_distance_to(&self, to: &Location) -> f64 {
        fast_distance(self.lat, self.lng, to.lat, to.lng)
    }

    pub fn distance_to_lat_lng(&self, lat: f64, lng: f64) -> f64 {
        distance(self.lat, self.lng, lat, lng)
    }

    /// Initial bearing to another location, in `[0, 360)`.
    pub fn bearing_to(&self, to: &Location) -> f64 {
        bearing(self.lat, self.lng, to.lat, to.lng)
    }

    pub fn bearing_to_lat_lng(&self, lat: f64, lng: f64) -> f64 {
        bearing(self.lat, self.lng, lat, lng)
    }

    /// Nearest point on the segment `from`-`to`.
    ///
    /// The result keeps this location's orientation and takes its floor
    /// from the segment (interpolated between the endpoints).
    pub fn nearest_location_to_line(&self, from: &Location, to: &Location) -> Location {
        let (lat, lng, t) = nearest_point_on_segment(
            (self.lat, self.lng),
            (from.lat, from.lng),
            (to.lat, to.lng),
        );
        Location {
            lat,
            lng,
            floor: from.floor + t * (to.floor - from.floor),
            ..*self
        }
    }

    /// Perpendicular distance to the segment `from`-`to` (meters).
    pub fn distance_to_line(&self, from: &Location, to: &Location) -> f64 {
        self.distance_to(&self.nearest_location_to_line(from, to))
    }

    /// The location `distance` meters away on `bearing`, facing `bearing`.
    pub fn offset(&self, distance: f64, bearing: f64) -> Location {
        let (lat, lng) = destination(self.lat, self.lng, distance, bearing);
        Location {
            lat,
            lng,
            orientation: normalize_heading(bearing),
            ..*self
        }
    }
}
