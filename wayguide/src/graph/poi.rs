//! Points of interest anchored along links.

use serde::{Deserialize, Serialize};

use crate::geo::{angle_difference, Location};

/// What a POI describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiCategory {
    Info,
    Floor,
    CornerEnd,
    CornerWarningBlock,
    CornerLandmark,
    Elevator,
    ElevatorEquipments,
    Door,
    Obstacle,
    Sign,
}

/// Announcement flags carried by a POI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoiFlags {
    pub caution: bool,
    pub onomastic: bool,
    pub singular: bool,
    pub plural: bool,
    pub auto: bool,
    pub welcome: bool,
}

impl PoiFlags {
    /// Parse a free-form flag list such as `"caution, plural"` or
    /// `"_flag_caution_ _flag_welcome_"`. Unknown tokens are ignored.
    pub fn parse(s: &str) -> Self {
        let mut flags = PoiFlags::default();
        for token in s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let name = token.trim_matches('_');
            let name = name.strip_prefix("flag_").unwrap_or(name);
            match name {
                "caution" => flags.caution = true,
                "onomastic" => flags.onomastic = true,
                "singular" => flags.singular = true,
                "plural" => flags.plural = true,
                "auto" => flags.auto = true,
                "welcome" => flags.welcome = true,
                _ => {}
            }
        }
        flags
    }
}

/// Elevator call-button layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevatorButtons {
    pub button_left: bool,
    pub button_left_braille: bool,
    pub button_right: bool,
    pub button_right_braille: bool,
    pub button_middle: bool,
    pub button_middle_braille: bool,
    pub flag_lower: bool,
}

/// Elevator cabin equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevatorEquipments {
    pub button_left: bool,
    pub button_left_braille: bool,
    pub button_right: bool,
    pub button_right_braille: bool,
    pub voice_guide: bool,
    pub button_wc_left: bool,
    pub button_wc_left_braille: bool,
    pub button_wc_right: bool,
    pub button_wc_right_braille: bool,
}

fn default_angle() -> f64 {
    180.0
}

/// A point of interest.
///
/// `heading` is the direction the POI faces and `angle` the half-width of
/// the sector from which it is announced (180 = from everywhere).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub id: String,
    pub category: PoiCategory,
    pub location: Location,
    #[serde(default)]
    pub heading: f64,
    #[serde(default = "default_angle")]
    pub angle: f64,
    #[serde(default)]
    pub flags: PoiFlags,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub elevator_buttons: Option<ElevatorButtons>,
    #[serde(default)]
    pub elevator_equipments: Option<ElevatorEquipments>,
}

impl Poi {
    pub fn new(id: impl Into<String>, category: PoiCategory, location: Location) -> Self {
        Self {
            id: id.into(),
            category,
            location,
            heading: 0.0,
            angle: default_angle(),
            flags: PoiFlags::default(),
            name: None,
            long_description: None,
            elevator_buttons: None,
            elevator_equipments: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_sector(mut self, heading: f64, angle: f64) -> Self {
        self.heading = heading;
        self.angle = angle;
        self
    }

    pub fn with_flags(mut self, flags: PoiFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Whether the user at `location` stands inside the POI's sector.
    pub fn is_on_front(&self, location: &Location) -> bool {
        if self.angle >= 180.0 {
            return true;
        }
        let to_user = self.location.bearing_to(location);
        angle_difference(to_user, self.heading).abs() <= self.angle
    }

    /// Whether the user at `location` passes beside the POI.
    pub fn is_on_side(&self, location: &Location) -> bool {
        let to_user = self.location.bearing_to(location);
        let diff = angle_difference(to_user, self.heading).abs();
        (diff - 90.0).abs() <= self.angle.min(90.0)
    }

    /// Whether travelling on `travel_bearing` approaches the POI from within
    /// its sector.
    pub fn is_facing(&self, travel_bearing: f64) -> bool {
        if self.angle >= 180.0 {
            return true;
        }
        // The user walks toward the POI's face, i.e. against its heading.
        angle_difference(travel_bearing + 180.0, self.heading).abs() <= self.angle
    }

    /// Whether the POI is on the same floor as `location`.
    pub fn is_on_floor_of(&self, location: &Location) -> bool {
        (self.location.floor() - location.floor()).abs() < 0.5
    }
}
