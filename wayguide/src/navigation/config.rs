//! Tuning constants for the live guidance evaluator.
//!
//! Every threshold the trackers consult lives in [`NavigatorConstants`].
//! Defaults match field-tested values; any of them may be overridden from
//! the `[navigation]` section of an INI file.
//!
//! # Example Configuration (INI)
//!
//! ```ini
//! [navigation]
//! off_route_threshold = 8
//! approaching_distance_threshold = 5
//! repeat_action_interval = 20
//! ```
//!
//! Distances are meters, angles degrees, intervals seconds.

use std::path::Path;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::warn;

/// INI section holding navigation overrides.
pub const NAVIGATION_SECTION: &str = "navigation";

/// Errors loading or validating constants.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("Failed to read config file: {0}")]
    Read(#[from] ini::Error),

    /// Failed to parse INI text
    #[error("Failed to parse config: {0}")]
    Parse(#[from] ini::ParseError),

    /// A value could not be parsed or is out of range
    #[error("Invalid configuration: {key} = '{value}' - {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// Values are individually valid but inconsistent
    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// Thresholds and intervals for the live guidance evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigatorConstants {
    // ─── Remaining distance ──────────────────────────────────────────────────
    /// Remaining-distance notices are suppressed this far into a leg.
    pub prevent_remaining_distance_first_meters: f64,
    /// Remaining-distance notices fire at multiples of this distance.
    pub remaining_distance_interval: f64,

    // ─── Target approach ─────────────────────────────────────────────────────
    pub approaching_distance_threshold: f64,
    /// Legs shorter than this get no approach announcement.
    pub no_approaching_distance_threshold: f64,
    /// The final target counts as reached within this distance.
    pub approached_distance_threshold: f64,
    /// The target must lie within this angle of the leg's final bearing.
    pub approaching_bearing_limit: f64,
    /// Turn instructions fire within this distance of the turn.
    pub no_and_turn_distance_threshold: f64,
    pub repeat_action_interval: Duration,

    // ─── Route shaping ───────────────────────────────────────────────────────
    /// A first leg shorter than this is dropped.
    pub ignore_first_link_length_threshold: f64,
    /// A last leg shorter than this is dropped.
    pub ignore_last_link_length_threshold: f64,

    // ─── POIs ────────────────────────────────────────────────────────────────
    pub poi_announce_distance: f64,
    /// POIs this close to a leg's source are announced as the user sets off.
    pub poi_start_info_distance_threshold: f64,
    /// Floor and elevator POIs are announced within this distance of the user.
    pub poi_floor_distance_threshold: f64,
    /// POIs this close to a leg's target are announced with the approach.
    pub poi_target_distance_threshold: f64,
    /// Extra distance past the announce distance before a POI is "left".
    pub poi_end_info_distance_threshold: f64,
    /// POIs farther than this from a leg are not attached to it.
    pub poi_distance_min_threshold: f64,
    pub poi_announce_min_interval: Duration,

    // ─── Start ───────────────────────────────────────────────────────────────
    pub navigation_start_caution_distance_limit: f64,
    pub navigation_start_distance_limit: f64,

    // ─── Off route ───────────────────────────────────────────────────────────
    pub off_route_threshold: f64,
    /// Search radius for an alternate, non-route link while off route.
    pub off_route_ext_link_threshold: f64,
    pub reroute_distance_threshold: f64,
    pub off_route_announce_min_interval: Duration,
    /// Upcoming legs considered when the user skips ahead.
    pub num_of_links_to_check: usize,
    pub off_route_bearing_threshold: f64,

    // ─── Heading ─────────────────────────────────────────────────────────────
    pub change_heading_threshold: f64,
    /// Hysteresis margin below `change_heading_threshold` for "adjusted".
    pub adjust_heading_margin: f64,

    // ─── Backward ────────────────────────────────────────────────────────────
    pub back_detection_threshold: f64,
    pub back_detection_heading_threshold: f64,
    pub back_announce_min_interval: Duration,

    // ─── Floors ──────────────────────────────────────────────────────────────
    /// Floor values further than this from an integer are mid-transition.
    pub floor_diff_threshold: f64,
}

impl Default for NavigatorConstants {
    fn default() -> Self {
        Self {
            prevent_remaining_distance_first_meters: 7.0,
            remaining_distance_interval: 10.0,
            approaching_distance_threshold: 6.0,
            no_approaching_distance_threshold: 8.0,
            approached_distance_threshold: 1.0,
            approaching_bearing_limit: 95.0,
            no_and_turn_distance_threshold: 2.0,
            repeat_action_interval: Duration::from_secs(15),
            ignore_first_link_length_threshold: 3.0,
            ignore_last_link_length_threshold: 2.0,
            poi_announce_distance: 5.0,
            poi_start_info_distance_threshold: 3.0,
            poi_floor_distance_threshold: 2.0,
            poi_target_distance_threshold: 2.0,
            poi_end_info_distance_threshold: 3.0,
            poi_distance_min_threshold: 5.0,
            poi_announce_min_interval: Duration::from_secs(20),
            navigation_start_caution_distance_limit: 3.0,
            navigation_start_distance_limit: 10.0,
            off_route_threshold: 5.0,
            off_route_ext_link_threshold: 5.0,
            reroute_distance_threshold: 10.0,
            off_route_announce_min_interval: Duration::from_secs(10),
            num_of_links_to_check: 3,
            off_route_bearing_threshold: 45.0,
            change_heading_threshold: 30.0,
            adjust_heading_margin: 15.0,
            back_detection_threshold: 2.0,
            back_detection_heading_threshold: 120.0,
            back_announce_min_interval: Duration::from_secs(20),
            floor_diff_threshold: 0.1,
        }
    }
}

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_non_negative(key: &str, value: &str) -> Result<f64, ConfigError> {
    let v: f64 = value
        .trim()
        .parse()
        .map_err(|_| invalid(key, value, "expected a number"))?;
    if !v.is_finite() || v < 0.0 {
        return Err(invalid(key, value, "must be a non-negative number"));
    }
    Ok(v)
}

fn parse_angle(key: &str, value: &str) -> Result<f64, ConfigError> {
    let v = parse_non_negative(key, value)?;
    if v > 180.0 {
        return Err(invalid(key, value, "angle must be within 0-180 degrees"));
    }
    Ok(v)
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let v = parse_non_negative(key, value)?;
    Duration::try_from_secs_f64(v).map_err(|_| invalid(key, value, "interval out of range"))
}

impl NavigatorConstants {
    /// Defaults overlaid with the `[navigation]` section of `text`.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text)?;
        Self::from_ini(&ini)
    }

    /// Defaults overlaid with the `[navigation]` section of the file.
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    /// Defaults overlaid with the `[navigation]` section of `ini`.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut c = Self::default();
        let Some(section) = ini.section(Some(NAVIGATION_SECTION)) else {
            return Ok(c);
        };

        for (key, value) in section.iter() {
            match key {
                "prevent_remaining_distance_first_meters" => {
                    c.prevent_remaining_distance_first_meters = parse_non_negative(key, value)?
                }
                "remaining_distance_interval" => {
                    c.remaining_distance_interval = parse_non_negative(key, value)?
                }
                "approaching_distance_threshold" => {
                    c.approaching_distance_threshold = parse_non_negative(key, value)?
                }
                "no_approaching_distance_threshold" => {
                    c.no_approaching_distance_threshold = parse_non_negative(key, value)?
                }
                "approached_distance_threshold" => {
                    c.approached_distance_threshold = parse_non_negative(key, value)?
                }
                "approaching_bearing_limit" => c.approaching_bearing_limit = parse_angle(key, value)?,
                "no_and_turn_distance_threshold" => {
                    c.no_and_turn_distance_threshold = parse_non_negative(key, value)?
                }
                "repeat_action_interval" => c.repeat_action_interval = parse_seconds(key, value)?,
                "ignore_first_link_length_threshold" => {
                    c.ignore_first_link_length_threshold = parse_non_negative(key, value)?
                }
                "ignore_last_link_length_threshold" => {
                    c.ignore_last_link_length_threshold = parse_non_negative(key, value)?
                }
                "poi_announce_distance" => c.poi_announce_distance = parse_non_negative(key, value)?,
                "poi_start_info_distance_threshold" => {
                    c.poi_start_info_distance_threshold = parse_non_negative(key, value)?
                }
                "poi_floor_distance_threshold" => {
                    c.poi_floor_distance_threshold = parse_non_negative(key, value)?
                }
                "poi_target_distance_threshold" => {
                    c.poi_target_distance_threshold = parse_non_negative(key, value)?
                }
                "poi_end_info_distance_threshold" => {
                    c.poi_end_info_distance_threshold = parse_non_negative(key, value)?
                }
                "poi_distance_min_threshold" => {
                    c.poi_distance_min_threshold = parse_non_negative(key, value)?
                }
                "poi_announce_min_interval" => {
                    c.poi_announce_min_interval = parse_seconds(key, value)?
                }
                "navigation_start_caution_distance_limit" => {
                    c.navigation_start_caution_distance_limit = parse_non_negative(key, value)?
                }
                "navigation_start_distance_limit" => {
                    c.navigation_start_distance_limit = parse_non_negative(key, value)?
                }
                "off_route_threshold" => c.off_route_threshold = parse_non_negative(key, value)?,
                "off_route_ext_link_threshold" => {
                    c.off_route_ext_link_threshold = parse_non_negative(key, value)?
                }
                "reroute_distance_threshold" => {
                    c.reroute_distance_threshold = parse_non_negative(key, value)?
                }
                "off_route_announce_min_interval" => {
                    c.off_route_announce_min_interval = parse_seconds(key, value)?
                }
                "num_of_links_to_check" => {
                    c.num_of_links_to_check = value
                        .trim()
                        .parse()
                        .map_err(|_| invalid(key, value, "expected a whole number"))?
                }
                "off_route_bearing_threshold" => {
                    c.off_route_bearing_threshold = parse_angle(key, value)?
                }
                "change_heading_threshold" => c.change_heading_threshold = parse_angle(key, value)?,
                "adjust_heading_margin" => c.adjust_heading_margin = parse_angle(key, value)?,
                "back_detection_threshold" => {
                    c.back_detection_threshold = parse_non_negative(key, value)?
                }
                "back_detection_heading_threshold" => {
                    c.back_detection_heading_threshold = parse_angle(key, value)?
                }
                "back_announce_min_interval" => {
                    c.back_announce_min_interval = parse_seconds(key, value)?
                }
                "floor_diff_threshold" => c.floor_diff_threshold = parse_non_negative(key, value)?,
                _ => warn!(key, "Unknown navigation setting ignored"),
            }
        }

        c.validate()?;
        Ok(c)
    }

    /// Check relationships between thresholds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remaining_distance_interval <= 0.0 {
            return Err(ConfigError::Inconsistent(
                "remaining_distance_interval must be positive".into(),
            ));
        }
        if self.approached_distance_threshold >= self.approaching_distance_threshold {
            return Err(ConfigError::Inconsistent(
                "approached_distance_threshold must be below approaching_distance_threshold"
                    .into(),
            ));
        }
        if self.poi_start_info_distance_threshold > self.poi_announce_distance {
            return Err(ConfigError::Inconsistent(
                "poi_start_info_distance_threshold must not exceed poi_announce_distance".into(),
            ));
        }
        if self.poi_floor_distance_threshold > self.poi_announce_distance {
            return Err(ConfigError::Inconsistent(
                "poi_floor_distance_threshold must not exceed poi_announce_distance".into(),
            ));
        }
        if self.poi_target_distance_threshold >= self.approaching_distance_threshold {
            return Err(ConfigError::Inconsistent(
                "poi_target_distance_threshold must be below approaching_distance_threshold".into(),
            ));
        }
        if self.navigation_start_caution_distance_limit > self.navigation_start_distance_limit {
            return Err(ConfigError::Inconsistent(
                "navigation_start_caution_distance_limit must not exceed navigation_start_distance_limit"
                    .into(),
            ));
        }
        if self.adjust_heading_margin >= self.change_heading_threshold {
            return Err(ConfigError::Inconsistent(
                "adjust_heading_margin must be below change_heading_threshold".into(),
            ));
        }
        if self.off_route_bearing_threshold >= self.back_detection_heading_threshold {
            return Err(ConfigError::Inconsistent(
                "off_route_bearing_threshold must be below back_detection_heading_threshold".into(),
            ));
        }
        if self.num_of_links_to_check == 0 {
            return Err(ConfigError::Inconsistent(
                "num_of_links_to_check must be at least 1".into(),
            ));
        }
        if !(self.floor_diff_threshold > 0.0 && self.floor_diff_threshold < 0.5) {
            return Err(ConfigError::Inconsistent(
                "floor_diff_threshold must be within (0, 0.5)".into(),
            ));
        }
        Ok(())
    }

    /// The constants as an INI document with a `[navigation]` section.
    pub fn to_ini(&self) -> Ini {
        let secs = |d: Duration| d.as_secs_f64().to_string();
        let mut ini = Ini::new();
        ini.with_section(Some(NAVIGATION_SECTION))
            .set(
                "prevent_remaining_distance_first_meters",
                self.prevent_remaining_distance_first_meters.to_string(),
            )
            .set(
                "remaining_distance_interval",
                self.remaining_distance_interval.to_string(),
            )
            .set(
                "approaching_distance_threshold",
                self.approaching_distance_threshold.to_string(),
            )
            .set(
                "no_approaching_distance_threshold",
                self.no_approaching_distance_threshold.to_string(),
            )
            .set(
                "approached_distance_threshold",
                self.approached_distance_threshold.to_string(),
            )
            .set(
                "approaching_bearing_limit",
                self.approaching_bearing_limit.to_string(),
            )
            .set(
                "no_and_turn_distance_threshold",
                self.no_and_turn_distance_threshold.to_string(),
            )
            .set("repeat_action_interval", secs(self.repeat_action_interval))
            .set(
                "ignore_first_link_length_threshold",
                self.ignore_first_link_length_threshold.to_string(),
            )
            .set(
                "ignore_last_link_length_threshold",
                self.ignore_last_link_length_threshold.to_string(),
            )
            .set("poi_announce_distance", self.poi_announce_distance.to_string())
            .set(
                "poi_start_info_distance_threshold",
                self.poi_start_info_distance_threshold.to_string(),
            )
            .set(
                "poi_floor_distance_threshold",
                self.poi_floor_distance_threshold.to_string(),
            )
            .set(
                "poi_target_distance_threshold",
                self.poi_target_distance_threshold.to_string(),
            )
            .set(
                "poi_end_info_distance_threshold",
                self.poi_end_info_distance_threshold.to_string(),
            )
            .set(
                "poi_distance_min_threshold",
                self.poi_distance_min_threshold.to_string(),
            )
            .set(
                "poi_announce_min_interval",
                secs(self.poi_announce_min_interval),
            )
            .set(
                "navigation_start_caution_distance_limit",
                self.navigation_start_caution_distance_limit.to_string(),
            )
            .set(
                "navigation_start_distance_limit",
                self.navigation_start_distance_limit.to_string(),
            )
            .set("off_route_threshold", self.off_route_threshold.to_string())
            .set(
                "off_route_ext_link_threshold",
                self.off_route_ext_link_threshold.to_string(),
            )
            .set(
                "reroute_distance_threshold",
                self.reroute_distance_threshold.to_string(),
            )
            .set(
                "off_route_announce_min_interval",
                secs(self.off_route_announce_min_interval),
            )
            .set("num_of_links_to_check", self.num_of_links_to_check.to_string())
            .set(
                "off_route_bearing_threshold",
                self.off_route_bearing_threshold.to_string(),
            )
            .set(
                "change_heading_threshold",
                self.change_heading_threshold.to_string(),
            )
            .set("adjust_heading_margin", self.adjust_heading_margin.to_string())
            .set(
                "back_detection_threshold",
                self.back_detection_threshold.to_string(),
            )
            .set(
                "back_detection_heading_threshold",
                self.back_detection_heading_threshold.to_string(),
            )
            .set(
                "back_announce_min_interval",
                secs(self.back_announce_min_interval),
            )
            .set("floor_diff_threshold", self.floor_diff_threshold.to_string());
        ini
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        NavigatorConstants::default().validate().unwrap();
    }

    #[test]
    fn test_overlay_from_str() {
        let c = NavigatorConstants::from_ini_str(
            "[navigation]\noff_route_threshold = 8\nrepeat_action_interval = 2.5\nnum_of_links_to_check = 5\n",
        )
        .unwrap();
        assert_eq!(c.off_route_threshold, 8.0);
        assert_eq!(c.repeat_action_interval, Duration::from_millis(2500));
        assert_eq!(c.num_of_links_to_check, 5);
        // Untouched keys keep defaults
        assert_eq!(c.approaching_distance_threshold, 6.0);
    }

    #[test]
    fn test_missing_section_yields_defaults() {
        let c = NavigatorConstants::from_ini_str("[other]\nx = 1\n").unwrap();
        assert_eq!(c, NavigatorConstants::default());
    }

    #[test]
    fn test_invalid_value() {
        let err = NavigatorConstants::from_ini_str("[navigation]\noff_route_threshold = far\n")
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value, .. } => {
                assert_eq!(key, "off_route_threshold");
                assert_eq!(value, "far");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = NavigatorConstants::from_ini_str("[navigation]\nchange_heading_threshold = 200\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_interval_out_of_range() {
        let err = NavigatorConstants::from_ini_str("[navigation]\nrepeat_action_interval = 1e20\n")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "repeat_action_interval"
        ));
    }

    #[test]
    fn test_inconsistent_thresholds() {
        let err = NavigatorConstants::from_ini_str(
            "[navigation]\napproached_distance_threshold = 7\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Inconsistent(_)));
    }

    #[test]
    fn test_poi_role_thresholds() {
        let c = NavigatorConstants::from_ini_str(
            "[navigation]\npoi_start_info_distance_threshold = 4\nno_approaching_distance_threshold = 12\n",
        )
        .unwrap();
        assert_eq!(c.poi_start_info_distance_threshold, 4.0);
        assert_eq!(c.no_approaching_distance_threshold, 12.0);

        let err =
            NavigatorConstants::from_ini_str("[navigation]\npoi_floor_distance_threshold = 9\n")
                .unwrap_err();
        assert!(matches!(err, ConfigError::Inconsistent(_)));

        let err =
            NavigatorConstants::from_ini_str("[navigation]\npoi_target_distance_threshold = 6\n")
                .unwrap_err();
        assert!(matches!(err, ConfigError::Inconsistent(_)));
    }

    #[test]
    fn test_roundtrip_through_file() {
        let mut custom = NavigatorConstants::default();
        custom.off_route_threshold = 7.5;
        custom.poi_target_distance_threshold = 1.5;
        custom.back_announce_min_interval = Duration::from_secs(30);

        let mut buf = Vec::new();
        custom.to_ini().write_to(&mut buf).unwrap();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&buf).unwrap();

        let loaded = NavigatorConstants::from_ini_file(file.path()).unwrap();
        assert_eq!(loaded, custom);
    }
}
