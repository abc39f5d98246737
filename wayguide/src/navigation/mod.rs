//! Live guidance.
//!
//! The [`Navigator`] tracks a user walking a resolved route and emits
//! [`GuidanceEvent`]s. Work is split into layers:
//!
//! - [`NavigationPlan`]: the route grouped into legs with their POIs
//! - [`LinkProgress`]: per-leg hysteresis state (heading, approach, turns,
//!   off-route excursions, backward walking, remaining distance)
//! - [`PoiTracker`]: per-POI approach/leave state within a leg
//!
//! All thresholds live in [`NavigatorConstants`], which can be loaded from
//! the `[navigation]` section of an INI file.

mod config;
mod events;
mod link_tracker;
mod navigator;
mod plan;
mod poi_tracker;

pub use config::{ConfigError, NavigatorConstants, NAVIGATION_SECTION};
pub use events::{
    FnSink, GuidanceEvent, GuidanceSink, OffRouteAlternate, PoiNotice, PoiRoles, PoiSide,
    StartFailure,
};
pub use link_tracker::{
    LinkFlags, LinkMetrics, LinkProgress, LinkProgressState, OffRoute, TrackerContext,
    FLOOR_HEIGHT_M,
};
pub use navigator::{NavigationPhase, Navigator};
pub use plan::{Leg, LegPoi, NavigationPlan};
pub use poi_tracker::{PoiFix, PoiMetrics, PoiState, PoiTracker};
