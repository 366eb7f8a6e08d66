//! Public API for zone classification

pub use crate::zones::error::{ZoneError, ZoneResult};
pub use crate::zones::region::{
    default_regions, movement_score, ZoneMap, ZoneRegion, UNKNOWN_ZONE,
};
pub use crate::zones::tracker::{
    ZoneReading, ZoneState, ZoneTracker, DEFAULT_MOVEMENT_WINDOW, MAX_MOVEMENT_WINDOW,
};
