//! Per-device zone tracking

use crate::core::sync::handle_mutex_poison;
use crate::zones::region::{movement_score, ZoneMap, UNKNOWN_ZONE};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

pub const DEFAULT_MOVEMENT_WINDOW: usize = 10;
/// Most RSSI samples kept per device for the movement score
pub const MAX_MOVEMENT_WINDOW: usize = 10;
const ZONE_HISTORY_DEPTH: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneState {
    pub rssi_history: VecDeque<i16>,
    pub zone_history: VecDeque<String>,
    pub last_update: DateTime<Utc>,
}

impl ZoneState {
    pub fn current_zone(&self) -> Option<&str> {
        self.zone_history.back().map(String::as_str)
    }
}

/// Result of classifying one reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneReading {
    pub zone: String,
    pub movement: f64,
}

/// Keeps ZoneState for every device seen; entries are never removed
pub struct ZoneTracker {
    map: ZoneMap,
    window: usize,
    states: Mutex<HashMap<String, ZoneState>>,
}

impl ZoneTracker {
    pub fn new(map: ZoneMap, movement_window: usize) -> Self {
        Self {
            map,
            window: movement_window.clamp(2, MAX_MOVEMENT_WINDOW),
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn zone_map(&self) -> &ZoneMap {
        &self.map
    }

    /// Record a reading and classify the device's zone
    pub fn observe(&self, address: &str, rssi: i16, now: DateTime<Utc>) -> ZoneReading {
        let mut states = match handle_mutex_poison(self.states.lock(), |m| m) {
            Ok(states) => states,
            Err(message) => {
                log::warn!("Zone tracker unavailable: {}", message);
                return ZoneReading {
                    zone: UNKNOWN_ZONE.to_string(),
                    movement: 0.0,
                };
            }
        };

        let state = states.entry(address.to_string()).or_insert_with(|| ZoneState {
            rssi_history: VecDeque::with_capacity(self.window),
            zone_history: VecDeque::with_capacity(ZONE_HISTORY_DEPTH),
            last_update: now,
        });

        state.rssi_history.push_back(rssi);
        while state.rssi_history.len() > self.window {
            state.rssi_history.pop_front();
        }

        let samples: Vec<i16> = state.rssi_history.iter().copied().collect();
        let movement = movement_score(&samples);
        let zone = self.map.classify(f64::from(rssi), movement).to_string();

        state.zone_history.push_back(zone.clone());
        while state.zone_history.len() > ZONE_HISTORY_DEPTH {
            state.zone_history.pop_front();
        }
        state.last_update = now;

        log::trace!("{} rssi={} movement={:.2} -> {}", address, rssi, movement, zone);
        ZoneReading { zone, movement }
    }

    pub fn state(&self, address: &str) -> Option<ZoneState> {
        self.states.lock().ok()?.get(address).cloned()
    }

    /// Device count per zone by current zone, every configured zone included
    pub fn statistics(&self) -> BTreeMap<String, usize> {
        let mut stats: BTreeMap<String, usize> = self
            .map
            .regions()
            .iter()
            .map(|region| (region.name.clone(), 0))
            .collect();
        stats.insert(UNKNOWN_ZONE.to_string(), 0);

        if let Ok(states) = self.states.lock() {
            for state in states.values() {
                if let Some(zone) = state.current_zone() {
                    *stats.entry(zone.to_string()).or_insert(0) += 1;
                }
            }
        }
        stats
    }
}

impl Default for ZoneTracker {
    fn default() -> Self {
        Self::new(ZoneMap::default(), DEFAULT_MOVEMENT_WINDOW)
    }
}
