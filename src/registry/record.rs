//! Device record and observation types

use crate::registry::category::infer_category;
use crate::registry::error::{RegistryError, RegistryResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

pub const DEFAULT_HISTORY_DEPTH: usize = 50;

#[derive(EnumIter, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceCategory {
    Smartphone,
    Wearable,
    Audio,
    IoT,
    Computer,
    #[default]
    Unknown,
}

impl DeviceCategory {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Smartphone => "Smartphone",
            Self::Wearable => "Wearable",
            Self::Audio => "Audio",
            Self::IoT => "IoT",
            Self::Computer => "Computer",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse a stored category name; unrecognised names map to `Unknown`
    pub fn from_name(name: &str) -> Self {
        Self::iter()
            .find(|category| category.name().eq_ignore_ascii_case(name))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One signal strength reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssiSample {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    pub rssi: i16,
}

/// What one scan reported about a device
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub rssi: i16,
    pub name: Option<String>,
    pub vendor: Option<String>,
    pub zone: Option<String>,
}

impl Observation {
    pub fn new(timestamp: DateTime<Utc>, rssi: i16) -> Self {
        Self {
            timestamp,
            rssi,
            name: None,
            vendor: None,
            zone: None,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_vendor(mut self, vendor: Option<String>) -> Self {
        self.vendor = vendor;
        self
    }

    pub fn with_zone(mut self, zone: Option<String>) -> Self {
        self.zone = zone;
        self
    }
}

/// Accumulated state for one device address
///
/// Fields are private so that the address never changes, `last_seen` never
/// falls behind `first_seen` and the history never exceeds its depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    address: String,
    name: Option<String>,
    vendor: Option<String>,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    rssi_history: VecDeque<RssiSample>,
    category: DeviceCategory,
    zone: Option<String>,
}

impl DeviceRecord {
    /// Record for an address seen for the first time
    pub(crate) fn first_sighting(address: String, observation: Observation) -> Self {
        let mut history = VecDeque::with_capacity(1);
        history.push_back(RssiSample {
            timestamp: observation.timestamp,
            rssi: observation.rssi,
        });

        let mut record = Self {
            address,
            name: observation.name,
            vendor: observation.vendor,
            first_seen: observation.timestamp,
            last_seen: observation.timestamp,
            rssi_history: history,
            category: DeviceCategory::Unknown,
            zone: observation.zone,
        };
        record.category = record.infer_category();
        record
    }

    /// Merge a later observation into the record
    pub(crate) fn apply(&mut self, observation: Observation, history_depth: usize) {
        if observation.timestamp > self.last_seen {
            self.last_seen = observation.timestamp;
        }
        if observation.vendor.is_some() {
            self.vendor = observation.vendor;
        }
        if observation.name.is_some() {
            self.name = observation.name;
        }
        if observation.zone.is_some() {
            self.zone = observation.zone;
        }

        self.rssi_history.push_back(RssiSample {
            timestamp: observation.timestamp,
            rssi: observation.rssi,
        });
        self.trim_history(history_depth);
        self.category = self.infer_category();
    }

    /// Rebuild a record from persisted columns, checking its invariants
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        address: String,
        name: Option<String>,
        vendor: Option<String>,
        first_seen: DateTime<Utc>,
        last_seen: DateTime<Utc>,
        rssi_history: Vec<RssiSample>,
        category: DeviceCategory,
        zone: Option<String>,
    ) -> RegistryResult<Self> {
        if last_seen < first_seen {
            return Err(RegistryError::Corrupt {
                address,
                message: "last_seen precedes first_seen".to_string(),
            });
        }

        Ok(Self {
            address,
            name,
            vendor,
            first_seen,
            last_seen,
            rssi_history: rssi_history.into(),
            category,
            zone,
        })
    }

    pub(crate) fn trim_history(&mut self, history_depth: usize) {
        while self.rssi_history.len() > history_depth.max(1) {
            self.rssi_history.pop_front();
        }
    }

    fn infer_category(&self) -> DeviceCategory {
        infer_category(
            self.name.as_deref(),
            self.vendor.as_deref(),
            self.rssi_history.iter().map(|s| s.rssi),
        )
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    pub fn first_seen(&self) -> DateTime<Utc> {
        self.first_seen
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    pub fn rssi_history(&self) -> &VecDeque<RssiSample> {
        &self.rssi_history
    }

    pub fn latest_rssi(&self) -> Option<i16> {
        self.rssi_history.back().map(|s| s.rssi)
    }

    pub fn category(&self) -> DeviceCategory {
        self.category
    }

    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }
}
