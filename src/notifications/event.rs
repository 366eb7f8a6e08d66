//! Events distributed to consumers

use crate::decoder::{Eddystone, IBeacon};
use crate::registry::api::{normalize_address, DeviceCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One processed observation, cloned by value to every consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub address: String,
    pub name: Option<String>,
    pub rssi: i16,
    pub ibeacon: Option<IBeacon>,
    pub eddystone: Option<Eddystone>,
    /// Reserved for direction finding; not produced by any backend yet
    pub angle: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub vendor: Option<String>,
    pub category: DeviceCategory,
    pub zone: Option<String>,
}

impl DecodedEvent {
    pub fn new(address: impl Into<String>, rssi: i16, timestamp: DateTime<Utc>) -> Self {
        Self {
            address: address.into(),
            name: None,
            rssi,
            ibeacon: None,
            eddystone: None,
            angle: None,
            timestamp,
            vendor: None,
            category: DeviceCategory::Unknown,
            zone: None,
        }
    }

    pub fn is_beacon(&self) -> bool {
        self.ibeacon.is_some() || self.eddystone.is_some()
    }

    /// Compact JSON form used by outward publishers
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Which events a subscriber wants to receive
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    All,
    BeaconsOnly,
    /// Events at or above this signal strength
    MinRssi(i16),
    /// Events for one device, any address notation
    Address(String),
}

impl EventFilter {
    pub fn accepts(&self, event: &DecodedEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::BeaconsOnly => event.is_beacon(),
            EventFilter::MinRssi(min) => event.rssi >= *min,
            EventFilter::Address(address) => {
                let wanted = normalize_address(address);
                let actual = normalize_address(&event.address);
                match (wanted, actual) {
                    (Some(wanted), Some(actual)) => wanted == actual,
                    _ => address.eq_ignore_ascii_case(&event.address),
                }
            }
        }
    }
}
