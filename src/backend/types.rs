//! Packet and capability types shared by all radio backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Physical layer a packet was received on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phy {
    #[default]
    #[serde(rename = "LE1M")]
    Le1M,
    #[serde(rename = "LE2M")]
    Le2M,
    #[serde(rename = "LECoded")]
    LeCoded,
}

impl Phy {
    pub fn name(&self) -> &'static str {
        match self {
            Phy::Le1M => "LE1M",
            Phy::Le2M => "LE2M",
            Phy::LeCoded => "LECoded",
        }
    }
}

impl fmt::Display for Phy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of features a backend can deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    /// Receives advertising channel traffic
    pub const ADVERTISING: Capabilities = Capabilities(1);

    pub fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Self) -> Self::Output {
        Capabilities(self.0 | rhs.0)
    }
}

/// One reception from a radio backend
///
/// Every field except the timestamp and PHY is optional because sniffers
/// report wildly different subsets. A line a sniffer printed that could not
/// be parsed arrives as a packet carrying the raw line as payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPacket {
    pub timestamp: DateTime<Utc>,
    pub phy: Phy,
    pub channel: Option<u8>,
    pub rssi: Option<i16>,
    pub address: Option<String>,
    pub access_address: Option<String>,
    pub handle: Option<u16>,
    pub pdu_type: Option<String>,
    #[serde(default)]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub local_name: Option<String>,
    /// Company (or 16-bit service) identifier → payload
    #[serde(default)]
    pub manufacturer_data: Vec<(u16, Vec<u8>)>,
}

impl RawPacket {
    /// Empty packet stamped with the given time on LE 1M
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            phy: Phy::Le1M,
            channel: None,
            rssi: None,
            address: None,
            access_address: None,
            handle: None,
            pdu_type: None,
            payload: Vec::new(),
            local_name: None,
            manufacturer_data: Vec::new(),
        }
    }

    /// Packet carrying an unparsed sniffer line
    pub fn unparsed(timestamp: DateTime<Utc>, line: &str) -> Self {
        let mut packet = Self::new(timestamp);
        packet.payload = line.as_bytes().to_vec();
        packet
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }

    pub fn with_manufacturer_data(mut self, company_id: u16, data: Vec<u8>) -> Self {
        self.manufacturer_data.push((company_id, data));
        self
    }

    /// True when the packet identifies a device and carries a signal level
    pub fn is_observation(&self) -> bool {
        self.address.is_some() && self.rssi.is_some()
    }
}
