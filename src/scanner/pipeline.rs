//! Per-packet ingest path
//!
//! vendor resolve → payload decode → address lock → zone → registry → publish.
//! The event is published before the address lock is released, so consumers
//! see one device's events in the order its updates were applied.

use crate::backend::api::RawPacket;
use crate::decoder::decode_manufacturer_data;
use crate::notifications::api::{DecodedEvent, EventBus};
use crate::registry::api::{normalize_address, DeviceRegistry, Observation, RegistryResult};
use crate::scanner::types::ScanStatistics;
use crate::vendor::api::VendorResolver;
use crate::zones::api::ZoneTracker;
use std::sync::Arc;

/// Outcome of feeding one packet through the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    Event(Box<DecodedEvent>),
    /// Packet did not identify a device or carry a signal level
    Malformed,
}

#[derive(Clone)]
pub struct Pipeline {
    registry: Arc<DeviceRegistry>,
    vendors: Arc<VendorResolver>,
    zones: Arc<ZoneTracker>,
    bus: Arc<EventBus>,
    statistics: Arc<ScanStatistics>,
}

impl Pipeline {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        vendors: Arc<VendorResolver>,
        zones: Arc<ZoneTracker>,
        bus: Arc<EventBus>,
        statistics: Arc<ScanStatistics>,
    ) -> Self {
        Self {
            registry,
            vendors,
            zones,
            bus,
            statistics,
        }
    }

    pub fn statistics(&self) -> &ScanStatistics {
        &self.statistics
    }

    pub async fn ingest(&self, packet: RawPacket) -> RegistryResult<Ingested> {
        self.statistics.record_packet();

        let (Some(raw_address), Some(rssi)) = (packet.address.as_deref(), packet.rssi) else {
            self.statistics.record_malformed();
            log::debug!(
                "Ignoring packet without address or RSSI: {}",
                String::from_utf8_lossy(&packet.payload)
            );
            return Ok(Ingested::Malformed);
        };
        let Some(address) = normalize_address(raw_address) else {
            self.statistics.record_malformed();
            log::debug!("Ignoring packet with unusable address {:?}", raw_address);
            return Ok(Ingested::Malformed);
        };

        let vendor = self.vendors.resolve(&address).await;
        let payloads = decode_manufacturer_data(
            packet
                .manufacturer_data
                .iter()
                .map(|(company_id, bytes)| (*company_id, bytes.as_slice())),
        );

        let guard = self.registry.lock(&address).await?;
        let reading = self.zones.observe(&address, rssi, packet.timestamp);
        let observation = Observation::new(packet.timestamp, rssi)
            .with_name(packet.local_name.clone())
            .with_vendor(vendor)
            .with_zone(Some(reading.zone));
        let record = self.registry.apply(&guard, observation).await?;

        let event = DecodedEvent {
            address: record.address().to_string(),
            name: record.name().map(str::to_string),
            rssi,
            ibeacon: payloads.ibeacon,
            eddystone: payloads.eddystone,
            angle: None,
            timestamp: packet.timestamp,
            vendor: record.vendor().map(str::to_string),
            category: record.category(),
            zone: record.zone().map(str::to_string),
        };
        self.bus.publish(&event);
        drop(guard);

        self.statistics.record_observation();
        Ok(Ingested::Event(Box::new(event)))
    }
}
