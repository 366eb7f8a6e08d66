//! Native radio backend on the platform Bluetooth stack
//!
//! Discovery runs in bounded passes. Each pass reports every device seen at
//! most once, which becomes one packet; the next pass starts only after the
//! previous batch has been consumed. Closing a source whose pass was cut
//! short stops the adapter's scan.

use crate::backend::traits::{PacketSource, RadioBackend};
use crate::backend::types::{Capabilities, RawPacket};
use crate::scanner::error::ScanResult;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// A device as reported by one discovery pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveredDevice {
    pub address: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    pub manufacturer_data: Vec<(u16, Vec<u8>)>,
}

/// Seam between the backend and a concrete Bluetooth stack
#[async_trait]
pub trait DiscoveryAdapter: Send + Sync {
    /// Scan for `duration` and report what was seen during that time
    async fn discover(&self, duration: Duration) -> ScanResult<Vec<DiscoveredDevice>>;

    /// Stop a scan left running by an interrupted `discover`
    async fn stop(&self) -> ScanResult<()>;
}

pub struct NativeBackend {
    adapter: Arc<dyn DiscoveryAdapter>,
    pass: Duration,
}

impl NativeBackend {
    pub fn new(adapter: Arc<dyn DiscoveryAdapter>, pass: Duration) -> Self {
        Self { adapter, pass }
    }

    /// Backend bound to the first adapter of the platform stack
    #[cfg(feature = "native-btleplug")]
    pub async fn platform(pass: Duration) -> ScanResult<Self> {
        let adapter = platform::BtleplugAdapter::first().await?;
        Ok(Self::new(Arc::new(adapter), pass))
    }
}

#[async_trait]
impl RadioBackend for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ADVERTISING
    }

    async fn scan(&self) -> ScanResult<Box<dyn PacketSource>> {
        Ok(Box::new(NativeSource {
            adapter: self.adapter.clone(),
            pass: self.pass,
            pending: VecDeque::new(),
            scanning: false,
            closed: false,
        }))
    }
}

struct NativeSource {
    adapter: Arc<dyn DiscoveryAdapter>,
    pass: Duration,
    pending: VecDeque<RawPacket>,
    // Set while a pass is in flight; still set if that pass was dropped
    scanning: bool,
    closed: bool,
}

fn packet_from_device(device: DiscoveredDevice) -> RawPacket {
    let mut packet = RawPacket::new(Utc::now()).with_address(device.address);
    packet.rssi = device.rssi;
    packet.local_name = device.name;
    packet.manufacturer_data = device.manufacturer_data;
    packet
}

#[async_trait]
impl PacketSource for NativeSource {
    async fn next_packet(&mut self) -> Option<RawPacket> {
        loop {
            if self.closed {
                return None;
            }
            if let Some(packet) = self.pending.pop_front() {
                return Some(packet);
            }

            self.scanning = true;
            let result = self.adapter.discover(self.pass).await;
            self.scanning = false;

            match result {
                Ok(devices) => {
                    log::trace!("Discovery pass reported {} devices", devices.len());
                    self.pending.extend(devices.into_iter().map(packet_from_device));
                }
                Err(e) => {
                    log::warn!("Native discovery pass failed: {}", e);
                    return None;
                }
            }
            tokio::task::yield_now().await;
        }
    }

    async fn close(&mut self) {
        self.closed = true;
        self.pending.clear();
        if self.scanning {
            self.scanning = false;
            log::debug!("Stopping interrupted discovery pass");
            if let Err(e) = self.adapter.stop().await {
                log::warn!("Cannot stop native discovery: {}", e);
            }
        }
    }
}

#[cfg(feature = "native-btleplug")]
mod platform {
    use super::{DiscoveredDevice, DiscoveryAdapter};
    use crate::decoder::EDDYSTONE_SERVICE_ID;
    use crate::scanner::error::{ScanError, ScanResult};
    use async_trait::async_trait;
    use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
    use btleplug::platform::{Adapter, Manager, PeripheralId};
    use futures::StreamExt;
    use std::collections::HashSet;
    use std::time::Duration;

    // 0000FEAA-0000-1000-8000-00805F9B34FB
    const EDDYSTONE_SERVICE_UUID: uuid::Uuid =
        uuid::Uuid::from_u128(0x0000_FEAA_0000_1000_8000_0080_5F9B_34FB);

    pub(super) struct BtleplugAdapter {
        central: Adapter,
    }

    fn io_error(context: &str, e: btleplug::Error) -> ScanError {
        ScanError::Io {
            message: format!("{}: {}", context, e),
        }
    }

    impl BtleplugAdapter {
        pub(super) async fn first() -> ScanResult<Self> {
            let manager = Manager::new()
                .await
                .map_err(|e| ScanError::Configuration {
                    message: format!("Bluetooth stack unavailable: {}", e),
                })?;
            let central = manager
                .adapters()
                .await
                .map_err(|e| io_error("listing Bluetooth adapters", e))?
                .into_iter()
                .next()
                .ok_or_else(|| ScanError::Configuration {
                    message: "no Bluetooth adapter found".to_string(),
                })?;
            Ok(Self { central })
        }
    }

    #[async_trait]
    impl DiscoveryAdapter for BtleplugAdapter {
        async fn discover(&self, duration: Duration) -> ScanResult<Vec<DiscoveredDevice>> {
            // The adapter caches every peripheral it ever saw, so only ids
            // announced during this pass are reported.
            let mut events = self
                .central
                .events()
                .await
                .map_err(|e| io_error("subscribing to adapter events", e))?;
            self.central
                .start_scan(ScanFilter::default())
                .await
                .map_err(|e| io_error("starting discovery", e))?;

            let deadline = tokio::time::Instant::now() + duration;
            let mut seen: HashSet<PeripheralId> = HashSet::new();
            while let Ok(Some(event)) = tokio::time::timeout_at(deadline, events.next()).await {
                match event {
                    CentralEvent::DeviceDiscovered(id)
                    | CentralEvent::DeviceUpdated(id)
                    | CentralEvent::ManufacturerDataAdvertisement { id, .. }
                    | CentralEvent::ServiceDataAdvertisement { id, .. } => {
                        seen.insert(id);
                    }
                    _ => {}
                }
            }

            if let Err(e) = self.central.stop_scan().await {
                log::debug!("Stopping discovery failed: {}", e);
            }

            let mut devices = Vec::with_capacity(seen.len());
            for id in seen {
                let Ok(peripheral) = self.central.peripheral(&id).await else {
                    continue;
                };
                let Ok(Some(props)) = peripheral.properties().await else {
                    continue;
                };

                let mut manufacturer_data: Vec<(u16, Vec<u8>)> =
                    props.manufacturer_data.into_iter().collect();
                if let Some(frame) = props.service_data.get(&EDDYSTONE_SERVICE_UUID) {
                    manufacturer_data.push((EDDYSTONE_SERVICE_ID, frame.clone()));
                }

                devices.push(DiscoveredDevice {
                    address: props.address.to_string(),
                    name: props.local_name,
                    rssi: props.rssi,
                    manufacturer_data,
                });
            }
            Ok(devices)
        }

        async fn stop(&self) -> ScanResult<()> {
            self.central
                .stop_scan()
                .await
                .map_err(|e| io_error("stopping discovery", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::error::ScanError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed batch per pass, failing after `passes_before_error`
    struct ScriptedAdapter {
        batch: Vec<DiscoveredDevice>,
        passes: AtomicUsize,
        passes_before_error: usize,
    }

    #[async_trait]
    impl DiscoveryAdapter for ScriptedAdapter {
        async fn discover(&self, _duration: Duration) -> ScanResult<Vec<DiscoveredDevice>> {
            let pass = self.passes.fetch_add(1, Ordering::SeqCst);
            if pass >= self.passes_before_error {
                return Err(ScanError::Io {
                    message: "adapter powered off".to_string(),
                });
            }
            Ok(self.batch.clone())
        }

        async fn stop(&self) -> ScanResult<()> {
            Ok(())
        }
    }

    /// Never finishes a pass; counts scans started and stopped
    #[derive(Default)]
    struct HangingAdapter {
        started: AtomicUsize,
        stopped: AtomicUsize,
    }

    #[async_trait]
    impl DiscoveryAdapter for HangingAdapter {
        async fn discover(&self, _duration: Duration) -> ScanResult<Vec<DiscoveredDevice>> {
            self.started.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }

        async fn stop(&self) -> ScanResult<()> {
            self.stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn device(address: &str, rssi: i16) -> DiscoveredDevice {
        DiscoveredDevice {
            address: address.to_string(),
            name: Some("Tag".to_string()),
            rssi: Some(rssi),
            manufacturer_data: vec![(0x004C, vec![0x02, 0x15])],
        }
    }

    #[tokio::test]
    async fn test_one_packet_per_device_per_pass() {
        let adapter = Arc::new(ScriptedAdapter {
            batch: vec![device("AA:BB:CC:DD:EE:01", -50), device("AA:BB:CC:DD:EE:02", -60)],
            passes: AtomicUsize::new(0),
            passes_before_error: 2,
        });
        let backend = NativeBackend::new(adapter.clone(), Duration::from_millis(1));
        assert_eq!(backend.name(), "native");
        assert!(backend.capabilities().contains(Capabilities::ADVERTISING));

        let mut source = backend.scan().await.unwrap();
        let mut packets = Vec::new();
        while let Some(packet) = source.next_packet().await {
            packets.push(packet);
        }

        assert_eq!(packets.len(), 4);
        assert_eq!(adapter.passes.load(Ordering::SeqCst), 3);
        let first = &packets[0];
        assert_eq!(first.address.as_deref(), Some("AA:BB:CC:DD:EE:01"));
        assert_eq!(first.rssi, Some(-50));
        assert_eq!(first.local_name.as_deref(), Some("Tag"));
        assert!(first.channel.is_none());
        assert!(first.handle.is_none());
        assert_eq!(first.manufacturer_data, vec![(0x004C, vec![0x02, 0x15])]);
    }

    #[tokio::test]
    async fn test_close_stops_the_sequence() {
        let adapter = Arc::new(ScriptedAdapter {
            batch: vec![device("AA:BB:CC:DD:EE:01", -50), device("AA:BB:CC:DD:EE:02", -60)],
            passes: AtomicUsize::new(0),
            passes_before_error: usize::MAX,
        });
        let backend = NativeBackend::new(adapter, Duration::from_millis(1));
        let mut source = backend.scan().await.unwrap();

        assert!(source.next_packet().await.is_some());
        source.close().await;
        assert!(source.next_packet().await.is_none());
    }

    #[tokio::test]
    async fn test_close_after_interrupted_pass_stops_the_scan() {
        let adapter = Arc::new(HangingAdapter::default());
        let backend = NativeBackend::new(adapter.clone(), Duration::from_secs(60));
        let mut source = backend.scan().await.unwrap();

        let pass = tokio::time::timeout(Duration::from_millis(50), source.next_packet()).await;
        assert!(pass.is_err());
        assert_eq!(adapter.started.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.stopped.load(Ordering::SeqCst), 0);

        source.close().await;
        assert_eq!(adapter.stopped.load(Ordering::SeqCst), 1);
        source.close().await;
        assert_eq!(adapter.stopped.load(Ordering::SeqCst), 1);
    }
}
