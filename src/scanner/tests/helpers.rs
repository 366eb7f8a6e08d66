//! Scripted backends and a ready-made manager for scanner tests

use crate::backend::api::{Capabilities, PacketSource, RadioBackend, RawPacket};
use crate::core::pool::WorkerPool;
use crate::core::retry::RetryPolicy;
use crate::notifications::api::EventBus;
use crate::registry::api::{DeviceRegistry, MemoryDeviceStore, RegistrySettings};
use crate::scanner::api::{ScanError, ScanResult, ScannerManager, ScannerSettings};
use crate::vendor::api::VendorResolver;
use crate::zones::api::ZoneTracker;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

pub fn packet(address: &str, rssi: i16, secs: i64) -> RawPacket {
    RawPacket::new(at(secs)).with_address(address).with_rssi(rssi)
}

pub struct ScriptedBackend {
    name: String,
    packets: Vec<RawPacket>,
    failures: Mutex<VecDeque<ScanError>>,
    /// Keep the source open after the script instead of ending the sequence
    endless: bool,
    pub opened: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(name: &str, packets: Vec<RawPacket>) -> Self {
        Self {
            name: name.to_string(),
            packets,
            failures: Mutex::new(VecDeque::new()),
            endless: false,
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn endless(mut self) -> Self {
        self.endless = true;
        self
    }

    pub fn failing_first(self, failures: Vec<ScanError>) -> Self {
        *self.failures.lock().unwrap() = failures.into();
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RadioBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ADVERTISING
    }

    async fn scan(&self) -> ScanResult<Box<dyn PacketSource>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(Box::new(ScriptedSource {
            queue: self.packets.clone().into(),
            endless: self.endless,
            closed: self.closed.clone(),
            is_closed: false,
        }))
    }
}

/// Always refuses to start
pub struct MisconfiguredBackend {
    pub opened: AtomicUsize,
}

#[async_trait]
impl RadioBackend for MisconfiguredBackend {
    fn name(&self) -> &str {
        "misconfigured"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ADVERTISING
    }

    async fn scan(&self) -> ScanResult<Box<dyn PacketSource>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Err(ScanError::Configuration {
            message: "sniffer binary 'missing' not found".to_string(),
        })
    }
}

/// Opens a source that ignores both reads and close, like a wedged sniffer
#[derive(Default)]
pub struct WedgedBackend {
    pub dropped: Arc<AtomicUsize>,
}

#[async_trait]
impl RadioBackend for WedgedBackend {
    fn name(&self) -> &str {
        "wedged"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ADVERTISING
    }

    async fn scan(&self) -> ScanResult<Box<dyn PacketSource>> {
        Ok(Box::new(WedgedSource {
            dropped: self.dropped.clone(),
        }))
    }
}

struct WedgedSource {
    dropped: Arc<AtomicUsize>,
}

#[async_trait]
impl PacketSource for WedgedSource {
    async fn next_packet(&mut self) -> Option<RawPacket> {
        std::future::pending().await
    }

    async fn close(&mut self) {
        std::future::pending::<()>().await
    }
}

impl Drop for WedgedSource {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedSource {
    queue: VecDeque<RawPacket>,
    endless: bool,
    closed: Arc<AtomicUsize>,
    is_closed: bool,
}

#[async_trait]
impl PacketSource for ScriptedSource {
    async fn next_packet(&mut self) -> Option<RawPacket> {
        if self.is_closed {
            return None;
        }
        match self.queue.pop_front() {
            Some(packet) => Some(packet),
            None if self.endless => std::future::pending().await,
            None => None,
        }
    }

    async fn close(&mut self) {
        if !self.is_closed {
            self.is_closed = true;
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub fn test_settings() -> ScannerSettings {
    ScannerSettings {
        workers: 1,
        interval: Duration::from_secs(60),
        grace_period: Duration::from_secs(2),
        sweep_interval: Duration::from_secs(3600),
        retry: RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(1),
            backoff: 1,
            max_delay: Duration::from_millis(5),
        },
    }
}

pub fn manager_with(settings: ScannerSettings, registry_settings: RegistrySettings) -> ScannerManager {
    let pool = WorkerPool::new(4);
    let registry = Arc::new(DeviceRegistry::new(
        Arc::new(MemoryDeviceStore::new()),
        pool.clone(),
        registry_settings,
    ));
    let vendors = Arc::new(VendorResolver::new(pool.clone(), 100));
    ScannerManager::new(
        registry,
        vendors,
        Arc::new(ZoneTracker::default()),
        Arc::new(EventBus::default()),
        pool,
        settings,
    )
}

pub fn test_manager() -> ScannerManager {
    manager_with(test_settings(), RegistrySettings::default())
}
