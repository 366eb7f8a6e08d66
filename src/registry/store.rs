//! Persistence seam for device records
//!
//! Stores are synchronous; the registry calls them from the worker pool.

use crate::core::sync::handle_mutex_poison;
use crate::registry::error::{RegistryError, RegistryResult};
use crate::registry::record::DeviceRecord;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

pub trait DeviceStore: Send + Sync {
    fn load(&self, address: &str) -> RegistryResult<Option<DeviceRecord>>;

    /// Insert or replace the record for its address
    fn save(&self, record: &DeviceRecord) -> RegistryResult<()>;

    /// Records ordered by last-seen descending, ties by address
    fn list(&self, limit: usize, offset: usize) -> RegistryResult<Vec<DeviceRecord>>;

    fn count(&self) -> RegistryResult<usize>;

    /// Remove records whose last sighting is older than `cutoff`
    fn delete_seen_before(&self, cutoff: DateTime<Utc>) -> RegistryResult<usize>;

    /// Current storage footprint in bytes
    fn size_bytes(&self) -> RegistryResult<u64>;

    /// Reclaim unused storage
    fn compact(&self) -> RegistryResult<()>;
}

/// Volatile store for tests and `:memory:` runs
#[derive(Default)]
pub struct MemoryDeviceStore {
    records: Mutex<HashMap<String, DeviceRecord>>,
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> RegistryResult<std::sync::MutexGuard<'_, HashMap<String, DeviceRecord>>> {
        handle_mutex_poison(self.records.lock(), |message| RegistryError::Storage {
            message,
        })
    }
}

impl DeviceStore for MemoryDeviceStore {
    fn load(&self, address: &str) -> RegistryResult<Option<DeviceRecord>> {
        Ok(self.records()?.get(address).cloned())
    }

    fn save(&self, record: &DeviceRecord) -> RegistryResult<()> {
        self.records()?
            .insert(record.address().to_string(), record.clone());
        Ok(())
    }

    fn list(&self, limit: usize, offset: usize) -> RegistryResult<Vec<DeviceRecord>> {
        let mut all: Vec<DeviceRecord> = self.records()?.values().cloned().collect();
        all.sort_by(|a, b| {
            b.last_seen()
                .cmp(&a.last_seen())
                .then_with(|| a.address().cmp(b.address()))
        });
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    fn count(&self) -> RegistryResult<usize> {
        Ok(self.records()?.len())
    }

    fn delete_seen_before(&self, cutoff: DateTime<Utc>) -> RegistryResult<usize> {
        let mut records = self.records()?;
        let before = records.len();
        records.retain(|_, record| record.last_seen() >= cutoff);
        Ok(before - records.len())
    }

    fn size_bytes(&self) -> RegistryResult<u64> {
        Ok(0)
    }

    fn compact(&self) -> RegistryResult<()> {
        self.records()?.shrink_to_fit();
        Ok(())
    }
}
