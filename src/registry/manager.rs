//! Device registry
//!
//! Owns the device store and the per-address lock table. Every mutation of a
//! record requires an [`AddressGuard`] for its address, so two updates for
//! one device can never interleave while updates for different devices run
//! in parallel on the worker pool.

use crate::core::pool::WorkerPool;
use crate::registry::address::normalize_address;
use crate::registry::error::{RegistryError, RegistryResult};
use crate::registry::locks::{AddressGuard, AddressLocks};
use crate::registry::record::{DeviceRecord, Observation, DEFAULT_HISTORY_DEPTH};
use crate::registry::store::DeviceStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Tunables for record retention and history depth
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub history_depth: usize,
    pub retention_days: u32,
    pub compact_threshold_bytes: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_HISTORY_DEPTH,
            retention_days: 30,
            compact_threshold_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// One page of a last-seen ordered listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    pub fn first(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }

    pub fn next(self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset + self.limit,
        }
    }
}

/// Outcome of a retention sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    pub removed: usize,
    pub compacted: bool,
}

pub struct DeviceRegistry {
    store: Arc<dyn DeviceStore>,
    locks: AddressLocks,
    pool: WorkerPool,
    settings: RegistrySettings,
}

impl DeviceRegistry {
    pub fn new(store: Arc<dyn DeviceStore>, pool: WorkerPool, settings: RegistrySettings) -> Self {
        Self {
            store,
            locks: AddressLocks::new(),
            pool,
            settings,
        }
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Acquire exclusive access to one device, normalizing the address
    pub async fn lock(&self, address: &str) -> RegistryResult<AddressGuard> {
        let normalized = normalize_address(address).ok_or_else(|| RegistryError::InvalidAddress {
            address: address.to_string(),
        })?;
        Ok(self.locks.lock(&normalized).await)
    }

    /// Insert or merge an observation for the guarded address
    ///
    /// Returns the record as stored after the change. The address stays
    /// locked until the store job finishes, even if this future is dropped.
    pub async fn apply(
        &self,
        guard: &AddressGuard,
        observation: Observation,
    ) -> RegistryResult<DeviceRecord> {
        let store = self.store.clone();
        let address = guard.address().to_string();
        let depth = self.settings.history_depth;
        let held = guard.share();

        self.pool
            .run_blocking(move || -> RegistryResult<DeviceRecord> {
                let _held = held;
                let record = match store.load(&address)? {
                    Some(mut existing) => {
                        existing.apply(observation, depth);
                        existing
                    }
                    None => {
                        let mut created = DeviceRecord::first_sighting(address, observation);
                        created.trim_history(depth);
                        created
                    }
                };
                store.save(&record)?;
                Ok(record)
            })
            .await?
    }

    /// Lock, apply and release in one step
    pub async fn update(
        &self,
        address: &str,
        observation: Observation,
    ) -> RegistryResult<DeviceRecord> {
        let guard = self.lock(address).await?;
        self.apply(&guard, observation).await
    }

    pub async fn get(&self, address: &str) -> RegistryResult<Option<DeviceRecord>> {
        let Some(normalized) = normalize_address(address) else {
            return Ok(None);
        };
        let store = self.store.clone();
        self.pool
            .run_blocking(move || store.load(&normalized))
            .await?
    }

    /// Records ordered by last-seen descending
    pub async fn list(&self, page: Page) -> RegistryResult<Vec<DeviceRecord>> {
        let store = self.store.clone();
        self.pool
            .run_blocking(move || store.list(page.limit, page.offset))
            .await?
    }

    pub async fn count(&self) -> RegistryResult<usize> {
        let store = self.store.clone();
        self.pool.run_blocking(move || store.count()).await?
    }

    /// Drop records unseen for the retention period and compact if oversized
    pub async fn sweep(&self, now: DateTime<Utc>) -> RegistryResult<SweepReport> {
        let store = self.store.clone();
        let cutoff = now - chrono::Duration::days(i64::from(self.settings.retention_days));
        let threshold = self.settings.compact_threshold_bytes;

        let report = self
            .pool
            .run_blocking(move || -> RegistryResult<SweepReport> {
                let removed = store.delete_seen_before(cutoff)?;
                let size = store.size_bytes()?;
                let compacted = size > threshold;
                if compacted {
                    store.compact()?;
                }
                Ok(SweepReport { removed, compacted })
            })
            .await??;

        if report.removed > 0 || report.compacted {
            log::info!(
                "Retention sweep removed {} devices unseen since {}{}",
                report.removed,
                cutoff.format("%Y-%m-%d %H:%M:%S"),
                if report.compacted { " and compacted storage" } else { "" }
            );
        } else {
            log::debug!("Retention sweep found nothing to remove");
        }
        Ok(report)
    }
}
