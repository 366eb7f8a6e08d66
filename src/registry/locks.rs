//! Per-address serialization
//!
//! Each address maps to its own async mutex. Holding the guard for one
//! address never delays work on another. Entries nobody holds or waits for
//! are pruned once the table grows past a threshold that doubles with use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

const INITIAL_PRUNE_AT: usize = 1024;

struct LockTable {
    entries: HashMap<String, Arc<tokio::sync::Mutex<()>>>,
    prune_at: usize,
}

pub struct AddressLocks {
    table: Mutex<LockTable>,
}

/// Exclusive right to mutate one device record
///
/// The address is released once the guard and every [`HeldAddress`] taken
/// from it are dropped.
#[derive(Debug)]
pub struct AddressGuard {
    address: String,
    held: Arc<OwnedMutexGuard<()>>,
}

/// Share of an [`AddressGuard`] that a background job keeps until it ends
#[derive(Debug)]
pub(crate) struct HeldAddress {
    _held: Arc<OwnedMutexGuard<()>>,
}

impl AddressGuard {
    /// The normalized address this guard covers
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Keep the address locked for as long as the returned value lives
    pub(crate) fn share(&self) -> HeldAddress {
        HeldAddress {
            _held: self.held.clone(),
        }
    }
}

impl Default for AddressLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressLocks {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(LockTable {
                entries: HashMap::new(),
                prune_at: INITIAL_PRUNE_AT,
            }),
        }
    }

    /// Wait for exclusive access to `address` (already normalized)
    pub async fn lock(&self, address: &str) -> AddressGuard {
        let mutex = {
            // The table holds no invariant a panic could break mid-update
            let mut table = self.table.lock().unwrap_or_else(|p| p.into_inner());
            let mutex = table
                .entries
                .entry(address.to_string())
                .or_default()
                .clone();

            if table.entries.len() >= table.prune_at {
                table.entries.retain(|_, m| Arc::strong_count(m) > 1);
                table.prune_at = (table.entries.len() * 2).max(INITIAL_PRUNE_AT);
            }
            mutex
        };

        AddressGuard {
            address: address.to_string(),
            held: Arc::new(mutex.lock_owned().await),
        }
    }

    /// Number of addresses currently tracked
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .map(|table| table.entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
