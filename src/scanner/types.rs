//! Scanner settings and run statistics

use crate::core::retry::RetryPolicy;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Consecutive malformed packets from one source before a warning
pub(crate) const MALFORMED_WARN_THRESHOLD: usize = 100;

#[derive(Debug, Clone)]
pub struct ScannerSettings {
    /// Scan workers per backend
    pub workers: usize,
    /// Pause between scan cycles
    pub interval: Duration,
    /// How long stopping workers may take before they are aborted
    pub grace_period: Duration,
    pub sweep_interval: Duration,
    /// Applied when a backend fails to open with an I/O error
    pub retry: RetryPolicy,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            interval: Duration::from_secs(5),
            grace_period: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(3600),
            retry: RetryPolicy::default(),
        }
    }
}

/// Live counters shared by every worker of a run
#[derive(Debug, Default)]
pub struct ScanStatistics {
    packets: AtomicUsize,
    observations: AtomicUsize,
    malformed: AtomicUsize,
    dropped: AtomicUsize,
    cycles: AtomicUsize,
}

impl ScanStatistics {
    pub fn record_packet(&self) {
        self.packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_observation(&self) {
        self.observations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ScanSummary {
        ScanSummary {
            packets: self.packets.load(Ordering::Relaxed),
            observations: self.observations.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ScanStatistics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Packets received from any backend
    pub packets: usize,
    /// Packets that became a registry update and an event
    pub observations: usize,
    /// Packets without an address or signal level
    pub malformed: usize,
    /// Observations lost to a registry failure
    pub dropped: usize,
    /// Scan cycles started
    pub cycles: usize,
}

impl std::fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} packets, {} observations, {} malformed, {} dropped over {} cycles",
            self.packets, self.observations, self.malformed, self.dropped, self.cycles
        )
    }
}
