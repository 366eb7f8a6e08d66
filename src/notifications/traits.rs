//! Consumer traits and delivery statistics

use crate::notifications::event::DecodedEvent;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Instant;

/// Delivery counters kept for every subscriber and sink
pub struct SubscriberStatistics {
    delivered: AtomicUsize,
    dropped: AtomicUsize,
    error_count: AtomicUsize,
    panic_count: AtomicUsize,
    last_message_time: RwLock<Option<Instant>>,
    last_error_time: RwLock<Option<Instant>>,
}

impl Default for SubscriberStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberStatistics {
    pub fn new() -> Self {
        Self {
            delivered: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
            error_count: AtomicUsize::new(0),
            panic_count: AtomicUsize::new(0),
            last_message_time: RwLock::new(None),
            last_error_time: RwLock::new(None),
        }
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut time) = self.last_message_time.write() {
            *time = Some(Instant::now());
        }
    }

    /// Events discarded because the queue was full
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut time) = self.last_error_time.write() {
            *time = Some(Instant::now());
        }
    }

    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }

    pub fn record_panic(&self) {
        self.panic_count.fetch_add(1, Ordering::Relaxed);
        self.record_error();
    }

    pub fn last_message_time(&self) -> Option<Instant> {
        *self.last_message_time.read().ok()?
    }

    pub fn last_error_time(&self) -> Option<Instant> {
        *self.last_error_time.read().ok()?
    }
}

pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Consumer driven by the event bus on its own task
///
/// Errors and panics are logged and counted by the bus; they never reach the
/// publisher or other consumers.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Unique name used in logs and statistics
    fn name(&self) -> &str;

    async fn handle(&self, event: &DecodedEvent) -> Result<(), SinkError>;

    /// Called once after the queue has drained at shutdown
    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_start_empty() {
        let stats = SubscriberStatistics::new();
        assert_eq!(stats.delivered(), 0);
        assert_eq!(stats.dropped(), 0);
        assert_eq!(stats.error_count(), 0);
        assert!(stats.last_message_time().is_none());
    }

    #[test]
    fn test_panic_counts_as_error() {
        let stats = SubscriberStatistics::new();
        stats.record_panic();
        stats.record_error();
        assert_eq!(stats.panic_count(), 1);
        assert_eq!(stats.error_count(), 2);
        assert!(stats.last_error_time().is_some());
    }

    #[test]
    fn test_delivery_updates_last_message_time() {
        let stats = SubscriberStatistics::new();
        stats.record_delivered();
        stats.record_dropped();
        assert_eq!(stats.delivered(), 1);
        assert_eq!(stats.dropped(), 1);
        assert!(stats.last_message_time().is_some());
    }
}
