//! Event bus
//!
//! Fans every [`DecodedEvent`] out to two kinds of consumer:
//!
//! - subscribers, which receive a bounded channel and pull at their own pace
//! - sinks, which the bus drives on a dedicated task with its own queue
//!
//! `publish` never waits. When a queue is full the new event is rejected for
//! that consumer only and counted in its statistics; the oldest queued events
//! are kept. A subscriber whose receiver was dropped is removed on the next
//! publish.

use crate::notifications::error::{NotificationError, NotificationResult};
use crate::notifications::event::{DecodedEvent, EventFilter};
use crate::notifications::traits::{EventSink, SubscriberStatistics};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

pub const DEFAULT_SUBSCRIBER_QUEUE: usize = 256;
pub const DEFAULT_SINK_QUEUE: usize = 1024;
/// How long `shutdown` waits for one sink to drain before aborting it
pub const DEFAULT_SINK_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub type EventReceiver = mpsc::Receiver<DecodedEvent>;

struct SubscriberInfo {
    filter: EventFilter,
    source: String,
    sender: mpsc::Sender<DecodedEvent>,
    statistics: Arc<SubscriberStatistics>,
}

struct SinkHandle {
    name: String,
    sender: mpsc::Sender<DecodedEvent>,
    statistics: Arc<SubscriberStatistics>,
    task: JoinHandle<()>,
}

/// What happened to one published event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Consumers the event was queued for
    pub queued: usize,
    /// Consumers whose queue was full
    pub dropped: usize,
    /// Subscribers removed because their receiver was gone
    pub removed: usize,
}

pub struct EventBus {
    subscribers: Mutex<HashMap<String, SubscriberInfo>>,
    sinks: Mutex<Vec<SinkHandle>>,
    subscriber_queue: usize,
    sink_queue: usize,
    drain_timeout: Duration,
    closed: AtomicBool,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_QUEUE, DEFAULT_SINK_QUEUE)
    }
}

impl EventBus {
    pub fn new(subscriber_queue: usize, sink_queue: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            sinks: Mutex::new(Vec::new()),
            subscriber_queue: subscriber_queue.max(1),
            sink_queue: sink_queue.max(1),
            drain_timeout: DEFAULT_SINK_DRAIN_TIMEOUT,
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn subscribe(
        &self,
        subscriber_id: impl Into<String>,
        filter: EventFilter,
        source: impl Into<String>,
    ) -> NotificationResult<EventReceiver> {
        if self.is_closed() {
            return Err(NotificationError::Closed);
        }
        let subscriber_id = subscriber_id.into();
        let source = source.into();
        let (sender, receiver) = mpsc::channel(self.subscriber_queue);

        let info = SubscriberInfo {
            filter,
            source: source.clone(),
            sender,
            statistics: Arc::new(SubscriberStatistics::new()),
        };

        let mut subscribers = self.subscribers.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(existing) = subscribers.insert(subscriber_id.clone(), info) {
            log::warn!(
                "Subscriber '{}' replaced existing subscription (source: {} -> {})",
                subscriber_id,
                existing.source,
                source
            );
        } else {
            log::debug!("Subscriber '{}' registered from {}", subscriber_id, source);
        }
        Ok(receiver)
    }

    pub fn unsubscribe(&self, subscriber_id: &str) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|p| p.into_inner());
        subscribers.remove(subscriber_id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn has_subscriber(&self, subscriber_id: &str) -> bool {
        self.subscribers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(subscriber_id)
    }

    pub fn subscriber_statistics(&self, subscriber_id: &str) -> Option<Arc<SubscriberStatistics>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(subscriber_id)
            .map(|info| info.statistics.clone())
    }

    /// Start a task driving `sink`; sinks receive events in registration order
    pub fn register_sink(&self, sink: Arc<dyn EventSink>) -> NotificationResult<()> {
        if self.is_closed() {
            return Err(NotificationError::Closed);
        }
        let name = sink.name().to_string();
        let mut sinks = self.sinks.lock().unwrap_or_else(|p| p.into_inner());
        if sinks.iter().any(|handle| handle.name == name) {
            return Err(NotificationError::DuplicateSink(name));
        }

        let (sender, receiver) = mpsc::channel(self.sink_queue);
        let statistics = Arc::new(SubscriberStatistics::new());
        let task = tokio::spawn(run_sink(sink, receiver, statistics.clone()));

        log::debug!("Event sink '{}' started", name);
        sinks.push(SinkHandle {
            name,
            sender,
            statistics,
            task,
        });
        Ok(())
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.sinks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|handle| handle.name.clone())
            .collect()
    }

    pub fn sink_statistics(&self, name: &str) -> Option<Arc<SubscriberStatistics>> {
        self.sinks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .find(|handle| handle.name == name)
            .map(|handle| handle.statistics.clone())
    }

    /// Queue an event for every interested consumer without waiting
    pub fn publish(&self, event: &DecodedEvent) -> PublishReport {
        let mut report = PublishReport::default();
        if self.is_closed() {
            return report;
        }

        {
            let mut subscribers = self.subscribers.lock().unwrap_or_else(|p| p.into_inner());
            subscribers.retain(|id, info| {
                if !info.filter.accepts(event) {
                    return true;
                }
                match info.sender.try_send(event.clone()) {
                    Ok(()) => {
                        info.statistics.record_delivered();
                        report.queued += 1;
                        true
                    }
                    Err(TrySendError::Full(_)) => {
                        info.statistics.record_dropped();
                        report.dropped += 1;
                        log::debug!("Subscriber '{}' queue full, dropped event for {}", id, event.address);
                        true
                    }
                    Err(TrySendError::Closed(_)) => {
                        log::debug!("Subscriber '{}' went away, removing", id);
                        report.removed += 1;
                        false
                    }
                }
            });
        }

        let sinks = self.sinks.lock().unwrap_or_else(|p| p.into_inner());
        for handle in sinks.iter() {
            match handle.sender.try_send(event.clone()) {
                Ok(()) => report.queued += 1,
                Err(TrySendError::Full(_)) => {
                    handle.statistics.record_dropped();
                    report.dropped += 1;
                    log::debug!("Sink '{}' queue full, dropped event for {}", handle.name, event.address);
                }
                Err(TrySendError::Closed(_)) => {
                    log::debug!("Sink '{}' is no longer running", handle.name);
                }
            }
        }

        report
    }

    /// Stop accepting events, let every sink drain its queue and wait for it
    ///
    /// Subscriber channels are closed; receivers still get what was queued.
    /// A sink still busy after the drain timeout is aborted along with
    /// whatever it had queued.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.subscribers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
        let sinks: Vec<SinkHandle> =
            std::mem::take(&mut *self.sinks.lock().unwrap_or_else(|p| p.into_inner()));

        for SinkHandle {
            name,
            sender,
            statistics,
            mut task,
        } in sinks
        {
            drop(sender);
            match tokio::time::timeout(self.drain_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("Event sink '{}' task ended abnormally: {}", name, e),
                Err(_) => {
                    log::warn!(
                        "Event sink '{}' still busy after {:?}, aborting it",
                        name,
                        self.drain_timeout
                    );
                    task.abort();
                }
            }
            log::debug!(
                "Event sink '{}' stopped: {} handled, {} dropped, {} errors",
                name,
                statistics.delivered(),
                statistics.dropped(),
                statistics.error_count()
            );
        }
        log::info!("Event bus stopped");
    }
}

async fn run_sink(
    sink: Arc<dyn EventSink>,
    mut receiver: EventReceiver,
    statistics: Arc<SubscriberStatistics>,
) {
    while let Some(event) = receiver.recv().await {
        match AssertUnwindSafe(sink.handle(&event)).catch_unwind().await {
            Ok(Ok(())) => statistics.record_delivered(),
            Ok(Err(e)) => {
                statistics.record_error();
                log::warn!("Event sink '{}' failed on {}: {}", sink.name(), event.address, e);
            }
            Err(panic) => {
                statistics.record_panic();
                log::error!(
                    "Event sink '{}' panicked on {}: {}",
                    sink.name(),
                    event.address,
                    panic_message(panic.as_ref())
                );
            }
        }
    }

    if let Err(panic) = AssertUnwindSafe(sink.close()).catch_unwind().await {
        log::error!(
            "Event sink '{}' panicked while closing: {}",
            sink.name(),
            panic_message(panic.as_ref())
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
