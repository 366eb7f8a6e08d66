//! Public API for the event bus
//!
//! External modules should import from here rather than directly from
//! internal modules. The bus is owned by the scanner and handed to whoever
//! needs to subscribe; there is no global instance.

pub use crate::notifications::error::{NotificationError, NotificationResult};
pub use crate::notifications::event::{DecodedEvent, EventFilter};
pub use crate::notifications::manager::{
    EventBus, EventReceiver, PublishReport, DEFAULT_SINK_DRAIN_TIMEOUT, DEFAULT_SINK_QUEUE,
    DEFAULT_SUBSCRIBER_QUEUE,
};
pub use crate::notifications::sinks::logging::LogSink;
pub use crate::notifications::sinks::mqtt::{MqttPublisher, MqttSettings};
pub use crate::notifications::traits::{EventSink, SinkError, SubscriberStatistics};
