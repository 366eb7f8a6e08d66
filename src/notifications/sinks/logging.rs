//! Sink writing one log line per observation

use crate::notifications::event::DecodedEvent;
use crate::notifications::traits::{EventSink, SinkError};
use async_trait::async_trait;

pub struct LogSink;

impl LogSink {
    pub const NAME: &'static str = "log";

    fn describe(event: &DecodedEvent) -> String {
        let mut line = format!(
            "{} rssi={} category={}",
            event.address,
            event.rssi,
            event.category.name()
        );
        if let Some(name) = &event.name {
            line.push_str(&format!(" name=\"{name}\""));
        }
        if let Some(vendor) = &event.vendor {
            line.push_str(&format!(" vendor=\"{vendor}\""));
        }
        if let Some(zone) = &event.zone {
            line.push_str(&format!(" zone={zone}"));
        }
        if let Some(ibeacon) = &event.ibeacon {
            line.push_str(&format!(" ibeacon=[{ibeacon}]"));
        }
        if let Some(eddystone) = &event.eddystone {
            line.push_str(&format!(" eddystone=[{eddystone}]"));
        }
        line
    }
}

#[async_trait]
impl EventSink for LogSink {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(&self, event: &DecodedEvent) -> Result<(), SinkError> {
        log::info!("{}", Self::describe(event));
        Ok(())
    }
}
