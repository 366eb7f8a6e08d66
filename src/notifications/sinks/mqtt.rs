//! Sink publishing each event as compact JSON to an MQTT broker
//!
//! Publishing is at-most-once. The client reconnects on its own whenever the
//! event loop is polled again after a failure, so a broker outage only costs
//! the events sent while it lasts. Requests never wait for room in the
//! client queue: a full queue fails the event instead.

use crate::notifications::error::{NotificationError, NotificationResult};
use crate::notifications::event::DecodedEvent;
use crate::notifications::traits::{EventSink, SinkError};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

const REQUEST_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            topic: "ble/events".to_string(),
            client_id: "bleradar".to_string(),
            keep_alive_secs: 30,
        }
    }
}

pub struct MqttPublisher {
    client: AsyncClient,
    topic: String,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl MqttPublisher {
    pub const NAME: &'static str = "mqtt";

    /// Create the client and start polling its event loop
    pub fn start(settings: &MqttSettings) -> NotificationResult<Self> {
        if settings.topic.is_empty() || settings.topic.contains(['+', '#']) {
            return Err(NotificationError::MqttClient {
                message: format!("invalid publish topic '{}'", settings.topic),
            });
        }

        let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        options.set_keep_alive(Duration::from_secs(settings.keep_alive_secs.max(5)));
        options.set_clean_session(true);

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let broker = format!("{}:{}", settings.host, settings.port);

        let task = tokio::spawn(async move {
            let mut connected = false;
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        connected = true;
                        log::info!("Connected to MQTT broker {}", broker);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if connected {
                            log::warn!("MQTT connection to {} lost: {}", broker, e);
                        } else {
                            log::debug!("MQTT broker {} unavailable: {}", broker, e);
                        }
                        connected = false;
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        log::info!(
            "Publishing events to mqtt://{}:{}/{}",
            settings.host,
            settings.port,
            settings.topic
        );
        Ok(Self {
            client,
            topic: settings.topic.clone(),
            event_loop: Mutex::new(Some(task)),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl EventSink for MqttPublisher {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(&self, event: &DecodedEvent) -> Result<(), SinkError> {
        let payload = event.to_json()?;
        self.client
            .try_publish(self.topic.as_str(), QoS::AtMostOnce, false, payload)?;
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.client.try_disconnect() {
            log::debug!("MQTT disconnect not sent: {}", e);
        }
        let task = self.event_loop.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(task) = task {
            // Give the event loop a moment to flush the disconnect
            tokio::time::sleep(Duration::from_millis(50)).await;
            task.abort();
        }
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        let task = self
            .event_loop
            .get_mut()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::manager::EventBus;
    use chrono::DateTime;
    use std::sync::Arc;

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_wildcard_topic_is_rejected() {
        let settings = MqttSettings {
            topic: "ble/#".into(),
            ..MqttSettings::default()
        };
        assert!(matches!(
            MqttPublisher::start(&settings),
            Err(NotificationError::MqttClient { .. })
        ));
    }

    #[tokio::test]
    async fn test_publish_without_broker_does_not_fail_the_sink() {
        let settings = MqttSettings {
            host: "127.0.0.1".into(),
            port: closed_port(),
            ..MqttSettings::default()
        };
        let publisher = MqttPublisher::start(&settings).unwrap();
        let event = DecodedEvent::new(
            "AABBCCDDEEFF",
            -60,
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        );

        publisher.handle(&event).await.unwrap();
        publisher.close().await;
        assert_eq!(publisher.topic(), "ble/events");
    }

    #[tokio::test]
    async fn test_unreachable_broker_does_not_stall_the_bus() {
        let settings = MqttSettings {
            host: "127.0.0.1".into(),
            port: closed_port(),
            ..MqttSettings::default()
        };
        let bus = EventBus::default();
        bus.register_sink(Arc::new(MqttPublisher::start(&settings).unwrap()))
            .unwrap();
        let statistics = bus.sink_statistics(MqttPublisher::NAME).unwrap();

        let event = DecodedEvent::new(
            "AABBCCDDEEFF",
            -60,
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        );
        for _ in 0..200 {
            bus.publish(&event);
        }

        tokio::time::timeout(Duration::from_secs(10), bus.shutdown())
            .await
            .expect("bus shutdown waited on the broker");
        assert_eq!(statistics.delivered() + statistics.error_count(), 200);
        assert!(statistics.error_count() > 0);
    }
}
