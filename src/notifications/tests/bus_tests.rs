//! Subscriber fan-out and queue policy

use crate::notifications::api::{DecodedEvent, EventBus, EventFilter, NotificationError};
use crate::decoder::parse_ibeacon;
use chrono::DateTime;
use std::time::Duration;
use tokio::time::timeout;

fn event(address: &str, rssi: i16) -> DecodedEvent {
    DecodedEvent::new(address, rssi, DateTime::from_timestamp(1_700_000_000, 0).unwrap())
}

#[tokio::test]
async fn test_subscriber_receives_matching_events_only() {
    let bus = EventBus::default();
    let mut beacons = bus
        .subscribe("beacons", EventFilter::BeaconsOnly, "test")
        .unwrap();
    let mut everything = bus.subscribe("all", EventFilter::All, "test").unwrap();

    let mut beacon = event("000000000001", -50);
    let mut payload = vec![0x02, 0x15];
    payload.extend([0u8; 21]);
    beacon.ibeacon = parse_ibeacon(&payload);

    bus.publish(&event("000000000002", -50));
    let report = bus.publish(&beacon);
    assert_eq!(report.queued, 2);

    assert_eq!(everything.recv().await.unwrap().address, "000000000002");
    assert_eq!(everything.recv().await.unwrap().address, "000000000001");
    assert_eq!(beacons.recv().await.unwrap().address, "000000000001");
    assert!(timeout(Duration::from_millis(50), beacons.recv()).await.is_err());
}

#[tokio::test]
async fn test_full_queue_rejects_newest() {
    let bus = EventBus::new(2, 16);
    let mut receiver = bus.subscribe("slow", EventFilter::All, "test").unwrap();

    for i in 0..5 {
        bus.publish(&event(&format!("00000000000{i}"), -50));
    }

    let stats = bus.subscriber_statistics("slow").unwrap();
    assert_eq!(stats.delivered(), 2);
    assert_eq!(stats.dropped(), 3);

    assert_eq!(receiver.recv().await.unwrap().address, "000000000000");
    assert_eq!(receiver.recv().await.unwrap().address, "000000000001");

    // Space is available again
    bus.publish(&event("00000000000A", -50));
    assert_eq!(receiver.recv().await.unwrap().address, "00000000000A");
}

#[tokio::test]
async fn test_slow_subscriber_does_not_affect_others() {
    let bus = EventBus::new(1, 16);
    let _slow = bus.subscribe("slow", EventFilter::All, "test").unwrap();
    let mut fast = bus.subscribe("fast", EventFilter::All, "test").unwrap();

    for i in 0..3 {
        bus.publish(&event(&format!("00000000000{i}"), -50));
        assert_eq!(fast.recv().await.unwrap().address, format!("00000000000{i}"));
    }
    assert_eq!(bus.subscriber_statistics("slow").unwrap().dropped(), 2);
    assert_eq!(bus.subscriber_statistics("fast").unwrap().dropped(), 0);
}

#[tokio::test]
async fn test_dropped_receiver_is_removed() {
    let bus = EventBus::default();
    let receiver = bus.subscribe("gone", EventFilter::All, "test").unwrap();
    drop(receiver);

    let report = bus.publish(&event("000000000001", -50));
    assert_eq!(report.removed, 1);
    assert!(!bus.has_subscriber("gone"));
    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test]
async fn test_resubscribe_replaces_existing() {
    let bus = EventBus::default();
    let _first = bus.subscribe("dup", EventFilter::All, "one").unwrap();
    let mut second = bus
        .subscribe("dup", EventFilter::MinRssi(-60), "two")
        .unwrap();
    assert_eq!(bus.subscriber_count(), 1);

    bus.publish(&event("000000000001", -80));
    bus.publish(&event("000000000002", -40));
    assert_eq!(second.recv().await.unwrap().address, "000000000002");
}

#[tokio::test]
async fn test_unsubscribe() {
    let bus = EventBus::default();
    let _receiver = bus.subscribe("x", EventFilter::All, "test").unwrap();
    assert!(bus.unsubscribe("x"));
    assert!(!bus.unsubscribe("x"));
}

#[tokio::test]
async fn test_shutdown_closes_subscriptions_after_queued_events() {
    let bus = EventBus::default();
    let mut receiver = bus.subscribe("s", EventFilter::All, "test").unwrap();
    bus.publish(&event("000000000001", -50));

    bus.shutdown().await;

    assert_eq!(receiver.recv().await.unwrap().address, "000000000001");
    assert!(receiver.recv().await.is_none());
    assert_eq!(bus.publish(&event("000000000002", -50)).queued, 0);
    assert_eq!(
        bus.subscribe("late", EventFilter::All, "test").unwrap_err(),
        NotificationError::Closed
    );
}
