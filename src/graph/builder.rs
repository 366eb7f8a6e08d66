//! Co-occurrence graph construction
//!
//! Two devices are linked when they were sighted within the window of each
//! other. Edges are undirected and stored in both directions; devices with no
//! neighbour do not appear.

use crate::registry::api::DeviceRecord;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// A device seen at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sighting {
    pub address: String,
    pub timestamp: DateTime<Utc>,
}

impl Sighting {
    pub fn new(address: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            address: address.into(),
            timestamp,
        }
    }
}

pub type Adjacency = BTreeMap<String, BTreeSet<String>>;

/// Build the adjacency map of devices sighted within `window` of each other
///
/// Sightings are sorted by time; each one is compared with the following
/// sightings until the gap exceeds the window.
pub fn build_cooccurrence<I>(sightings: I, window: Duration) -> Adjacency
where
    I: IntoIterator<Item = Sighting>,
{
    let mut events: Vec<Sighting> = sightings.into_iter().collect();
    events.sort_by_key(|s| s.timestamp);

    let mut graph = Adjacency::new();
    for (i, first) in events.iter().enumerate() {
        for second in &events[i + 1..] {
            if second.timestamp - first.timestamp > window {
                break;
            }
            if first.address != second.address {
                graph
                    .entry(first.address.clone())
                    .or_default()
                    .insert(second.address.clone());
                graph
                    .entry(second.address.clone())
                    .or_default()
                    .insert(first.address.clone());
            }
        }
    }
    graph
}

/// Graph over the last-seen time of each stored device
pub fn from_records<'a, I>(records: I, window: Duration) -> Adjacency
where
    I: IntoIterator<Item = &'a DeviceRecord>,
{
    build_cooccurrence(
        records
            .into_iter()
            .map(|record| Sighting::new(record.address(), record.last_seen())),
        window,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::api::{DeviceRegistry, MemoryDeviceStore, Observation, RegistrySettings};
    use crate::core::pool::WorkerPool;
    use std::sync::Arc;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_window_separates_distant_sightings() {
        let graph = build_cooccurrence(
            vec![
                Sighting::new("CC", at(120)),
                Sighting::new("AA", at(0)),
                Sighting::new("BB", at(10)),
            ],
            Duration::seconds(60),
        );

        assert_eq!(graph.len(), 2);
        assert_eq!(graph["AA"], set(&["BB"]));
        assert_eq!(graph["BB"], set(&["AA"]));
        assert!(!graph.contains_key("CC"));
    }

    #[test]
    fn test_gap_equal_to_window_still_links() {
        let graph = build_cooccurrence(
            vec![Sighting::new("AA", at(0)), Sighting::new("BB", at(60))],
            Duration::seconds(60),
        );
        assert_eq!(graph["AA"], set(&["BB"]));
    }

    #[test]
    fn test_repeated_sightings_of_one_device_have_no_self_edge() {
        let graph = build_cooccurrence(
            vec![
                Sighting::new("AA", at(0)),
                Sighting::new("AA", at(1)),
                Sighting::new("BB", at(2)),
            ],
            Duration::seconds(60),
        );
        assert_eq!(graph["AA"], set(&["BB"]));
        assert_eq!(graph["BB"], set(&["AA"]));
    }

    #[test]
    fn test_edges_are_symmetric() {
        let sightings: Vec<Sighting> = (0..10)
            .map(|i| Sighting::new(format!("{:02}", i % 4), at(i * 20)))
            .collect();
        let graph = build_cooccurrence(sightings, Duration::seconds(30));

        for (node, neighbours) in &graph {
            for neighbour in neighbours {
                assert!(graph[neighbour].contains(node));
            }
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(build_cooccurrence(Vec::new(), Duration::seconds(60)).is_empty());
    }

    #[tokio::test]
    async fn test_from_registry_records() {
        let registry = DeviceRegistry::new(
            Arc::new(MemoryDeviceStore::new()),
            WorkerPool::new(1),
            RegistrySettings::default(),
        );
        for (address, secs) in [("000000000001", 0), ("000000000002", 30), ("000000000003", 500)] {
            registry
                .update(address, Observation::new(at(secs), -50))
                .await
                .unwrap();
        }

        let records = registry
            .list(crate::registry::api::Page::first(100))
            .await
            .unwrap();
        let graph = from_records(&records, Duration::seconds(60));

        assert_eq!(graph["000000000001"], set(&["000000000002"]));
        assert!(!graph.contains_key("000000000003"));
    }
}
