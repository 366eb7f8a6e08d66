//! Live sighting capture for graph building

use crate::graph::builder::{build_cooccurrence, Adjacency, Sighting};
use crate::notifications::api::{DecodedEvent, EventSink, SinkError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub const DEFAULT_SIGHTING_CAPACITY: usize = 4096;

/// Ring of the most recent sightings; the oldest is overwritten when full
pub struct SightingRecorder {
    capacity: usize,
    sightings: Mutex<VecDeque<Sighting>>,
}

impl SightingRecorder {
    pub const NAME: &'static str = "sightings";

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            sightings: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_SIGHTING_CAPACITY))),
        }
    }

    pub fn record(&self, sighting: Sighting) {
        let mut sightings = self.sightings.lock().unwrap_or_else(|p| p.into_inner());
        if sightings.len() == self.capacity {
            sightings.pop_front();
        }
        sightings.push_back(sighting);
    }

    pub fn len(&self) -> usize {
        self.sightings.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Sighting> {
        self.sightings
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn graph(&self, window: chrono::Duration) -> Adjacency {
        build_cooccurrence(self.snapshot(), window)
    }
}

impl Default for SightingRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_SIGHTING_CAPACITY)
    }
}

#[async_trait]
impl EventSink for SightingRecorder {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(&self, event: &DecodedEvent) -> Result<(), SinkError> {
        self.record(Sighting::new(event.address.clone(), event.timestamp));
        Ok(())
    }
}
