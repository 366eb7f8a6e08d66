//! Public API for co-occurrence graphs

pub use crate::graph::builder::{
    build_cooccurrence, from_records, Adjacency, Sighting, DEFAULT_WINDOW_SECS,
};
pub use crate::graph::recorder::{SightingRecorder, DEFAULT_SIGHTING_CAPACITY};
