//! Scanner API
//!
//! Public interface of the scanner: the orchestrator, its settings and the
//! error type shared with the radio backends.

pub use crate::scanner::error::{ScanError, ScanResult};
pub use crate::scanner::manager::ScannerManager;
pub use crate::scanner::pipeline::{Ingested, Pipeline};
pub use crate::scanner::types::{ScanStatistics, ScanSummary, ScannerSettings};
