//! Scanner orchestration
//!
//! Runs scan workers against the configured radio backends and feeds every
//! packet through the ingest pipeline into the registry and the event bus.

pub(crate) mod error;
pub(crate) mod manager;
pub(crate) mod pipeline;
pub(crate) mod types;
pub(crate) mod worker;

pub mod api;

#[cfg(test)]
mod tests;
