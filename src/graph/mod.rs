//! Co-occurrence graph of devices seen close together in time

pub(crate) mod builder;
pub(crate) mod recorder;

pub mod api;
