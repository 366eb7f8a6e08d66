//! Built-in event sinks

pub(crate) mod logging;
pub(crate) mod mqtt;
