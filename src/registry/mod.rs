//! Device registry
//!
//! Per-address device state with bounded RSSI history, pluggable persistence
//! (SQLite or memory) and a retention sweep.

pub(crate) mod address;
pub(crate) mod category;
pub(crate) mod error;
pub(crate) mod locks;
pub(crate) mod manager;
pub(crate) mod record;
pub(crate) mod sqlite;
pub(crate) mod store;

pub mod api;
