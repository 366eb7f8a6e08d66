//! Zone classification from signal strength and movement

pub(crate) mod error;
pub(crate) mod region;
pub(crate) mod tracker;

pub mod api;
