pub mod app;
pub mod backend;
pub mod core;
pub mod decoder;
pub mod graph;
pub mod notifications;
pub mod registry;
pub mod scanner;
pub mod vendor;
pub mod zones;

include!(concat!(env!("OUT_DIR"), "/version.rs"));
