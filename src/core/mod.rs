//! Core services and infrastructure

pub mod error_handling;
pub mod logging;
pub mod pool;
pub mod retry;
pub mod shutdown;
pub mod sync;
