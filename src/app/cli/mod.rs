//! Command line interface

pub(crate) mod args;

pub use args::Args;
