//! Structured logging setup for the relay binary and its embedders

pub mod logging;

pub use logging::*;
