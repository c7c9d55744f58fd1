//! Operational logging for relaydb

pub mod logger;

pub use logger::{Logger, Severity};
