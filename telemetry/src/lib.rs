//! Logging and metrics initialization shared by the sync binaries.

pub mod metrics;
pub mod tracing;
