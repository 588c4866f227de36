mod base;
pub mod statement;

pub use base::{MergeCapability, MergeOutcome};
