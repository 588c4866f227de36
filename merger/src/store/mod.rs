mod base;
pub mod memory;
pub mod postgres;

pub use base::StagingStore;
