#[cfg(feature = "failpoints")]
pub mod failpoints;
