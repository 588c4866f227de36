//! Postgres plumbing for staging table synchronization.
//!
//! Holds table naming, the typed ordering column value and the raw `sqlx` queries
//! the merge core issues against staging and target tables.

pub mod schema;
pub mod sqlx;
pub mod types;
