//! Batched synchronization of staging tables into target tables.
//!
//! Rows accumulate in a staging table and are drained into their target in bounded
//! chunks. Each chunk is the set of staging rows below a watermark on the ordering
//! column: it is upserted into the target and then deleted from staging, so partial
//! progress of an interrupted run is durable and the next run resumes from whatever
//! is left.
//!
//! [`BatchMerger`] drives a run over any [`StagingStore`] and [`MergeCapability`].
//! [`store::postgres::PostgresStore`] implements both on a Postgres pool and
//! [`store::memory::MemoryStore`] keeps everything in process.

pub mod error;
pub mod failpoints;
pub mod merge;
pub mod orchestrator;
pub mod planner;
pub mod purge;
pub mod setup;
pub mod store;
#[cfg(feature = "test-utils")]
pub mod test_utils;
pub mod types;
pub mod watermark;

pub use error::{ErrorKind, MergerError, MergerResult, RunPhase};
pub use merge::{MergeCapability, MergeOutcome};
pub use orchestrator::{BatchMerger, RunSummary};
pub use planner::{ChunkPlanner, plan_iterations};
pub use store::StagingStore;
pub use types::{OrderValue, RowFilter, SyncJob, TableName, Watermark};
pub use watermark::resolve_watermark;
