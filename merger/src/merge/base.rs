use std::future::Future;

use crate::error::MergerResult;
use crate::types::{RowFilter, TableName};

/// Result of one merge invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No staging row passed the filter, nothing was executed.
    Skipped,
    /// Rows were upserted into the target. `rows` counts inserted and changed rows.
    Merged { rows: u64 },
}

impl MergeOutcome {
    pub fn rows(&self) -> u64 {
        match self {
            MergeOutcome::Skipped => 0,
            MergeOutcome::Merged { rows } => *rows,
        }
    }
}

/// Upserts staging rows into a target table.
///
/// Rows whose key is absent from the target are inserted, present rows are updated
/// only when a column changed, and target rows missing from staging are left alone.
pub trait MergeCapability {
    /// Merges the rows of `staging` passing `filter` into `target`, or every row
    /// when `filter` is `None`.
    ///
    /// Fails with [`crate::error::MergerError::MergeGeneration`] when no upsert can be
    /// produced for the table pair.
    fn merge(
        &self,
        target: &TableName,
        staging: &TableName,
        filter: Option<&RowFilter>,
    ) -> impl Future<Output = MergerResult<MergeOutcome>> + Send;
}
