//! Error types for the merger crate.

use std::fmt;

use postgres::schema::TableName;
use thiserror::Error;

/// Step of a batched run, used to report where an aborted run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Planning,
    MeasuringSize,
    Resolving,
    Merging,
    Purging,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            RunPhase::Planning => "planning",
            RunPhase::MeasuringSize => "measuring staging size",
            RunPhase::Resolving => "resolving watermark",
            RunPhase::Merging => "merging",
            RunPhase::Purging => "purging",
        };
        f.write_str(phase)
    }
}

/// Failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A best-effort setup statement failed. Never aborts a run.
    SetupStatement,
    /// No valid upsert can be produced for the table pair. Fatal.
    MergeGeneration,
    /// Any other database failure while merging, purging or measuring. Fatal.
    Execution,
    /// The run was configured with invalid parameters.
    Configuration,
}

/// Errors that can occur during merge operations.
#[derive(Error, Debug)]
pub enum MergerError {
    /// Error from the database driver.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The upsert statement could not be generated.
    #[error("Cannot generate merge from {staging} into {target}: {reason}")]
    MergeGeneration {
        target: TableName,
        staging: TableName,
        reason: String,
    },

    /// A best-effort setup statement failed.
    #[error("Setup statement `{statement}` failed: {source}")]
    SetupStatement {
        statement: String,
        #[source]
        source: Box<MergerError>,
    },

    /// Table not found.
    #[error("Table not found: {0}")]
    TableNotFound(TableName),

    /// A store rejected an operation for a reason other than the driver.
    #[error("Store error: {0}")]
    Store(String),

    /// Invalid parameters.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A batched run stopped before its planned iterations completed.
    ///
    /// Chunks completed before `chunk` stay merged and purged.
    #[error(
        "Run aborted in chunk {chunk} while {phase} after {chunks_completed} completed chunks: {source}"
    )]
    RunAborted {
        chunk: u64,
        phase: RunPhase,
        chunks_completed: u64,
        staging_size: Option<u64>,
        #[source]
        source: Box<MergerError>,
    },
}

impl MergerError {
    /// Returns the [`ErrorKind`] of this error. Aborted runs report the kind of their cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MergerError::MergeGeneration { .. } => ErrorKind::MergeGeneration,
            MergerError::SetupStatement { .. } => ErrorKind::SetupStatement,
            MergerError::InvalidInput(_) => ErrorKind::Configuration,
            MergerError::RunAborted { source, .. } => source.kind(),
            MergerError::Database(_) | MergerError::TableNotFound(_) | MergerError::Store(_) => {
                ErrorKind::Execution
            }
        }
    }
}

/// Result type for merger operations.
pub type MergerResult<T> = Result<T, MergerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aborted_run_reports_kind_of_cause() {
        let cause = MergerError::MergeGeneration {
            target: TableName::new("sales", "orders"),
            staging: TableName::new("sales", "orders_staging"),
            reason: "target table has no primary key".to_string(),
        };
        let err = MergerError::RunAborted {
            chunk: 2,
            phase: RunPhase::Merging,
            chunks_completed: 1,
            staging_size: Some(1500),
            source: Box::new(cause),
        };

        assert_eq!(err.kind(), ErrorKind::MergeGeneration);
        assert_eq!(
            err.to_string(),
            "Run aborted in chunk 2 while merging after 1 completed chunks: Cannot generate merge \
             from sales.orders_staging into sales.orders: target table has no primary key"
        );
    }

    #[test]
    fn test_store_failures_are_execution_errors() {
        assert_eq!(
            MergerError::Store("connection reset".to_string()).kind(),
            ErrorKind::Execution
        );
        assert_eq!(
            MergerError::TableNotFound(TableName::new("sales", "missing")).kind(),
            ErrorKind::Execution
        );
    }
}
