use serde::Deserialize;

use crate::shared::ValidationError;

/// Chunking configuration for a batched merge run.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MergeBatchConfig {
    /// Maximum number of staging rows merged and purged by one chunk.
    #[serde(default = "default_capacity")]
    pub capacity: u64,
    /// Extra iterations planned on top of `ceil(initial_size / capacity)`.
    ///
    /// Absorbs rows inserted while a run is in progress. It is a heuristic margin:
    /// rows arriving faster than chunks drain are left for the next run.
    #[serde(default = "default_iteration_margin")]
    pub iteration_margin: u64,
}

impl MergeBatchConfig {
    /// Default number of rows per chunk.
    pub const DEFAULT_CAPACITY: u64 = 1000;

    /// Default number of extra iterations per run.
    pub const DEFAULT_ITERATION_MARGIN: u64 = 1;

    /// Validates batch configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.capacity == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch.capacity".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for MergeBatchConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            iteration_margin: default_iteration_margin(),
        }
    }
}

fn default_capacity() -> u64 {
    MergeBatchConfig::DEFAULT_CAPACITY
}

fn default_iteration_margin() -> u64 {
    MergeBatchConfig::DEFAULT_ITERATION_MARGIN
}
