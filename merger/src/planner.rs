use std::num::NonZeroU64;

use config::shared::MergeBatchConfig;

use crate::error::{MergerError, MergerResult};

/// Decides how many chunk iterations a run performs.
///
/// The count is fixed once at the start of a run from the staging size observed then.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlanner {
    capacity: NonZeroU64,
    iteration_margin: u64,
}

impl ChunkPlanner {
    /// Creates a planner with the default margin of one extra iteration.
    pub fn new(capacity: NonZeroU64) -> Self {
        Self {
            capacity,
            iteration_margin: MergeBatchConfig::DEFAULT_ITERATION_MARGIN,
        }
    }

    pub fn with_iteration_margin(mut self, iteration_margin: u64) -> Self {
        self.iteration_margin = iteration_margin;
        self
    }

    pub fn from_config(config: &MergeBatchConfig) -> MergerResult<Self> {
        let capacity = NonZeroU64::new(config.capacity).ok_or_else(|| {
            MergerError::InvalidInput("batch capacity must be greater than 0".to_string())
        })?;

        Ok(Self::new(capacity).with_iteration_margin(config.iteration_margin))
    }

    pub fn capacity(&self) -> u64 {
        self.capacity.get()
    }

    pub fn iteration_margin(&self) -> u64 {
        self.iteration_margin
    }

    /// Returns `ceil(initial_size / capacity) + iteration_margin`.
    ///
    /// An empty staging table still plans `iteration_margin` iterations, which end
    /// up skipped unless rows arrive during the run.
    pub fn plan_iterations(&self, initial_size: u64) -> u64 {
        initial_size
            .div_ceil(self.capacity.get())
            .saturating_add(self.iteration_margin)
    }
}

/// Plans iterations with the default margin. See [`ChunkPlanner::plan_iterations`].
pub fn plan_iterations(initial_size: u64, capacity: NonZeroU64) -> u64 {
    ChunkPlanner::new(capacity).plan_iterations(initial_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capacity(value: u64) -> NonZeroU64 {
        NonZeroU64::new(value).unwrap()
    }

    #[test]
    fn test_plans_one_extra_iteration() {
        assert_eq!(plan_iterations(2500, capacity(1000)), 4);
        assert_eq!(plan_iterations(1000, capacity(1000)), 2);
        assert_eq!(plan_iterations(1001, capacity(1000)), 3);
        assert_eq!(plan_iterations(1, capacity(1000)), 2);
    }

    #[test]
    fn test_empty_table_plans_margin_only() {
        assert_eq!(plan_iterations(0, capacity(1000)), 1);
        assert_eq!(
            ChunkPlanner::new(capacity(1000))
                .with_iteration_margin(0)
                .plan_iterations(0),
            0
        );
    }

    #[test]
    fn test_from_config_rejects_zero_capacity() {
        let config = MergeBatchConfig {
            capacity: 0,
            iteration_margin: 1,
        };

        assert!(matches!(
            ChunkPlanner::from_config(&config),
            Err(MergerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_config_applies_margin() {
        let config = MergeBatchConfig {
            capacity: 500,
            iteration_margin: 3,
        };

        let planner = ChunkPlanner::from_config(&config).unwrap();

        assert_eq!(planner.capacity(), 500);
        assert_eq!(planner.plan_iterations(1200), 6);
    }
}
