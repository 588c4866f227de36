use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, error, info, warn};

use crate::error::{MergerError, MergerResult, RunPhase};
use crate::failpoints::{BEFORE_MERGE, BEFORE_PURGE, merger_fail_point};
use crate::merge::{MergeCapability, MergeOutcome};
use crate::planner::ChunkPlanner;
use crate::purge::purge;
use crate::setup::{SetupOutcome, ensure_primary_key};
use crate::store::StagingStore;
use crate::types::{RowFilter, SyncJob, Watermark};
use crate::watermark::resolve_watermark;

/// Statistics of a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Staging size measured before planning.
    pub initial_size: u64,
    pub iterations_planned: u64,
    /// Iterations that merged and purged rows.
    pub chunks_completed: u64,
    /// Iterations that found the staging table empty.
    pub empty_iterations: u64,
    /// Filtered iterations that moved no row because no staging value is below the
    /// watermark. Happens when more than `capacity` rows share the smallest ordering
    /// value, and repeats on every run until the ties are resolved.
    pub stalled_iterations: u64,
    /// Chunk merges restricted by a watermark.
    pub filtered_merges: u64,
    pub rows_merged: u64,
    pub rows_purged: u64,
    /// Staging size measured after the last iteration.
    pub final_size: u64,
}

/// What one iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChunkOutcome {
    Empty,
    Stalled {
        watermark: Watermark,
    },
    Drained {
        filtered: bool,
        merge: MergeOutcome,
        purged: u64,
    },
}

/// Failure of one iteration, before it is wrapped into [`MergerError::RunAborted`].
struct ChunkFailure {
    phase: RunPhase,
    staging_size: Option<u64>,
    error: MergerError,
}

impl ChunkFailure {
    fn at(phase: RunPhase, staging_size: Option<u64>) -> impl FnOnce(MergerError) -> Self {
        move |error| Self {
            phase,
            staging_size,
            error,
        }
    }
}

/// Drains a staging table into its target in bounded chunks.
///
/// Each iteration resolves a watermark at the fixed offset `capacity`, measures the
/// staging table and then either merges and purges the rows below the watermark, or
/// merges and purges everything when at most `capacity` rows remain. Chunks are
/// processed strictly one after another and each purge completes before the next
/// watermark is resolved, so no row is merged by two chunks.
pub struct BatchMerger<S, M> {
    store: S,
    merger: M,
    planner: ChunkPlanner,
    job: SyncJob,
}

impl<S, M> BatchMerger<S, M>
where
    S: StagingStore,
    M: MergeCapability,
{
    pub fn new(store: S, merger: M, planner: ChunkPlanner, job: SyncJob) -> Self {
        Self {
            store,
            merger,
            planner,
            job,
        }
    }

    pub fn job(&self) -> &SyncJob {
        &self.job
    }

    /// Runs best-effort setup for the job. Failures are logged and never abort.
    pub async fn provision(&self) -> Option<SetupOutcome> {
        let column = self.job.primary_key_column.as_deref()?;

        Some(ensure_primary_key(&self.store, &self.job.staging, column).await)
    }

    /// Provisions the staging table, then drains it.
    ///
    /// The number of iterations is planned once from the size measured at the start.
    /// Rows arriving faster than chunks drain stay in staging for the next run.
    ///
    /// The first merge or purge failure aborts the run with
    /// [`MergerError::RunAborted`]. Chunks completed before it stay committed.
    pub async fn run(&self) -> MergerResult<RunSummary> {
        let started = Instant::now();
        let staging = &self.job.staging;

        self.provision().await;

        let result = self.drain().await;

        let duration = started.elapsed();
        histogram!("merger.run.duration_seconds", "table" => staging.to_string())
            .record(duration.as_secs_f64());

        match &result {
            Ok(summary) => {
                info!(
                    %staging,
                    target = %self.job.target,
                    chunks_completed = summary.chunks_completed,
                    stalled_iterations = summary.stalled_iterations,
                    rows_merged = summary.rows_merged,
                    rows_purged = summary.rows_purged,
                    final_size = summary.final_size,
                    duration_ms = duration.as_millis() as u64,
                    "batched merge completed"
                );
            }
            Err(err) => {
                counter!("merger.runs.failed", "table" => staging.to_string()).increment(1);
                error!(
                    %staging,
                    target = %self.job.target,
                    error = %err,
                    error_kind = ?err.kind(),
                    "batched merge aborted"
                );
            }
        }

        result
    }

    async fn drain(&self) -> MergerResult<RunSummary> {
        let staging = &self.job.staging;

        let initial_size = self
            .store
            .count_rows(staging)
            .await
            .map_err(|err| self.aborted(0, 0, ChunkFailure::at(RunPhase::Planning, None)(err)))?;
        let iterations = self.planner.plan_iterations(initial_size);
        info!(
            %staging,
            target = %self.job.target,
            capacity = self.planner.capacity(),
            initial_size,
            iterations,
            "starting batched merge"
        );

        let mut summary = RunSummary {
            initial_size,
            iterations_planned: iterations,
            ..RunSummary::default()
        };

        for chunk in 1..=iterations {
            match self.run_chunk(chunk).await {
                Ok(ChunkOutcome::Empty) => summary.empty_iterations += 1,
                Ok(ChunkOutcome::Stalled { watermark }) => {
                    summary.stalled_iterations += 1;
                    counter!("merger.chunks.stalled", "table" => staging.to_string()).increment(1);
                    warn!(
                        %staging,
                        chunk,
                        %watermark,
                        order_column = %self.job.order_column,
                        "no staging row is below the watermark, chunk made no progress"
                    );
                }
                Ok(ChunkOutcome::Drained {
                    filtered,
                    merge,
                    purged,
                }) => {
                    summary.chunks_completed += 1;
                    summary.filtered_merges += u64::from(filtered);
                    summary.rows_merged += merge.rows();
                    summary.rows_purged += purged;
                    counter!("merger.chunks.completed", "table" => staging.to_string())
                        .increment(1);
                    counter!("merger.rows.purged", "table" => staging.to_string())
                        .increment(purged);
                }
                Err(failure) => return Err(self.aborted(chunk, summary.chunks_completed, failure)),
            }
        }

        summary.final_size = self.store.count_rows(staging).await.map_err(|err| {
            self.aborted(
                iterations,
                summary.chunks_completed,
                ChunkFailure::at(RunPhase::MeasuringSize, None)(err),
            )
        })?;

        Ok(summary)
    }

    async fn run_chunk(&self, chunk: u64) -> Result<ChunkOutcome, ChunkFailure> {
        let SyncJob {
            target,
            staging,
            order_column,
            ..
        } = &self.job;
        let capacity = self.planner.capacity();

        let watermark = resolve_watermark(&self.store, staging, order_column, capacity)
            .await
            .map_err(ChunkFailure::at(RunPhase::Resolving, None))?;

        let size = self
            .store
            .count_rows(staging)
            .await
            .map_err(ChunkFailure::at(RunPhase::MeasuringSize, None))?;
        info!(%staging, chunk, size, "staging table size");

        if size == 0 {
            debug!(%staging, chunk, "staging table is empty, skipping chunk");
            return Ok(ChunkOutcome::Empty);
        }

        let filter = (size > capacity).then(|| RowFilter::below(order_column, watermark));

        merger_fail_point(BEFORE_MERGE)
            .map_err(ChunkFailure::at(RunPhase::Merging, Some(size)))?;
        let merge = self
            .merger
            .merge(target, staging, filter.as_ref())
            .await
            .map_err(ChunkFailure::at(RunPhase::Merging, Some(size)))?;

        merger_fail_point(BEFORE_PURGE)
            .map_err(ChunkFailure::at(RunPhase::Purging, Some(size)))?;
        let purged = purge(
            &self.store,
            staging,
            order_column,
            filter.as_ref().map(|filter| &filter.watermark),
        )
        .await
        .map_err(ChunkFailure::at(RunPhase::Purging, Some(size)))?;

        let filtered = filter.is_some();
        if let Some(filter) = filter
            && merge == MergeOutcome::Skipped
            && purged == 0
        {
            return Ok(ChunkOutcome::Stalled {
                watermark: filter.watermark,
            });
        }

        Ok(ChunkOutcome::Drained {
            filtered,
            merge,
            purged,
        })
    }

    fn aborted(&self, chunk: u64, chunks_completed: u64, failure: ChunkFailure) -> MergerError {
        MergerError::RunAborted {
            chunk,
            phase: failure.phase,
            chunks_completed,
            staging_size: failure.staging_size,
            source: Box::new(failure.error),
        }
    }
}
