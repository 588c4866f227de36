use std::time::Instant;

use config::shared::SyncerConfig;
use merger::store::postgres::PostgresStore;
use merger::{BatchMerger, ChunkPlanner, SyncJob};
use metrics::{counter, histogram};
use postgres::sqlx::connect_to_database;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{Instrument, error, info, info_span};

/// Runs are sequential, one connection covers every statement.
const MAX_CONNECTIONS: u32 = 1;

/// Validates the configuration, connects to the database and drains every configured table.
///
/// Without a `run_interval` each table is drained once and an error is returned if any
/// run failed. With one, cycles repeat until SIGTERM or SIGINT arrives.
pub async fn start_syncer(config: SyncerConfig) -> anyhow::Result<()> {
    config.validate()?;

    let planner = ChunkPlanner::from_config(&config.batch)?;
    let jobs: Vec<SyncJob> = config.tables.iter().map(SyncJob::from).collect();

    info!(
        host = %config.database.host,
        database = %config.database.name,
        table_count = jobs.len(),
        capacity = planner.capacity(),
        iteration_margin = planner.iteration_margin(),
        "starting syncer"
    );

    let pool = connect_to_database(&config.database, MAX_CONNECTIONS).await?;
    let store = PostgresStore::new(pool);

    let result = match config.run_interval {
        None => {
            let failures = run_cycle(&store, planner, &jobs).await;
            if failures > 0 {
                Err(anyhow::anyhow!(
                    "{failures} of {} tables failed to sync",
                    jobs.len()
                ))
            } else {
                Ok(())
            }
        }
        Some(run_interval) => run_on_interval(&store, planner, &jobs, run_interval).await,
    };

    store.pool().close().await;
    info!("syncer shutdown complete");

    result
}

async fn run_on_interval(
    store: &PostgresStore,
    planner: ChunkPlanner,
    jobs: &[SyncJob],
    run_interval: std::time::Duration,
) -> anyhow::Result<()> {
    info!(
        interval_secs = run_interval.as_secs(),
        "running sync cycles on interval"
    );

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let mut interval = tokio::time::interval(run_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_cycle(store, planner, jobs).await;
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down gracefully");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down gracefully");
                break;
            }
        }
    }

    Ok(())
}

/// Drains every table once. A failed table does not stop the others.
///
/// Returns the number of tables whose run failed.
async fn run_cycle(store: &PostgresStore, planner: ChunkPlanner, jobs: &[SyncJob]) -> usize {
    let start = Instant::now();
    let mut failure_count = 0;

    for job in jobs {
        let span = info_span!("sync_table", staging = %job.staging, target = %job.target);
        let merger = BatchMerger::new(store.clone(), store.clone(), planner, job.clone());

        match merger.run().instrument(span).await {
            Ok(_) => {
                counter!("syncer.table.success", "table" => job.staging.to_string()).increment(1);
            }
            Err(err) => {
                failure_count += 1;
                sentry::capture_error(&err);
                error!(
                    staging = %job.staging,
                    target = %job.target,
                    %err,
                    "failed to sync table"
                );
                counter!("syncer.table.failure", "table" => job.staging.to_string()).increment(1);
            }
        }
    }

    let duration = start.elapsed();
    histogram!("syncer.cycle.duration_seconds").record(duration.as_secs_f64());
    info!(
        duration_secs = duration.as_secs(),
        success_count = jobs.len() - failure_count,
        failure_count,
        "sync cycle completed"
    );

    failure_count
}
