//! Staging syncer service binary.
//!
//! Drains configured staging tables into their target tables in bounded chunks,
//! either once or on a fixed interval.

use config::load_config;
use config::shared::SyncerConfig;
use telemetry::metrics::init_metrics;
use telemetry::tracing::init_tracing;
use tracing::{Instrument, error, info_span};

use crate::core::start_syncer;

mod core;
mod sentry_init;

/// The name of the environment variable which contains version information for this syncer.
const APP_VERSION_ENV_NAME: &str = "APP_VERSION";

/// Loads configuration, initializes tracing, Sentry and metrics, then runs the
/// syncer on a multi-threaded runtime.
fn main() -> anyhow::Result<()> {
    let syncer_config: SyncerConfig = load_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    // Sentry is initialized before the runtime so panics in runtime threads are captured.
    let _sentry_guard = sentry_init::init(&syncer_config)?;

    init_metrics(syncer_config.project_ref.as_deref())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(syncer_config))?;

    Ok(())
}

async fn async_main(syncer_config: SyncerConfig) -> anyhow::Result<()> {
    let span = info_span!("syncer", project = syncer_config.project_ref.as_deref());

    if let Err(err) = start_syncer(syncer_config).instrument(span).await {
        sentry::capture_error(&*err);
        error!(%err, "an error occurred in the syncer");
        return Err(err);
    }

    Ok(())
}
