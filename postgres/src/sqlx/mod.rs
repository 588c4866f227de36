//! Queries executed through `sqlx`.

pub mod tables;
#[cfg(feature = "test-utils")]
pub mod test_utils;

use config::shared::{IntoConnectOptions, PgConnectionConfig};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

/// Connects to the configured database with a small pool.
///
/// Runs are sequential, so a single connection is enough; `max_connections`
/// exists for callers that drain several tables from separate tasks.
pub async fn connect_to_database(
    config: &PgConnectionConfig,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    let options: PgConnectOptions = config.with_db();

    PgPoolOptions::new()
        .min_connections(1)
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await
}
