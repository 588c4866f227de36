//! Shared configuration types for the sync services.

mod base;
mod batch;
mod connection;
mod sentry;
mod sync;
mod syncer;

pub use base::ValidationError;
pub use batch::MergeBatchConfig;
pub use connection::{DefaultPgConnectionOptions, IntoConnectOptions, PgConnectionConfig, TlsConfig};
pub use sentry::SentryConfig;
pub use sync::SyncTableConfig;
pub use syncer::SyncerConfig;
