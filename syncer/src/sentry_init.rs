use std::sync::Arc;

use config::Environment;
use config::shared::SyncerConfig;
use secrecy::ExposeSecret;
use tracing::info;

use crate::APP_VERSION_ENV_NAME;

/// Initializes Sentry when the configuration carries a DSN.
///
/// Events are tagged with `service=syncer` and the version from `APP_VERSION` when set.
/// Returns [`None`] when Sentry is not configured.
pub fn init(config: &SyncerConfig) -> anyhow::Result<Option<sentry::ClientInitGuard>> {
    let Some(sentry_config) = &config.sentry else {
        info!("sentry not configured, skipping initialization");
        return Ok(None);
    };

    info!("initializing sentry with supplied dsn");

    let environment = Environment::load()?;
    let dsn = sentry_config.dsn.expose_secret().parse()?;

    let guard = sentry::init(sentry::ClientOptions {
        dsn: Some(dsn),
        environment: Some(environment.to_string().into()),
        integrations: vec![Arc::new(
            sentry::integrations::panic::PanicIntegration::new(),
        )],
        attach_stacktrace: true,
        ..Default::default()
    });

    let version = std::env::var(APP_VERSION_ENV_NAME);
    sentry::configure_scope(|scope| {
        scope.set_tag("service", "syncer");
        if let Ok(version) = version {
            scope.set_tag("version", version);
        }
    });

    Ok(Some(guard))
}
