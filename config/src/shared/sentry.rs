use secrecy::SecretString;
use serde::Deserialize;

/// Sentry error tracking configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SentryConfig {
    /// Sentry DSN (Data Source Name) for error reporting.
    pub dsn: SecretString,
}
