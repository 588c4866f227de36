use std::time::Duration;

use serde::Deserialize;

use crate::Config;
use crate::shared::{
    MergeBatchConfig, PgConnectionConfig, SentryConfig, SyncTableConfig, ValidationError,
};

/// Complete configuration for the syncer service.
///
/// This intentionally does not implement `Serialize` to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncerConfig {
    /// Database holding the staging and target tables.
    pub database: PgConnectionConfig,
    /// Chunking settings shared by every table.
    #[serde(default)]
    pub batch: MergeBatchConfig,
    /// Staging/target pairs to drain, processed sequentially.
    pub tables: Vec<SyncTableConfig>,
    /// When set, runs repeat on this interval until a shutdown signal arrives.
    /// When absent, every table is drained once and the process exits.
    #[serde(default, with = "humantime_serde")]
    pub run_interval: Option<Duration>,
    /// Project reference attached to logs and metrics.
    #[serde(default)]
    pub project_ref: Option<String>,
    /// Optional Sentry configuration for error tracking.
    #[serde(default)]
    pub sentry: Option<SentryConfig>,
}

impl SyncerConfig {
    /// Validates the complete syncer configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.batch.validate()?;

        if self.tables.is_empty() {
            return Err(ValidationError::NoTablesConfigured);
        }

        for table in &self.tables {
            table.validate()?;
        }

        Ok(())
    }
}

impl Config for SyncerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> serde_json::Value {
        serde_json::json!({
            "database": {
                "host": "localhost",
                "port": 5432,
                "name": "warehouse",
                "username": "postgres",
                "password": "secret"
            },
            "tables": [{
                "schema": "dbo",
                "target_table": "orders",
                "staging_table": "orders_staging",
                "order_column": "loaded_at"
            }],
            "run_interval": "5m"
        })
    }

    #[test]
    fn test_deserializes_with_defaults() {
        let config: SyncerConfig = serde_json::from_value(sample()).unwrap();

        assert_eq!(config.batch.capacity, MergeBatchConfig::DEFAULT_CAPACITY);
        assert_eq!(config.run_interval, Some(Duration::from_secs(300)));
        assert!(config.tables[0].primary_key_column.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_table_list_is_rejected() {
        let mut value = sample();
        value["tables"] = serde_json::json!([]);
        let config: SyncerConfig = serde_json::from_value(value).unwrap();

        assert_eq!(config.validate(), Err(ValidationError::NoTablesConfigured));
    }

    #[test]
    fn test_staging_equal_to_target_is_rejected() {
        let mut value = sample();
        value["tables"][0]["staging_table"] = serde_json::json!("orders");
        let config: SyncerConfig = serde_json::from_value(value).unwrap();

        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue { field, .. }) if field == "tables.staging_table"
        ));
    }

    #[test]
    fn test_password_is_redacted_in_debug_output() {
        let config: SyncerConfig = serde_json::from_value(sample()).unwrap();

        assert!(!format!("{config:?}").contains("secret"));
    }
}
