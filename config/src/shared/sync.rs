use serde::Deserialize;

use crate::shared::ValidationError;

/// One staging/target pair drained by the syncer.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncTableConfig {
    /// Schema holding both the staging and the target table.
    pub schema: String,
    /// Durable destination table rows are upserted into.
    pub target_table: String,
    /// Table accumulating rows awaiting synchronization.
    pub staging_table: String,
    /// Monotonically assigned column used to order and chunk staging rows.
    pub order_column: String,
    /// When set, a primary key on this column is created on the staging table
    /// before the run. Failures are tolerated.
    #[serde(default)]
    pub primary_key_column: Option<String>,
}

impl SyncTableConfig {
    /// Validates the table configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("schema", &self.schema),
            ("target_table", &self.target_table),
            ("staging_table", &self.staging_table),
            ("order_column", &self.order_column),
        ];

        for (field, value) in required {
            if value.is_empty() {
                return Err(ValidationError::InvalidFieldValue {
                    field: format!("tables.{field}"),
                    constraint: "cannot be empty".to_string(),
                });
            }
        }

        if self.target_table == self.staging_table {
            return Err(ValidationError::InvalidFieldValue {
                field: "tables.staging_table".to_string(),
                constraint: "must differ from target_table".to_string(),
            });
        }

        if matches!(&self.primary_key_column, Some(column) if column.is_empty()) {
            return Err(ValidationError::InvalidFieldValue {
                field: "tables.primary_key_column".to_string(),
                constraint: "cannot be empty when set".to_string(),
            });
        }

        Ok(())
    }
}
