use std::fmt;

pub use postgres::schema::TableName;
pub use postgres::types::OrderValue;

/// Upper bound of the staging rows selected by one chunk.
///
/// A watermark is always compared with strict less-than, so the row holding the
/// watermark value itself belongs to the next chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Watermark {
    /// Returned for an empty staging table. No value is below it.
    Floor,
    /// A concrete value of the ordering column.
    Value(OrderValue),
}

impl Watermark {
    /// Returns the ordering value, `None` for [`Watermark::Floor`].
    pub fn value(&self) -> Option<&OrderValue> {
        match self {
            Watermark::Floor => None,
            Watermark::Value(value) => Some(value),
        }
    }

    /// Returns `true` if `value` is strictly below this watermark.
    pub fn admits(&self, value: &OrderValue) -> bool {
        match self {
            Watermark::Floor => false,
            Watermark::Value(watermark) => value < watermark,
        }
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Watermark::Floor => f.write_str("floor"),
            Watermark::Value(value) => write!(f, "{value}"),
        }
    }
}

/// Restricts a merge to staging rows whose ordering column is below a watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub column: String,
    pub watermark: Watermark,
}

impl RowFilter {
    pub fn below(column: impl Into<String>, watermark: Watermark) -> Self {
        Self {
            column: column.into(),
            watermark,
        }
    }

    /// Returns `true` if a row with ordering `value` passes the filter.
    pub fn admits(&self, value: &OrderValue) -> bool {
        self.watermark.admits(value)
    }
}

impl fmt::Display for RowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} < {}", self.column, self.watermark)
    }
}

/// One staging/target pair drained by a batched run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
    pub target: TableName,
    pub staging: TableName,
    pub order_column: String,
    /// Column receiving a best-effort primary key on the staging table before the run.
    pub primary_key_column: Option<String>,
}

impl From<&config::shared::SyncTableConfig> for SyncJob {
    fn from(config: &config::shared::SyncTableConfig) -> Self {
        Self {
            target: TableName::new(&config.schema, &config.target_table),
            staging: TableName::new(&config.schema, &config.staging_table),
            order_column: config.order_column.clone(),
            primary_key_column: config.primary_key_column.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_admits_nothing() {
        assert!(!Watermark::Floor.admits(&OrderValue::Int(i64::MIN)));
        assert_eq!(Watermark::Floor.value(), None);
    }

    #[test]
    fn test_watermark_is_exclusive() {
        let watermark = Watermark::Value(OrderValue::Int(1000));

        assert!(watermark.admits(&OrderValue::Int(999)));
        assert!(!watermark.admits(&OrderValue::Int(1000)));
    }
}
