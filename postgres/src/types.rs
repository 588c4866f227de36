use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// A value of a staging table's ordering column.
///
/// Ordering columns are monotonically assigned on insert, so only sequence-like
/// and time-like column types are supported. Values of the same variant are
/// totally ordered.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrderValue {
    /// `smallint`, `integer` and `bigint` columns.
    Int(i64),
    /// `date` columns.
    Date(NaiveDate),
    /// `timestamp without time zone` columns.
    Timestamp(NaiveDateTime),
    /// `timestamp with time zone` columns.
    TimestampTz(DateTime<Utc>),
    /// `text`, `varchar` and `char` columns.
    Text(String),
}

impl fmt::Display for OrderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderValue::Int(value) => write!(f, "{value}"),
            OrderValue::Date(value) => write!(f, "{value}"),
            OrderValue::Timestamp(value) => write!(f, "{value}"),
            OrderValue::TimestampTz(value) => write!(f, "{}", value.to_rfc3339()),
            OrderValue::Text(value) => f.write_str(value),
        }
    }
}

/// Returned when an ordering column has a type [`OrderValue`] cannot represent.
#[derive(Debug, Error)]
#[error("unsupported ordering column type `{0}`")]
pub struct UnsupportedOrderTypeError(pub String);
