use std::future::Future;

use crate::error::MergerResult;
use crate::types::{OrderValue, TableName};

/// Tabular store holding staging tables.
///
/// Every operation maps to a single statement. Offsets are 1-based and values are
/// compared with strict less-than.
pub trait StagingStore {
    /// Returns the number of rows in `table`.
    fn count_rows(&self, table: &TableName) -> impl Future<Output = MergerResult<u64>> + Send;

    /// Returns the value of `column` at the 1-based `offset` in ascending order, or
    /// `None` when `table` holds fewer than `offset` rows.
    fn value_at_offset(
        &self,
        table: &TableName,
        column: &str,
        offset: u64,
    ) -> impl Future<Output = MergerResult<Option<OrderValue>>> + Send;

    /// Returns the smallest value of `column`, `None` when `table` is empty.
    fn min_value(
        &self,
        table: &TableName,
        column: &str,
    ) -> impl Future<Output = MergerResult<Option<OrderValue>>> + Send;

    /// Deletes the rows whose `column` is strictly below `value`. Returns the deleted count.
    fn delete_below(
        &self,
        table: &TableName,
        column: &str,
        value: &OrderValue,
    ) -> impl Future<Output = MergerResult<u64>> + Send;

    /// Deletes every row of `table`. Returns the deleted count.
    fn delete_all(&self, table: &TableName) -> impl Future<Output = MergerResult<u64>> + Send;

    /// Lists the primary key columns of `table` in key order, empty when it has none.
    fn primary_key_columns(
        &self,
        table: &TableName,
    ) -> impl Future<Output = MergerResult<Vec<String>>> + Send;

    /// Executes a provisioning statement.
    ///
    /// Failures are returned, callers decide whether they are fatal.
    fn execute_setup(&self, statement: &str) -> impl Future<Output = MergerResult<()>> + Send;
}
