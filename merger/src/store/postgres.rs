use postgres::sqlx::tables;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::MergerResult;
use crate::merge::statement::{MergeColumns, UpsertStatement};
use crate::merge::{MergeCapability, MergeOutcome};
use crate::store::StagingStore;
use crate::types::{OrderValue, RowFilter, TableName, Watermark};

/// Store backed by a Postgres connection pool.
///
/// Merges are generated `insert ... on conflict` upserts, see [`UpsertStatement`].
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Lists the columns of `table` in ordinal order.
    pub async fn list_columns(&self, table: &TableName) -> MergerResult<Vec<String>> {
        Ok(tables::get_column_names(&self.pool, table).await?)
    }

    /// Drops `table` if it exists.
    pub async fn drop_table(&self, table: &TableName) -> MergerResult<()> {
        Ok(tables::drop_table(&self.pool, table).await?)
    }

    async fn count_pending(
        &self,
        staging: &TableName,
        filter: Option<&RowFilter>,
    ) -> MergerResult<u64> {
        let count = match filter {
            None => tables::count_rows(&self.pool, staging).await?,
            Some(RowFilter {
                watermark: Watermark::Floor,
                ..
            }) => 0,
            Some(RowFilter {
                column,
                watermark: Watermark::Value(value),
            }) => tables::count_rows_below(&self.pool, staging, column, value).await?,
        };

        Ok(count)
    }
}

impl StagingStore for PostgresStore {
    async fn count_rows(&self, table: &TableName) -> MergerResult<u64> {
        Ok(tables::count_rows(&self.pool, table).await?)
    }

    async fn value_at_offset(
        &self,
        table: &TableName,
        column: &str,
        offset: u64,
    ) -> MergerResult<Option<OrderValue>> {
        Ok(tables::order_value_at_offset(&self.pool, table, column, offset).await?)
    }

    async fn min_value(&self, table: &TableName, column: &str) -> MergerResult<Option<OrderValue>> {
        Ok(tables::min_order_value(&self.pool, table, column).await?)
    }

    async fn delete_below(
        &self,
        table: &TableName,
        column: &str,
        value: &OrderValue,
    ) -> MergerResult<u64> {
        Ok(tables::delete_rows_below(&self.pool, table, column, value).await?)
    }

    async fn delete_all(&self, table: &TableName) -> MergerResult<u64> {
        Ok(tables::delete_all_rows(&self.pool, table).await?)
    }

    async fn primary_key_columns(&self, table: &TableName) -> MergerResult<Vec<String>> {
        Ok(tables::get_primary_key_columns(&self.pool, table).await?)
    }

    async fn execute_setup(&self, statement: &str) -> MergerResult<()> {
        tables::execute_statement(&self.pool, statement).await?;

        Ok(())
    }
}

impl MergeCapability for PostgresStore {
    async fn merge(
        &self,
        target: &TableName,
        staging: &TableName,
        filter: Option<&RowFilter>,
    ) -> MergerResult<MergeOutcome> {
        let pending = self.count_pending(staging, filter).await?;
        if pending == 0 {
            debug!(%staging, "no staging rows pass the filter, skipping merge");
            return Ok(MergeOutcome::Skipped);
        }

        let target_columns = self.list_columns(target).await?;
        let staging_columns = self.list_columns(staging).await?;
        let key_columns = self.primary_key_columns(target).await?;

        let statement = UpsertStatement::build(
            target,
            staging,
            MergeColumns {
                target: &target_columns,
                staging: &staging_columns,
                key: &key_columns,
            },
            filter,
        )?;
        debug!(sql = statement.sql(), "executing upsert");

        let rows =
            tables::execute_with_order_value(&self.pool, statement.sql(), statement.watermark())
                .await?;
        info!(%target, %staging, pending, rows_merged = rows, "merged staging rows into target");

        Ok(MergeOutcome::Merged { rows })
    }
}
