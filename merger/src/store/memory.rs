use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{MergerError, MergerResult};
use crate::merge::{MergeCapability, MergeOutcome};
use crate::store::StagingStore;
use crate::types::{OrderValue, RowFilter, TableName};

/// A row of an in-memory table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRow {
    /// Primary key the merge upserts on.
    pub key: String,
    /// Value of the ordering column.
    pub order: OrderValue,
    pub payload: String,
}

impl MemoryRow {
    pub fn new(key: impl Into<String>, order: OrderValue, payload: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            order,
            payload: payload.into(),
        }
    }
}

/// A recorded merge invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCall {
    pub target: TableName,
    pub staging: TableName,
    pub filter: Option<RowFilter>,
    /// Keys of the staging rows selected by the call, in merge order.
    pub selected_keys: Vec<String>,
    pub outcome: MergeOutcome,
}

/// A recorded purge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeCall {
    pub staging: TableName,
    /// Exclusive bound of the purge, `None` for a full purge.
    pub below: Option<OrderValue>,
    pub deleted: u64,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<TableName, Vec<MemoryRow>>,
    merge_calls: Vec<MergeCall>,
    purge_calls: Vec<PurgeCall>,
    setup_statements: Vec<String>,
    primary_keys: HashMap<TableName, Vec<String>>,
    /// Batches appended to a table after each purge of it.
    arrivals: HashMap<TableName, VecDeque<Vec<MemoryRow>>>,
}

impl Inner {
    fn table(&self, table: &TableName) -> MergerResult<&Vec<MemoryRow>> {
        self.tables
            .get(table)
            .ok_or_else(|| MergerError::TableNotFound(table.clone()))
    }

    fn table_mut(&mut self, table: &TableName) -> MergerResult<&mut Vec<MemoryRow>> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| MergerError::TableNotFound(table.clone()))
    }

    fn sorted_orders(&self, table: &TableName) -> MergerResult<Vec<OrderValue>> {
        let mut orders: Vec<OrderValue> =
            self.table(table)?.iter().map(|row| row.order.clone()).collect();
        orders.sort();

        Ok(orders)
    }

    fn record_purge(&mut self, staging: &TableName, below: Option<OrderValue>, deleted: u64) {
        self.purge_calls.push(PurgeCall {
            staging: staging.clone(),
            below,
            deleted,
        });

        let batch = self
            .arrivals
            .get_mut(staging)
            .and_then(|batches| batches.pop_front());
        if let Some(batch) = batch {
            debug!(%staging, rows = batch.len(), "appending rows that arrived during the run");
            self.tables.entry(staging.clone()).or_default().extend(batch);
        }
    }
}

/// In-process store implementing both [`StagingStore`] and [`MergeCapability`].
///
/// Tables are keyed by name and hold [`MemoryRow`]s. A merge upserts staging rows into
/// the target by [`MemoryRow::key`]. Every merge and purge is recorded for inspection.
/// Cloning shares the underlying tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `table` if missing.
    pub async fn create_table(&self, table: &TableName) {
        let mut inner = self.inner.lock().await;
        inner.tables.entry(table.clone()).or_default();
    }

    /// Appends `rows` to `table`, creating it if missing.
    pub async fn insert_rows(&self, table: &TableName, rows: impl IntoIterator<Item = MemoryRow>) {
        let mut inner = self.inner.lock().await;
        inner.tables.entry(table.clone()).or_default().extend(rows);
    }

    /// Returns the rows of `table`, empty if it does not exist.
    pub async fn rows(&self, table: &TableName) -> Vec<MemoryRow> {
        let inner = self.inner.lock().await;
        inner.tables.get(table).cloned().unwrap_or_default()
    }

    pub async fn merge_calls(&self) -> Vec<MergeCall> {
        let inner = self.inner.lock().await;
        inner.merge_calls.clone()
    }

    pub async fn purge_calls(&self) -> Vec<PurgeCall> {
        let inner = self.inner.lock().await;
        inner.purge_calls.clone()
    }

    pub async fn setup_statements(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.setup_statements.clone()
    }

    /// Declares the primary key of `table`, as if it had been created beforehand.
    pub async fn set_primary_key(&self, table: &TableName, columns: &[&str]) {
        let mut inner = self.inner.lock().await;
        inner.primary_keys.insert(
            table.clone(),
            columns.iter().map(|column| column.to_string()).collect(),
        );
    }

    /// Appends one of `batches` to `staging` after each purge of it, simulating writers
    /// inserting while a run is in progress.
    pub async fn schedule_arrivals(&self, staging: &TableName, batches: Vec<Vec<MemoryRow>>) {
        let mut inner = self.inner.lock().await;
        inner
            .arrivals
            .entry(staging.clone())
            .or_default()
            .extend(batches);
    }
}

impl StagingStore for MemoryStore {
    async fn count_rows(&self, table: &TableName) -> MergerResult<u64> {
        let inner = self.inner.lock().await;

        Ok(inner.table(table)?.len() as u64)
    }

    async fn value_at_offset(
        &self,
        table: &TableName,
        _column: &str,
        offset: u64,
    ) -> MergerResult<Option<OrderValue>> {
        let inner = self.inner.lock().await;

        if offset == 0 {
            return Ok(None);
        }
        let orders = inner.sorted_orders(table)?;

        Ok(orders.into_iter().nth((offset - 1) as usize))
    }

    async fn min_value(&self, table: &TableName, _column: &str) -> MergerResult<Option<OrderValue>> {
        let inner = self.inner.lock().await;

        Ok(inner.sorted_orders(table)?.into_iter().next())
    }

    async fn delete_below(
        &self,
        table: &TableName,
        _column: &str,
        value: &OrderValue,
    ) -> MergerResult<u64> {
        let mut inner = self.inner.lock().await;

        let rows = inner.table_mut(table)?;
        let before = rows.len();
        rows.retain(|row| row.order >= *value);
        let deleted = (before - rows.len()) as u64;

        inner.record_purge(table, Some(value.clone()), deleted);

        Ok(deleted)
    }

    async fn delete_all(&self, table: &TableName) -> MergerResult<u64> {
        let mut inner = self.inner.lock().await;

        let rows = inner.table_mut(table)?;
        let deleted = rows.len() as u64;
        rows.clear();

        inner.record_purge(table, None, deleted);

        Ok(deleted)
    }

    async fn primary_key_columns(&self, table: &TableName) -> MergerResult<Vec<String>> {
        let inner = self.inner.lock().await;
        inner.table(table)?;

        Ok(inner.primary_keys.get(table).cloned().unwrap_or_default())
    }

    async fn execute_setup(&self, statement: &str) -> MergerResult<()> {
        let mut inner = self.inner.lock().await;
        inner.setup_statements.push(statement.to_string());

        Ok(())
    }
}

impl MergeCapability for MemoryStore {
    async fn merge(
        &self,
        target: &TableName,
        staging: &TableName,
        filter: Option<&RowFilter>,
    ) -> MergerResult<MergeOutcome> {
        let mut inner = self.inner.lock().await;

        let mut selected: Vec<MemoryRow> = inner
            .table(staging)?
            .iter()
            .filter(|row| filter.is_none_or(|filter| filter.admits(&row.order)))
            .cloned()
            .collect();
        selected.sort_by(|a, b| a.order.cmp(&b.order));

        let target_rows = inner.table_mut(target)?;
        let outcome = if selected.is_empty() {
            MergeOutcome::Skipped
        } else {
            let mut changed = 0;
            for row in &selected {
                match target_rows.iter_mut().find(|existing| existing.key == row.key) {
                    Some(existing) if existing == row => {}
                    Some(existing) => {
                        *existing = row.clone();
                        changed += 1;
                    }
                    None => {
                        target_rows.push(row.clone());
                        changed += 1;
                    }
                }
            }
            MergeOutcome::Merged { rows: changed }
        };

        inner.merge_calls.push(MergeCall {
            target: target.clone(),
            staging: staging.clone(),
            filter: filter.cloned(),
            selected_keys: selected.into_iter().map(|row| row.key).collect(),
            outcome,
        });

        Ok(outcome)
    }
}
