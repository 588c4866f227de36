use pg_escape::quote_identifier;
use tracing::{debug, info, warn};

use crate::error::MergerError;
use crate::failpoints::{BEFORE_SETUP, merger_fail_point};
use crate::store::StagingStore;
use crate::types::TableName;

/// Result of a best-effort setup statement.
#[derive(Debug)]
pub enum SetupOutcome {
    Applied,
    /// The table already had a primary key, nothing was executed.
    AlreadyPresent { columns: Vec<String> },
    /// The statement failed and the failure was logged. Runs continue regardless.
    Skipped { error: MergerError },
}

impl SetupOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SetupOutcome::Applied)
    }
}

/// Returns the name of the primary key constraint created on a staging table.
pub fn primary_key_constraint_name(table: &TableName, column: &str) -> String {
    format!("{}_staging_{column}_pk", table.simplified())
}

/// Returns the statement adding a primary key on `column` of `table`.
pub fn primary_key_statement(table: &TableName, column: &str) -> String {
    format!(
        "alter table {} add constraint {} primary key ({})",
        table.as_quoted_identifier(),
        quote_identifier(&primary_key_constraint_name(table, column)),
        quote_identifier(column)
    )
}

/// Adds a primary key on `column` of `table` unless the table already has one.
///
/// Failures, including a failed lookup of the existing key, are logged and returned
/// as [`SetupOutcome::Skipped`].
pub async fn ensure_primary_key<S>(store: &S, table: &TableName, column: &str) -> SetupOutcome
where
    S: StagingStore,
{
    let statement = primary_key_statement(table, column);

    match store.primary_key_columns(table).await {
        Ok(columns) if !columns.is_empty() => {
            debug!(%table, ?columns, "staging primary key already exists");
            return SetupOutcome::AlreadyPresent { columns };
        }
        Ok(_) => {}
        Err(err) => return skipped(table, column, statement, err),
    }

    let result = match merger_fail_point(BEFORE_SETUP) {
        Ok(()) => store.execute_setup(&statement).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => {
            info!(%table, column, "created staging primary key");
            SetupOutcome::Applied
        }
        Err(err) => skipped(table, column, statement, err),
    }
}

fn skipped(table: &TableName, column: &str, statement: String, err: MergerError) -> SetupOutcome {
    warn!(%table, column, error = %err, "setup statement failed, continuing");

    SetupOutcome::Skipped {
        error: MergerError::SetupStatement {
            statement,
            source: Box::new(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::memory::MemoryStore;

    #[test]
    fn test_constraint_name_uses_simplified_table() {
        let table = TableName::new("[dbo]", "[orders]");

        assert_eq!(
            primary_key_constraint_name(&table, "order_id"),
            "dbo_orders_staging_order_id_pk"
        );
    }

    #[test]
    fn test_primary_key_statement() {
        let table = TableName::new("sales", "orders_staging");

        assert_eq!(
            primary_key_statement(&table, "order_id"),
            "alter table sales.orders_staging add constraint sales_orders_staging_staging_order_id_pk \
             primary key (order_id)"
        );
    }

    #[tokio::test]
    async fn test_creates_missing_primary_key() {
        let store = MemoryStore::new();
        let table = TableName::new("sales", "orders_staging");
        store.create_table(&table).await;

        let outcome = ensure_primary_key(&store, &table, "order_id").await;

        assert!(outcome.is_applied());
        assert_eq!(
            store.setup_statements().await,
            vec![primary_key_statement(&table, "order_id")]
        );
    }

    #[tokio::test]
    async fn test_existing_primary_key_is_left_alone() {
        let store = MemoryStore::new();
        let table = TableName::new("sales", "orders_staging");
        store.create_table(&table).await;
        store.set_primary_key(&table, &["order_id"]).await;

        let outcome = ensure_primary_key(&store, &table, "order_id").await;

        assert!(matches!(
            outcome,
            SetupOutcome::AlreadyPresent { columns } if columns == vec!["order_id".to_string()]
        ));
        assert!(store.setup_statements().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_key_lookup_is_skipped() {
        let store = MemoryStore::new();
        let table = TableName::new("sales", "missing");

        let outcome = ensure_primary_key(&store, &table, "order_id").await;

        match outcome {
            SetupOutcome::Skipped { error } => assert_eq!(error.kind(), ErrorKind::SetupStatement),
            other => panic!("expected a skipped setup, got {other:?}"),
        }
    }
}
