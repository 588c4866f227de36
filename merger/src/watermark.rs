use tracing::debug;

use crate::error::{MergerError, MergerResult};
use crate::store::StagingStore;
use crate::types::{TableName, Watermark};

/// Resolves the upper bound of the next chunk of `table`.
///
/// Returns the value of `column` at the 1-based `offset` in ascending order. When the
/// table holds fewer rows, falls back to the smallest value, and to
/// [`Watermark::Floor`] when the table is empty.
///
/// With a fixed `offset` equal to the chunk capacity, rows strictly below the
/// returned watermark number at most `offset - 1` when ordering values are unique.
pub async fn resolve_watermark<S>(
    store: &S,
    table: &TableName,
    column: &str,
    offset: u64,
) -> MergerResult<Watermark>
where
    S: StagingStore,
{
    if offset == 0 {
        return Err(MergerError::InvalidInput(
            "watermark offset must be at least 1".to_string(),
        ));
    }

    if let Some(value) = store.value_at_offset(table, column, offset).await? {
        debug!(%table, offset, %value, "resolved watermark at offset");
        return Ok(Watermark::Value(value));
    }

    if let Some(value) = store.min_value(table, column).await? {
        debug!(%table, offset, %value, "fewer rows than offset, using minimum as watermark");
        return Ok(Watermark::Value(value));
    }

    debug!(%table, "staging table is empty, using floor watermark");
    Ok(Watermark::Floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryRow, MemoryStore};
    use crate::types::OrderValue;

    fn staging() -> TableName {
        TableName::new("sales", "orders_staging")
    }

    async fn store_with(orders: impl IntoIterator<Item = i64>) -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table(&staging()).await;
        store
            .insert_rows(
                &staging(),
                orders
                    .into_iter()
                    .map(|order| MemoryRow::new(order.to_string(), OrderValue::Int(order), "")),
            )
            .await;
        store
    }

    #[tokio::test]
    async fn test_resolves_value_at_offset() {
        let store = store_with(1..=2500).await;

        let watermark = resolve_watermark(&store, &staging(), "id", 1000).await.unwrap();

        assert_eq!(watermark, Watermark::Value(OrderValue::Int(1000)));
    }

    #[tokio::test]
    async fn test_falls_back_to_minimum_with_fewer_rows() {
        let store = store_with([42, 7, 19]).await;

        let watermark = resolve_watermark(&store, &staging(), "id", 1000).await.unwrap();

        assert_eq!(watermark, Watermark::Value(OrderValue::Int(7)));
    }

    #[tokio::test]
    async fn test_empty_table_resolves_to_floor() {
        let store = store_with(Vec::new()).await;

        let watermark = resolve_watermark(&store, &staging(), "id", 1000).await.unwrap();

        assert_eq!(watermark, Watermark::Floor);
    }

    #[tokio::test]
    async fn test_zero_offset_is_rejected() {
        let store = store_with([1]).await;

        let err = resolve_watermark(&store, &staging(), "id", 0).await.unwrap_err();

        assert!(matches!(err, MergerError::InvalidInput(_)));
    }
}
