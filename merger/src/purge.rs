use tracing::info;

use crate::error::MergerResult;
use crate::store::StagingStore;
use crate::types::{TableName, Watermark};

/// Deletes merged rows from `staging`.
///
/// With a watermark, deletes the rows whose `column` is strictly below it, using the
/// same bound as the preceding filtered merge. Without one, deletes every row.
/// Returns the number of deleted rows.
pub async fn purge<S>(
    store: &S,
    staging: &TableName,
    column: &str,
    watermark: Option<&Watermark>,
) -> MergerResult<u64>
where
    S: StagingStore,
{
    let deleted = match watermark {
        None => store.delete_all(staging).await?,
        Some(Watermark::Floor) => 0,
        Some(Watermark::Value(value)) => store.delete_below(staging, column, value).await?,
    };

    info!(%staging, rows_deleted = deleted, "merged and deleted rows from staging");

    Ok(deleted)
}
