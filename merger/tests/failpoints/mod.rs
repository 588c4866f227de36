use std::num::NonZeroU64;

use merger::failpoints::{BEFORE_MERGE, BEFORE_PURGE, BEFORE_SETUP};
use merger::store::memory::{MemoryRow, MemoryStore};
use merger::test_utils::failpoints::MergerFailScenario;
use merger::{BatchMerger, ChunkPlanner, ErrorKind, MergerError, OrderValue, RunPhase, SyncJob, TableName};
use telemetry::tracing::init_test_tracing;

fn job() -> SyncJob {
    SyncJob {
        target: TableName::new("sales", "orders"),
        staging: TableName::new("sales", "orders_staging"),
        order_column: "id".to_string(),
        primary_key_column: None,
    }
}

async fn store_with(orders: impl IntoIterator<Item = i64>) -> MemoryStore {
    let store = MemoryStore::new();
    store.create_table(&job().target).await;
    let rows = orders
        .into_iter()
        .map(|order| MemoryRow::new(format!("order-{order}"), OrderValue::Int(order), "pending"));
    store.insert_rows(&job().staging, rows).await;
    store
}

fn merger_for(store: &MemoryStore, job: SyncJob) -> BatchMerger<MemoryStore, MemoryStore> {
    let planner = ChunkPlanner::new(NonZeroU64::new(1000).unwrap());
    BatchMerger::new(store.clone(), store.clone(), planner, job)
}

#[tokio::test]
async fn purge_failure_aborts_and_keeps_completed_chunks() {
    init_test_tracing();
    let store = store_with(1..=2500).await;

    let err = {
        // The first purge goes through, the second one fails.
        let _scenario = MergerFailScenario::setup(&[(BEFORE_PURGE, "1*off->return")]);
        merger_for(&store, job()).run().await.unwrap_err()
    };

    match &err {
        MergerError::RunAborted {
            chunk,
            phase,
            chunks_completed,
            staging_size,
            ..
        } => {
            assert_eq!(*chunk, 2);
            assert_eq!(*phase, RunPhase::Purging);
            assert_eq!(*chunks_completed, 1);
            assert_eq!(*staging_size, Some(1501));
        }
        other => panic!("expected an aborted run, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Execution);

    // The second chunk was merged but not purged.
    assert_eq!(store.rows(&job().staging).await.len(), 1501);
    assert_eq!(store.rows(&job().target).await.len(), 1998);
    assert_eq!(store.merge_calls().await.len(), 2);

    let summary = merger_for(&store, job()).run().await.unwrap();

    assert_eq!(summary.final_size, 0);
    assert_eq!(summary.rows_merged, 502);
    assert_eq!(store.rows(&job().target).await.len(), 2500);
}

#[tokio::test]
async fn merge_failure_aborts_before_purging() {
    init_test_tracing();
    let store = store_with(1..=2500).await;
    let _scenario = MergerFailScenario::setup(&[(BEFORE_MERGE, "return(connection reset)")]);

    let err = merger_for(&store, job()).run().await.unwrap_err();

    assert!(matches!(
        err,
        MergerError::RunAborted {
            chunk: 1,
            phase: RunPhase::Merging,
            chunks_completed: 0,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(store.merge_calls().await.is_empty());
    assert!(store.purge_calls().await.is_empty());
    assert_eq!(store.rows(&job().staging).await.len(), 2500);
}

#[tokio::test]
async fn setup_failure_does_not_abort_the_run() {
    init_test_tracing();
    let store = store_with(1..=10).await;
    let _scenario = MergerFailScenario::setup(&[(BEFORE_SETUP, "return")]);
    let job = SyncJob {
        primary_key_column: Some("id".to_string()),
        ..job()
    };

    let summary = merger_for(&store, job.clone()).run().await.unwrap();

    assert_eq!(summary.final_size, 0);
    assert!(store.setup_statements().await.is_empty());
    assert_eq!(store.rows(&job.target).await.len(), 10);
}
