use std::sync::Arc;

use catalog_diff::test_support::InMemoryPageSource;
use catalog_diff::{
    KeyFormat, PaginationMode, Pipeline, PipelineConfig, Product, ProductKey, SnapshotStore,
    canonicalize, fingerprint,
};
use catalog_diff_store::SqliteSnapshotStore;

fn config() -> PipelineConfig {
    PipelineConfig {
        fetch_workers: 2,
        detect_workers: 8,
        queue_capacity: 4,
        pagination: PaginationMode::Discover,
    }
}

fn hash_of(ids: &[&str]) -> String {
    fingerprint(&canonicalize(ids.iter().copied()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn three_runs_track_a_product_through_create_modify_and_unchanged() {
    let source = Arc::new(InMemoryPageSource::new("fashion"));
    source.push_products(vec![Product::new("p1", ["c1", "c2"])]);
    let store = Arc::new(SqliteSnapshotStore::open_in_memory("fashion").unwrap());
    let pipeline = Pipeline::new(source.clone(), store.clone(), config());
    let key = ProductKey::from_stored("p1");

    // First sighting.
    let first = pipeline.run_and_record(store.as_ref()).await.report.stats;
    assert_eq!((first.checked, first.updated), (1, 1));
    assert_eq!((first.added, first.removed), (2, 0));
    let snap1 = store.find(&key).await.unwrap().unwrap();
    assert_eq!(snap1.competitors_hash, hash_of(&["c1", "c2"]));

    // c1 dropped, c3 appeared.
    source.set_products(1, vec![Product::new("p1", ["c3", "c2"])]);
    let second = pipeline.run_and_record(store.as_ref()).await.report.stats;
    assert_eq!((second.checked, second.updated), (1, 1));
    assert_eq!((second.added, second.removed), (1, 1));
    let snap2 = store.find(&key).await.unwrap().unwrap();
    assert_eq!(snap2.competitors_hash, hash_of(&["c2", "c3"]));
    assert_eq!(snap2.competitors, vec!["c2", "c3"]);
    assert!(snap2.last_changed >= snap1.last_changed);

    // Same set again.
    let third = pipeline.run_and_record(store.as_ref()).await.report.stats;
    assert_eq!((third.checked, third.updated), (1, 0));
    assert_eq!((third.added, third.removed), (0, 0));
    let snap3 = store.find(&key).await.unwrap().unwrap();
    assert_eq!(snap3.competitors_hash, snap2.competitors_hash);
    assert_eq!(snap3.last_changed, snap2.last_changed);
    assert!(snap3.last_checked >= snap2.last_checked);

    let history = store.recent_runs(10).unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].stats, third);
    assert_eq!(history[2].stats, first);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_pages_share_one_store_handle() {
    let source = Arc::new(InMemoryPageSource::new("fashion"));
    for page in 0..20 {
        source.push_products(
            (0..25)
                .map(|i| Product::new(format!("p{page}-{i}"), [format!("c{}", i % 4)]))
                .collect(),
        );
    }
    let store = Arc::new(SqliteSnapshotStore::open_in_memory("fashion").unwrap());
    let pipeline = Pipeline::new(source, store.clone(), config());

    let stats = pipeline.run().await.report.stats;
    assert_eq!(stats.checked, 500);
    assert_eq!(stats.updated, 500);
    assert_eq!(stats.added, 500);
    assert_eq!(store.snapshot_count().unwrap(), 500);
}

#[tokio::test]
async fn object_id_store_skips_malformed_catalog_ids() {
    let source = Arc::new(InMemoryPageSource::new("fashion"));
    source.push_products(vec![
        Product::new("5F1A2B3C4D5E6F7A8B9C0D1E", ["c1"]),
        Product::new("legacy-42", ["c1"]),
    ]);
    let store = Arc::new(
        SqliteSnapshotStore::open_in_memory("fashion")
            .unwrap()
            .with_key_format(KeyFormat::ObjectId),
    );
    let pipeline = Pipeline::new(source, store.clone(), config());

    let outcome = pipeline.run().await;
    assert_eq!(outcome.report.stats.checked, 2);
    assert_eq!(outcome.report.stats.updated, 1);
    assert_eq!(outcome.report.stats.skipped, 1);
    assert!(
        store
            .find(&ProductKey::from_stored("5f1a2b3c4d5e6f7a8b9c0d1e"))
            .await
            .unwrap()
            .is_some()
    );
}
