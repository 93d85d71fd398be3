//! Contract: both entry points are idempotent.
//!
//! With no external mutation between calls, a second `synchronize(D)` issues
//! zero patches and zero creates, and a second `defragment()` moves zero
//! entries. Anything else would mean the engine oscillates and burns
//! provider calls on every scheduled run.

mod common;

use common::*;
use chrono::{Duration, Utc};
use gatesync_core::traits::Item;
use gatesync_core::MemoryPartitionStore;

#[tokio::test]
async fn second_synchronize_is_a_noop() {
    let store = MemoryPartitionStore::new(3);
    let config = test_config(3);
    let (engine, _rx) = engine_over(Box::new(store.clone()), &config);

    let wanted = desired(&["a", "b", "c", "d", "e"]);

    let first = engine.synchronize(&wanted).await.unwrap();
    assert_eq!(first.additions, 5);
    assert!(!first.is_noop());

    let second = engine.synchronize(&wanted).await.unwrap();
    assert!(second.is_noop(), "second run was not a no-op: {second:?}");
    assert_eq!(second.additions, 0);
    assert_eq!(second.removals, 0);
}

#[tokio::test]
async fn synchronize_after_partial_drift_touches_only_the_diff() {
    let store = MemoryPartitionStore::new(3);
    let config = test_config(3);
    let (engine, _rx) = engine_over(Box::new(store.clone()), &config);

    engine.synchronize(&desired(&["a", "b", "c"])).await.unwrap();
    let report = engine.synchronize(&desired(&["a", "b", "d"])).await.unwrap();

    assert_eq!(report.additions, 1);
    assert_eq!(report.removals, 1);
    assert_eq!(report.patches, 1);
    assert_eq!(report.partitions_created, 0);
    assert_eq!(sorted_values(&store).await, desired(&["a", "b", "d"]));
}

#[tokio::test]
async fn second_defragment_moves_nothing() {
    let store = MemoryPartitionStore::new(2);
    let now = Utc::now();

    // Old and new items interleaved across three partitions.
    store
        .seed_partition(
            "Gatesync List - Chunk 1",
            vec![
                Item::with_added_at("new-1", now),
                Item::with_added_at("old-1", now - Duration::days(30)),
            ],
        )
        .await
        .unwrap();
    store
        .seed_partition(
            "Gatesync List - Chunk 2",
            vec![Item::with_added_at("old-2", now - Duration::days(20))],
        )
        .await
        .unwrap();
    store
        .seed_partition(
            "Gatesync List - Chunk 3",
            vec![Item::with_added_at("new-2", now - Duration::hours(1))],
        )
        .await
        .unwrap();

    let config = test_config(2);
    let (engine, _rx) = engine_over(Box::new(store.clone()), &config);

    let first = engine.defragment().await.unwrap();
    assert!(first.entries_to_move > 0);

    let second = engine.defragment().await.unwrap();
    assert!(second.is_noop(), "second run moved entries: {second:?}");
    assert_eq!(second.patches, 0);
}

#[tokio::test]
async fn defragment_then_synchronize_stays_converged() {
    let store = MemoryPartitionStore::new(2);
    let now = Utc::now();
    store
        .seed_partition(
            "Gatesync List - Chunk 1",
            vec![Item::with_added_at("b", now)],
        )
        .await
        .unwrap();
    store
        .seed_partition(
            "Gatesync List - Chunk 2",
            vec![Item::with_added_at("a", now - Duration::days(1))],
        )
        .await
        .unwrap();

    let config = test_config(2);
    let (engine, _rx) = engine_over(Box::new(store.clone()), &config);

    engine.defragment().await.unwrap();

    // Defragmentation only rearranges; the desired set is unchanged.
    let report = engine.synchronize(&desired(&["a", "b"])).await.unwrap();
    assert!(report.is_noop());
    assert_eq!(sorted_values(&store).await, desired(&["a", "b"]));
}
