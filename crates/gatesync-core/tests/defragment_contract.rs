//! Contract: `defragment()` front-packs all ordinal-scheme partitions
//! oldest-first, preserves item timestamps across moves, reports which
//! partitions ended up empty, and never touches prefix-named partitions
//! outside the strict ordinal scheme.

mod common;

use common::*;
use chrono::{Duration, Utc};
use gatesync_core::traits::Item;
use gatesync_core::{EngineEvent, MemoryPartitionStore};

#[tokio::test]
async fn front_packs_oldest_items_across_partitions() {
    let store = MemoryPartitionStore::new(2);
    let now = Utc::now();

    let chunk1 = store
        .seed_partition(
            "Gatesync List - Chunk 1",
            vec![
                Item::with_added_at("new-a", now),
                Item::with_added_at("old-b", now - Duration::days(10)),
            ],
        )
        .await
        .unwrap();
    let chunk2 = store
        .seed_partition(
            "Gatesync List - Chunk 2",
            vec![Item::with_added_at("old-c", now - Duration::days(20))],
        )
        .await
        .unwrap();
    let chunk3 = store
        .seed_partition(
            "Gatesync List - Chunk 3",
            vec![Item::with_added_at("new-d", now - Duration::hours(1))],
        )
        .await
        .unwrap();

    let config = test_config(2);
    let (engine, _rx) = engine_over(Box::new(store.clone()), &config);

    let report = engine.defragment().await.unwrap();

    assert_eq!(report.chunks, 3);
    assert_eq!(report.all_entries, 4);
    assert_eq!(report.entries_to_move, 3);
    assert_eq!(report.assigned_lists, 2);
    assert_eq!(report.empty_lists, 1);
    assert_eq!(report.empty_partitions[0].id, chunk3.id);

    // Global age order is old-c, old-b, new-d, new-a; the first two land in
    // Chunk 1, the next two in Chunk 2, Chunk 3 drains.
    let values = |items: &[Item]| -> Vec<String> {
        let mut v: Vec<String> = items.iter().map(|i| i.value.clone()).collect();
        v.sort();
        v
    };
    assert_eq!(
        values(&store.partition_items(&chunk1.id).await.unwrap()),
        desired(&["old-b", "old-c"])
    );
    assert_eq!(
        values(&store.partition_items(&chunk2.id).await.unwrap()),
        desired(&["new-a", "new-d"])
    );
    assert!(store.partition_items(&chunk3.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn moved_items_keep_their_original_timestamps() {
    let store = MemoryPartitionStore::new(1);
    let now = Utc::now();
    let old_stamp = now - Duration::days(5);

    let chunk1 = store
        .seed_partition(
            "Gatesync List - Chunk 1",
            vec![Item::with_added_at("newer", now)],
        )
        .await
        .unwrap();
    store
        .seed_partition(
            "Gatesync List - Chunk 2",
            vec![Item::with_added_at("older", old_stamp)],
        )
        .await
        .unwrap();

    let config = test_config(1);
    let (engine, _rx) = engine_over(Box::new(store.clone()), &config);
    engine.defragment().await.unwrap();

    let front = store.partition_items(&chunk1.id).await.unwrap();
    assert_eq!(front.len(), 1);
    assert_eq!(front[0].value, "older");
    assert_eq!(front[0].added_at, Some(old_stamp));
}

#[tokio::test]
async fn items_without_timestamps_sort_newest() {
    let store = MemoryPartitionStore::new(1);
    let now = Utc::now();

    let chunk1 = store
        .seed_partition("Gatesync List - Chunk 1", vec![Item::new("z-untimed")])
        .await
        .unwrap();
    let chunk2 = store
        .seed_partition(
            "Gatesync List - Chunk 2",
            vec![Item::with_added_at("a-old", now - Duration::days(1))],
        )
        .await
        .unwrap();

    let config = test_config(1);
    let (engine, _rx) = engine_over(Box::new(store.clone()), &config);
    engine.defragment().await.unwrap();

    let front = store.partition_items(&chunk1.id).await.unwrap();
    let back = store.partition_items(&chunk2.id).await.unwrap();
    assert_eq!(front[0].value, "a-old");
    assert_eq!(back[0].value, "z-untimed");
}

#[tokio::test]
async fn off_scheme_prefix_partitions_are_reported_but_untouched() {
    let store = MemoryPartitionStore::new(1);
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
    let legacy = store
        .seed_partition("Gatesync List (legacy)", vec![Item::new("keep")])
        .await
        .unwrap();

    let config = test_config(1);
    let (engine, _rx) = engine_over(Box::new(store.clone()), &config);

    let report = engine.defragment().await.unwrap();

    // Only the two ordinal chunks participate; the legacy partition is
    // carried in the non-empty report unchanged.
    assert_eq!(report.chunks, 2);
    assert_eq!(report.all_entries, 2);
    assert!(
        report
            .non_empty_partitions
            .iter()
            .any(|p| p.id == legacy.id)
    );
    let legacy_items = store.partition_items(&legacy.id).await.unwrap();
    assert_eq!(legacy_items.len(), 1);
    assert_eq!(legacy_items[0].value, "keep");
}

#[tokio::test]
async fn emptied_partitions_are_deleted_through_the_engine() {
    let store = MemoryPartitionStore::new(2);
    let now = Utc::now();

    store
        .seed_partition(
            "Gatesync List - Chunk 1",
            vec![Item::with_added_at("a", now - Duration::days(3))],
        )
        .await
        .unwrap();
    store
        .seed_partition(
            "Gatesync List - Chunk 2",
            vec![
                Item::with_added_at("b", now - Duration::days(2)),
                Item::with_added_at("c", now - Duration::days(1)),
            ],
        )
        .await
        .unwrap();
    let chunk3 = store
        .seed_partition(
            "Gatesync List - Chunk 3",
            vec![Item::with_added_at("d", now)],
        )
        .await
        .unwrap();

    let config = test_config(2);
    let (engine, mut rx) = engine_over(Box::new(store.clone()), &config);

    let report = engine.defragment().await.unwrap();
    assert_eq!(report.empty_lists, 1);
    assert_eq!(report.empty_partitions[0].id, chunk3.id);

    // The cleanup the daemon runs after every defrag.
    let deleted = engine
        .delete_partitions(&report.empty_partitions)
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    assert_eq!(store.partition_count().await, 2);
    assert!(store.partition_items(&chunk3.id).await.is_none());
    // No items were lost with the partition.
    assert_eq!(sorted_values(&store).await, desired(&["a", "b", "c", "d"]));

    let events = drain_events(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::PartitionDeleted { partition_id, .. } if *partition_id == chunk3.id
    )));
}

#[tokio::test]
async fn already_packed_layout_yields_an_empty_plan() {
    let store = MemoryPartitionStore::new(2);
    let now = Utc::now();

    store
        .seed_partition(
            "Gatesync List - Chunk 1",
            vec![
                Item::with_added_at("a", now - Duration::days(2)),
                Item::with_added_at("b", now - Duration::days(1)),
            ],
        )
        .await
        .unwrap();
    store
        .seed_partition(
            "Gatesync List - Chunk 2",
            vec![Item::with_added_at("c", now)],
        )
        .await
        .unwrap();

    let config = test_config(2);
    let (engine, _rx) = engine_over(Box::new(store.clone()), &config);

    let report = engine.defragment().await.unwrap();
    assert!(report.is_noop());
    assert_eq!(report.patches, 0);
    assert_eq!(report.non_empty_lists, 2);
    assert_eq!(report.empty_lists, 0);
}
