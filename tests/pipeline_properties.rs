// tests/pipeline_properties.rs
//
// Component-level behavior of the ingest and ranking pipeline, driven
// through a scripted fetcher and a manual clock.

mod common;

use bytes::Bytes;
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

use common::{job, story, DownStore, MockFetcher};
use hn_ranker::bus::{InProcessBus, MessageBus};
use hn_ranker::clock::{Clock, ManualClock};
use hn_ranker::error::ErrorClass;
use hn_ranker::ingest::{Dispatcher, ItemProcessor, ProcessOutcome};
use hn_ranker::item::{item_key, ExternalRecord, Item, RawItem, IDS_LATEST_KEY};
use hn_ranker::rank::{Ranker, TopQuery};
use hn_ranker::store::{ItemStore, MemoryItemStore, MemorySnapshotStore, SnapshotStore};

struct Harness {
    clock: Arc<ManualClock>,
    fetcher: Arc<MockFetcher>,
    items: Arc<MemoryItemStore>,
    snapshots: Arc<MemorySnapshotStore>,
    processor: ItemProcessor,
    ranker: Ranker,
    top: TopQuery,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    ));
    let fetcher = MockFetcher::new();
    let items = Arc::new(MemoryItemStore::new(
        Some(std::time::Duration::from_secs(7 * 24 * 3600)),
        clock.clone(),
    ));
    let snapshots = Arc::new(MemorySnapshotStore::new(clock.clone()));
    Harness {
        processor: ItemProcessor::new(fetcher.clone(), items.clone()),
        ranker: Ranker::new(items.clone(), snapshots.clone(), clock.clone()),
        top: TopQuery::new(snapshots.clone()),
        clock,
        fetcher,
        items,
        snapshots,
    }
}

async fn stored(items: &MemoryItemStore, id: u64) -> Option<Item> {
    items
        .get(&item_key(id))
        .await
        .unwrap()
        .map(|e| serde_json::from_slice(&e.value).unwrap())
}

#[tokio::test]
async fn processing_twice_converges_on_same_record() {
    let h = harness();
    let now = h.clock.now();
    h.fetcher.set_story(7, 42, now - Duration::hours(2));

    h.processor.process(7).await.unwrap();
    let first = h.items.get(&item_key(7)).await.unwrap().unwrap();
    h.processor.process(7).await.unwrap();
    let second = h.items.get(&item_key(7)).await.unwrap().unwrap();

    assert_eq!(first.value, second.value);
    assert!(second.revision > first.revision);
    assert_eq!(h.items.keys().await.unwrap().len(), 1);
}

#[tokio::test]
async fn latest_write_wins_over_higher_earlier_score() {
    let h = harness();
    let t = h.clock.now() - Duration::hours(1);
    h.fetcher.set_story(5, 10, t);
    h.processor.process(5).await.unwrap();
    h.fetcher.set_story(5, 20, t);
    h.processor.process(5).await.unwrap();
    assert_eq!(stored(&h.items, 5).await.unwrap().score, 20);

    h.fetcher.set_story(5, 3, t);
    h.processor.process(5).await.unwrap();
    assert_eq!(stored(&h.items, 5).await.unwrap().score, 3);
}

#[tokio::test]
async fn record_missing_score_is_a_silent_skip() {
    let h = harness();
    let raw: Option<RawItem> =
        serde_json::from_str(r#"{"type":"story","title":"no score","time":1714560000}"#).unwrap();
    h.fetcher.set_record(9, ExternalRecord::from_raw(raw));

    let outcome = h.processor.process(9).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Skipped(_)));
    assert!(h.items.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn fetch_failure_is_an_upstream_error_without_mutation() {
    let h = harness();
    let err = h.processor.process(404).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::TransientUpstream);
    assert!(h.items.keys().await.unwrap().is_empty());

    // fire-and-forget swallows the same failure
    h.processor.process_and_forget(404).await;
    assert_eq!(h.fetcher.detail_calls(), 2);
}

#[tokio::test]
async fn snapshot_keeps_only_trailing_24h() {
    let h = harness();
    let now = h.clock.now();
    h.fetcher.set_story(1, 10, now - Duration::hours(1));
    h.fetcher.set_story(2, 20, now - Duration::hours(23));
    h.fetcher.set_story(3, 30, now - Duration::hours(25));
    for id in [1, 2, 3] {
        h.processor.process(id).await.unwrap();
    }

    let summary = h.ranker.build_snapshot().await.unwrap();
    assert_eq!(summary.items, 2);
    assert_eq!(summary.name, "hn_posts_2024-05-01");

    let top = h.top.top(10).await.unwrap();
    let ids: Vec<u64> = top.posts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![2, 1]);
}

#[tokio::test]
async fn snapshot_is_sorted_by_score_descending() {
    let h = harness();
    let t = h.clock.now() - Duration::hours(3);
    for (id, score) in [(1, 5), (2, 90), (3, 12)] {
        h.fetcher.set_story(id, score, t);
        h.processor.process(id).await.unwrap();
    }
    h.ranker.build_snapshot().await.unwrap();

    let scores: Vec<u64> = h.top.top(3).await.unwrap().posts.iter().map(|p| p.score).collect();
    assert_eq!(scores, vec![90, 12, 5]);
}

#[tokio::test]
async fn equal_scores_rank_by_id() {
    let h = harness();
    let t = h.clock.now() - Duration::hours(3);
    for id in [30, 10, 20] {
        h.fetcher.set_story(id, 50, t);
        h.processor.process(id).await.unwrap();
    }
    h.ranker.build_snapshot().await.unwrap();
    let ids: Vec<u64> = h.top.top(3).await.unwrap().posts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![10, 20, 30]);
}

#[tokio::test]
async fn ranker_skips_reserved_key_and_garbage() {
    let h = harness();
    let t = h.clock.now() - Duration::hours(1);
    h.fetcher.set_story(1, 10, t);
    h.processor.process(1).await.unwrap();
    h.items.put(IDS_LATEST_KEY, b"[1,2]".to_vec()).await.unwrap();
    h.items.put(&item_key(2), b"{not json".to_vec()).await.unwrap();

    let summary = h.ranker.build_snapshot().await.unwrap();
    assert_eq!(summary.items, 1);
}

#[tokio::test]
async fn same_day_rebuild_replaces_snapshot() {
    let h = harness();
    let t = h.clock.now() - Duration::hours(1);
    h.fetcher.set_story(1, 10, t);
    h.processor.process(1).await.unwrap();
    h.ranker.build_snapshot().await.unwrap();

    h.clock.advance(Duration::hours(2));
    h.fetcher.set_story(2, 99, t);
    h.processor.process(2).await.unwrap();
    h.ranker.build_snapshot().await.unwrap();

    assert_eq!(h.snapshots.list().await.unwrap().len(), 1);
    assert_eq!(h.top.top(10).await.unwrap().count, 2);

    // next day: a second snapshot, and it is the one queried
    h.clock.advance(Duration::days(1));
    h.ranker.build_snapshot().await.unwrap();
    assert_eq!(h.snapshots.list().await.unwrap().len(), 2);
    assert_eq!(h.top.top(10).await.unwrap().count, 0);
}

#[tokio::test]
async fn top_truncates_in_rank_order() {
    let h = harness();
    let t = h.clock.now() - Duration::hours(1);
    for (id, score) in [(1, 50), (2, 40), (3, 30), (4, 20), (5, 10)] {
        h.fetcher.set_story(id, score, t);
        h.processor.process(id).await.unwrap();
    }
    h.ranker.build_snapshot().await.unwrap();

    let top = h.top.top(2).await.unwrap();
    assert_eq!(top.count, 2);
    let ids: Vec<u64> = top.posts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1, 2]);

    assert_eq!(h.top.top(50).await.unwrap().count, 5);
}

#[tokio::test]
async fn top_without_snapshots_is_not_found() {
    let h = harness();
    let err = h.top.top(1).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotFound);
    assert_eq!(err.code(), 404);
}

#[tokio::test]
async fn top_rejects_non_positive_counts() {
    let h = harness();
    for n in [0, -5] {
        let err = h.top.top(n).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation, "n={n}");
    }
}

#[tokio::test]
async fn corrupt_snapshot_is_a_parse_error() {
    let h = harness();
    h.snapshots
        .put("hn_posts_2024-05-01", b"not json".to_vec())
        .await
        .unwrap();
    let err = h.top.top(1).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Internal);
}

#[tokio::test]
async fn dispatch_persists_ids_before_fan_out() {
    let h = harness();
    let bus = InProcessBus::new(8);
    let mut sub = bus.subscribe("work", Some("g"));
    let d = Dispatcher::new(h.items.clone(), Arc::new(bus.clone()), "work");

    assert_eq!(d.dispatch(&[3, 1, 2]).await.unwrap(), 3);
    let raw = h.items.get(IDS_LATEST_KEY).await.unwrap().unwrap().value;
    assert_eq!(serde_json::from_slice::<Vec<u64>>(&raw).unwrap(), vec![3, 1, 2]);

    let mut got = Vec::new();
    for _ in 0..3 {
        got.push(sub.next().await.unwrap().payload);
    }
    assert_eq!(
        got,
        vec![Bytes::from("3"), Bytes::from("1"), Bytes::from("2")]
    );

    // a second batch overwrites the list
    d.dispatch(&[9]).await.unwrap();
    let raw = h.items.get(IDS_LATEST_KEY).await.unwrap().unwrap().value;
    assert_eq!(raw, b"[9]");
}

#[tokio::test]
async fn empty_dispatch_is_a_no_op() {
    let h = harness();
    let d = Dispatcher::new(h.items.clone(), Arc::new(InProcessBus::new(1)), "work");
    assert_eq!(d.dispatch(&[]).await.unwrap(), 0);
    assert!(h.items.get(IDS_LATEST_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn dispatch_fails_when_id_list_cannot_be_stored() {
    let bus = InProcessBus::new(8);
    let mut sub = bus.subscribe("work", Some("g"));
    let d = Dispatcher::new(Arc::new(DownStore), Arc::new(bus.clone()), "work");

    let err = d.dispatch(&[1, 2]).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::StoreUnavailable);

    // nothing was published
    bus.publish("work", Bytes::from_static(b"marker")).await.unwrap();
    assert_eq!(sub.next().await.unwrap().payload, Bytes::from_static(b"marker"));
}

#[tokio::test]
async fn non_story_records_are_skipped() {
    let h = harness();
    h.fetcher.set_record(2, job());
    h.fetcher.set_record(
        3,
        story("Kept", 1, h.clock.now() - Duration::minutes(5)),
    );
    assert!(matches!(
        h.processor.process(2).await.unwrap(),
        ProcessOutcome::Skipped(_)
    ));
    assert!(matches!(
        h.processor.process(3).await.unwrap(),
        ProcessOutcome::Stored(_)
    ));
    assert_eq!(h.items.keys().await.unwrap(), vec![item_key(3)]);
}
