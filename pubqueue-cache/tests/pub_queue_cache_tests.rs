//! End-to-end tests of the package queue cache against an in-memory journal.

use std::sync::Arc;
use std::time::Duration;

use pubqueue_cache::{CacheConfig, PubQueueCache};
use pubqueue_test_utils::fixtures::{package, packages};
use pubqueue_test_utils::{
    init_tracing, wait_until, InMemoryJournal, InMemoryQueueRegistry, Offset, PubQueueError,
    RecordingQueuedCallback, ReqType,
};

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    journal: Arc<InMemoryJournal>,
    callback: Arc<RecordingQueuedCallback>,
    registry: Arc<InMemoryQueueRegistry>,
    cache: PubQueueCache,
}

async fn harness_with(journal: InMemoryJournal, config: CacheConfig) -> Harness {
    init_tracing();
    let journal = Arc::new(journal);
    let callback = Arc::new(RecordingQueuedCallback::new());
    let registry = Arc::new(InMemoryQueueRegistry::new());
    let cache = PubQueueCache::new(journal.clone(), callback.clone(), registry.clone(), config)
        .await
        .expect("cache should start");
    Harness {
        journal,
        callback,
        registry,
        cache,
    }
}

async fn harness() -> Harness {
    harness_with(InMemoryJournal::new(), CacheConfig::default()).await
}

async fn wait_for_max(cache: &PubQueueCache, offset: Offset) {
    assert!(
        wait_until(WAIT, || cache.max_offset() == Some(offset)).await,
        "tail never reached offset {}",
        offset
    );
}

async fn wait_for_tail_records(cache: &PubQueueCache, count: u64) {
    assert!(
        wait_until(WAIT, || cache.stats().tail_records >= count).await,
        "tail never handled {} records",
        count
    );
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_query_before_any_record_is_not_ready() {
    let h = harness().await;

    let err = h.cache.query("agentA", 0).await.unwrap_err();

    assert!(err.is_not_ready());
    assert_eq!(h.journal.fetch_count(), 0);
    assert!(!h.cache.is_seeded());
}

#[tokio::test]
async fn test_first_tail_message_seeds_cache() {
    let h = harness().await;
    h.journal.publish(package(10, "A", ReqType::Add)).await;
    wait_for_max(&h.cache, 10).await;

    assert_eq!(h.cache.min_offset(), Some(10));
    assert_eq!(h.cache.max_offset(), Some(10));

    let queue = h.cache.query("A", 10).await.unwrap();
    assert_eq!(queue.offsets(), vec![10]);

    let unknown = h.cache.query("B", 10).await.unwrap();
    assert!(unknown.is_empty());
    assert_eq!(h.journal.fetch_count(), 0);
}

#[tokio::test]
async fn test_marker_after_seed_changes_nothing() {
    let h = harness().await;
    h.journal.publish(package(10, "A", ReqType::Add)).await;
    h.journal.publish_marker(11).await;
    wait_for_tail_records(&h.cache, 2).await;

    assert_eq!(h.cache.min_offset(), Some(10));
    assert_eq!(h.cache.max_offset(), Some(10));
    assert_eq!(h.cache.size(), 1);
}

#[tokio::test]
async fn test_marker_alone_seeds_min_offset_only() {
    let h = harness().await;
    h.journal.publish_marker(42).await;
    wait_for_tail_records(&h.cache, 1).await;

    assert_eq!(h.cache.min_offset(), Some(42));
    assert_eq!(h.cache.max_offset(), None);
    assert_eq!(h.cache.size(), 0);

    let queue = h.cache.query("A", 42).await.unwrap();
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_query_below_min_offset_backfills() {
    let h = harness().await;
    h.journal.append_history(packages("A", [5, 6, 7]));
    h.journal.publish(package(10, "A", ReqType::Add)).await;
    wait_for_max(&h.cache, 10).await;

    let queue = h.cache.query("A", 5).await.unwrap();

    assert_eq!(h.journal.fetch_calls(), vec![(5, 10)]);
    assert_eq!(h.cache.min_offset(), Some(5));
    assert_eq!(queue.offsets(), vec![5, 6, 7, 10]);

    // Covered now; no second fetch.
    let again = h.cache.query("A", 5).await.unwrap();
    assert_eq!(again.offsets(), vec![5, 6, 7, 10]);
    assert_eq!(h.journal.fetch_count(), 1);
}

#[tokio::test]
async fn test_concurrent_backfills_fetch_once() {
    let h = harness_with(
        InMemoryJournal::new().with_fetch_delay(Duration::from_millis(100)),
        CacheConfig::default(),
    )
    .await;
    h.journal.append_history(packages("A", [3, 4, 8]));
    h.journal.publish(package(10, "A", ReqType::Add)).await;
    wait_for_max(&h.cache, 10).await;

    let (first, second) = tokio::join!(h.cache.query("A", 3), h.cache.query("A", 3));

    assert_eq!(first.unwrap().offsets(), vec![3, 4, 8, 10]);
    assert_eq!(second.unwrap().offsets(), vec![3, 4, 8, 10]);
    assert_eq!(h.journal.fetch_calls(), vec![(3, 10)]);

    let stats = h.cache.stats();
    assert_eq!(stats.backfill_fetches, 1);
    assert_eq!(stats.backfills_skipped, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_backfills_across_threads_fetch_once() {
    let h = harness_with(
        InMemoryJournal::new().with_fetch_delay(Duration::from_millis(100)),
        CacheConfig::default(),
    )
    .await;
    h.journal.append_history(packages("A", 0..10));
    h.journal.publish(package(10, "A", ReqType::Add)).await;
    wait_for_max(&h.cache, 10).await;

    let cache = Arc::new(h.cache);
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.query("A", 0).await.map(|q| q.size()) })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 11);
    }
    assert_eq!(h.journal.fetch_count(), 1);
}

#[tokio::test]
async fn test_test_message_moves_max_but_is_not_cached() {
    let h = harness().await;
    h.journal.publish(package(10, "A", ReqType::Add)).await;
    h.journal.publish(package(12, "A", ReqType::Test)).await;
    wait_for_max(&h.cache, 12).await;

    let queue = h.cache.query("A", 10).await.unwrap();
    assert_eq!(queue.offsets(), vec![10]);
    assert_eq!(h.cache.size(), 1);
    assert_eq!(h.callback.call_count(), 1);
}

// ============================================================================
// MERGE SIDE EFFECTS
// ============================================================================

#[tokio::test]
async fn test_backfill_filters_test_messages_and_notifies_per_agent() {
    let h = harness().await;
    h.journal.append_history(vec![
        package(1, "A", ReqType::Test),
        package(2, "A", ReqType::Add),
        package(3, "B", ReqType::Delete),
        package(4, "A", ReqType::Add),
    ]);
    h.journal.publish(package(5, "C", ReqType::Add)).await;
    wait_for_max(&h.cache, 5).await;

    let queue = h.cache.query("A", 1).await.unwrap();

    assert_eq!(queue.offsets(), vec![2, 4]);
    assert_eq!(h.cache.query("B", 1).await.unwrap().offsets(), vec![3]);
    assert_eq!(h.cache.min_offset(), Some(1));
    assert_eq!(h.cache.agents(), vec!["A", "B", "C"]);
    // One notification from the tail, then one per backfilled agent.
    assert_eq!(h.callback.offsets(), vec![vec![5], vec![2, 4], vec![3]]);
}

#[tokio::test]
async fn test_queues_are_registered_once_per_agent() {
    let h = harness().await;
    h.journal.publish(package(1, "A", ReqType::Add)).await;
    h.journal.publish(package(2, "B", ReqType::Add)).await;
    h.journal.publish(package(3, "A", ReqType::Add)).await;
    wait_for_max(&h.cache, 3).await;

    assert_eq!(h.registry.registered(), vec!["A", "B"]);
    let introspected = h.registry.queue("A").unwrap();
    assert_eq!(introspected.offsets(), vec![1, 3]);
}

#[tokio::test]
async fn test_registration_can_be_disabled() {
    let h = harness_with(
        InMemoryJournal::new(),
        CacheConfig::default().with_register_queues(false),
    )
    .await;
    h.journal.publish(package(1, "A", ReqType::Add)).await;
    wait_for_max(&h.cache, 1).await;

    assert!(h.registry.registered().is_empty());
    assert_eq!(h.cache.size(), 1);
}

#[tokio::test]
async fn test_failed_registration_does_not_block_ingestion() {
    let journal = InMemoryJournal::new();
    let h = harness_with(journal, CacheConfig::default()).await;
    h.registry.set_fail_register(true);
    h.journal.publish(package(1, "A", ReqType::Add)).await;
    wait_for_max(&h.cache, 1).await;

    assert_eq!(h.cache.query("A", 1).await.unwrap().offsets(), vec![1]);
    assert!(h.registry.registered().is_empty());
}

// ============================================================================
// ERRORS
// ============================================================================

#[tokio::test]
async fn test_fetch_failure_propagates_and_keeps_watermark() {
    let h = harness().await;
    h.journal.publish(package(10, "A", ReqType::Add)).await;
    wait_for_max(&h.cache, 10).await;
    h.journal.set_fail_fetch(true);

    let err = h.cache.query("A", 5).await.unwrap_err();

    assert!(matches!(err, PubQueueError::Journal(_)));
    assert_eq!(h.cache.min_offset(), Some(10));

    // The caller decides to retry once the journal recovers.
    h.journal.set_fail_fetch(false);
    h.cache.query("A", 5).await.unwrap();
    assert_eq!(h.cache.min_offset(), Some(5));
}

#[tokio::test]
async fn test_backfill_wait_times_out() {
    let h = harness_with(
        InMemoryJournal::new().with_fetch_delay(Duration::from_millis(500)),
        CacheConfig::default().with_max_fetch_wait(Duration::from_millis(20)),
    )
    .await;
    h.journal.publish(package(10, "A", ReqType::Add)).await;
    wait_for_max(&h.cache, 10).await;

    let (first, second) = tokio::join!(h.cache.query("A", 5), h.cache.query("A", 4));

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| r.as_ref().err().is_some_and(|e| e.is_timeout())));
    assert_eq!(h.cache.stats().backfill_timeouts, 1);
    assert_eq!(h.journal.fetch_count(), 1);
}

#[tokio::test]
async fn test_subscribe_failure_fails_construction() {
    let journal = Arc::new(InMemoryJournal::new());
    journal.set_fail_subscribe(true);

    let err = PubQueueCache::with_defaults(journal).await.unwrap_err();
    assert!(matches!(err, PubQueueError::Journal(_)));
}

#[tokio::test]
async fn test_invalid_config_fails_construction() {
    let journal = Arc::new(InMemoryJournal::new());
    let err = PubQueueCache::new(
        journal.clone(),
        Arc::new(RecordingQueuedCallback::new()),
        Arc::new(InMemoryQueueRegistry::new()),
        CacheConfig::default().with_max_fetch_wait(Duration::ZERO),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PubQueueError::Config(_)));
    assert!(!journal.has_consumer());
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[tokio::test]
async fn test_close_releases_consumer_and_registrations() {
    let h = harness().await;
    h.journal.publish(package(1, "A", ReqType::Add)).await;
    h.journal.publish(package(2, "B", ReqType::Add)).await;
    wait_for_max(&h.cache, 2).await;

    h.cache.close().await;

    assert_eq!(h.journal.close_count(), 1);
    assert!(!h.journal.has_consumer());
    assert_eq!(h.registry.unregistered(), vec!["A", "B"]);

    // Tail is gone; new records are not delivered.
    assert!(!h.journal.publish(package(3, "A", ReqType::Add)).await);
    assert_eq!(h.cache.max_offset(), Some(2));

    // Cached data stays readable.
    assert_eq!(h.cache.query("A", 1).await.unwrap().offsets(), vec![1]);
}

#[tokio::test]
async fn test_backfill_after_close_does_not_register_new_agents() {
    let h = harness().await;
    h.journal.append_history(packages("Z", [3]));
    h.journal.publish(package(10, "A", ReqType::Add)).await;
    wait_for_max(&h.cache, 10).await;

    h.cache.close().await;
    let late = h.cache.query("Z", 3).await.unwrap();

    assert_eq!(late.offsets(), vec![3]);
    assert_eq!(h.registry.registered(), vec!["A"]);
    assert_eq!(h.registry.unregistered(), vec!["A"]);
}

#[tokio::test]
async fn test_close_twice_is_safe() {
    let h = harness().await;
    h.journal.publish(package(1, "A", ReqType::Add)).await;
    wait_for_max(&h.cache, 1).await;

    h.cache.close().await;
    h.cache.close().await;

    assert_eq!(h.journal.close_count(), 1);
    assert_eq!(h.registry.unregistered(), vec!["A"]);
}

#[tokio::test]
async fn test_close_swallows_collaborator_failures() {
    let h = harness().await;
    h.journal.publish(package(1, "A", ReqType::Add)).await;
    wait_for_max(&h.cache, 1).await;
    h.journal.set_fail_close(true);
    h.registry.set_fail_close(true);

    h.cache.close().await;
    h.cache.close().await;

    assert_eq!(h.journal.close_count(), 1);
    assert_eq!(h.registry.unregistered(), vec!["A"]);
}

#[tokio::test]
async fn test_drop_without_close_releases_consumer() {
    let h = harness().await;
    let journal = h.journal.clone();
    let registry = h.registry.clone();
    h.journal.publish(package(1, "A", ReqType::Add)).await;
    wait_for_max(&h.cache, 1).await;

    drop(h);

    assert_eq!(journal.close_count(), 1);
    assert_eq!(registry.unregistered(), vec!["A"]);
}

#[tokio::test]
async fn test_stats_snapshot() {
    let h = harness().await;
    h.journal.append_history(packages("A", [5]));
    h.journal.publish(package(10, "A", ReqType::Add)).await;
    h.journal.publish(package(11, "B", ReqType::Add)).await;
    wait_for_max(&h.cache, 11).await;
    h.cache.query("A", 5).await.unwrap();

    let stats = h.cache.stats();
    assert_eq!(stats.agents, 2);
    assert_eq!(stats.items, 3);
    assert_eq!(stats.min_offset, Some(5));
    assert_eq!(stats.max_offset, Some(11));
    assert_eq!(stats.tail_records, 2);
    assert_eq!(stats.backfill_fetches, 1);
    assert_eq!(stats.covered_span(), 7);
}
