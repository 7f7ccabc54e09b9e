//! Dispatcher and worker pool integration tests.
//!
//! Requests go through `parse_video_ids` and the dispatcher, the pool drains
//! the queue, and subscribers of the broadcast notifier see the results.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use tubetone_core::{
    parse_video_ids,
    testing::{fixtures, MockProcessRunner, MockResolver},
    BroadcastNotifier, CacheStore, ConversionWorker, ConverterConfig, FfmpegTranscoder,
    FsBlobStore, InMemoryCancellationRegistry, JobDispatcher, JobItem, JobQueue, MemoryQueue,
    NotificationRouting, WorkerConfig, WorkerPool,
};

struct TestHarness {
    resolver: Arc<MockResolver>,
    cache: Arc<CacheStore>,
    queue: Arc<MemoryQueue>,
    notifier: Arc<BroadcastNotifier>,
    dispatcher: JobDispatcher,
    pool: WorkerPool,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new(routing: NotificationRouting) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let resolver = Arc::new(MockResolver::new());
        let blobs = Arc::new(FsBlobStore::new(
            temp_dir.path().join("blobs"),
            "http://localhost:8080/files",
        ));
        let cache = Arc::new(CacheStore::new(blobs, 2));
        let queue = Arc::new(MemoryQueue::default());
        let notifier = Arc::new(BroadcastNotifier::new(1024));

        let transcoder = Arc::new(FfmpegTranscoder::new(
            ConverterConfig::default().with_work_dir(temp_dir.path().join("work")),
            Arc::new(MockProcessRunner::new()),
        ));
        let worker = Arc::new(ConversionWorker::new(
            WorkerConfig::default().with_routing(routing),
            resolver.clone(),
            transcoder,
            cache.clone(),
            notifier.clone(),
            Arc::new(InMemoryCancellationRegistry::new()),
        ));
        let dispatcher = JobDispatcher::new(resolver.clone(), cache.clone(), queue.clone());
        let pool = WorkerPool::new(worker, queue.clone(), 2);

        Self {
            resolver,
            cache,
            queue,
            notifier,
            dispatcher,
            pool,
            _temp_dir: temp_dir,
        }
    }

    async fn wait_for_cached(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.cache.list_all().await.unwrap().len() < count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {} cached items",
                count
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[tokio::test]
async fn test_mixed_batch() {
    let h = TestHarness::new(NotificationRouting::Broadcast);
    h.resolver.add_video(fixtures::video_info("fresh", "Fresh Song", 30));
    h.resolver.add_video(fixtures::video_info("cached", "Old Song", 30));
    let mut cached = JobItem::new("cached");
    cached.title = "Old Song".to_string();
    h.cache
        .put_metadata("cached", &cached, CancellationToken::new())
        .await
        .unwrap();

    let ids = parse_video_ids("fresh,cached\nunknown fresh");
    assert_eq!(ids, vec!["fresh", "cached", "unknown"]);

    let items = h.dispatcher.dispatch(&ids, "session-1").await;

    assert_eq!(items[0].message.as_deref(), Some("Enqueued"));
    assert!(items[1].is_ready() && !items[1].has_error());
    assert!(items[2].has_error());
    assert_eq!(h.queue.len(), 1);
}

#[tokio::test]
async fn test_pool_converts_and_broadcasts() {
    let h = TestHarness::new(NotificationRouting::Broadcast);
    let mut rx = h.notifier.subscribe();
    for id in ["a1", "b2", "c3"] {
        h.resolver
            .add_video(fixtures::video_info(id, &format!("Artist - {}", id), 30));
    }

    h.pool.start();
    let ids = parse_video_ids("a1 b2 c3");
    h.dispatcher.dispatch(&ids, "session-1").await;
    h.wait_for_cached(3).await;
    h.pool.stop().await;

    let mut ready = Vec::new();
    while let Ok(n) = rx.try_recv() {
        assert_eq!(n.routing_key, "broadcast");
        if n.item.is_ready {
            ready.push(n.item.item.id.clone());
        }
    }
    ready.sort();
    assert_eq!(ready, vec!["a1", "b2", "c3"]);

    // Everything is now served from the cache.
    let again = h.dispatcher.dispatch(&ids, "session-2").await;
    assert!(again.iter().all(|i| i.is_ready() && i.invocation_id.is_none()));
    assert!(h.queue.is_empty());
}

#[tokio::test]
async fn test_session_routing_reaches_requester_only() {
    let h = TestHarness::new(NotificationRouting::Session);
    let mut rx = h.notifier.subscribe();
    h.resolver.add_video(fixtures::video_info("a1", "Song", 30));

    h.pool.start();
    h.dispatcher.dispatch(&["a1".to_string()], "session-42").await;
    h.wait_for_cached(1).await;
    h.pool.stop().await;

    let mut seen = 0;
    while let Ok(n) = rx.try_recv() {
        assert_eq!(n.routing_key, "session-42");
        seen += 1;
    }
    assert!(seen >= 5);
}

#[tokio::test]
async fn test_concurrent_dispatch_of_same_id_may_enqueue_twice() {
    let h = TestHarness::new(NotificationRouting::Broadcast);
    h.resolver.add_video(fixtures::video_info("dup", "Song", 30));
    let ids = vec!["dup".to_string()];

    let (first, second) = tokio::join!(
        h.dispatcher.dispatch(&ids, "s1"),
        h.dispatcher.dispatch(&ids, "s2")
    );

    assert_ne!(first[0].invocation_id, second[0].invocation_id);
    assert_eq!(h.queue.len(), 2);

    // Both deliveries converge on one valid cache entry.
    let mut rx = h.notifier.subscribe();
    h.pool.start();
    let mut finished = 0;
    while finished < 2 {
        let n = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for jobs")
            .unwrap();
        if n.item.is_ready {
            assert!(!n.item.item.has_error());
            finished += 1;
        }
    }
    h.pool.stop().await;

    let hit = h.cache.lookup("dup").await.unwrap().unwrap();
    assert!(hit.url.starts_with("http://localhost:8080/files/dup/"));
    assert_eq!(h.cache.list_all().await.unwrap().len(), 1);
}
