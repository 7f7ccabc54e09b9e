//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, enabling E2E testing without yt-dlp,
//! ffmpeg or network access.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use tubetone_core::{
    testing::{MockProcessRunner, MockResolver},
    BroadcastNotifier, CacheStore, Config, ConversionWorker, FfmpegTranscoder, FsBlobStore,
    InMemoryCancellationRegistry, JobDispatcher, MemoryQueue, NotificationRouting,
    WorkerPool,
};
use tubetone_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use tubetone_core::testing::fixtures;

pub const PUBLIC_BASE_URL: &str = "http://localhost:8080/files";

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with controllable mocks for:
/// - Stream resolution (MockResolver)
/// - The transcoder process (MockProcessRunner)
///
/// Artifacts land in a real filesystem blob store under `temp_dir`.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_enqueue() {
///     let fixture = TestFixture::new();
///     fixture.resolver.add_video(fixtures::video_info("abc123", "Song", 60));
///
///     let response = fixture.get("/api/v1/enqueue?c=s1&v=abc123").await;
///
///     assert_eq!(response.body[0]["message"], "Enqueued");
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock resolver - register videos and streams
    pub resolver: Arc<MockResolver>,
    /// Mock process runner - script transcoder output
    pub runner: Arc<MockProcessRunner>,
    pub cache: Arc<CacheStore>,
    pub queue: Arc<MemoryQueue>,
    pub notifier: Arc<BroadcastNotifier>,
    pub registry: Arc<InMemoryCancellationRegistry>,
    pub pool: Arc<WorkerPool>,
    /// Temporary directory for blobs and scratch files
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Create a new test fixture with broadcast routing.
    pub fn new() -> Self {
        Self::with_routing(NotificationRouting::Broadcast)
    }

    /// Create a test fixture with the given notification routing.
    pub fn with_routing(routing: NotificationRouting) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.server.host = std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);
        config.storage.root = temp_dir.path().join("blobs");
        config.storage.public_base_url = PUBLIC_BASE_URL.to_string();
        config.converter = config.converter.with_work_dir(temp_dir.path().join("work"));
        config.worker = config.worker.with_routing(routing);

        let resolver = Arc::new(MockResolver::new());
        let runner = Arc::new(MockProcessRunner::new());
        let blobs = Arc::new(FsBlobStore::new(
            config.storage.root.clone(),
            config.storage.public_base_url.clone(),
        ));
        let cache = Arc::new(CacheStore::new(blobs, config.storage.list_page_size));
        let queue = Arc::new(MemoryQueue::new(config.worker.queue_capacity));
        let notifier = Arc::new(BroadcastNotifier::new(1024));
        let registry = Arc::new(InMemoryCancellationRegistry::new());

        let transcoder = Arc::new(FfmpegTranscoder::new(
            config.converter.clone(),
            runner.clone(),
        ));
        let dispatcher = JobDispatcher::new(resolver.clone(), cache.clone(), queue.clone());
        let worker = Arc::new(ConversionWorker::new(
            config.worker.clone(),
            resolver.clone(),
            transcoder,
            cache.clone(),
            notifier.clone(),
            registry.clone(),
        ));
        let pool = Arc::new(WorkerPool::new(
            worker,
            queue.clone(),
            config.worker.concurrency,
        ));

        let state = Arc::new(AppState::new(
            config,
            dispatcher,
            cache.clone(),
            registry.clone(),
            notifier.clone(),
            queue.clone(),
            pool.clone(),
        ));
        let router = create_router(state);

        Self {
            router,
            resolver,
            runner,
            cache,
            queue,
            notifier,
            registry,
            pool,
            temp_dir,
        }
    }

    /// Wait until the cache holds `count` artifacts.
    pub async fn wait_for_cached(&self, count: usize) {
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

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, Body::empty()).await
    }

    /// Send a POST request with a plain text body.
    pub async fn post_text(&self, path: &str, body: &str) -> TestResponse {
        self.request("POST", path, Body::from(body.to_string()))
            .await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Body) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "text/plain")
            .body(body)
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status, $response.status, $response.text
        );
    };
}
