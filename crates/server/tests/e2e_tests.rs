//! End-to-end tests with mocked external dependencies.
//!
//! These tests run the full router in-process with mock implementations of
//! stream resolution and the transcoder process.

mod common;

use axum::http::StatusCode;
use std::time::Duration;
use tubetone_core::{CancellationRegistry, JobQueue, NotificationRouting};

use common::{fixtures, TestFixture, PUBLIC_BASE_URL};

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_version_endpoint() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/version").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_config_hides_local_paths() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["storage"]["public_base_url"], PUBLIC_BASE_URL);
    assert_eq!(response.body["worker"]["routing"], "broadcast");
    assert!(response.body["storage"].get("root").is_none());
    assert!(!response.text.contains(&*fixture.temp_dir.path().to_string_lossy()));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new();
    fixture.get("/api/v1/health").await;

    let response = fixture.get("/metrics").await;

    assert_status!(response, StatusCode::OK);
    assert!(response.text.contains("tubetone_http_requests_total"));
    assert!(response.text.contains("tubetone_queue_depth"));
}

// =============================================================================
// Enqueue
// =============================================================================

#[tokio::test]
async fn test_enqueue_requires_session() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/enqueue?v=abc123").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("session"));

    let response = fixture.get("/api/v1/enqueue?c=%20&v=abc123").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(fixture.queue.is_empty());
}

#[tokio::test]
async fn test_enqueue_uncached_video() {
    let fixture = TestFixture::new();
    fixture
        .resolver
        .add_video(fixtures::video_info("abc123", "Daft Punk - One More Time", 180));

    let response = fixture.get("/api/v1/enqueue?c=session-1&v=abc123").await;

    assert_status!(response, StatusCode::OK);
    let items = response.body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], "abc123");
    assert_eq!(items[0]["title"], "Daft Punk - One More Time");
    assert_eq!(items[0]["duration"], "PT3M0S");
    assert_eq!(items[0]["message"], "Enqueued");
    assert_eq!(items[0]["isReady"], false);
    assert!(items[0]["fileName"].is_null());
    assert!(items[0]["invocationId"].is_string());
    assert_eq!(fixture.queue.len(), 1);
}

#[tokio::test]
async fn test_enqueue_unknown_video_is_ready_with_error() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/enqueue?c=s1&v=missing").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body[0]["isReady"], true);
    assert!(response.body[0]["error"].is_string());
    assert!(response.body[0].get("invocationId").is_none());
    assert!(fixture.queue.is_empty());
}

#[tokio::test]
async fn test_enqueue_ids_from_body() {
    let fixture = TestFixture::new();
    for id in ["aaa", "bbb", "ccc"] {
        fixture.resolver.add_video(fixtures::video_info(id, id, 30));
    }

    let response = fixture
        .post_text("/api/v1/enqueue?c=s1", "aaa\nbbb,ccc aaa")
        .await;

    assert_status!(response, StatusCode::OK);
    let ids: Vec<&str> = response
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["aaa", "bbb", "ccc"]);
    assert_eq!(fixture.queue.len(), 3);
}

#[tokio::test]
async fn test_enqueue_with_no_ids_returns_empty_list() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/enqueue?c=s1").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body, serde_json::json!([]));
}

// =============================================================================
// Full conversion through the worker pool
// =============================================================================

#[tokio::test]
async fn test_converted_artifact_is_cached_listed_and_served() {
    let fixture = TestFixture::new();
    let mut rx = fixture.notifier.subscribe();
    fixture
        .resolver
        .add_video(fixtures::video_info("abc123", "Song", 60));
    fixture.pool.start();

    fixture.get("/api/v1/enqueue?c=s1&v=abc123").await;
    fixture.wait_for_cached(1).await;
    fixture.pool.stop().await;

    // Every notification went to the broadcast channel and the last is ready.
    let mut last = None;
    while let Ok(n) = rx.try_recv() {
        assert_eq!(n.routing_key, "broadcast");
        last = Some(n);
    }
    let last = last.expect("no notifications");
    assert!(last.item.is_ready);
    assert!(last.item.item.error.is_none());

    // A second request is a cache hit.
    let response = fixture.get("/api/v1/enqueue?c=s2&v=abc123").await;
    let url = response.body[0]["url"].as_str().unwrap().to_string();
    assert_eq!(url, format!("{}/abc123/Song.mp3", PUBLIC_BASE_URL));
    assert_eq!(response.body[0]["isReady"], true);
    assert!(response.body[0]["conversionDate"].is_string());
    assert!(fixture.queue.is_empty());

    // Listed.
    let response = fixture.get("/api/v1/list").await;
    assert_status!(response, StatusCode::OK);
    let listed = response.body.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], "abc123");
    assert_eq!(listed[0]["url"], url.as_str());

    // Served.
    let response = fixture.get("/files/abc123/Song.mp3").await;
    assert_status!(response, StatusCode::OK);
    assert!(!response.text.is_empty());
}

#[tokio::test]
async fn test_session_routing() {
    let fixture = TestFixture::with_routing(NotificationRouting::Session);
    let mut rx = fixture.notifier.subscribe();
    fixture
        .resolver
        .add_video(fixtures::video_info("abc123", "Song", 60));
    fixture.pool.start();

    fixture.get("/api/v1/enqueue?c=session-9&v=abc123").await;
    fixture.wait_for_cached(1).await;
    fixture.pool.stop().await;

    let mut count = 0;
    while let Ok(n) = rx.try_recv() {
        assert_eq!(n.routing_key, "session-9");
        count += 1;
    }
    assert!(count > 0);
}

#[tokio::test]
async fn test_list_empty_cache() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/list").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body, serde_json::json!([]));
}

// =============================================================================
// Terminate
// =============================================================================

#[tokio::test]
async fn test_terminate_requires_id() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/terminate").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_terminate_unknown_id_succeeds() {
    let fixture = TestFixture::new();

    let response = fixture.post_text("/api/v1/terminate?id=nope", "").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["invocationId"], "nope");
    assert!(fixture.registry.is_cancelled("nope"));
}

#[tokio::test]
async fn test_terminate_stops_running_job() {
    let fixture = TestFixture::new();
    let mut rx = fixture.notifier.subscribe();
    fixture
        .resolver
        .add_video(fixtures::video_info("abc123", "Song", 60));
    fixture.runner.set_delay(Duration::from_secs(10));
    fixture.pool.start();

    let response = fixture.get("/api/v1/enqueue?c=s1&v=abc123").await;
    let invocation_id = response.body[0]["invocationId"].as_str().unwrap().to_string();

    // Wait until the transcoder is running.
    loop {
        let n = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("never reached converting")
            .unwrap();
        if n.item.item.message.as_deref() == Some("Converting...") {
            break;
        }
    }

    let response = fixture
        .get(&format!("/api/v1/terminate?id={}", invocation_id))
        .await;
    assert_status!(response, StatusCode::OK);

    let finished = loop {
        let n = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("job did not stop")
            .unwrap();
        if n.item.is_ready {
            break n;
        }
    };
    fixture.pool.stop().await;

    assert_eq!(finished.item.item.error.as_deref(), Some("Download cancelled"));
    assert!(finished.item.item.storage_url.is_none());
    assert!(fixture.cache.lookup("abc123").await.unwrap().is_none());
    assert!(fixture.registry.is_empty());
}
