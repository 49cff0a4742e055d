//! # Request Lifecycle Tests
//!
//! Drive the full router (middleware stack included) and check what the
//! client sees and what the metadata store holds afterwards.

mod common;

use axum::http::StatusCode;
use blobber_handler::{
    codes, HandlerConfig, HandlerError, InMemoryMetaStore, MetaStore, MetaStoreStorageHandler,
    Operation, RequestIdentity,
};
use common::{app, request, send, Behavior, InstrumentedStore, ScriptedHandler};
use proptest::prelude::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_upload_success_is_committed() {
    let store = InMemoryMetaStore::new();
    let (router, stats) = app(
        HandlerConfig::default(),
        Arc::new(store.clone()),
        Arc::new(MetaStoreStorageHandler::new()),
    );

    let (status, body) = send(
        &router,
        request(
            "POST",
            "/v1/file/upload/abc123?path=/a.txt&connection_id=c1",
            Some("clientA"),
            b"hello",
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "a.txt");
    assert_eq!(body["size"], 5);
    assert_eq!(
        store.get_committed(b"pending:abc123:c1:/a.txt"),
        Some(b"hello".to_vec())
    );
    assert!(store.get_committed(b"allocation:abc123").is_some());
    assert_eq!(stats.commits.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_upload_then_commit_then_read() {
    let store = InMemoryMetaStore::new();
    let (router, _) = app(
        HandlerConfig::default(),
        Arc::new(store.clone()),
        Arc::new(MetaStoreStorageHandler::new()),
    );

    send(
        &router,
        request(
            "PUT",
            "/v1/file/upload/abc123?path=/docs/a.txt&connection_id=c1",
            Some("clientA"),
            b"hello",
        ),
    )
    .await;
    let (status, commit) = send(
        &router,
        request(
            "POST",
            "/v1/connection/commit/abc123?connection_id=c1",
            Some("clientA"),
            b"",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(commit["committed"][0], "/docs/a.txt");

    let (status, meta) = send(
        &router,
        request("GET", "/v1/file/meta/abc123?path=/docs/a.txt", None, b""),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["size"], 5);

    let (_, list) = send(&router, request("GET", "/v1/file/list/abc123", None, b"")).await;
    assert_eq!(list["entities"].as_array().unwrap().len(), 1);

    let (_, download) = send(
        &router,
        request("GET", "/v1/file/download/abc123?path=/docs/a.txt", None, b""),
    )
    .await;
    assert_eq!(download["content"], "hello");

    // download runs read-write: its read counter is committed
    let (_, again) = send(
        &router,
        request("GET", "/v1/file/download/abc123?path=/docs/a.txt", None, b""),
    )
    .await;
    assert_eq!(again["read_count"], 2);

    let (_, refpath) = send(
        &router,
        request("GET", "/v1/file/referencepath/abc123?path=/docs/a.txt", None, b""),
    )
    .await;
    assert_eq!(refpath["refs"].as_array().unwrap().len(), 3);

    let (status, allocation) =
        send(&router, request("GET", "/allocation?id=abc123", None, b"")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(allocation["owner_id"], "clientA");
}

#[tokio::test]
async fn test_upload_validation_error_leaves_store_unchanged() {
    let store = InMemoryMetaStore::new();
    let (router, stats) = app(
        HandlerConfig::default(),
        Arc::new(store.clone()),
        Arc::new(MetaStoreStorageHandler::new()),
    );

    let (status, body) = send(
        &router,
        request(
            "POST",
            "/v1/file/upload/abc123?path=/a.txt&connection_id=c1",
            None,
            b"hello",
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], codes::INVALID_OPERATION);
    assert!(body.get("filename").is_none());
    assert!(store.is_empty());
    assert_eq!(stats.rollbacks.load(Ordering::Relaxed), 1);
    assert_eq!(stats.commits.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_handler_error_passes_through_verbatim() {
    let store = InMemoryMetaStore::new();
    let handler = Arc::new(ScriptedHandler::new(Behavior::Fail(HandlerError::new(
        "size_mismatch",
        "declared size does not match",
    ))));
    let (router, _) = app(HandlerConfig::default(), Arc::new(store.clone()), handler);

    let (status, body) = send(
        &router,
        request("POST", "/v1/file/upload/abc123", Some("clientA"), b""),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "size_mismatch");
    assert_eq!(body["error"], "declared size does not match");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_commit_failure_returns_commit_error() {
    let store = InMemoryMetaStore::new();
    let handler = Arc::new(ScriptedHandler::new(Behavior::Succeed(
        serde_json::json!({ "uploaded": true }),
    )));
    let (router, stats) = app(
        HandlerConfig::default(),
        Arc::new(InstrumentedStore::failing_commits(store.clone())),
        handler,
    );

    let (status, body) = send(
        &router,
        request("POST", "/v1/file/upload/abc123", Some("clientA"), b"hello"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], codes::COMMIT_ERROR);
    assert_eq!(body["error"], "Error committing to meta store");
    assert!(body.get("uploaded").is_none());
    assert!(store.is_empty());
    assert_eq!(stats.commit_failures.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_write_conflict_returns_commit_error() {
    let store = InMemoryMetaStore::new();
    let handler = Arc::new(ScriptedHandler::new(Behavior::Conflict(store.clone())));
    let (router, _) = app(HandlerConfig::default(), Arc::new(store.clone()), handler);

    let (status, body) = send(
        &router,
        request("POST", "/v1/connection/commit/abc123", Some("clientA"), b""),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], codes::COMMIT_ERROR);
    // only the competing write is visible
    assert_eq!(store.get_committed(b"touched"), Some(b"competing".to_vec()));
}

#[tokio::test]
async fn test_meta_without_headers_rolls_back() {
    let store = InMemoryMetaStore::new();
    let handler = Arc::new(ScriptedHandler::new(Behavior::Succeed(
        serde_json::json!({ "name": "a.txt" }),
    )));
    let (router, stats) = app(
        HandlerConfig::default(),
        Arc::new(store.clone()),
        Arc::clone(&handler) as _,
    );

    let (status, body) = send(&router, request("GET", "/v1/file/meta/abc123", None, b"")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "a.txt");

    let calls = handler.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "get_file_meta");
    assert_eq!(calls[0].1, RequestIdentity::new("abc123", "", ""));

    assert!(store.is_empty());
    assert_eq!(stats.rollbacks.load(Ordering::Relaxed), 1);
    assert_eq!(stats.commits.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_null_payload_gives_empty_body() {
    let handler = Arc::new(ScriptedHandler::new(Behavior::Succeed(serde_json::Value::Null)));
    let (router, _) = app(
        HandlerConfig::default(),
        Arc::new(InMemoryMetaStore::new()),
        handler,
    );

    let (status, body) = send(&router, request("GET", "/v1/file/list/abc123", None, b"")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());
}

#[tokio::test]
async fn test_panicking_handler_rolls_back() {
    let store = InMemoryMetaStore::new();
    let handler = Arc::new(ScriptedHandler::new(Behavior::Panic));
    let (router, stats) = app(HandlerConfig::default(), Arc::new(store.clone()), handler);

    let (status, body) = send(
        &router,
        request("POST", "/v1/file/upload/abc123", Some("clientA"), b""),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], codes::INTERNAL_ERROR);
    assert!(store.is_empty());
    assert_eq!(stats.abandoned_scopes.load(Ordering::Relaxed), 1);
    assert_eq!(stats.scopes_open.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_timeout_rolls_back() {
    let store = InMemoryMetaStore::new();
    let handler = Arc::new(ScriptedHandler::new(Behavior::Sleep(Duration::from_secs(5))));
    let mut config = HandlerConfig::default();
    config.timeouts.upload = Duration::from_millis(50);
    let (router, stats) = app(config, Arc::new(store.clone()), handler);

    let (status, body) = send(
        &router,
        request("POST", "/v1/file/upload/abc123", Some("clientA"), b""),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], codes::TIMEOUT);
    assert!(store.is_empty());
    assert_eq!(stats.abandoned_scopes.load(Ordering::Relaxed), 1);
    assert_eq!(stats.requests_total.load(Ordering::Relaxed), 1);
    assert_eq!(stats.requests_error.load(Ordering::Relaxed), 1);
    assert_eq!(stats.operation_total(Operation::FileUpload), 1);
}

#[tokio::test]
async fn test_closed_store_fails_before_handler() {
    let store = InMemoryMetaStore::new();
    store.close();
    let handler = Arc::new(ScriptedHandler::new(Behavior::Succeed(serde_json::json!({}))));
    let (router, stats) = app(
        HandlerConfig::default(),
        Arc::new(store.clone()),
        Arc::clone(&handler) as _,
    );

    let (status, body) = send(&router, request("GET", "/v1/file/meta/abc123", None, b"")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], codes::INTERNAL_ERROR);
    assert_eq!(handler.call_count(), 0);
    assert_eq!(stats.setup_failures.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_non_utf8_header_fails_before_transaction() {
    let store = InstrumentedStore::new(InMemoryMetaStore::new());
    let opened = Arc::clone(&store.opened);
    let handler = Arc::new(ScriptedHandler::new(Behavior::Succeed(serde_json::json!({}))));
    let (router, _) = app(HandlerConfig::default(), Arc::new(store), Arc::clone(&handler) as _);

    let req = axum::http::Request::builder()
        .uri("/v1/file/meta/abc123")
        .header(
            "X-App-Client-ID",
            axum::http::HeaderValue::from_bytes(&[0xc3, 0x28]).unwrap(),
        )
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body) = send(&router, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], codes::INVALID_PARAMETERS);
    assert_eq!(handler.call_count(), 0);
    assert_eq!(opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let handler = Arc::new(ScriptedHandler::new(Behavior::Succeed(serde_json::json!({}))));
    let mut config = HandlerConfig::default();
    config.limits.max_request_size = 4;
    let (router, _) = app(
        config,
        Arc::new(InMemoryMetaStore::new()),
        Arc::clone(&handler) as _,
    );

    let (status, _) = send(
        &router,
        request("POST", "/v1/file/upload/abc123", Some("clientA"), b"too large"),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(handler.call_count(), 0);
}

#[tokio::test]
async fn test_routes_are_method_agnostic() {
    let handler = Arc::new(ScriptedHandler::new(Behavior::Succeed(serde_json::json!({}))));
    let (router, _) = app(
        HandlerConfig::default(),
        Arc::new(InMemoryMetaStore::new()),
        Arc::clone(&handler) as _,
    );

    for method in ["GET", "POST", "PUT", "DELETE"] {
        let (status, _) = send(&router, request(method, "/v1/file/list/abc123", None, b"")).await;
        assert_eq!(status, StatusCode::OK, "{}", method);
    }
    assert_eq!(handler.call_count(), 4);
}

#[tokio::test]
async fn test_concurrent_requests_get_independent_scopes() {
    let store = InMemoryMetaStore::new();
    let mut tasks = Vec::new();

    for i in 0..16u8 {
        let handler = Arc::new(
            ScriptedHandler::new(Behavior::Succeed(serde_json::json!({ "i": i })))
                .with_writes(vec![(vec![b'k', i], vec![i])]),
        );
        let (router, _) = app(HandlerConfig::default(), Arc::new(store.clone()), handler);
        tasks.push(tokio::spawn(async move {
            send(
                &router,
                request("POST", "/v1/file/upload/abc123", Some("clientA"), b""),
            )
            .await
        }));
    }

    for task in tasks {
        let (status, _) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(store.len(), 16);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn read_only_routes_never_persist(
        writes in proptest::collection::vec(
            (proptest::collection::vec(any::<u8>(), 1..8), proptest::collection::vec(any::<u8>(), 0..8)),
            0..6,
        ),
        fail in any::<bool>(),
        route in prop::sample::select(vec![
            "/v1/file/meta/abc123",
            "/v1/file/list/abc123",
            "/v1/file/referencepath/abc123",
        ]),
    ) {
        let store = InMemoryMetaStore::new();
        let behavior = if fail {
            Behavior::Fail(HandlerError::not_found("a.txt"))
        } else {
            Behavior::Succeed(serde_json::json!({ "ok": true }))
        };
        let handler = Arc::new(ScriptedHandler::new(behavior).with_writes(writes));
        let (router, _) = app(HandlerConfig::default(), Arc::new(store.clone()), handler);

        let (status, _) = tokio_test::block_on(send(&router, request("GET", route, None, b"")));

        prop_assert_eq!(status, if fail { StatusCode::BAD_REQUEST } else { StatusCode::OK });
        prop_assert!(store.is_empty());
        prop_assert_eq!(store.version(), 0);
    }
}
