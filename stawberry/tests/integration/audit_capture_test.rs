//! HTTP経由での監査ログ記録

use crate::support::{body_json, build_app, get, json_post, test_config};
use axum::{extract::ConnectInfo, http::StatusCode};
use serde_json::{json, Value};
use stawberry::audit::types::UserRole;
use std::net::SocketAddr;
use tower::ServiceExt;

#[tokio::test]
async fn nine_posts_are_flushed_as_one_batch_on_shutdown() {
    let t = build_app(test_config(10, 2, 5));

    for i in 0..9 {
        let res = t
            .app
            .clone()
            .oneshot(json_post("/api/offers", json!({"price": i})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    t.writer.shutdown().await;

    let batches = t.sink.batches();
    assert_eq!(batches.len(), 1, "below the eager-flush threshold");
    assert_eq!(batches[0].len(), 9);
    assert!(batches[0].iter().all(|e| e.method == "POST" && e.resp_status == 201));
}

#[tokio::test]
async fn get_requests_are_not_recorded() {
    let t = build_app(test_config(10, 2, 5));

    let res = t.app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = t
        .app
        .clone()
        .oneshot(get("/api/v1/audit/logs"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    t.writer.shutdown().await;
    assert!(t.sink.entries().is_empty());
}

#[tokio::test]
async fn credentials_are_redacted_in_log_but_not_in_response() {
    let t = build_app(test_config(10, 1, 5));

    let res = t
        .app
        .clone()
        .oneshot(json_post(
            "/api/auth/login",
            json!({"email": "a@example.com", "password": "hunter2"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["access_token"], "at-123");

    t.writer.shutdown().await;

    let entries = t.sink.entries();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.url, "/api/auth/login");
    assert_eq!(entry.user_id, 5);
    assert_eq!(entry.user_role, UserRole::User);
    assert_eq!(
        Value::Object(entry.req_body.clone()),
        json!({"email": "a@example.com", "password": "[REDACTED]"})
    );
    assert_eq!(
        Value::Object(entry.resp_body.clone()),
        json!({"access_token": "[REDACTED]", "refresh_token": "[REDACTED]"})
    );
}

#[tokio::test]
async fn peer_address_is_recorded_when_no_proxy_headers() {
    let t = build_app(test_config(10, 1, 5));

    let mut request = json_post("/api/offers", json!({}));
    let peer: SocketAddr = "[::ffff:10.1.2.3]:5000".parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    t.app.clone().oneshot(request).await.unwrap();

    t.writer.shutdown().await;
    assert_eq!(t.sink.entries()[0].ip, "10.1.2.3");
}

#[tokio::test]
async fn rejected_requests_are_recorded_with_status() {
    let t = build_app(test_config(10, 1, 5));

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/offers")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{broken"))
        .unwrap();
    let res = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    drop(res);

    t.writer.shutdown().await;
    let entry = &t.sink.entries()[0];
    assert_eq!(entry.resp_status, 400);
    assert!(entry.req_body.is_empty());
}

#[tokio::test]
async fn burst_above_threshold_is_flushed_early_in_order() {
    let t = build_app(test_config(10, 1, 5));

    for i in 0..25 {
        t.app
            .clone()
            .oneshot(json_post("/api/offers", json!({"seq": i})))
            .await
            .unwrap();
        tokio::task::yield_now().await;
    }

    t.writer.shutdown().await;

    let batches = t.sink.batches();
    assert!(batches.len() >= 2, "expected an eager flush, got {:?}", batches.len());
    let seqs: Vec<i64> = t
        .sink
        .entries()
        .iter()
        .map(|e| e.req_body["seq"].as_i64().unwrap())
        .collect();
    assert_eq!(seqs, (0..25).collect::<Vec<_>>());
}
