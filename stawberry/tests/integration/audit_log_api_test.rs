//! GET /api/v1/audit/logs

use crate::support::{body_json, build_app, get, json_post, test_config};
use axum::http::StatusCode;
use serde_json::json;
use stawberry::api::audit_log::AuditLogListResponse;
use stawberry::api::create_app;
use stawberry::audit::sink::JsonLinesAuditSink;
use stawberry::audit::writer::AuditLogWriter;
use stawberry::shutdown::ShutdownController;
use stawberry::AppState;
use std::sync::Arc;
use tower::ServiceExt;

#[tokio::test]
async fn lists_recorded_entries_with_pagination() {
    let t = build_app(test_config(100, 2, 10));
    for i in 0..3 {
        t.app
            .clone()
            .oneshot(json_post("/api/offers", json!({"price": i})))
            .await
            .unwrap();
    }
    t.writer.shutdown().await;

    let res = t
        .app
        .clone()
        .oneshot(get("/api/v1/audit/logs?limit=2"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let list: AuditLogListResponse = serde_json::from_value(body_json(res).await).unwrap();
    assert_eq!(list.total_logs, 3);
    assert_eq!(list.per_page, 2);
    assert_eq!(list.current_page, 1);
    assert_eq!(list.total_pages, 2);
    assert_eq!(list.data.len(), 2);
    assert!(list.data[0].received_at >= list.data[1].received_at);

    let res = t
        .app
        .clone()
        .oneshot(get("/api/v1/audit/logs?limit=2&page=2"))
        .await
        .unwrap();
    let list: AuditLogListResponse = serde_json::from_value(body_json(res).await).unwrap();
    assert_eq!(list.current_page, 2);
    assert_eq!(list.data.len(), 1);
}

#[tokio::test]
async fn entries_serialize_with_wire_field_names() {
    let t = build_app(test_config(100, 1, 10));
    t.app
        .clone()
        .oneshot(json_post("/api/offers", json!({"price": 1})))
        .await
        .unwrap();
    t.writer.shutdown().await;

    let res = t
        .app
        .clone()
        .oneshot(get("/api/v1/audit/logs"))
        .await
        .unwrap();
    let body = body_json(res).await;
    let entry = &body["data"][0];
    for field in [
        "method",
        "url",
        "resp_status",
        "user_id",
        "user_ip",
        "user_role",
        "received_at",
        "req_body",
        "resp_body",
    ] {
        assert!(entry.get(field).is_some(), "missing field {}", field);
    }
    assert_eq!(entry["user_role"], "user");
    assert_eq!(entry["resp_status"], 201);
}

#[tokio::test]
async fn filters_by_user_id() {
    let t = build_app(test_config(100, 2, 10));
    t.app
        .clone()
        .oneshot(json_post("/api/offers", json!({})))
        .await
        .unwrap();
    t.app
        .clone()
        .oneshot(json_post("/api/auth/login", json!({"password": "x"})))
        .await
        .unwrap();
    t.writer.shutdown().await;

    let res = t
        .app
        .clone()
        .oneshot(get("/api/v1/audit/logs?uid=5"))
        .await
        .unwrap();
    let list: AuditLogListResponse = serde_json::from_value(body_json(res).await).unwrap();
    assert_eq!(list.total_logs, 1);
    assert_eq!(list.data[0].url, "/api/auth/login");
}

#[tokio::test]
async fn rejects_inverted_range() {
    let t = build_app(test_config(100, 1, 10));
    let res = t
        .app
        .clone()
        .oneshot(get(
            "/api/v1/audit/logs?from=2024-02-01T00:00:00Z&to=2024-01-01T00:00:00Z",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(res).await,
        json!({"error": "Invalid request parameters"})
    );
    t.writer.shutdown().await;
}

#[tokio::test]
async fn rejects_long_range_without_uid() {
    let t = build_app(test_config(100, 1, 10));
    let res = t
        .app
        .clone()
        .oneshot(get(
            "/api/v1/audit/logs?from=2020-01-01T00:00:00Z&to=2024-01-01T00:00:00Z",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = t
        .app
        .clone()
        .oneshot(get(
            "/api/v1/audit/logs?from=2020-01-01T00:00:00Z&to=2024-01-01T00:00:00Z&uid=3",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    t.writer.shutdown().await;
}

#[tokio::test]
async fn json_lines_sink_round_trip_through_api() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(JsonLinesAuditSink::new(dir.path().join("audit.jsonl")));
    let writer = AuditLogWriter::new(test_config(100, 1, 10), sink.clone()).unwrap();
    let app = create_app(AppState {
        audit_log_writer: writer.clone(),
        audit_log_query: sink.clone(),
        shutdown: ShutdownController::default(),
    });

    let request = axum::http::Request::builder()
        .method("PUT")
        .uri("/health")
        .header("x-real-ip", "198.51.100.4")
        .body(axum::body::Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap();
    writer.shutdown().await;

    let res = app.oneshot(get("/api/v1/audit/logs")).await.unwrap();
    let list: AuditLogListResponse = serde_json::from_value(body_json(res).await).unwrap();
    assert_eq!(list.total_logs, 1);
    assert_eq!(list.data[0].method, "PUT");
    assert_eq!(list.data[0].ip, "198.51.100.4");
}
