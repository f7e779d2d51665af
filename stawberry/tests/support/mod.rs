//! テスト用のアプリケーション構築ユーティリティ

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::post,
    Extension, Json, Router,
};
use serde_json::{json, Value};
use stawberry::api::create_app_with_routes;
use stawberry::audit::sink::MemoryAuditSink;
use stawberry::audit::types::AuthContext;
use stawberry::audit::writer::AuditLogWriter;
use stawberry::config::AuditConfig;
use stawberry::shutdown::ShutdownController;
use stawberry::AppState;
use std::sync::Arc;
use std::time::Duration;

/// 監査対象のアプリケーションとその記録先
pub struct TestApp {
    pub app: Router,
    pub writer: AuditLogWriter,
    pub sink: Arc<MemoryAuditSink>,
}

/// 定期フラッシュが走らないテスト用設定
#[allow(dead_code)]
pub fn test_config(queue_size: usize, worker_pool_size: usize, batch_size: usize) -> AuditConfig {
    AuditConfig {
        queue_size,
        worker_pool_size,
        batch_size,
        flush_interval: Duration::from_secs(300),
        retry_base_delay: Duration::from_millis(10),
        max_retries: 3,
    }
}

/// アプリケーション側のルート（認証済みユーザーとして応答する）
fn app_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/offers",
            post(|Json(body): Json<Value>| async move {
                (StatusCode::CREATED, Json(json!({"id": 1, "offer": body})))
            }),
        )
        .route(
            "/api/auth/login",
            post(|| async {
                (
                    Extension(AuthContext {
                        user_id: 5,
                        is_store: false,
                        is_admin: false,
                    }),
                    Json(json!({"access_token": "at-123", "refresh_token": "rt-456"})),
                )
            }),
        )
}

#[allow(dead_code)]
pub fn build_app(config: AuditConfig) -> TestApp {
    let sink = Arc::new(MemoryAuditSink::new());
    let writer = AuditLogWriter::new(config, sink.clone()).unwrap();
    let state = AppState {
        audit_log_writer: writer.clone(),
        audit_log_query: sink.clone(),
        shutdown: ShutdownController::default(),
    };
    TestApp {
        app: create_app_with_routes(state, app_routes()),
        writer,
        sink,
    }
}

#[allow(dead_code)]
pub fn json_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
