//! HTTP API
//!
//! ルーター構築と各ハンドラー。更新系リクエストはすべて監査ログミドルウェアを通る。

/// 監査ログAPI
pub mod audit_log;
/// APIエラー型
pub mod error;

use crate::audit::middleware::audit_middleware;
use crate::AppState;
use axum::{middleware, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// アプリケーションのルーターを構築する
///
/// `routes` にアプリケーション固有のルートを渡すと、監査ログの対象に含まれる。
pub fn create_app_with_routes(state: AppState, routes: Router<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/audit/logs", get(audit_log::list_audit_logs))
        .merge(routes)
        .layer(middleware::from_fn_with_state(
            state.audit_log_writer.clone(),
            audit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 組み込みルートのみのルーターを構築する
pub fn create_app(state: AppState) -> Router {
    create_app_with_routes(state, Router::new())
}
