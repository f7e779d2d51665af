//! APIエラーレスポンス型
//!
//! axum用の共通エラーハンドリング

use crate::common::error::AuditError;
use axum::{response::IntoResponse, Json};
use serde_json::json;
use tracing::error;

/// Axum用のエラーレスポンス型
#[derive(Debug)]
pub struct AppError(pub AuditError);

impl From<AuditError> for AppError {
    fn from(err: AuditError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // 内部詳細（ファイルパス等）はレスポンスに含めず、ログにのみ出す
        let status = self.0.status_code();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }

        let payload = json!({
            "error": self.0.external_message()
        });

        (status, Json(payload)).into_response()
    }
}
