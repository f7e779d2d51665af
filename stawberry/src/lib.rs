//! Stawberry: asynchronous HTTP audit logging
//!
//! Mutating requests are captured by an axum middleware, sanitized by a worker
//! pool, staged in a double buffer and written to a pluggable sink in batches.

#![warn(missing_docs)]

/// REST API
pub mod api;

/// 監査ログ（キャプチャ・パイプライン・シンク）
pub mod audit;

/// CLI
pub mod cli;

/// 共通型・ユーティリティ
pub mod common;

/// 環境変数による設定
pub mod config;

/// ログ初期化
pub mod logging;

/// HTTPサーバー起動
pub mod server;

/// 協調シャットダウン
pub mod shutdown;

use audit::sink::AuditLogQuery;
use audit::writer::AuditLogWriter;
use shutdown::ShutdownController;
use std::sync::Arc;

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// 監査ログライター（ミドルウェアから送信）
    pub audit_log_writer: AuditLogWriter,
    /// 監査ログ検索
    pub audit_log_query: Arc<dyn AuditLogQuery>,
    /// シャットダウン制御
    pub shutdown: ShutdownController,
}
