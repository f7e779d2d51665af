//! serve サブコマンド
//!
//! HTTPサーバーを起動します。

use crate::audit::sink::{AuditLogQuery, AuditSink, JsonLinesAuditSink, MemoryAuditSink};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

/// 監査ログの書き込み先
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// プロセス内メモリ（再起動で消える）
    Memory,
    /// JSON Linesファイル
    Jsonl,
}

/// serve サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Listen port
    #[arg(short, long, default_value = "8080", env = "STAWBERRY_PORT")]
    pub port: u16,

    /// Bind address
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "STAWBERRY_HOST")]
    pub host: String,

    /// Audit log sink
    #[arg(long, value_enum, default_value = "memory", env = "STAWBERRY_AUDIT_SINK")]
    pub sink: SinkKind,

    /// Output file of the jsonl sink
    #[arg(long, default_value = "audit.jsonl", env = "STAWBERRY_AUDIT_SINK_PATH")]
    pub sink_path: PathBuf,
}

impl ServeArgs {
    /// 書き込み先と検索先（同一インスタンス）を作成する
    pub fn build_sink(&self) -> (Arc<dyn AuditSink>, Arc<dyn AuditLogQuery>) {
        match self.sink {
            SinkKind::Memory => {
                let sink = Arc::new(MemoryAuditSink::new());
                (sink.clone(), sink)
            }
            SinkKind::Jsonl => {
                let sink = Arc::new(JsonLinesAuditSink::new(&self.sink_path));
                (sink.clone(), sink)
            }
        }
    }
}
