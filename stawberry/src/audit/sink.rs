//! 監査ログの書き込み先
//!
//! パイプラインが依存するのは [`AuditSink::append_batch`] のみ。同じバッチで
//! 再試行されることがあり、部分成功後の重複書き込みは許容する。

use crate::audit::types::{AuditEntry, AuditLogFilter};
use crate::common::error::{AuditError, AuditResult, CommonError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// バッチ書き込み先
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// エントリを順序通りに追記する
    async fn append_batch(&self, entries: &[AuditEntry]) -> AuditResult<()>;
}

/// 監査ログの検索
#[async_trait]
pub trait AuditLogQuery: Send + Sync {
    /// 条件に一致するエントリ（受信時刻の降順、ページ適用後）と総件数を返す
    async fn query(&self, filter: &AuditLogFilter) -> AuditResult<(Vec<AuditEntry>, usize)>;
}

/// メモリ上のシンク
///
/// `append_batch` の呼び出し単位でバッチを保持する。開発サーバーとテスト用。
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    batches: Mutex<Vec<Vec<AuditEntry>>>,
    attempts: AtomicUsize,
    failures_remaining: AtomicUsize,
}

impl MemoryAuditSink {
    /// 空のシンクを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 次の `count` 回の書き込みを失敗させる
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// `append_batch` が呼ばれた回数（失敗含む）
    pub fn append_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// 書き込みに成功したバッチ
    pub fn batches(&self) -> Vec<Vec<AuditEntry>> {
        self.lock_batches().clone()
    }

    /// 書き込みに成功した全エントリ（書き込み順）
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock_batches().iter().flatten().cloned().collect()
    }

    fn lock_batches(&self) -> std::sync::MutexGuard<'_, Vec<Vec<AuditEntry>>> {
        self.batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append_batch(&self, entries: &[AuditEntry]) -> AuditResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AuditError::Sink("injected failure".to_string()));
        }
        self.lock_batches().push(entries.to_vec());
        Ok(())
    }
}

#[async_trait]
impl AuditLogQuery for MemoryAuditSink {
    async fn query(&self, filter: &AuditLogFilter) -> AuditResult<(Vec<AuditEntry>, usize)> {
        let matched = self
            .lock_batches()
            .iter()
            .flatten()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        Ok(paginate(matched, filter))
    }
}

/// 受信時刻の降順に並べてページを切り出す
fn paginate(mut matched: Vec<AuditEntry>, filter: &AuditLogFilter) -> (Vec<AuditEntry>, usize) {
    matched.sort_by(|a, b| b.received_at.cmp(&a.received_at));
    let total = matched.len();
    let page = matched
        .into_iter()
        .skip(filter.offset)
        .take(filter.limit)
        .collect();
    (page, total)
}

/// JSON Lines形式でファイルに追記するシンク
#[derive(Debug, Clone)]
pub struct JsonLinesAuditSink {
    path: PathBuf,
}

impl JsonLinesAuditSink {
    /// 書き込み先パスを指定して作成（ファイルは初回書き込み時に作成）
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AuditSink for JsonLinesAuditSink {
    async fn append_batch(&self, entries: &[AuditEntry]) -> AuditResult<()> {
        let mut lines = Vec::with_capacity(entries.len() * 256);
        for entry in entries {
            serde_json::to_writer(&mut lines, entry).map_err(CommonError::from)?;
            lines.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&lines).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl AuditLogQuery for JsonLinesAuditSink {
    async fn query(&self, filter: &AuditLogFilter) -> AuditResult<(Vec<AuditEntry>, usize)> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut matched = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(line) {
                Ok(entry) if filter.matches(&entry) => matched.push(entry),
                Ok(_) => {}
                Err(e) => {
                    // 書き込み途中で停止した行などは読み飛ばす
                    debug!(line = line_no + 1, error = %e, "Skipping malformed audit log line");
                }
            }
        }
        Ok(paginate(matched, filter))
    }
}
