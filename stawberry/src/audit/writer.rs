//! 監査ログの非同期パイプライン
//!
//! キャプチャ → インテークキュー（有界mpsc）→ サニタイズワーカー（N個）→
//! ダブルバッファ → フラッシャー（単一）→ シンク。
//!
//! - キャプチャは `try_send` のみでブロックしない。キュー満杯なら破棄して警告。
//! - バッファがしきい値を超えたら、観測したワーカーがスワップしてフラッシャーへ
//!   受け渡す。受け渡しはフラッシャーが受信するまで完了しない（ランデブー）ため、
//!   シンクが遅いとワーカー全体が止まり、最終的にキャプチャ側の破棄に至る。
//! - シンクへの書き込みはフラッシャーのみが行い、バッチ順序を保つ。

use crate::audit::buffer::DoubleBuffer;
use crate::audit::sanitize::redact_entry;
use crate::audit::sink::AuditSink;
use crate::audit::types::AuditEntry;
use crate::common::error::AuditResult;
use crate::config::AuditConfig;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// ワーカーからフラッシャーへの受け渡し
struct Handoff {
    /// 書き出し対象スロット
    slot: usize,
    /// スワップ世代（ログ用）
    generation: u64,
    /// フラッシャーが受信したことの通知
    received: oneshot::Sender<()>,
}

/// シンク書き込みの再試行ポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 初回再試行までの待機時間（以降倍々）
    pub base_delay: Duration,
    /// 初回失敗後の再試行回数
    pub max_retries: u32,
}

impl From<&AuditConfig> for RetryPolicy {
    fn from(config: &AuditConfig) -> Self {
        Self {
            base_delay: config.retry_base_delay,
            max_retries: config.max_retries,
        }
    }
}

/// バッチをシンクへ書き込む。失敗時は待機時間を倍にしながら再試行する。
///
/// 再試行を使い切ったバッチは破棄する（`false` を返す）。
pub async fn store_with_retry(
    sink: &dyn AuditSink,
    entries: &[AuditEntry],
    policy: RetryPolicy,
) -> bool {
    let mut delay = policy.base_delay;
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match sink.append_batch(entries).await {
            Ok(()) => {
                debug!(
                    entries = entries.len(),
                    attempt, "Flushed audit log entries to sink"
                );
                return true;
            }
            Err(e) if attempt <= policy.max_retries => {
                error!(
                    attempt,
                    entries = entries.len(),
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Failed to store audit log entries, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(e) => {
                error!(
                    attempt,
                    entries = entries.len(),
                    error = %e,
                    "Failed to store audit log entries, giving up"
                );
                return false;
            }
        }
    }
}

struct PipelineTasks {
    workers: Vec<JoinHandle<()>>,
    flusher: JoinHandle<()>,
    stop_flusher: oneshot::Sender<()>,
}

struct WriterInner {
    intake: RwLock<Option<mpsc::Sender<AuditEntry>>>,
    buffers: Arc<DoubleBuffer>,
    sink: Arc<dyn AuditSink>,
    retry: RetryPolicy,
    tasks: Mutex<Option<PipelineTasks>>,
}

/// 監査ログの非同期ライター
///
/// プロセス起動時に一度だけ作成し、ミドルウェアへはClone（Arc共有）で渡す。
/// 終了時は [`AuditLogWriter::shutdown`] で残りを書き出す。
#[derive(Clone)]
pub struct AuditLogWriter {
    inner: Arc<WriterInner>,
}

impl AuditLogWriter {
    /// パイプラインを構築し、ワーカーとフラッシャーを起動する
    ///
    /// Tokioランタイム内で呼び出す必要がある。
    pub fn new(config: AuditConfig, sink: Arc<dyn AuditSink>) -> AuditResult<Self> {
        config.validate()?;

        let (intake_tx, intake_rx) = mpsc::channel(config.queue_size);
        let intake_rx = Arc::new(Mutex::new(intake_rx));
        // 容量1 + 受信通知で、受信されるまで送信側を待たせる
        let (handoff_tx, handoff_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = oneshot::channel();

        let buffers = Arc::new(DoubleBuffer::new(config.batch_size));
        let retry = RetryPolicy::from(&config);
        let threshold = config.eager_flush_threshold();

        let workers = (0..config.worker_pool_size)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    intake_rx.clone(),
                    buffers.clone(),
                    handoff_tx.clone(),
                    threshold,
                ))
            })
            .collect();
        drop(handoff_tx);

        let flusher = tokio::spawn(run_flusher(
            handoff_rx,
            stop_rx,
            buffers.clone(),
            sink.clone(),
            retry,
            config.flush_interval,
        ));

        info!(
            queue_size = config.queue_size,
            workers = config.worker_pool_size,
            batch_size = config.batch_size,
            flush_interval_secs = config.flush_interval.as_secs(),
            "Audit log pipeline started"
        );

        Ok(Self {
            inner: Arc::new(WriterInner {
                intake: RwLock::new(Some(intake_tx)),
                buffers,
                sink,
                retry,
                tasks: Mutex::new(Some(PipelineTasks {
                    workers,
                    flusher,
                    stop_flusher: stop_tx,
                })),
            }),
        })
    }

    /// エントリをインテークキューへ送る（ブロックしない）
    ///
    /// キュー満杯・停止済みの場合は破棄して `false` を返す。
    pub fn send(&self, entry: AuditEntry) -> bool {
        let intake = self
            .inner
            .intake
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(sender) = intake.as_ref() else {
            warn!(
                path = %entry.url,
                status = entry.resp_status,
                "Audit log pipeline is shut down, dropping audit log entry"
            );
            return false;
        };

        match sender.try_send(entry) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(entry)) => {
                warn!(
                    path = %entry.url,
                    status = entry.resp_status,
                    "Audit log channel full, dropping audit log entry"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(entry)) => {
                warn!(
                    path = %entry.url,
                    status = entry.resp_status,
                    "Audit log channel closed, dropping audit log entry"
                );
                false
            }
        }
    }

    /// パイプラインを停止する
    ///
    /// 1. インテークを閉じる（以降の `send` は破棄）
    /// 2. キューを処理し終えたワーカーの終了を待つ
    /// 3. フラッシャーを停止する
    /// 4. 残ったバッファ（バックアップ → アクティブの順）を直接書き出す
    ///
    /// タイムアウトはなく、最後まで実行する。書き込み失敗はログのみ。
    /// 2回目以降の呼び出しは何もしない。
    pub async fn shutdown(&self) {
        let started = Instant::now();

        let intake = self
            .inner
            .intake
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(intake);

        let Some(tasks) = self.inner.tasks.lock().await.take() else {
            debug!("Audit log pipeline already shut down");
            return;
        };

        for worker in tasks.workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Audit log worker terminated abnormally");
            }
        }

        let _ = tasks.stop_flusher.send(());
        if let Err(e) = tasks.flusher.await {
            error!(error = %e, "Audit log flusher terminated abnormally");
        }

        let guard = self.inner.buffers.lock().await;
        let mut drained = 0;
        for index in [guard.backup_index(), guard.active_index()] {
            let mut slot = self.inner.buffers.lock_slot(index).await;
            if slot.is_empty() {
                continue;
            }
            drained += slot.len();
            store_with_retry(self.inner.sink.as_ref(), &slot, self.inner.retry).await;
            slot.clear();
        }
        drop(guard);

        info!(
            drained,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Audit log pipeline shut down"
        );
    }
}

/// サニタイズワーカー
///
/// キューが閉じられ空になったら終了する。
async fn run_worker(
    id: usize,
    intake: Arc<Mutex<mpsc::Receiver<AuditEntry>>>,
    buffers: Arc<DoubleBuffer>,
    handoff: mpsc::Sender<Handoff>,
    threshold: usize,
) {
    loop {
        let next = intake.lock().await.recv().await;
        let Some(mut entry) = next else {
            break;
        };

        // ロック取得前にマスクし、保持時間を短くする
        redact_entry(&mut entry);

        let mut guard = buffers.lock().await;
        let len = guard.active_len().await;
        if len > threshold {
            warn!(size = len, worker = id, "Audit log buffer full");
            let slot = guard.swap().await;
            let (received_tx, received_rx) = oneshot::channel();
            let sent = handoff
                .send(Handoff {
                    slot,
                    generation: guard.generation(),
                    received: received_tx,
                })
                .await
                .is_ok();
            if !sent || received_rx.await.is_err() {
                // 書き出されなかったバッチはバックアップに残り、シャットダウン時に書き出す
                error!(slot, worker = id, "Audit log flusher is not running");
            }
        }
        guard.push(entry).await;
    }
    debug!(worker = id, "Audit log worker stopped");
}

/// 単一フラッシャー
///
/// 受け渡されたバッチ、定期タイマー、停止シグナルを待つ。
async fn run_flusher(
    mut handoff: mpsc::Receiver<Handoff>,
    mut stop: oneshot::Receiver<()>,
    buffers: Arc<DoubleBuffer>,
    sink: Arc<dyn AuditSink>,
    retry: RetryPolicy,
    flush_interval: Duration,
) {
    let mut interval = tokio::time::interval(flush_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // 最初のtickはすぐに発火するのでスキップ
    interval.tick().await;

    loop {
        tokio::select! {
            Some(batch) = handoff.recv() => {
                // 受信通知より先にスロットを確保し、次のスワップが書き出し完了を待つようにする
                let slot = buffers.lock_slot(batch.slot).await;
                let _ = batch.received.send(());
                debug!(slot = batch.slot, generation = batch.generation, "Eager audit log flush");
                write_slot(slot, sink.as_ref(), retry).await;
            }
            _ = interval.tick() => {
                // 受け渡し待ちのワーカーがロックを保持している場合はこのtickを見送る
                let Some(mut guard) = buffers.try_lock() else {
                    debug!("Audit log buffer busy, skipping periodic flush");
                    continue;
                };
                if guard.active_len().await == 0 {
                    continue;
                }
                let slot = guard.swap().await;
                drop(guard);
                flush_slot(&buffers, slot, sink.as_ref(), retry).await;
            }
            _ = &mut stop => {
                break;
            }
        }
    }
    debug!("Audit log flusher stopped");
}

/// スロットの内容を書き出して空にする（確保済み領域は保持）
async fn flush_slot(buffers: &DoubleBuffer, slot: usize, sink: &dyn AuditSink, retry: RetryPolicy) {
    write_slot(buffers.lock_slot(slot).await, sink, retry).await;
}

async fn write_slot(
    mut batch: MutexGuard<'_, Vec<AuditEntry>>,
    sink: &dyn AuditSink,
    retry: RetryPolicy,
) {
    if batch.is_empty() {
        return;
    }
    store_with_retry(sink, &batch, retry).await;
    batch.clear();
}
