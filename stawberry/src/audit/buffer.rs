//! ダブルバッファ
//!
//! 2スロット固定配列とアクティブ側インデックスで構成する。スワップは
//! インデックスの反転のみ（O(1)）で、各スロットのVecは起動時に確保した
//! ものを使い回す。
//!
//! ロック順序は常に「アクティブ状態 → スロット」。フラッシャーは書き込み中に
//! スロットのロックのみを保持し、アクティブ状態のロックは取らない。

use crate::audit::types::AuditEntry;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// アクティブ側の状態
#[derive(Debug, Default)]
struct ActiveState {
    index: usize,
    generation: u64,
}

/// ワーカーとフラッシャーが共有するダブルバッファ
#[derive(Debug)]
pub struct DoubleBuffer {
    state: Mutex<ActiveState>,
    slots: [Mutex<Vec<AuditEntry>>; 2],
}

impl DoubleBuffer {
    /// `capacity_hint` は初期容量のみ（上限ではない）
    pub fn new(capacity_hint: usize) -> Self {
        Self {
            state: Mutex::new(ActiveState::default()),
            slots: [
                Mutex::new(Vec::with_capacity(capacity_hint)),
                Mutex::new(Vec::with_capacity(capacity_hint)),
            ],
        }
    }

    /// バッファ変更を直列化するロックを取得する
    pub async fn lock(&self) -> BufferGuard<'_> {
        BufferGuard {
            state: self.state.lock().await,
            buffer: self,
        }
    }

    /// ロックが空いていれば取得する
    pub fn try_lock(&self) -> Option<BufferGuard<'_>> {
        self.state.try_lock().ok().map(|state| BufferGuard {
            state,
            buffer: self,
        })
    }

    /// スロットを直接ロックする（フラッシャー・シャットダウン用）
    pub async fn lock_slot(&self, index: usize) -> MutexGuard<'_, Vec<AuditEntry>> {
        self.slots[index % 2].lock().await
    }
}

/// アクティブ状態のロックを保持している間だけ有効なハンドル
pub struct BufferGuard<'a> {
    state: MutexGuard<'a, ActiveState>,
    buffer: &'a DoubleBuffer,
}

impl BufferGuard<'_> {
    /// アクティブ側スロットのインデックス
    pub fn active_index(&self) -> usize {
        self.state.index
    }

    /// バックアップ側スロットのインデックス
    pub fn backup_index(&self) -> usize {
        self.state.index ^ 1
    }

    /// これまでのスワップ回数
    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    /// アクティブ側の件数
    pub async fn active_len(&self) -> usize {
        self.buffer.lock_slot(self.active_index()).await.len()
    }

    /// アクティブ側に追記する
    pub async fn push(&mut self, entry: AuditEntry) {
        self.buffer
            .lock_slot(self.active_index())
            .await
            .push(entry);
    }

    /// アクティブとバックアップを入れ替える
    ///
    /// 戻り値は書き出し対象になった（旧アクティブの）スロット。新しいアクティブ側を
    /// フラッシャーが書き込み中の場合は、書き込み完了まで待つ。スロットを空にするのは
    /// 書き出した側（フラッシャー・シャットダウン）のみで、未書き出しのエントリは残す。
    pub async fn swap(&mut self) -> usize {
        let full = self.state.index;
        self.state.index ^= 1;
        self.state.generation += 1;
        let resident = self.buffer.lock_slot(self.state.index).await.len();
        if resident > 0 {
            debug!(resident, "Swapped into a buffer holding unflushed entries");
        }
        full
    }
}
