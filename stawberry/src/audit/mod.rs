//! 監査ログパイプライン
//!
//! 更新系HTTPリクエストを捕捉し、リクエスト処理をブロックせずに
//! ワーカープール → ダブルバッファ → 単一フラッシャー経由でシンクへ書き込む

/// 監査ログの型定義
pub mod types;

/// 機密フィールドのマスク
pub mod sanitize;

/// リクエスト/レスポンスボディの切り詰めとパース
pub mod body;

/// 監査ログミドルウェア（キャプチャステージ）
pub mod middleware;

/// ダブルバッファ
pub mod buffer;

/// 書き込み先シンク
pub mod sink;

/// 非同期パイプライン（インテークキュー・ワーカー・フラッシャー）
pub mod writer;
