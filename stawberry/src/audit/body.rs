//! ボディの切り詰めとJSONパース

use crate::audit::types::JsonMap;
use std::borrow::Cow;
use tracing::debug;

/// 記録するボディの上限（10 KiB）
pub const MAX_BODY_SIZE: usize = 10 * 1024;

/// 切り詰めたボディの末尾に付与するマーカー
pub const TRUNCATED_MARKER: &[u8] = b"... [TRUNCATED]";

/// 上限を超えるボディを切り詰める
///
/// 上限以下ならコピーせずにそのまま返す。
pub fn cap_body(bytes: &[u8]) -> Cow<'_, [u8]> {
    if bytes.len() <= MAX_BODY_SIZE {
        return Cow::Borrowed(bytes);
    }
    let mut capped = Vec::with_capacity(MAX_BODY_SIZE + TRUNCATED_MARKER.len());
    capped.extend_from_slice(&bytes[..MAX_BODY_SIZE]);
    capped.extend_from_slice(TRUNCATED_MARKER);
    Cow::Owned(capped)
}

/// ボディをJSONオブジェクトとしてパースする
///
/// 空・パース不能・オブジェクト以外は空マップになる。切り詰めたボディは
/// 通常パースに失敗する（記録用メタデータなので許容）。
pub fn parse_body(bytes: &[u8], kind: &'static str) -> JsonMap {
    if bytes.is_empty() {
        return JsonMap::new();
    }
    let capped = cap_body(bytes);
    match serde_json::from_slice::<JsonMap>(&capped) {
        Ok(map) => map,
        Err(e) => {
            debug!(body = kind, error = %e, "Failed to unmarshal body for audit log");
            JsonMap::new()
        }
    }
}
