//! 機密フィールドのマスク
//!
//! キーの存在のみで判定する（スキーマは見ない）。

use crate::audit::types::{AuditEntry, JsonMap};
use serde_json::Value;

/// マスク後の値
pub const REDACTED: &str = "[REDACTED]";

/// マスク対象のトップレベルキー
pub const SENSITIVE_FIELDS: [&str; 4] = ["password", "fingerprint", "refresh_token", "access_token"];

/// マップ内の機密フィールドを置き換える
pub fn redact(data: &mut JsonMap) {
    for field in SENSITIVE_FIELDS {
        if let Some(value) = data.get_mut(field) {
            *value = Value::String(REDACTED.to_string());
        }
    }
}

/// エントリのリクエスト/レスポンス両ボディをマスクする
pub fn redact_entry(entry: &mut AuditEntry) {
    redact(&mut entry.req_body);
    redact(&mut entry.resp_body);
}
