//! 監査ログAPIハンドラー
//!
//! `GET /api/v1/audit/logs` で期間・ユーザーを指定して監査ログを取得する。

use super::error::AppError;
use crate::audit::types::{AuditEntry, AuditLogFilter};
use crate::common::error::{AuditError, AuditResult};
use crate::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 1ページあたり件数のデフォルト
pub const DEFAULT_LIMIT: usize = 100;
/// 1ページあたり件数の上限
pub const MAX_LIMIT: usize = 500;
/// ユーザー指定なしで検索できる最大期間（日）
pub const MAX_RANGE_DAYS: i64 = 365;

/// 監査ログ一覧取得のクエリパラメータ
///
/// 不正値の扱いが項目ごとに異なるため、すべて文字列で受け取る。
#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQueryParams {
    /// 開始日時（RFC 3339、デフォルト: 24時間前）
    pub from: Option<String>,
    /// 終了日時（RFC 3339、デフォルト: 現在）
    pub to: Option<String>,
    /// ユーザーIDでフィルタ
    pub uid: Option<String>,
    /// ページあたり件数（1..=500、範囲外はデフォルト）
    pub limit: Option<String>,
    /// ページ番号（1始まり）
    pub page: Option<String>,
}

fn parse_time(value: Option<&str>, name: &str, default: DateTime<Utc>) -> AuditResult<DateTime<Utc>> {
    match value {
        None | Some("") => Ok(default),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| AuditError::validation(format!("invalid '{}' time: {}", name, raw))),
    }
}

impl AuditLogQueryParams {
    /// パラメータを検証し、検索条件とページ番号に変換する
    pub fn resolve(&self, now: DateTime<Utc>) -> AuditResult<(AuditLogFilter, usize)> {
        let from = parse_time(self.from.as_deref(), "from", now - Duration::hours(24))?;
        let to = parse_time(self.to.as_deref(), "to", now)?;

        let user_id = match self.uid.as_deref() {
            None | Some("") => 0,
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| AuditError::validation(format!("invalid 'uid': {}", raw)))?,
        };

        if from > to {
            return Err(AuditError::validation("'from' must be before 'to'"));
        }
        if user_id == 0 && to - from > Duration::days(MAX_RANGE_DAYS) {
            return Err(AuditError::validation(format!(
                "range must not exceed {} days without 'uid'",
                MAX_RANGE_DAYS
            )));
        }

        let limit = self
            .limit
            .as_deref()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| (1..=MAX_LIMIT).contains(n))
            .unwrap_or(DEFAULT_LIMIT);
        let page = self
            .page
            .as_deref()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n >= 1)
            .unwrap_or(1);

        let filter = AuditLogFilter {
            from,
            to,
            user_id,
            limit,
            offset: (page - 1).saturating_mul(limit),
        };
        Ok((filter, page))
    }
}

/// 監査ログ一覧レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct AuditLogListResponse {
    /// 条件に一致した総件数
    pub total_logs: usize,
    /// 現在のページ番号
    pub current_page: usize,
    /// ページあたり件数
    pub per_page: usize,
    /// 総ページ数
    pub total_pages: usize,
    /// エントリ（新しい順）
    pub data: Vec<AuditEntry>,
}

/// GET /api/v1/audit/logs
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(params): Query<AuditLogQueryParams>,
) -> Result<Json<AuditLogListResponse>, AppError> {
    let (filter, page) = params.resolve(Utc::now())?;
    let (data, total) = state.audit_log_query.query(&filter).await?;

    Ok(Json(AuditLogListResponse {
        total_logs: total,
        current_page: page,
        per_page: filter.limit,
        total_pages: total.div_ceil(filter.limit),
        data,
    }))
}
