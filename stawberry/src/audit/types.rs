//! 監査ログの型定義

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// JSONボディのキー・値マップ（パース不能・未指定は空マップ）
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// 記録時点のユーザーロール
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// 店舗アカウント
    Shop,
    /// 管理者
    Admin,
    /// 一般ユーザー（未認証含む）
    #[default]
    User,
}

impl UserRole {
    /// 認証フラグからロールを決定する
    ///
    /// 店舗フラグを管理者フラグより先に判定する（最初に一致したものを採用）。
    pub fn from_flags(is_store: bool, is_admin: bool) -> Self {
        if is_store {
            Self::Shop
        } else if is_admin {
            Self::Admin
        } else {
            Self::User
        }
    }

    /// UserRoleを文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shop => "shop",
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 認証レイヤーがリクエスト/レスポンスのextensionsに設定する識別情報
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthContext {
    /// ユーザーID
    pub user_id: u64,
    /// 店舗アカウントか
    pub is_store: bool,
    /// 管理者か
    pub is_admin: bool,
}

impl AuthContext {
    /// 記録用のロール
    pub fn role(&self) -> UserRole {
        UserRole::from_flags(self.is_store, self.is_admin)
    }
}

/// 監査ログエントリ（1リクエスト = 1エントリ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// HTTPメソッド
    pub method: String,
    /// リクエストパス
    pub url: String,
    /// 最終レスポンスステータス
    pub resp_status: u16,
    /// ユーザーID（未認証は0）
    pub user_id: u64,
    /// クライアントIP
    #[serde(rename = "user_ip")]
    pub ip: String,
    /// ユーザーロール
    pub user_role: UserRole,
    /// リクエスト受信時刻（完了時刻ではない）
    pub received_at: DateTime<Utc>,
    /// リクエストボディ
    pub req_body: JsonMap,
    /// レスポンスボディ
    pub resp_body: JsonMap,
}

/// 監査ログ検索条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogFilter {
    /// 開始日時（含む）
    pub from: DateTime<Utc>,
    /// 終了日時（含む）
    pub to: DateTime<Utc>,
    /// ユーザーID（0は全ユーザー）
    pub user_id: u64,
    /// 取得件数
    pub limit: usize,
    /// オフセット
    pub offset: usize,
}

impl AuditLogFilter {
    /// エントリが期間・ユーザー条件に一致するか
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        entry.received_at >= self.from
            && entry.received_at <= self.to
            && (self.user_id == 0 || entry.user_id == self.user_id)
    }
}
