//! エラー型定義
//!
//! 統一エラー型（thiserror使用）

use axum::http::StatusCode;
use thiserror::Error;

/// Common layer error type
#[derive(Debug, Error)]
pub enum CommonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// 監査ログサブシステムのエラー型
#[derive(Debug, Error)]
pub enum AuditError {
    /// Common layer error
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Sink write error
    #[error("Sink error: {0}")]
    Sink(String),

    /// I/O error (file sinks)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuditError {
    /// Returns a safe error message for external clients.
    ///
    /// Full details (file paths, storage errors) stay in server logs via `Display`.
    pub fn external_message(&self) -> &'static str {
        match self {
            Self::Common(CommonError::Validation(_)) => "Invalid request parameters",
            Self::Common(_) => "Request error",
            Self::Sink(_) => "Audit storage error",
            Self::Io(_) => "Audit storage error",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Common(CommonError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Common(CommonError::Serialization(_)) => StatusCode::BAD_REQUEST,
            Self::Common(CommonError::Config(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Sink(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Common(CommonError::Validation(message.into()))
    }
}

/// 監査ログサブシステムのResult型
pub type AuditResult<T> = Result<T, AuditError>;
