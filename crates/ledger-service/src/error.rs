//! 账本服务错误类型

use thiserror::Error;

use crate::models::RewardStatus;

#[derive(Debug, Error)]
pub enum LedgerError {
    // === 请求错误 ===
    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("流水不存在: {0}")]
    EntryNotFound(String),

    // === 状态机错误 ===
    #[error("非法状态转换: entry_id={entry_id}, {from} -> {to}")]
    InvalidTransition {
        entry_id: String,
        from: RewardStatus,
        to: RewardStatus,
    },

    #[error("流水已冲正: {0}")]
    AlreadyReversed(String),

    /// 仓储层检测到幂等键冲突，服务层会回读已有流水
    #[error("幂等键已存在: {0}")]
    DuplicateReference(String),

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("存储错误: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::EntryNotFound(_) => "NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::AlreadyReversed(_) => "ALREADY_REVERSED",
            Self::DuplicateReference(_) => "DUPLICATE_REFERENCE",
            Self::Database(_) | Self::Storage(_) => "STORAGE_FAILURE",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// 连接层面的瞬时故障，调用方可重试读操作
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(sqlx::Error::PoolTimedOut) | Self::Database(sqlx::Error::Io(_))
        )
    }

    /// 对应的 HTTP 状态码
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::EntryNotFound(_) => 404,
            Self::InvalidTransition { .. } | Self::AlreadyReversed(_) => 409,
            Self::DuplicateReference(_) => 409,
            _ => 500,
        }
    }
}

impl From<validator::ValidationErrors> for LedgerError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 判断数据库错误是否为唯一约束冲突
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(LedgerError::Validation("x".into()).error_code(), "VALIDATION_ERROR");
        assert_eq!(LedgerError::EntryNotFound("e".into()).error_code(), "NOT_FOUND");
        assert_eq!(
            LedgerError::InvalidTransition {
                entry_id: "e".into(),
                from: RewardStatus::Paid,
                to: RewardStatus::Confirmed,
            }
            .error_code(),
            "INVALID_TRANSITION"
        );
        assert_eq!(
            LedgerError::Storage("disk".into()).error_code(),
            "STORAGE_FAILURE"
        );
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = LedgerError::InvalidTransition {
            entry_id: "entry-1".into(),
            from: RewardStatus::Pending,
            to: RewardStatus::Paid,
        };
        assert_eq!(err.to_string(), "非法状态转换: entry_id=entry-1, pending -> paid");
    }

    #[test]
    fn test_classification() {
        assert!(!LedgerError::AlreadyReversed("e".into()).is_retryable());
        assert!(LedgerError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!LedgerError::Storage("x".into()).is_retryable());
        assert_eq!(LedgerError::Validation("x".into()).http_status(), 400);
        assert_eq!(LedgerError::EntryNotFound("x".into()).http_status(), 404);
    }

    #[test]
    fn test_unique_violation_detection() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
