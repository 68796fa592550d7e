//! 规则引擎错误类型
//!
//! 评估过程本身从不失败；这里只覆盖规则的创作、存储与加载。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("规则未找到: {0}")]
    RuleNotFound(String),

    #[error("规则已存在: {0}")]
    AlreadyExists(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;

impl From<validator::ValidationErrors> for RuleError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl RuleError {
    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::RuleNotFound(_) => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::Database(_) => "STORAGE_FAILURE",
            Self::JsonError(_) => "SERIALIZATION_ERROR",
        }
    }

    /// 规则的读取操作可安全重试；写入失败由调用方决定
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(sqlx::Error::PoolTimedOut) | Self::Database(sqlx::Error::Io(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(RuleError::Validation("x".into()).error_code(), "VALIDATION_ERROR");
        assert_eq!(RuleError::RuleNotFound("r".into()).error_code(), "NOT_FOUND");
        assert_eq!(
            RuleError::Database(sqlx::Error::PoolTimedOut).error_code(),
            "STORAGE_FAILURE"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(RuleError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!RuleError::Validation("bad".into()).is_retryable());
    }
}
