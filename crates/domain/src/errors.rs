//! 领域模型错误定义
//!
//! 所有校验错误都在任何状态变更之前检出，调用方拿到错误时存储保持原样。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 身份字符串不符合 `name@<10位数字>` 格式
    #[error("invalid identity: {value:?}")]
    InvalidIdentity { value: String },

    /// 必填字段缺失或为空
    #[error("missing field: {field}")]
    MissingField { field: &'static str },

    /// 私信内容为空
    #[error("message content cannot be empty")]
    EmptyMessage,

    /// 评分不在 1..=5 范围内
    #[error("invalid rating {value}: must be between 1 and 5")]
    InvalidRating { value: i64 },

    /// 资源不存在
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// 请求者不是资源拥有者
    #[error("unauthorized: {action}")]
    Unauthorized { action: String },

    /// 媒体被外部存储拒绝（类型不支持或体积过大）
    #[error("media rejected: {reason}")]
    MediaRejected { reason: String },

    /// 参数不合法
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    /// 连接已关闭或不存在
    #[error("session closed")]
    SessionClosed,
}

impl DomainError {
    pub fn invalid_identity(value: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            value: value.into(),
        }
    }

    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn unauthorized(action: impl Into<String>) -> Self {
        Self::Unauthorized {
            action: action.into(),
        }
    }

    pub fn media_rejected(reason: impl Into<String>) -> Self {
        Self::MediaRejected {
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
