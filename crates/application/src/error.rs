use domain::DomainError;
use thiserror::Error;

use crate::media::MediaError;

/// 用例层错误。广播失败只记录日志，不会传给调用方。
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("media error: {0}")]
    Media(#[from] MediaError),
}
