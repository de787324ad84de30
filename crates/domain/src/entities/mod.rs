//! 领域实体定义
//!
//! 包含系统的核心实体：商品条目、私信、在线状态。

pub mod listing;
pub mod message;
pub mod presence;

// 重新导出核心实体
pub use listing::{Listing, MediaRef, RatingAggregate};
pub use message::{ConversationKey, Message};
pub use presence::PresenceState;
