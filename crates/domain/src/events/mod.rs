//! 领域事件定义
//!
//! 实时同步引擎向所有连接推送的事件。

pub mod market_event;

// 重新导出事件类型
pub use market_event::*;
