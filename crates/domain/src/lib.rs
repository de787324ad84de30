//! 集市信息流核心领域模型
//!
//! 包含身份、商品条目、私信、在线状态等核心实体，以及实时同步所广播的领域事件。

pub mod entities;
pub mod errors;
pub mod events;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use events::*;
pub use value_objects::*;
