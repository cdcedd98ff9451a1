//! 事件模块
//!
//! - `types.rs`: 上传事件类型与优先级
//! - `bus.rs`: 广播式事件总线（展示层订阅入口）
//! - `throttle.rs`: 进度事件节流工具

mod bus;
mod throttle;
mod types;

pub use bus::*;
pub use throttle::*;
pub use types::*;
