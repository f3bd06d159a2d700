//! 后端存储抽象
//!
//! 缓存本身不做任何 I/O，所有读、写、同步都交给实现了 [`BackingStore`]
//! 的协作者。
//!
//! - store/device.rs 定义存储接口和调试事件
//! - store/buffer.rs 提供满足对齐要求的表缓冲区
//! - store/mem.rs 提供内存存储，带操作日志和故障注入

mod buffer;
mod device;
mod mem;

pub use buffer::TableBuf;
pub use device::{BackingStore, TraceEvent};
pub use mem::{MemStore, StoreOp};
