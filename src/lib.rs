//! metacache_core: 块存储上的元数据表写回缓存
//!
//! 为写时复制磁盘镜像格式的元数据表（引用计数块、L2 映射表、位图）
//! 提供固定容量的缓存：
//! - **固定内存上限**：每个缓存的槽位数和表大小在创建时确定
//! - **批量写回**：修改只标记为脏，驱逐或显式 flush 时才写回
//! - **写回顺序依赖**：缓存之间可以声明刷新顺序，保证崩溃后元数据一致
//! - **零 unsafe 代码**
//!
//! # 示例
//!
//! ```rust,ignore
//! use metacache_core::{MemStore, TableCaches, TableKind, Result};
//!
//! fn main() -> Result<()> {
//!     let mut caches = TableCaches::new(MemStore::new());
//!     let refcount = caches.create(4, 65536, TableKind::Refcount)?;
//!     let l2 = caches.create(16, 65536, TableKind::L2)?;
//!
//!     // L2 表项引用的簇必须先在引用计数表中持久化
//!     caches.set_dependency(l2, refcount)?;
//!
//!     let table = caches.get(l2, 0x50000)?;
//!     caches.table_mut(&table)[0] = 0x80;
//!     caches.mark_dirty(l2, &table);
//!     caches.put(l2, table)?;
//!
//!     caches.flush(l2)?;
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`consts`] - 常量定义
//! - [`types`] - 标识类型
//! - [`store`] - 后端存储抽象
//! - [`cache`] - 表缓存
//! - [`entry`] - 表项读写

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// 标识类型
pub mod types;

/// 后端存储抽象
pub mod store;

/// 元数据表缓存
pub mod cache;

/// 表项读写
pub mod entry;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 标识类型
pub use types::{CacheId, StoreId, TableHandle, TableKind};

// 存储
pub use store::{BackingStore, MemStore, StoreOp, TableBuf, TraceEvent};

// 缓存
pub use cache::{CacheStats, SlotInfo, TableCaches};
