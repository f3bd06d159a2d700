//! 元数据表缓存模块
//!
//! 为镜像格式的元数据表（引用计数块、L2 映射表、位图）提供固定容量的
//! 写回缓存。
//!
//! # 主要组件
//!
//! - [`TableCaches`] - 一个镜像的所有表缓存及其后端存储
//! - [`CacheStats`] - 缓存统计信息
//! - [`SlotInfo`] - 槽位快照
//!
//! # 设计原理
//!
//! 1. **固定槽位数组**：每个缓存在创建时分配 `capacity` 个表缓冲区，之后
//!    不再分配。查找和驱逐都是线性扫描，容量就是内存上限。
//! 2. **引用计数 pin**：`get` 增加槽位的 pin 计数，`put` 减少。被 pin 的
//!    槽位不会被驱逐。同时借出的表超过容量是调用者的错误，会 panic。
//! 3. **老化命中计数驱逐**：每次扫描把未 pin 槽位的分数减半，取最小者。
//! 4. **写回顺序依赖**：一个缓存可以声明“写回之前先刷新另一个缓存”或
//!    “写回之前先同步设备”，保证崩溃后磁盘上的元数据仍然一致。
//!
//! # 内存分配要求
//!
//! 本模块依赖 `alloc` crate，需要用户提供全局分配器。

mod caches;
mod slot;
mod table_cache;

pub use caches::TableCaches;
pub use slot::SlotInfo;
pub use table_cache::CacheStats;
