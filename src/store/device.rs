//! 后端存储接口

use super::buffer::TableBuf;
use crate::consts::DEFAULT_ALIGNMENT;
use crate::error::Result;
use crate::types::TableKind;

/// 调试事件
///
/// 缓存在 `get` 和 flush 的关键点上发出这些事件，只用于观察，
/// 不影响缓存语义。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    /// 进入 `get` / `get_empty`
    Get {
        /// 表类型
        kind: TableKind,
        /// 请求的偏移
        offset: u64,
        /// 是否从存储读取
        populate: bool,
    },
    /// 未命中，选中了要替换的槽位
    GetReplaceEntry {
        /// 表类型
        kind: TableKind,
        /// 被替换的槽位
        slot: usize,
    },
    /// 被替换的槽位已写回，准备装入新表
    GetRead {
        /// 表类型
        kind: TableKind,
        /// 槽位
        slot: usize,
    },
    /// `get` 完成
    GetDone {
        /// 表类型
        kind: TableKind,
        /// 槽位
        slot: usize,
    },
    /// 开始刷新整个缓存
    Flush {
        /// 表类型
        kind: TableKind,
    },
    /// 开始写回单个脏槽位
    EntryFlush {
        /// 表类型
        kind: TableKind,
        /// 槽位
        slot: usize,
    },
    /// 即将从存储载入一张表（L2 / 位图）
    TableLoad {
        /// 表类型
        kind: TableKind,
    },
    /// 即将把一张表写回存储
    TableUpdate {
        /// 表类型
        kind: TableKind,
    },
}

/// 后端存储接口
///
/// 实现此 trait 以提供底层存储访问。偏移以字节为单位。
///
/// # 示例
///
/// ```rust,ignore
/// use metacache_core::{BackingStore, Result};
///
/// struct ImageFile {
///     // ...
/// }
///
/// impl BackingStore for ImageFile {
///     fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
///         // pread
///         Ok(())
///     }
///
///     fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
///         // pwrite
///         Ok(())
///     }
///
///     fn sync(&mut self) -> Result<()> {
///         // fdatasync
///         Ok(())
///     }
/// }
/// ```
pub trait BackingStore {
    /// 直通 I/O 要求的缓冲区对齐（字节，必须是 2 的幂）
    fn alignment(&self) -> usize {
        DEFAULT_ALIGNMENT
    }

    /// 分配一个满足对齐要求的缓冲区
    ///
    /// 缓冲区在 drop 时释放。
    fn aligned_alloc(&self, size: usize) -> TableBuf {
        TableBuf::new(size, self.alignment())
    }

    /// 从 `offset` 读取 `buf.len()` 字节
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// 把 `buf` 写到 `offset`
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()>;

    /// 让之前的写入持久化
    fn sync(&mut self) -> Result<()>;

    /// 调试钩子，默认什么都不做
    fn trace(&mut self, _event: TraceEvent) {}
}
