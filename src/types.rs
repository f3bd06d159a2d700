//! 缓存相关的标识类型

use core::fmt;

/// 缓存中表的类型
///
/// 只影响调试事件，不影响表的布局。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// 引用计数块
    Refcount,
    /// L2 映射表
    L2,
    /// 写时复制位图
    Bitmap,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableKind::Refcount => "refcount",
            TableKind::L2 => "l2",
            TableKind::Bitmap => "bitmap",
        };
        f.write_str(name)
    }
}

/// 缓存 ID
///
/// 由 [`TableCaches`](crate::cache::TableCaches) 分配，销毁后不会复用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheId(pub(crate) usize);

impl CacheId {
    /// 内部索引
    pub fn index(self) -> usize {
        self.0
    }
}

/// 后端存储 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreId(pub(crate) usize);

impl StoreId {
    /// 内部索引
    pub fn index(self) -> usize {
        self.0
    }
}

/// 已借出的表句柄
///
/// 由 `get` / `get_empty` 返回，用 `put` 归还。句柄本身只是
/// (缓存, 槽位) 坐标；归还之后继续用它访问表数据会 panic。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHandle {
    pub(crate) cache: CacheId,
    pub(crate) slot: usize,
}

impl TableHandle {
    /// 句柄所属的缓存
    pub fn cache(&self) -> CacheId {
        self.cache
    }

    /// 句柄指向的槽位下标
    pub fn slot(&self) -> usize {
        self.slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_table_kind_display() {
        assert_eq!(TableKind::Refcount.to_string(), "refcount");
        assert_eq!(TableKind::L2.to_string(), "l2");
        assert_eq!(TableKind::Bitmap.to_string(), "bitmap");
    }
}
