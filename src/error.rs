//! 错误类型定义
//!
//! 提供元数据表缓存操作的错误类型。
//!
//! 只有环境性故障（I/O、无空间）和可恢复的参数错误通过 [`Error`] 返回；
//! 调用者违反借用协议（pin 计数下溢、对不属于本缓存的表调用 `mark_dirty`、
//! 销毁仍被 pin 的缓存、无可驱逐槽位）直接 panic。

use core::fmt;

/// 缓存操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误
    Io,
    /// 无效参数
    InvalidInput,
    /// 空间不足（I/O 错误的子类，flush 汇总错误时优先级最低）
    NoSpace,
    /// 对象不存在
    NotFound,
    /// 对象仍被引用
    Busy,
    /// 无效状态
    InvalidState,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// 是否为空间不足错误
    pub fn is_no_space(&self) -> bool {
        self.kind == ErrorKind::NoSpace
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_display() {
        let err = Error::new(ErrorKind::Io, "write failed");
        assert_eq!(format!("{}", err), "Io: write failed");
    }

    #[test]
    fn test_no_space() {
        assert!(Error::new(ErrorKind::NoSpace, "full").is_no_space());
        assert!(!Error::new(ErrorKind::Io, "eio").is_no_space());
    }
}
