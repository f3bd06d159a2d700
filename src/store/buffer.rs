//! 对齐的表缓冲区

use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};

/// 对齐的表缓冲区
///
/// 对应块层的 `qemu_blockalign` / `qemu_vfree`。
///
/// 通过多分配 `align - 1` 字节再取对齐的起点来满足对齐要求，
/// 不需要 unsafe。底层 `Vec` 创建后不再改变长度，所以起点地址
/// 在缓冲区整个生命周期内保持不变。
pub struct TableBuf {
    raw: Vec<u8>,
    start: usize,
    len: usize,
}

impl TableBuf {
    /// 分配 `len` 字节、按 `align` 对齐的全零缓冲区
    ///
    /// # Panics
    ///
    /// `align` 不是 2 的幂时 panic。
    pub fn new(len: usize, align: usize) -> Self {
        assert!(align.is_power_of_two(), "alignment must be a power of two");

        let raw = alloc::vec![0u8; len + align - 1];
        let addr = raw.as_ptr() as usize;
        let start = (align - addr % align) % align;

        Self { raw, start, len }
    }

    /// 缓冲区长度
    pub fn len(&self) -> usize {
        self.len
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Deref for TableBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.raw[self.start..self.start + self.len]
    }
}

impl DerefMut for TableBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.raw[self.start..self.start + self.len]
    }
}

impl core::fmt::Debug for TableBuf {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TableBuf")
            .field("len", &self.len)
            .field("addr", &self.as_ptr())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment() {
        for align in [1usize, 8, 512, 4096] {
            let buf = TableBuf::new(4096, align);
            assert_eq!(buf.len(), 4096);
            assert_eq!(buf.as_ptr() as usize % align, 0);
        }
    }

    #[test]
    fn test_zeroed_and_writable() {
        let mut buf = TableBuf::new(64, 512);
        assert!(buf.iter().all(|&b| b == 0));

        buf[0] = 0xAB;
        buf[63] = 0xCD;
        assert_eq!(buf[0], 0xAB);
        assert_eq!(buf[63], 0xCD);
    }

    #[test]
    #[should_panic]
    fn test_bad_alignment() {
        let _ = TableBuf::new(64, 3);
    }
}
