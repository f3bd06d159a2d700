//! 表项读写
//!
//! 元数据表由定宽的大端表项组成：引用计数块是 `u16`，L2 映射表是 `u64`。
//! 缓存本身把表当作不透明的字节，这里的辅助函数供上层格式逻辑使用。

use crate::error::{Error, ErrorKind, Result};
use byteorder::{BigEndian, ByteOrder};

/// 一张 `table_size` 字节的表能容纳多少个 `width` 字节的表项
pub fn entry_count(table_size: usize, width: usize) -> usize {
    table_size / width
}

fn range(table: &[u8], index: usize, width: usize) -> Result<core::ops::Range<usize>> {
    let overflow = Error::new(ErrorKind::InvalidInput, "table entry index overflow");
    let start = index.checked_mul(width).ok_or(overflow.clone())?;
    let end = start.checked_add(width).ok_or(overflow)?;
    if end > table.len() {
        return Err(Error::new(ErrorKind::InvalidInput, "table entry index out of range"));
    }
    Ok(start..end)
}

/// 读取第 `index` 个 `u16` 表项
pub fn read_u16(table: &[u8], index: usize) -> Result<u16> {
    let range = range(table, index, 2)?;
    Ok(BigEndian::read_u16(&table[range]))
}

/// 写入第 `index` 个 `u16` 表项
pub fn write_u16(table: &mut [u8], index: usize, value: u16) -> Result<()> {
    let range = range(table, index, 2)?;
    BigEndian::write_u16(&mut table[range], value);
    Ok(())
}

/// 读取第 `index` 个 `u64` 表项
pub fn read_u64(table: &[u8], index: usize) -> Result<u64> {
    let range = range(table, index, 8)?;
    Ok(BigEndian::read_u64(&table[range]))
}

/// 写入第 `index` 个 `u64` 表项
pub fn write_u64(table: &mut [u8], index: usize, value: u64) -> Result<()> {
    let range = range(table, index, 8)?;
    BigEndian::write_u64(&mut table[range], value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_count() {
        assert_eq!(entry_count(65536, 8), 8192);
        assert_eq!(entry_count(512, 2), 256);
    }

    #[test]
    fn test_u64_big_endian() {
        let mut table = [0u8; 32];
        write_u64(&mut table, 1, 0x8000_0000_0005_0000).unwrap();
        assert_eq!(&table[8..16], &[0x80, 0, 0, 0, 0, 0x05, 0, 0]);
        assert_eq!(read_u64(&table, 1).unwrap(), 0x8000_0000_0005_0000);
        assert_eq!(read_u64(&table, 0).unwrap(), 0);
    }

    #[test]
    fn test_u16_big_endian() {
        let mut table = [0u8; 8];
        write_u16(&mut table, 3, 0x0102).unwrap();
        assert_eq!(&table[6..8], &[0x01, 0x02]);
        assert_eq!(read_u16(&table, 3).unwrap(), 0x0102);
    }

    #[test]
    fn test_out_of_range() {
        let mut table = [0u8; 16];
        assert_eq!(read_u64(&table, 2).unwrap_err().kind(), ErrorKind::InvalidInput);
        assert_eq!(write_u16(&mut table, 8, 1).unwrap_err().kind(), ErrorKind::InvalidInput);
        assert_eq!(read_u16(&table, usize::MAX).unwrap_err().kind(), ErrorKind::InvalidInput);
    }
}
