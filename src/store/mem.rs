//! 内存后端存储
//!
//! 把整个“设备”放在一个 `Vec<u8>` 里，并按顺序记录每一次读、写、同步，
//! 用来观察缓存的写回顺序。也支持按偏移注入读写故障和同步故障。

use super::device::{BackingStore, TraceEvent};
use crate::consts::DEFAULT_ALIGNMENT;
use crate::error::{Error, ErrorKind, Result};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

/// 存储操作记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// 读取
    Read {
        /// 偏移
        offset: u64,
        /// 长度
        len: usize,
    },
    /// 写入
    Write {
        /// 偏移
        offset: u64,
        /// 长度
        len: usize,
    },
    /// 同步
    Sync,
}

/// 内存存储
#[derive(Debug)]
pub struct MemStore {
    data: Vec<u8>,
    alignment: usize,
    ops: Vec<StoreOp>,
    events: Vec<TraceEvent>,
    read_faults: BTreeMap<u64, ErrorKind>,
    write_faults: BTreeMap<u64, ErrorKind>,
    sync_fault: Option<ErrorKind>,
}

impl MemStore {
    /// 创建空的内存存储
    pub fn new() -> Self {
        Self::with_alignment(DEFAULT_ALIGNMENT)
    }

    /// 创建指定缓冲区对齐的内存存储
    pub fn with_alignment(alignment: usize) -> Self {
        Self {
            data: Vec::new(),
            alignment,
            ops: Vec::new(),
            events: Vec::new(),
            read_faults: BTreeMap::new(),
            write_faults: BTreeMap::new(),
            sync_fault: None,
        }
    }

    /// 直接查看存储内容（不记录操作）
    ///
    /// 超出已写入范围的部分视为全零。
    pub fn peek(&self, offset: u64, len: usize) -> Vec<u8> {
        let mut out = alloc::vec![0u8; len];
        let start = offset as usize;
        if start < self.data.len() {
            let end = (start + len).min(self.data.len());
            out[..end - start].copy_from_slice(&self.data[start..end]);
        }
        out
    }

    /// 直接写入存储内容（不记录操作），用于准备测试数据
    pub fn poke(&mut self, offset: u64, buf: &[u8]) {
        self.store(offset, buf);
    }

    /// 按顺序记录的所有操作
    pub fn ops(&self) -> &[StoreOp] {
        &self.ops
    }

    /// 所有写入操作的偏移，按发生顺序
    pub fn writes(&self) -> Vec<u64> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                StoreOp::Write { offset, .. } => Some(*offset),
                _ => None,
            })
            .collect()
    }

    /// 同步次数
    pub fn sync_count(&self) -> usize {
        self.ops.iter().filter(|op| **op == StoreOp::Sync).count()
    }

    /// 清空操作记录
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// 记录到的调试事件
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// 让从 `offset` 开始的读取失败
    pub fn fail_read(&mut self, offset: u64, kind: ErrorKind) {
        self.read_faults.insert(offset, kind);
    }

    /// 让写到 `offset` 的写入失败
    pub fn fail_write(&mut self, offset: u64, kind: ErrorKind) {
        self.write_faults.insert(offset, kind);
    }

    /// 让之后的同步失败
    pub fn fail_sync(&mut self, kind: ErrorKind) {
        self.sync_fault = Some(kind);
    }

    /// 撤销所有故障注入
    pub fn clear_faults(&mut self) {
        self.read_faults.clear();
        self.write_faults.clear();
        self.sync_fault = None;
    }

    fn store(&mut self, offset: u64, buf: &[u8]) {
        let start = offset as usize;
        let end = start + buf.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(buf);
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

fn injected(kind: ErrorKind) -> Error {
    match kind {
        ErrorKind::NoSpace => Error::new(kind, "injected: no space left on device"),
        _ => Error::new(kind, "injected I/O fault"),
    }
}

impl BackingStore for MemStore {
    fn alignment(&self) -> usize {
        self.alignment
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if let Some(&kind) = self.read_faults.get(&offset) {
            log::debug!("[MEMSTORE] read offset={:#x} fails with {:?}", offset, kind);
            return Err(injected(kind));
        }
        self.ops.push(StoreOp::Read { offset, len: buf.len() });
        let data = self.peek(offset, buf.len());
        buf.copy_from_slice(&data);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        if let Some(&kind) = self.write_faults.get(&offset) {
            log::debug!("[MEMSTORE] write offset={:#x} fails with {:?}", offset, kind);
            return Err(injected(kind));
        }
        self.ops.push(StoreOp::Write { offset, len: buf.len() });
        self.store(offset, buf);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        if let Some(kind) = self.sync_fault {
            log::debug!("[MEMSTORE] sync fails with {:?}", kind);
            return Err(injected(kind));
        }
        self.ops.push(StoreOp::Sync);
        Ok(())
    }

    fn trace(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write() {
        let mut store = MemStore::new();
        store.write_at(100, &[1, 2, 3, 4]).unwrap();

        let mut buf = [0u8; 6];
        store.read_at(98, &mut buf).unwrap();
        assert_eq!(buf, [0, 0, 1, 2, 3, 4]);

        assert_eq!(
            store.ops(),
            &[
                StoreOp::Write { offset: 100, len: 4 },
                StoreOp::Read { offset: 98, len: 6 },
            ]
        );
    }

    #[test]
    fn test_read_past_end_is_zero() {
        let mut store = MemStore::new();
        let mut buf = [0xFFu8; 16];
        store.read_at(4096, &mut buf).unwrap();
        assert_eq!(buf, [0u8; 16]);
    }

    #[test]
    fn test_fault_injection() {
        let mut store = MemStore::new();
        store.fail_write(512, ErrorKind::NoSpace);
        store.fail_read(1024, ErrorKind::Io);
        store.fail_sync(ErrorKind::Io);

        assert_eq!(store.write_at(512, &[0]).unwrap_err().kind(), ErrorKind::NoSpace);
        assert_eq!(store.read_at(1024, &mut [0u8; 1]).unwrap_err().kind(), ErrorKind::Io);
        assert_eq!(store.sync().unwrap_err().kind(), ErrorKind::Io);
        // 失败的操作不记录
        assert!(store.ops().is_empty());

        store.clear_faults();
        store.write_at(512, &[0]).unwrap();
        store.sync().unwrap();
        assert_eq!(store.writes(), alloc::vec![512]);
        assert_eq!(store.sync_count(), 1);
    }

    #[test]
    fn test_aligned_alloc() {
        let store = MemStore::with_alignment(4096);
        let buf = store.aligned_alloc(512);
        assert_eq!(buf.len(), 512);
        assert_eq!(buf.as_ptr() as usize % 4096, 0);
    }
}
