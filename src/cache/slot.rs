//! 缓存槽位
//!
//! 每个槽位持有一张表大小的缓冲区以及它的元数据。缓冲区在缓存创建时
//! 分配一次，此后一直复用。

use crate::consts::UNASSIGNED_OFFSET;
use crate::store::TableBuf;
use bitflags::bitflags;

bitflags! {
    /// 槽位状态标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SlotFlags: u8 {
        /// 缓冲区在上次成功写回后被修改过
        const DIRTY    = 0x01;
        /// 缓冲区内容与存储上的内容一致（读入或写回过）
        const UPTODATE = 0x02;
    }
}

/// 槽位快照，用于诊断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    /// 映射的存储偏移，0 表示未分配
    pub offset: u64,
    /// 是否为脏
    pub dirty: bool,
    /// 缓冲区是否与存储一致
    pub uptodate: bool,
    /// 未归还的借用数
    pub pin_count: u32,
    /// 老化命中分数
    pub hit_score: u32,
}

/// 缓存槽位
///
/// # 不变量
///
/// - `offset == UNASSIGNED_OFFSET` 的槽位永远不是脏的
/// - `pin_count > 0` 的槽位不会被驱逐或覆盖
pub(crate) struct Slot {
    table: TableBuf,
    offset: u64,
    flags: SlotFlags,
    pin_count: u32,
    hit_score: u32,
}

impl Slot {
    pub(crate) fn new(table: TableBuf) -> Self {
        Self {
            table,
            offset: UNASSIGNED_OFFSET,
            flags: SlotFlags::empty(),
            pin_count: 0,
            hit_score: 0,
        }
    }

    pub(crate) fn table(&self) -> &[u8] {
        &self.table
    }

    pub(crate) fn table_mut(&mut self) -> &mut [u8] {
        &mut self.table
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn is_assigned(&self) -> bool {
        self.offset != UNASSIGNED_OFFSET
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.flags.contains(SlotFlags::DIRTY)
    }

    /// 有未写回的修改且映射了存储位置
    pub(crate) fn needs_writeback(&self) -> bool {
        self.is_dirty() && self.is_assigned()
    }

    pub(crate) fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    pub(crate) fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub(crate) fn hit_score(&self) -> u32 {
        self.hit_score
    }

    pub(crate) fn mark_dirty(&mut self) {
        assert!(self.is_assigned(), "marking an unassigned table dirty");
        self.flags.insert(SlotFlags::DIRTY);
    }

    /// 写回成功
    pub(crate) fn mark_clean(&mut self) {
        self.flags.remove(SlotFlags::DIRTY);
        self.flags.insert(SlotFlags::UPTODATE);
    }

    pub(crate) fn pin(&mut self) {
        self.pin_count += 1;
    }

    pub(crate) fn unpin(&mut self) {
        if self.pin_count == 0 {
            log::error!("[TCACHE] unbalanced put on table at offset {:#x}", self.offset);
            panic!("unbalanced put: table is not pinned");
        }
        self.pin_count -= 1;
    }

    pub(crate) fn hit(&mut self) {
        self.hit_score = self.hit_score.saturating_add(1);
    }

    /// 驱逐扫描中的老化
    pub(crate) fn age(&mut self) {
        self.hit_score /= 2;
    }

    /// 解除映射，在重新装入之前调用
    ///
    /// 槽位必须已经写回。
    pub(crate) fn release(&mut self) {
        debug_assert!(!self.needs_writeback());
        self.offset = UNASSIGNED_OFFSET;
        self.flags = SlotFlags::empty();
    }

    /// 映射到新的存储偏移
    pub(crate) fn assign(&mut self, offset: u64, hit_score: u32, uptodate: bool) {
        self.offset = offset;
        self.hit_score = hit_score;
        self.flags.set(SlotFlags::UPTODATE, uptodate);
    }

    pub(crate) fn info(&self) -> SlotInfo {
        SlotInfo {
            offset: self.offset,
            dirty: self.is_dirty(),
            uptodate: self.flags.contains(SlotFlags::UPTODATE),
            pin_count: self.pin_count,
            hit_score: self.hit_score,
        }
    }
}

impl core::fmt::Debug for Slot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Slot")
            .field("offset", &self.offset)
            .field("table_len", &self.table.len())
            .field("flags", &self.flags)
            .field("pin_count", &self.pin_count)
            .field("hit_score", &self.hit_score)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> Slot {
        Slot::new(TableBuf::new(512, 512))
    }

    #[test]
    fn test_slot_creation() {
        let slot = slot();
        assert!(!slot.is_assigned());
        assert!(!slot.is_dirty());
        assert!(!slot.is_pinned());
        assert_eq!(slot.hit_score(), 0);
        assert_eq!(slot.table().len(), 512);
    }

    #[test]
    fn test_pinning() {
        let mut slot = slot();

        slot.pin();
        slot.pin();
        assert_eq!(slot.pin_count(), 2);
        assert!(slot.is_pinned());

        slot.unpin();
        slot.unpin();
        assert!(!slot.is_pinned());
    }

    #[test]
    #[should_panic(expected = "unbalanced put")]
    fn test_unpin_underflow() {
        let mut slot = slot();
        slot.unpin();
    }

    #[test]
    fn test_dirty_and_clean() {
        let mut slot = slot();
        slot.assign(4096, 32, false);
        assert!(!slot.info().uptodate);

        slot.mark_dirty();
        assert!(slot.needs_writeback());

        slot.mark_clean();
        assert!(!slot.is_dirty());
        assert!(slot.info().uptodate);
    }

    #[test]
    #[should_panic(expected = "unassigned")]
    fn test_dirty_unassigned() {
        let mut slot = slot();
        slot.mark_dirty();
    }

    #[test]
    fn test_aging() {
        let mut slot = slot();
        slot.assign(4096, 33, true);
        slot.age();
        assert_eq!(slot.hit_score(), 16);
        slot.age();
        slot.age();
        assert_eq!(slot.hit_score(), 4);
        slot.hit();
        assert_eq!(slot.hit_score(), 5);
    }

    #[test]
    fn test_release() {
        let mut slot = slot();
        slot.assign(8192, 32, true);
        slot.release();

        let info = slot.info();
        assert_eq!(info.offset, UNASSIGNED_OFFSET);
        assert!(!info.dirty);
        assert!(!info.uptodate);
    }
}
