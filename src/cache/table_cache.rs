//! 单个元数据表缓存的槽位表和驱逐策略
//!
//! 所有 I/O 和跨缓存的依赖处理都在 [`TableCaches`](super::TableCaches)
//! 里完成，这里只维护固定长度的槽位数组。

use super::slot::Slot;
use crate::store::BackingStore;
use crate::types::{CacheId, StoreId, TableKind};
use alloc::vec::Vec;

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 命中次数
    pub hits: u64,
    /// 未命中次数
    pub misses: u64,
    /// 被替换掉的有效表数量
    pub evictions: u64,
    /// 从存储读入的表数量
    pub reads: u64,
    /// 写回的表数量
    pub writebacks: u64,
    /// 当前脏表数量
    pub dirty: usize,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 单个表缓存
pub(crate) struct TableCache {
    pub(crate) slots: Vec<Slot>,
    pub(crate) table_size: usize,
    pub(crate) kind: TableKind,
    pub(crate) store: StoreId,
    /// 写回任何脏表之前必须完整刷新的缓存（不拥有）
    pub(crate) dependency: Option<CacheId>,
    /// 写回任何脏表之前必须先同步设备
    pub(crate) depends_on_flush: bool,
    pub(crate) stats: CacheStats,
}

impl TableCache {
    /// 创建缓存，缓冲区由存储分配
    pub(crate) fn new<S: BackingStore>(
        backing: &S,
        store: StoreId,
        capacity: usize,
        table_size: usize,
        kind: TableKind,
    ) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot::new(backing.aligned_alloc(table_size)))
            .collect();

        Self {
            slots,
            table_size,
            kind,
            store,
            dependency: None,
            depends_on_flush: false,
            stats: CacheStats::default(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 查找映射到 `offset` 的槽位
    pub(crate) fn find(&self, offset: u64) -> Option<usize> {
        self.slots.iter().position(|slot| slot.offset() == offset)
    }

    /// 选出要替换的槽位
    ///
    /// 只考虑未被 pin 的槽位，取命中分数最小者（相同时取第一个）。
    /// 扫描过的每个槽位分数减半，让最近的命中更有分量。
    ///
    /// # Panics
    ///
    /// 所有槽位都被 pin 时 panic：调用者同时持有的表超过了缓存容量。
    pub(crate) fn find_victim(&mut self) -> usize {
        let mut victim: Option<(usize, u32)> = None;

        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_pinned() {
                continue;
            }

            let score = slot.hit_score();
            if victim.map_or(true, |(_, min)| score < min) {
                victim = Some((i, score));
            }

            slot.age();
        }

        match victim {
            Some((i, _)) => i,
            None => {
                log::error!(
                    "[TCACHE] {} cache: all {} tables are pinned, nothing to evict",
                    self.kind,
                    self.slots.len()
                );
                panic!("table cache over-borrowed: every slot is pinned");
            }
        }
    }

    pub(crate) fn dirty_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.needs_writeback()).count()
    }

    pub(crate) fn pinned_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_pinned()).count()
    }
}

impl core::fmt::Debug for TableCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TableCache")
            .field("kind", &self.kind)
            .field("capacity", &self.slots.len())
            .field("table_size", &self.table_size)
            .field("store", &self.store)
            .field("dependency", &self.dependency)
            .field("depends_on_flush", &self.depends_on_flush)
            .field("dirty_count", &self.dirty_count())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn cache(capacity: usize) -> TableCache {
        TableCache::new(&MemStore::new(), StoreId(0), capacity, 512, TableKind::L2)
    }

    #[test]
    fn test_cache_creation() {
        let cache = cache(4);
        assert_eq!(cache.capacity(), 4);
        assert_eq!(cache.dirty_count(), 0);
        assert_eq!(cache.pinned_count(), 0);
        assert!(cache.slots.iter().all(|slot| !slot.is_assigned()));
        assert!(cache.slots.iter().all(|slot| slot.table().len() == 512));
    }

    #[test]
    fn test_find() {
        let mut cache = cache(3);
        cache.slots[1].assign(4096, 32, true);
        assert_eq!(cache.find(4096), Some(1));
        assert_eq!(cache.find(8192), None);
    }

    #[test]
    fn test_victim_lowest_score_first_wins() {
        let mut cache = cache(4);
        cache.slots[0].assign(512, 40, true);
        cache.slots[1].assign(1024, 8, true);
        cache.slots[2].assign(1536, 8, true);
        cache.slots[3].assign(2048, 20, true);

        assert_eq!(cache.find_victim(), 1);

        // 每个槽位都老化了
        let scores: Vec<u32> = cache.slots.iter().map(|s| s.hit_score()).collect();
        assert_eq!(scores, alloc::vec![20, 4, 4, 10]);
    }

    #[test]
    fn test_victim_skips_pinned() {
        let mut cache = cache(3);
        cache.slots[0].assign(512, 0, true);
        cache.slots[0].pin();
        cache.slots[1].assign(1024, 50, true);
        cache.slots[2].assign(1536, 30, true);

        assert_eq!(cache.find_victim(), 2);
        // 被 pin 的槽位不参与老化
        assert_eq!(cache.slots[0].hit_score(), 0);
    }

    #[test]
    fn test_aging_lets_cold_slots_decay() {
        let mut cache = cache(2);
        cache.slots[0].assign(512, 64, true);
        cache.slots[1].assign(1024, 0, true);
        cache.slots[1].pin();

        // 只有槽位 0 可选，每次扫描分数减半
        for expected in [32, 16, 8, 4, 2, 1, 0] {
            assert_eq!(cache.find_victim(), 0);
            assert_eq!(cache.slots[0].hit_score(), expected);
        }
    }

    #[test]
    #[should_panic(expected = "over-borrowed")]
    fn test_no_victim_is_fatal() {
        let mut cache = cache(2);
        cache.slots[0].pin();
        cache.slots[1].pin();
        cache.find_victim();
    }

    #[test]
    fn test_stats_hit_rate() {
        let mut stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        stats.hits = 3;
        stats.misses = 1;
        assert_eq!(stats.hit_rate(), 0.75);
    }
}
