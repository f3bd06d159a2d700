//! 元数据表缓存集合
//!
//! [`TableCaches`] 持有一个镜像的所有表缓存以及它们的后端存储。
//! 缓存之间的写回顺序依赖用 [`CacheId`] 表示，依赖方不拥有被依赖的缓存。
//!
//! # 借用协议
//!
//! ```rust,ignore
//! let l2 = caches.create(16, 65536, TableKind::L2)?;
//!
//! let table = caches.get(l2, l2_offset)?;
//! caches.table_mut(&table)[0..8].copy_from_slice(&entry);
//! caches.mark_dirty(l2, &table);
//! caches.put(l2, table)?;
//!
//! caches.flush(l2)?;
//! ```
//!
//! # 写回顺序
//!
//! `set_dependency(a, b)` 之后，`a` 第一次要写回脏表时会先把 `b` 完整刷新
//! 到存储并同步，然后才写 `a` 的表。`depends_on_flush(a)` 则要求在 `a`
//! 写回之前先同步一次设备。两种义务都在第一次兑现后自动清除。

use super::slot::SlotInfo;
use super::table_cache::{CacheStats, TableCache};
use crate::consts::{UNASSIGNED_OFFSET, WARM_START_HITS};
use crate::error::{Error, ErrorKind, Result};
use crate::store::{BackingStore, TraceEvent};
use crate::types::{CacheId, StoreId, TableHandle, TableKind};
use alloc::vec::Vec;

/// 元数据表缓存集合
pub struct TableCaches<S: BackingStore> {
    stores: Vec<S>,
    /// 已销毁的缓存留下 `None`，ID 不复用
    caches: Vec<Option<TableCache>>,
}

impl<S: BackingStore> TableCaches<S> {
    /// 以 `store` 作为主存储创建缓存集合
    pub fn new(store: S) -> Self {
        Self {
            stores: alloc::vec![store],
            caches: Vec::new(),
        }
    }

    /// 主存储的 ID
    pub fn primary_store(&self) -> StoreId {
        StoreId(0)
    }

    /// 添加另一个后端存储（例如外部位图文件）
    pub fn add_store(&mut self, store: S) -> StoreId {
        self.stores.push(store);
        StoreId(self.stores.len() - 1)
    }

    /// 访问后端存储
    ///
    /// # Panics
    ///
    /// 存储 ID 不存在时 panic。
    pub fn store(&self, id: StoreId) -> &S {
        &self.stores[id.0]
    }

    /// 可变访问后端存储
    pub fn store_mut(&mut self, id: StoreId) -> &mut S {
        &mut self.stores[id.0]
    }

    // ===== 创建 / 销毁 =====

    /// 在主存储上创建缓存
    ///
    /// # 参数
    ///
    /// * `capacity` - 槽位数量
    /// * `table_size` - 每张表的字节数
    /// * `kind` - 表类型
    pub fn create(&mut self, capacity: usize, table_size: usize, kind: TableKind) -> Result<CacheId> {
        self.create_on(self.primary_store(), capacity, table_size, kind)
    }

    /// 在指定存储上创建缓存
    pub fn create_on(
        &mut self,
        store: StoreId,
        capacity: usize,
        table_size: usize,
        kind: TableKind,
    ) -> Result<CacheId> {
        if capacity == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "cache capacity must be non-zero"));
        }
        if table_size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "table size must be non-zero"));
        }
        let backing = self
            .stores
            .get(store.0)
            .ok_or(Error::new(ErrorKind::NotFound, "unknown backing store"))?;

        let cache = TableCache::new(backing, store, capacity, table_size, kind);
        self.caches.push(Some(cache));
        let id = CacheId(self.caches.len() - 1);

        log::debug!(
            "[TCACHE] created {} cache {:?}: {} x {} bytes on {:?}",
            kind,
            id,
            capacity,
            table_size,
            store
        );
        Ok(id)
    }

    /// 销毁缓存，释放所有缓冲区
    ///
    /// 不会刷新脏表；需要持久化时调用者应先 [`flush`](Self::flush)。
    ///
    /// # 错误
    ///
    /// 其他缓存仍依赖它时返回 `Busy`（先对依赖方调用
    /// [`flush_dependency`](Self::flush_dependency)）。
    ///
    /// # Panics
    ///
    /// 仍有表未归还时 panic。
    pub fn destroy(&mut self, id: CacheId) -> Result<()> {
        let cache = self.lookup(id)?;

        if let Some(slot) = cache.slots.iter().position(|slot| slot.is_pinned()) {
            log::error!(
                "[TCACHE] destroying {} cache {:?} with pinned table in slot {}",
                cache.kind,
                id,
                slot
            );
            panic!("destroying a table cache with outstanding pins");
        }

        let dependent = self
            .caches
            .iter()
            .enumerate()
            .find(|(i, c)| *i != id.0 && matches!(c, Some(c) if c.dependency == Some(id)));
        if let Some((dependent, _)) = dependent {
            log::warn!(
                "[TCACHE] refusing to destroy cache {:?}: cache {} still depends on it",
                id,
                dependent
            );
            return Err(Error::new(
                ErrorKind::Busy,
                "another cache still depends on this cache",
            ));
        }

        self.caches[id.0] = None;
        log::debug!("[TCACHE] destroyed cache {:?}", id);
        Ok(())
    }

    // ===== 借用 / 归还 =====

    /// 获取映射到 `offset` 的表，不在缓存中时从存储读入
    ///
    /// 返回的句柄会 pin 住槽位，必须用 [`put`](Self::put) 归还。
    ///
    /// # Panics
    ///
    /// 缓存的所有槽位都被 pin 时 panic。
    pub fn get(&mut self, id: CacheId, offset: u64) -> Result<TableHandle> {
        self.do_get(id, offset, true)
    }

    /// 获取映射到 `offset` 的表，但不从存储读入
    ///
    /// 用于调用者马上要覆盖整张表的情况。未命中时缓冲区里是旧内容。
    pub fn get_empty(&mut self, id: CacheId, offset: u64) -> Result<TableHandle> {
        self.do_get(id, offset, false)
    }

    fn do_get(&mut self, id: CacheId, offset: u64, populate: bool) -> Result<TableHandle> {
        if offset == UNASSIGNED_OFFSET {
            return Err(Error::new(ErrorKind::InvalidInput, "offset 0 is reserved"));
        }

        let (cache, store) = self.parts(id)?;
        let kind = cache.kind;
        store.trace(TraceEvent::Get { kind, offset, populate });

        let index = match cache.find(offset) {
            Some(index) => {
                cache.stats.hits += 1;
                log::trace!("[TCACHE] {} get offset={:#x} HIT slot {}", kind, offset, index);
                index
            }
            None => {
                cache.stats.misses += 1;
                let index = cache.find_victim();
                store.trace(TraceEvent::GetReplaceEntry { kind, slot: index });

                self.flush_entry(id, index)?;

                let (cache, store) = self.parts(id)?;
                store.trace(TraceEvent::GetRead { kind, slot: index });

                let slot = &mut cache.slots[index];
                if slot.is_assigned() {
                    cache.stats.evictions += 1;
                    log::debug!(
                        "[TCACHE] {} evict offset={:#x} from slot {}",
                        kind,
                        slot.offset(),
                        index
                    );
                }
                slot.release();

                if populate {
                    if matches!(kind, TableKind::L2 | TableKind::Bitmap) {
                        store.trace(TraceEvent::TableLoad { kind });
                    }
                    store.read_at(offset, slot.table_mut())?;
                    cache.stats.reads += 1;
                }

                slot.assign(offset, WARM_START_HITS, populate);
                log::debug!(
                    "[TCACHE] {} get offset={:#x} MISS -> slot {} (populate={})",
                    kind,
                    offset,
                    index,
                    populate
                );
                index
            }
        };

        let (cache, store) = self.parts(id)?;
        let slot = &mut cache.slots[index];
        slot.hit();
        slot.pin();
        store.trace(TraceEvent::GetDone { kind, slot: index });

        Ok(TableHandle { cache: id, slot: index })
    }

    /// 归还借用的表
    ///
    /// # 错误
    ///
    /// 句柄不属于此缓存时返回 `InvalidInput`。
    ///
    /// # Panics
    ///
    /// 槽位没有被 pin（重复归还）时 panic。
    pub fn put(&mut self, id: CacheId, handle: TableHandle) -> Result<()> {
        let cache = self.lookup_mut(id)?;
        if handle.cache != id || handle.slot >= cache.capacity() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "table does not belong to this cache",
            ));
        }

        cache.slots[handle.slot].unpin();
        Ok(())
    }

    /// 标记表为脏
    ///
    /// # Panics
    ///
    /// 句柄不属于此缓存时 panic。
    pub fn mark_dirty(&mut self, id: CacheId, handle: &TableHandle) {
        if handle.cache != id {
            log::error!(
                "[TCACHE] mark_dirty on cache {:?} with a table of cache {:?}",
                id,
                handle.cache
            );
            panic!("mark_dirty with a table that does not belong to this cache");
        }

        let cache = self.cache_mut(id);
        let kind = cache.kind;
        let slot = &mut cache.slots[handle.slot];
        if !slot.is_dirty() {
            log::trace!("[TCACHE] {} mark_dirty offset={:#x}", kind, slot.offset());
        }
        slot.mark_dirty();
    }

    /// 只读访问借用的表
    ///
    /// # Panics
    ///
    /// 句柄已经归还时 panic。
    pub fn table(&self, handle: &TableHandle) -> &[u8] {
        let slot = &self.cache(handle.cache).slots[handle.slot];
        assert!(slot.is_pinned(), "table accessed after it was put");
        slot.table()
    }

    /// 可写访问借用的表
    ///
    /// 修改后需要调用 [`mark_dirty`](Self::mark_dirty)。
    pub fn table_mut(&mut self, handle: &TableHandle) -> &mut [u8] {
        let slot = &mut self.cache_mut(handle.cache).slots[handle.slot];
        assert!(slot.is_pinned(), "table accessed after it was put");
        slot.table_mut()
    }

    // ===== 闭包访问 =====

    /// 借用表，在闭包中只读访问，然后归还
    pub fn with_table<F, R>(&mut self, id: CacheId, offset: u64, f: F) -> Result<R>
    where
        F: FnOnce(&[u8]) -> R,
    {
        let handle = self.get(id, offset)?;
        let result = f(self.table(&handle));
        self.put(id, handle)?;
        Ok(result)
    }

    /// 借用表，在闭包中修改，标记为脏后归还
    ///
    /// # 示例
    ///
    /// ```rust,ignore
    /// caches.with_table_mut(refcount, block_offset, |table| {
    ///     entry::write_u16(table, index, refcount)
    /// })??;
    /// ```
    pub fn with_table_mut<F, R>(&mut self, id: CacheId, offset: u64, f: F) -> Result<R>
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let handle = self.get(id, offset)?;
        self.modify(id, handle, f)
    }

    /// 与 [`with_table_mut`](Self::with_table_mut) 相同，但不从存储读入
    pub fn with_new_table<F, R>(&mut self, id: CacheId, offset: u64, f: F) -> Result<R>
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let handle = self.get_empty(id, offset)?;
        self.modify(id, handle, f)
    }

    fn modify<F, R>(&mut self, id: CacheId, handle: TableHandle, f: F) -> Result<R>
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let result = f(self.table_mut(&handle));
        self.mark_dirty(id, &handle);
        self.put(id, handle)?;
        Ok(result)
    }

    // ===== 刷新 =====

    /// 写回单个槽位
    ///
    /// 先兑现缓存的顺序义务，再写表。义务兑现成功后即使写表失败也保持兑现。
    fn flush_entry(&mut self, id: CacheId, index: usize) -> Result<()> {
        let (cache, store) = self.parts(id)?;
        if !cache.slots[index].needs_writeback() {
            return Ok(());
        }

        let kind = cache.kind;
        store.trace(TraceEvent::EntryFlush { kind, slot: index });

        if cache.dependency.is_some() || cache.depends_on_flush {
            self.flush_dependency(id)?;
        }

        let (cache, store) = self.parts(id)?;
        store.trace(TraceEvent::TableUpdate { kind });

        let slot = &mut cache.slots[index];
        store.write_at(slot.offset(), slot.table())?;
        slot.mark_clean();
        cache.stats.writebacks += 1;

        log::debug!("[TCACHE] {} wrote back offset={:#x} from slot {}", kind, slot.offset(), index);
        Ok(())
    }

    /// 把所有脏表写回存储并同步设备
    ///
    /// 即使中途失败也会尝试每一个槽位。返回遇到的第一个错误，
    /// 但 `NoSpace` 会被之后的其他错误取代。没有错误时才同步设备。
    pub fn flush(&mut self, id: CacheId) -> Result<()> {
        let (cache, store) = self.parts(id)?;
        let kind = cache.kind;
        let capacity = cache.capacity();
        let store_id = cache.store;
        store.trace(TraceEvent::Flush { kind });

        let mut result: Option<Error> = None;
        for index in 0..capacity {
            if let Err(err) = self.flush_entry(id, index) {
                log::warn!("[TCACHE] {} flush of slot {} failed: {}", kind, index, err);
                result = match result {
                    None => Some(err),
                    Some(prev) if prev.is_no_space() && !err.is_no_space() => Some(err),
                    prev => prev,
                };
            }
        }

        if result.is_none() {
            if let Err(err) = self.stores[store_id.0].sync() {
                log::warn!("[TCACHE] {} flush: sync failed: {}", kind, err);
                result = Some(err);
            }
        }

        match result {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // ===== 依赖 =====

    /// 立即兑现缓存的顺序义务
    ///
    /// 完整刷新被依赖的缓存（如果有），必要时同步自己的设备，
    /// 然后清除依赖关系和设备同步标志。任何一步失败都保持义务不变。
    pub fn flush_dependency(&mut self, id: CacheId) -> Result<()> {
        let cache = self.lookup(id)?;
        let dependency = cache.dependency;
        let needs_sync = cache.depends_on_flush;
        let own_store = cache.store;

        // 刷新成功意味着被依赖缓存的存储已经同步过
        let mut synced = None;
        if let Some(dependency) = dependency {
            log::debug!("[TCACHE] cache {:?} flushing dependency {:?}", id, dependency);
            self.flush(dependency)?;
            synced = Some(self.cache(dependency).store);
        }

        if needs_sync && synced != Some(own_store) {
            self.stores[own_store.0].sync()?;
        }

        let cache = self.cache_mut(id);
        cache.dependency = None;
        cache.depends_on_flush = false;
        Ok(())
    }

    /// 声明 `id` 的脏表写回之前必须先完整刷新 `dependency`
    ///
    /// 如果 `dependency` 自己还有依赖，先兑现它，所以依赖链在建立时
    /// 就被压平到一层。`id` 已经依赖另一个缓存时，先兑现旧依赖。
    ///
    /// 两个缓存可以位于不同的后端存储上。
    pub fn set_dependency(&mut self, id: CacheId, dependency: CacheId) -> Result<()> {
        if id == dependency {
            return Err(Error::new(ErrorKind::InvalidInput, "a cache cannot depend on itself"));
        }
        self.lookup(id)?;

        if self.lookup(dependency)?.dependency.is_some() {
            self.flush_dependency(dependency)?;
        }

        let current = self.cache(id).dependency;
        if current.is_some() && current != Some(dependency) {
            self.flush_dependency(id)?;
        }

        self.cache_mut(id).dependency = Some(dependency);
        log::debug!("[TCACHE] cache {:?} now depends on {:?}", id, dependency);
        Ok(())
    }

    /// 声明 `id` 的脏表写回之前必须先同步设备
    pub fn depends_on_flush(&mut self, id: CacheId) {
        self.cache_mut(id).depends_on_flush = true;
    }

    // ===== 查询 =====

    /// 缓存是否存在（未被销毁）
    pub fn is_live(&self, id: CacheId) -> bool {
        self.lookup(id).is_ok()
    }

    /// 槽位数量
    pub fn capacity(&self, id: CacheId) -> usize {
        self.cache(id).capacity()
    }

    /// 每张表的字节数
    pub fn table_size(&self, id: CacheId) -> usize {
        self.cache(id).table_size
    }

    /// 表类型
    pub fn kind(&self, id: CacheId) -> TableKind {
        self.cache(id).kind
    }

    /// 缓存所在的存储
    pub fn store_of(&self, id: CacheId) -> StoreId {
        self.cache(id).store
    }

    /// 尚未兑现的缓存依赖
    pub fn dependency(&self, id: CacheId) -> Option<CacheId> {
        self.cache(id).dependency
    }

    /// 是否还有尚未兑现的设备同步义务
    pub fn depends_on_flush_pending(&self, id: CacheId) -> bool {
        self.cache(id).depends_on_flush
    }

    /// 脏表数量
    pub fn dirty_count(&self, id: CacheId) -> usize {
        self.cache(id).dirty_count()
    }

    /// 被 pin 的槽位数量
    pub fn pinned_count(&self, id: CacheId) -> usize {
        self.cache(id).pinned_count()
    }

    /// `offset` 的表是否在缓存中
    pub fn contains(&self, id: CacheId, offset: u64) -> bool {
        offset != UNASSIGNED_OFFSET && self.cache(id).find(offset).is_some()
    }

    /// 槽位快照
    pub fn slot_info(&self, id: CacheId, index: usize) -> SlotInfo {
        self.cache(id).slots[index].info()
    }

    /// 统计信息
    pub fn stats(&self, id: CacheId) -> CacheStats {
        let cache = self.cache(id);
        let mut stats = cache.stats.clone();
        stats.dirty = cache.dirty_count();
        stats
    }

    // 内部辅助方法

    fn lookup(&self, id: CacheId) -> Result<&TableCache> {
        self.caches
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(Error::new(ErrorKind::NotFound, "cache does not exist"))
    }

    fn lookup_mut(&mut self, id: CacheId) -> Result<&mut TableCache> {
        self.caches
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(Error::new(ErrorKind::NotFound, "cache does not exist"))
    }

    /// 同时借出缓存和它的存储
    fn parts(&mut self, id: CacheId) -> Result<(&mut TableCache, &mut S)> {
        let cache = self
            .caches
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(Error::new(ErrorKind::NotFound, "cache does not exist"))?;
        let store = &mut self.stores[cache.store.0];
        Ok((cache, store))
    }

    fn cache(&self, id: CacheId) -> &TableCache {
        match self.lookup(id) {
            Ok(cache) => cache,
            Err(_) => panic!("use of destroyed or unknown cache {:?}", id),
        }
    }

    fn cache_mut(&mut self, id: CacheId) -> &mut TableCache {
        match self.lookup_mut(id) {
            Ok(cache) => cache,
            Err(_) => panic!("use of destroyed or unknown cache {:?}", id),
        }
    }
}

impl<S: BackingStore> core::fmt::Debug for TableCaches<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TableCaches")
            .field("stores", &self.stores.len())
            .field("caches", &self.caches)
            .finish()
    }
}
