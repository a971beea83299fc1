use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::common::{FrameId, PageId, Result, StrataError, TableId};
use crate::storage::disk::{DiskManager, DiskScheduler};
use crate::storage::page::{Page, PageHandle, PageMaker};

use super::{ClockReplacer, Frame};

/// Everything guarded by the buffer manager's mutex
struct BufferPoolState<P> {
    /// The buffer pool frames
    frames: Vec<Frame<P>>,
    /// Page table: maps page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Free list: frames that are not currently in use
    free_list: VecDeque<FrameId>,
    /// Clock replacer for eviction decisions
    replacer: ClockReplacer,
    /// Whether eviction may pick a dirty frame (flushing it first)
    evict_dirty: bool,
}

/// BufferManager caches a fixed number of pages in memory.
///
/// Pages are pinned while in use and are never evicted while pinned. On a miss
/// an unpinned frame is chosen by the clock replacer. All disk I/O goes through
/// the disk scheduler.
pub struct BufferManager<P: Page> {
    /// Number of frames in the buffer pool
    pool_size: usize,
    state: Mutex<BufferPoolState<P>>,
    /// Disk scheduler for page I/O
    disk_scheduler: DiskScheduler,
}

impl<P: Page> BufferManager<P> {
    /// Creates a new BufferManager with `pool_size` frames over `disk_manager`.
    /// Dirty eviction starts disabled.
    pub fn new(pool_size: usize, disk_manager: Arc<dyn DiskManager>) -> Self {
        let frames = (0..pool_size)
            .map(|i| Frame::new(FrameId::new(i as u32)))
            .collect();
        let free_list = (0..pool_size).map(|i| FrameId::new(i as u32)).collect();

        Self {
            pool_size,
            state: Mutex::new(BufferPoolState {
                frames,
                page_table: HashMap::new(),
                free_list,
                replacer: ClockReplacer::new(),
                evict_dirty: false,
            }),
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Pins `page_id`, reading it from disk with `page_maker` on a miss.
    ///
    /// The returned handle is valid until the matching `unpin_page`.
    pub fn pin_page<M>(&self, page_id: PageId, page_maker: &M) -> Result<PageHandle<P>>
    where
        M: PageMaker<Page = P> + ?Sized,
    {
        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &mut state.frames[frame_id.as_usize()];
            let pins = frame.pin();
            trace!("pin hit {} in {} (pins={})", page_id, frame_id, pins);
            return frame
                .page()
                .cloned()
                .ok_or(StrataError::PageNotCached(page_id));
        }

        let frame_id = self.get_free_frame(&mut state)?;

        let page = match self.load_page(page_id, page_maker) {
            Ok(page) => page,
            Err(e) => {
                state.free_list.push_back(frame_id);
                return Err(e);
            }
        };

        let frame = &mut state.frames[frame_id.as_usize()];
        frame.install(page_id, page);
        let handle = frame.page().cloned().ok_or(StrataError::PageNotCached(page_id))?;
        state.page_table.insert(page_id, frame_id);
        trace!("pin miss {} loaded into {}", page_id, frame_id);

        Ok(handle)
    }

    fn load_page<M>(&self, page_id: PageId, page_maker: &M) -> Result<P>
    where
        M: PageMaker<Page = P> + ?Sized,
    {
        let data = self.disk_scheduler.schedule_read_sync(page_id)?;
        page_maker.make_page(page_id, &data)
    }

    /// Releases one pin on `page_id`, marking it dirty if `is_dirty`.
    /// A clean unpin never clears an earlier dirty mark.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let mut state = self.state.lock();
        let frame_id = *state
            .page_table
            .get(&page_id)
            .ok_or(StrataError::PageNotCached(page_id))?;
        let frame = &mut state.frames[frame_id.as_usize()];

        let pins = frame.unpin().ok_or(StrataError::PageNotPinned(page_id))?;
        if is_dirty {
            frame.set_dirty(true);
        }
        trace!("unpin {} dirty={} (pins={})", page_id, is_dirty, pins);
        Ok(())
    }

    /// Writes `page_id` to disk if it is cached and dirty, then marks it clean.
    /// Pinned pages may be flushed.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.flush_frame(&mut state, frame_id)?;
        }
        Ok(())
    }

    /// Flushes all dirty pages in the buffer pool to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut state = self.state.lock();
        let frame_ids: Vec<FrameId> = state.page_table.values().copied().collect();
        for frame_id in frame_ids {
            self.flush_frame(&mut state, frame_id)?;
        }
        Ok(())
    }

    fn flush_frame(&self, state: &mut BufferPoolState<P>, frame_id: FrameId) -> Result<()> {
        let frame = &mut state.frames[frame_id.as_usize()];
        if !frame.is_dirty() {
            return Ok(());
        }
        let (page_id, handle) = match (frame.page_id(), frame.page()) {
            (Some(page_id), Some(handle)) => (page_id, handle),
            _ => return Ok(()),
        };

        let data = handle.read().page_data()?;
        self.disk_scheduler.schedule_write_sync(page_id, data)?;
        frame.set_dirty(false);
        debug!("flushed {} from {}", page_id, frame_id);
        Ok(())
    }

    /// Drops `page_id` from the pool without writing it, whatever its pin count
    /// or dirty flag. The frame goes back on the free list.
    pub fn discard_page(&self, page_id: PageId) {
        let mut state = self.state.lock();
        if let Some(frame_id) = state.page_table.remove(&page_id) {
            state.frames[frame_id.as_usize()].reset();
            state.free_list.push_back(frame_id);
            debug!("discarded {} from {}", page_id, frame_id);
        }
    }

    /// Makes `page_id` exist on disk. The page is not cached.
    pub fn allocate_page(&self, page_id: PageId) -> Result<()> {
        self.disk_scheduler.schedule_allocate_sync(page_id)
    }

    /// Whether eviction may choose dirty frames. When it does, the frame is
    /// written to disk before reuse.
    pub fn set_evict_dirty(&self, evict_dirty: bool) {
        self.state.lock().evict_dirty = evict_dirty;
    }

    pub fn is_dirty(&self, page_id: PageId) -> bool {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map_or(false, |&frame_id| state.frames[frame_id.as_usize()].is_dirty())
    }

    pub fn in_buffer_pool(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Returns the pin count for a page, None if it is not cached.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| state.frames[frame_id.as_usize()].pin_count())
    }

    /// Returns the cached page without pinning it.
    pub fn get_page(&self, page_id: PageId) -> Result<PageHandle<P>> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .and_then(|&frame_id| state.frames[frame_id.as_usize()].page().cloned())
            .ok_or(StrataError::PageNotCached(page_id))
    }

    /// Returns the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Number of pages of `table_id` on disk.
    pub fn num_pages(&self, table_id: TableId) -> Result<u32> {
        self.disk_scheduler.num_pages(table_id)
    }

    pub fn page_size(&self) -> usize {
        self.disk_scheduler.page_size()
    }

    /// Gets a free frame, either from the free list or by evicting a page.
    fn get_free_frame(&self, state: &mut BufferPoolState<P>) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let allow_dirty = state.evict_dirty;
        let frame_id = match state.replacer.victim(&mut state.frames, allow_dirty) {
            Some(frame_id) => frame_id,
            None => {
                warn!(
                    "buffer pool exhausted: no evictable frame among {}",
                    self.pool_size
                );
                return Err(StrataError::BufferPoolFull);
            }
        };

        // Dirty victims are only chosen when allowed; write them out first
        self.flush_frame(state, frame_id)?;

        let frame = &mut state.frames[frame_id.as_usize()];
        if let Some(old_page_id) = frame.page_id() {
            state.page_table.remove(&old_page_id);
            debug!("evicted {} from {}", old_page_id, frame_id);
        }
        state.frames[frame_id.as_usize()].reset();

        Ok(frame_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::MemoryDiskManager;
    use crate::storage::page::{SlottedPage, SlottedPageMaker};
    use crate::tuple::{DataType, Schema, TupleBuilder};

    const PAGE_SIZE: usize = 128;

    fn create_bm(
        pool_size: usize,
    ) -> (
        BufferManager<SlottedPage>,
        Arc<MemoryDiskManager>,
        SlottedPageMaker,
    ) {
        let dm = Arc::new(MemoryDiskManager::new(PAGE_SIZE));
        let bm = BufferManager::new(pool_size, dm.clone());
        let schema = Schema::builder().column("v", DataType::Integer).build_arc();
        (bm, dm, SlottedPageMaker::new(schema, PAGE_SIZE).unwrap())
    }

    fn insert(handle: &PageHandle<SlottedPage>, maker: &SlottedPageMaker, v: i32) {
        let mut tuple = TupleBuilder::new(maker.schema().clone())
            .value(v)
            .build()
            .unwrap();
        handle.write().insert_tuple(&mut tuple).unwrap();
    }

    #[test]
    fn test_buffer_manager_new() {
        let (bm, _dm, _maker) = create_bm(10);
        assert_eq!(bm.pool_size(), 10);
        assert_eq!(bm.free_frame_count(), 10);
    }

    #[test]
    fn test_pin_miss_then_hit() {
        let (bm, dm, maker) = create_bm(4);
        let page_id = PageId::new(0, 0);

        let first = bm.pin_page(page_id, &maker).unwrap();
        assert_eq!(bm.pin_count(page_id), Some(1));
        assert_eq!(bm.free_frame_count(), 3);

        let second = bm.pin_page(page_id, &maker).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(bm.pin_count(page_id), Some(2));
        assert_eq!(dm.write_count(), 0);
    }

    #[test]
    fn test_unpin_errors() {
        let (bm, _dm, maker) = create_bm(2);
        let page_id = PageId::new(0, 0);

        assert!(matches!(
            bm.unpin_page(page_id, false),
            Err(StrataError::PageNotCached(_))
        ));

        bm.pin_page(page_id, &maker).unwrap();
        bm.unpin_page(page_id, false).unwrap();
        assert!(matches!(
            bm.unpin_page(page_id, false),
            Err(StrataError::PageNotPinned(_))
        ));
    }

    #[test]
    fn test_dirty_is_sticky() {
        let (bm, _dm, maker) = create_bm(2);
        let page_id = PageId::new(0, 0);

        bm.pin_page(page_id, &maker).unwrap();
        bm.pin_page(page_id, &maker).unwrap();
        bm.unpin_page(page_id, true).unwrap();
        bm.unpin_page(page_id, false).unwrap();
        assert!(bm.is_dirty(page_id));
    }

    #[test]
    fn test_flush_page() {
        let (bm, dm, maker) = create_bm(2);
        let page_id = PageId::new(0, 1);

        let handle = bm.pin_page(page_id, &maker).unwrap();
        insert(&handle, &maker, 42);
        bm.unpin_page(page_id, true).unwrap();

        bm.flush_page(page_id).unwrap();
        assert!(!bm.is_dirty(page_id));
        assert_eq!(dm.writes_to(page_id), 1);
        assert_eq!(
            dm.page_bytes(page_id).unwrap(),
            handle.read().page_data().unwrap().to_vec()
        );

        // Clean page: no second write
        bm.flush_page(page_id).unwrap();
        assert_eq!(dm.writes_to(page_id), 1);

        // Not cached: no-op
        bm.flush_page(PageId::new(0, 9)).unwrap();
    }

    #[test]
    fn test_flush_pinned_page() {
        let (bm, dm, maker) = create_bm(2);
        let page_id = PageId::new(0, 0);

        bm.pin_page(page_id, &maker).unwrap();
        bm.pin_page(page_id, &maker).unwrap();
        bm.unpin_page(page_id, true).unwrap();

        bm.flush_page(page_id).unwrap();
        assert_eq!(dm.writes_to(page_id), 1);
        assert_eq!(bm.pin_count(page_id), Some(1));
    }

    #[test]
    fn test_pool_full_then_evict() {
        let (bm, _dm, maker) = create_bm(2);
        let a = PageId::new(0, 0);
        let b = PageId::new(0, 1);
        let c = PageId::new(0, 2);

        bm.pin_page(a, &maker).unwrap();
        bm.pin_page(b, &maker).unwrap();
        assert!(matches!(
            bm.pin_page(c, &maker),
            Err(StrataError::BufferPoolFull)
        ));

        bm.unpin_page(a, false).unwrap();
        bm.pin_page(c, &maker).unwrap();
        assert!(!bm.in_buffer_pool(a));
        assert!(bm.in_buffer_pool(b));
        assert!(bm.in_buffer_pool(c));
    }

    #[test]
    fn test_dirty_eviction_policy() {
        let (bm, dm, maker) = create_bm(1);
        let a = PageId::new(0, 0);
        let b = PageId::new(0, 1);

        let handle = bm.pin_page(a, &maker).unwrap();
        insert(&handle, &maker, 7);
        bm.unpin_page(a, true).unwrap();

        // Dirty frames are skipped by default
        assert!(matches!(
            bm.pin_page(b, &maker),
            Err(StrataError::BufferPoolFull)
        ));
        assert_eq!(dm.write_count(), 0);

        bm.set_evict_dirty(true);
        bm.pin_page(b, &maker).unwrap();
        assert!(!bm.in_buffer_pool(a));
        assert_eq!(dm.writes_to(a), 1);

        // The evicted page comes back with its contents
        bm.unpin_page(b, false).unwrap();
        let again = bm.pin_page(a, &maker).unwrap();
        assert_eq!(again.read().iter().count(), 1);
    }

    #[test]
    fn test_discard_page() {
        let (bm, dm, maker) = create_bm(2);
        let page_id = PageId::new(0, 0);

        let handle = bm.pin_page(page_id, &maker).unwrap();
        insert(&handle, &maker, 1);
        bm.unpin_page(page_id, true).unwrap();

        bm.discard_page(page_id);
        assert!(!bm.in_buffer_pool(page_id));
        assert_eq!(bm.free_frame_count(), 2);
        assert_eq!(dm.write_count(), 0);

        let reloaded = bm.pin_page(page_id, &maker).unwrap();
        assert_eq!(reloaded.read().iter().count(), 0);
    }

    #[test]
    fn test_failed_read_returns_frame() {
        let (bm, dm, maker) = create_bm(1);
        let page_id = PageId::new(0, 0);
        // Header bit beyond capacity: 128*8/33 = 31 slots, bit 31 is invalid
        let mut bad = vec![0u8; PAGE_SIZE];
        bad[3] = 0b1000_0000;
        dm.write_page(page_id, &bad).unwrap();

        assert!(bm.pin_page(page_id, &maker).is_err());
        assert_eq!(bm.free_frame_count(), 1);
        assert!(!bm.in_buffer_pool(page_id));
    }

    #[test]
    fn test_allocate_page() {
        let (bm, dm, _maker) = create_bm(2);
        bm.allocate_page(PageId::new(3, 0)).unwrap();
        assert_eq!(bm.num_pages(3).unwrap(), 1);
        assert!(!bm.in_buffer_pool(PageId::new(3, 0)));
        assert_eq!(dm.write_count(), 0);
    }
}
