use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::buffer::BufferManager;
use crate::common::{PageId, Result, StorageConfig, StrataError, TableId};
use crate::storage::disk::DiskManager;
use crate::storage::page::{Page, PageHandle, PageMaker};
use crate::transaction::{LockManager, LockMode, TransactionId};

/// Pages one transaction has touched
#[derive(Debug, Default)]
struct TransactionPages {
    /// One entry per outstanding pin
    pinned: Vec<PageId>,
    /// Every page pinned during the transaction
    touched: HashSet<PageId>,
    /// Pages unpinned dirty
    written: HashSet<PageId>,
}

#[derive(Debug, Default)]
struct Bookkeeping {
    transactions: HashMap<TransactionId, TransactionPages>,
    /// Transactions currently pinning each page, one entry per pin
    pinners: HashMap<PageId, Vec<TransactionId>>,
}

impl Bookkeeping {
    fn drop_pinner(&mut self, page_id: PageId, tid: TransactionId) {
        if let Some(tids) = self.pinners.get_mut(&page_id) {
            if let Some(pos) = tids.iter().position(|&t| t == tid) {
                tids.swap_remove(pos);
            }
            if tids.is_empty() {
                self.pinners.remove(&page_id);
            }
        }
    }
}

/// Transactional front of the buffer manager and the lock manager.
///
/// Callers lock a page, pin it, mutate it through the returned handle and unpin
/// it. When the transaction ends its dirty pages are flushed (force policy),
/// left for eviction (no-force) or discarded (abort), and all its locks are
/// released.
pub struct AccessManager<P: Page> {
    buffer_manager: BufferManager<P>,
    lock_manager: LockManager,
    bookkeeping: Mutex<Bookkeeping>,
    force: AtomicBool,
}

impl<P: Page> AccessManager<P> {
    /// Wraps `buffer_manager` with the force policy. Dirty eviction is turned
    /// off so uncommitted changes never reach disk.
    pub fn new(buffer_manager: BufferManager<P>, lock_timeout: Duration) -> Self {
        buffer_manager.set_evict_dirty(false);
        Self {
            buffer_manager,
            lock_manager: LockManager::new(lock_timeout),
            bookkeeping: Mutex::new(Bookkeeping::default()),
            force: AtomicBool::new(true),
        }
    }

    /// Builds the whole stack over `disk_manager` from `config`.
    pub fn with_config(config: &StorageConfig, disk_manager: Arc<dyn DiskManager>) -> Result<Self> {
        if disk_manager.page_size() != config.page_size {
            return Err(StrataError::PageSizeMismatch {
                expected: config.page_size,
                actual: disk_manager.page_size(),
            });
        }
        let buffer_manager = BufferManager::new(config.buffer_pool_size, disk_manager);
        let access_manager = Self::new(buffer_manager, config.lock_timeout);
        access_manager.set_force(config.force);
        Ok(access_manager)
    }

    pub fn buffer_manager(&self) -> &BufferManager<P> {
        &self.buffer_manager
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn acquire_lock(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<()> {
        self.lock_manager.acquire_lock(tid, page_id, mode)
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        self.lock_manager.holds_lock(tid, page_id, mode)
    }

    pub fn release_lock(&self, tid: TransactionId, page_id: PageId) -> Result<()> {
        self.lock_manager.release_lock(tid, page_id)
    }

    /// Pins `page_id` on behalf of `tid`.
    pub fn pin_page<M>(
        &self,
        tid: TransactionId,
        page_id: PageId,
        page_maker: &M,
    ) -> Result<PageHandle<P>>
    where
        M: PageMaker<Page = P> + ?Sized,
    {
        let first_touch = {
            let mut bk = self.bookkeeping.lock();
            let pages = bk.transactions.entry(tid).or_default();
            pages.pinned.push(page_id);
            let first_touch = pages.touched.insert(page_id);
            bk.pinners.entry(page_id).or_default().push(tid);
            first_touch
        };

        match self.buffer_manager.pin_page(page_id, page_maker) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                let mut bk = self.bookkeeping.lock();
                if let Some(pages) = bk.transactions.get_mut(&tid) {
                    if let Some(pos) = pages.pinned.iter().rposition(|&p| p == page_id) {
                        pages.pinned.swap_remove(pos);
                    }
                    if first_touch {
                        pages.touched.remove(&page_id);
                    }
                }
                bk.drop_pinner(page_id, tid);
                Err(e)
            }
        }
    }

    /// Releases one pin `tid` holds on `page_id`. A dirty unpin records the
    /// page as written by `tid`.
    pub fn unpin_page(&self, tid: TransactionId, page_id: PageId, is_dirty: bool) -> Result<()> {
        {
            let mut bk = self.bookkeeping.lock();
            let pages = bk
                .transactions
                .get_mut(&tid)
                .ok_or(StrataError::PageNotPinnedBy { tid, page_id })?;
            let pos = pages
                .pinned
                .iter()
                .position(|&p| p == page_id)
                .ok_or(StrataError::PageNotPinnedBy { tid, page_id })?;
            pages.pinned.swap_remove(pos);
            if is_dirty {
                pages.written.insert(page_id);
            }
            bk.drop_pinner(page_id, tid);
        }

        self.buffer_manager.unpin_page(page_id, is_dirty)
    }

    pub fn allocate_page(&self, page_id: PageId) -> Result<()> {
        self.buffer_manager.allocate_page(page_id)
    }

    pub fn num_pages(&self, table_id: TableId) -> Result<u32> {
        self.buffer_manager.num_pages(table_id)
    }

    pub fn page_size(&self) -> usize {
        self.buffer_manager.page_size()
    }

    /// Ends `tid`: drops its remaining pins, flushes or discards the pages it
    /// wrote, then releases all of its locks.
    ///
    /// Locks are released even when a flush fails; the first flush error is
    /// returned afterwards.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let pages = {
            let mut bk = self.bookkeeping.lock();
            let pages = bk.transactions.remove(&tid).unwrap_or_default();
            for &page_id in &pages.pinned {
                bk.drop_pinner(page_id, tid);
            }
            pages
        };

        let mut written = pages.written;
        for &page_id in &pages.pinned {
            if self.buffer_manager.is_dirty(page_id) {
                written.insert(page_id);
            }
            if let Err(e) = self.buffer_manager.unpin_page(page_id, false) {
                warn!("{} could not release its pin on {}: {}", tid, page_id, e);
            }
        }

        let mut written: Vec<PageId> = written.into_iter().collect();
        written.sort();

        let force = self.is_force();
        let mut result = Ok(());
        for &page_id in &written {
            if !self.buffer_manager.in_buffer_pool(page_id) {
                continue;
            }
            if !commit {
                if self.buffer_manager.is_dirty(page_id) {
                    self.buffer_manager.discard_page(page_id);
                }
                continue;
            }

            if force {
                if let Err(e) = self.buffer_manager.flush_page(page_id) {
                    warn!("{} failed to flush {} at commit: {}", tid, page_id, e);
                    if result.is_ok() {
                        result = Err(e);
                    }
                    continue;
                }
            }
            // Committed contents become the new before-image
            if let Ok(handle) = self.buffer_manager.get_page(page_id) {
                if let Err(e) = handle.write().set_before_image() {
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }

        let released = self.lock_manager.release_all_locks(tid);
        debug!(
            "{} {}: {} pages written, {} locks released",
            tid,
            if commit { "committed" } else { "aborted" },
            written.len(),
            released.len()
        );
        result
    }

    pub fn commit_transaction(&self, tid: TransactionId) -> Result<()> {
        self.transaction_complete(tid, true)
    }

    pub fn abort_transaction(&self, tid: TransactionId) -> Result<()> {
        self.transaction_complete(tid, false)
    }

    /// Selects the durability policy. Force flushes at commit and forbids dirty
    /// eviction; no-force leaves committed pages dirty and lets eviction write
    /// them.
    pub fn set_force(&self, force: bool) {
        self.force.store(force, Ordering::SeqCst);
        self.buffer_manager.set_evict_dirty(!force);
    }

    pub fn is_force(&self) -> bool {
        self.force.load(Ordering::SeqCst)
    }

    /// Pages `tid` currently pins, one entry per pin, in page order.
    pub fn pinned_pages(&self, tid: TransactionId) -> Vec<PageId> {
        let bk = self.bookkeeping.lock();
        let mut pages = bk
            .transactions
            .get(&tid)
            .map(|pages| pages.pinned.clone())
            .unwrap_or_default();
        pages.sort();
        pages
    }

    /// Pages `tid` has pinned at any point since it started, in page order.
    pub fn touched_pages(&self, tid: TransactionId) -> Vec<PageId> {
        let bk = self.bookkeeping.lock();
        let mut pages: Vec<PageId> = bk
            .transactions
            .get(&tid)
            .map(|pages| pages.touched.iter().copied().collect())
            .unwrap_or_default();
        pages.sort();
        pages
    }

    /// Transactions currently pinning `page_id`, without duplicates.
    pub fn pinning_transactions(&self, page_id: PageId) -> Vec<TransactionId> {
        let bk = self.bookkeeping.lock();
        let mut tids = bk.pinners.get(&page_id).cloned().unwrap_or_default();
        tids.sort();
        tids.dedup();
        tids
    }
}
