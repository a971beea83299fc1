use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::common::{PageId, RecordId, Result, StrataError, TableId};
use crate::storage::page::{SlottedPage, SlottedPageMaker};
use crate::transaction::{LockMode, TransactionId};
use crate::tuple::{Schema, Tuple};

use super::AccessManager;

/// Unordered collection of tuples of one table, stored in slotted pages
/// `0..num_pages` of that table.
///
/// Every page access goes through the access manager: shared locks for reads,
/// exclusive locks for writes, held until the transaction completes.
pub struct HeapFile {
    table_id: TableId,
    page_maker: SlottedPageMaker,
    access_manager: Arc<AccessManager<SlottedPage>>,
    /// Pages on disk; grows under this lock
    num_pages: Mutex<u32>,
}

impl HeapFile {
    pub fn new(
        table_id: TableId,
        schema: Arc<Schema>,
        access_manager: Arc<AccessManager<SlottedPage>>,
    ) -> Result<Self> {
        let page_maker = SlottedPageMaker::new(schema, access_manager.page_size())?;
        let num_pages = access_manager.num_pages(table_id)?;
        debug!("opened heap file for table {} with {} pages", table_id, num_pages);
        Ok(Self {
            table_id,
            page_maker,
            access_manager,
            num_pages: Mutex::new(num_pages),
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.page_maker.schema()
    }

    pub fn num_pages(&self) -> u32 {
        *self.num_pages.lock()
    }

    pub fn access_manager(&self) -> &Arc<AccessManager<SlottedPage>> {
        &self.access_manager
    }

    /// Inserts `tuple` into the first page with a free slot, growing the file
    /// if every page is full. Sets and returns the tuple's record id.
    pub fn insert_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> Result<RecordId> {
        loop {
            let page_id = match self.find_free_page(tid)? {
                Some(page_id) => page_id,
                None => self.grow()?,
            };

            self.access_manager
                .acquire_lock(tid, page_id, LockMode::Exclusive)?;
            let handle = self.access_manager.pin_page(tid, page_id, &self.page_maker)?;
            let result = handle.write().insert_tuple(tuple);
            self.access_manager
                .unpin_page(tid, page_id, result.is_ok())?;

            match result {
                // Filled by someone else between the probe and the exclusive lock
                Err(StrataError::PageFull) => continue,
                Ok(record_id) => {
                    trace!("{} inserted {}", tid, record_id);
                    return Ok(record_id);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Removes `tuple` from its page and clears its record id.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(StrataError::MissingRecordId)?;
        if record_id.page_id.table_id() != self.table_id {
            return Err(StrataError::RecordNotInTable {
                record_id,
                table_id: self.table_id,
            });
        }
        let page_id = record_id.page_id;

        self.access_manager
            .acquire_lock(tid, page_id, LockMode::Exclusive)?;
        let handle = self.access_manager.pin_page(tid, page_id, &self.page_maker)?;
        let result = handle.write().delete_tuple(tuple);
        self.access_manager
            .unpin_page(tid, page_id, result.is_ok())?;
        if result.is_ok() {
            trace!("{} deleted {}", tid, record_id);
        }
        result
    }

    /// Iterates over every tuple of the table, page by page.
    pub fn scan(&self, tid: TransactionId) -> HeapFileIter<'_> {
        HeapFileIter {
            heap_file: self,
            tid,
            next_page: 0,
            num_pages: self.num_pages(),
            buffered: Vec::new().into_iter(),
            done: false,
        }
    }

    /// Probes each page for a free slot. Probe locks are shared and are given
    /// back unless `tid` already held one.
    fn find_free_page(&self, tid: TransactionId) -> Result<Option<PageId>> {
        let num_pages = self.num_pages();
        for page_number in 0..num_pages {
            let page_id = PageId::new(self.table_id, page_number);
            let held = self
                .access_manager
                .holds_lock(tid, page_id, LockMode::Shared);
            if !held {
                self.access_manager
                    .acquire_lock(tid, page_id, LockMode::Shared)?;
            }

            let handle = self.access_manager.pin_page(tid, page_id, &self.page_maker)?;
            let empty_slots = handle.read().num_empty_slots();
            self.access_manager.unpin_page(tid, page_id, false)?;

            if !held {
                self.access_manager.release_lock(tid, page_id)?;
            }
            if empty_slots > 0 {
                return Ok(Some(page_id));
            }
        }
        Ok(None)
    }

    fn grow(&self) -> Result<PageId> {
        let mut num_pages = self.num_pages.lock();
        let page_id = PageId::new(self.table_id, *num_pages);
        self.access_manager.allocate_page(page_id)?;
        *num_pages += 1;
        debug!("table {} grew to {} pages", self.table_id, *num_pages);
        Ok(page_id)
    }

    /// Shared-locks and copies out the tuples of one page.
    fn read_page(&self, tid: TransactionId, page_id: PageId) -> Result<Vec<Tuple>> {
        self.access_manager
            .acquire_lock(tid, page_id, LockMode::Shared)?;
        let handle = self.access_manager.pin_page(tid, page_id, &self.page_maker)?;
        let tuples = handle.read().iter().cloned().collect();
        self.access_manager.unpin_page(tid, page_id, false)?;
        Ok(tuples)
    }
}

/// Iterator returned by [`HeapFile::scan`].
///
/// Pages created after the scan started are not visited. The first error ends
/// the iteration.
pub struct HeapFileIter<'a> {
    heap_file: &'a HeapFile,
    tid: TransactionId,
    next_page: u32,
    num_pages: u32,
    buffered: std::vec::IntoIter<Tuple>,
    done: bool,
}

impl Iterator for HeapFileIter<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(tuple) = self.buffered.next() {
                return Some(Ok(tuple));
            }
            if self.next_page >= self.num_pages {
                self.done = true;
                return None;
            }

            let page_id = PageId::new(self.heap_file.table_id, self.next_page);
            self.next_page += 1;
            match self.heap_file.read_page(self.tid, page_id) {
                Ok(tuples) => self.buffered = tuples.into_iter(),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
