use std::collections::HashMap;

use parking_lot::Mutex;

use super::disk_manager::{check_page_len, DiskManager};
use crate::common::{PageId, Result, TableId};

#[derive(Default)]
struct MemoryState {
    pages: HashMap<PageId, Vec<u8>>,
    num_pages: HashMap<TableId, u32>,
    /// Every page written, in order
    write_log: Vec<PageId>,
}

impl MemoryState {
    fn grow(&mut self, page_id: PageId) {
        let n = self.num_pages.entry(page_id.table_id()).or_insert(0);
        *n = (*n).max(page_id.page_number() + 1);
    }
}

/// DiskManager that keeps pages in memory and records every write.
pub struct MemoryDiskManager {
    page_size: usize,
    state: Mutex<MemoryState>,
}

impl MemoryDiskManager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Total number of page writes, allocations excluded.
    pub fn write_count(&self) -> usize {
        self.state.lock().write_log.len()
    }

    /// Number of times `page_id` was written.
    pub fn writes_to(&self, page_id: PageId) -> usize {
        self.state
            .lock()
            .write_log
            .iter()
            .filter(|p| **p == page_id)
            .count()
    }

    pub fn write_log(&self) -> Vec<PageId> {
        self.state.lock().write_log.clone()
    }

    /// Current on-"disk" bytes of a page, if it was ever written or allocated.
    pub fn page_bytes(&self, page_id: PageId) -> Option<Vec<u8>> {
        self.state.lock().pages.get(&page_id).cloned()
    }
}

impl DiskManager for MemoryDiskManager {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        check_page_len(self.page_size, data.len())?;
        match self.state.lock().pages.get(&page_id) {
            Some(bytes) => data.copy_from_slice(bytes),
            None => data.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        check_page_len(self.page_size, data.len())?;
        let mut state = self.state.lock();
        state.pages.insert(page_id, data.to_vec());
        state.grow(page_id);
        state.write_log.push(page_id);
        Ok(())
    }

    fn allocate_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();
        state
            .pages
            .insert(page_id, vec![0u8; self.page_size]);
        state.grow(page_id);
        Ok(())
    }

    fn num_pages(&self, table_id: TableId) -> Result<u32> {
        Ok(self
            .state
            .lock()
            .num_pages
            .get(&table_id)
            .copied()
            .unwrap_or(0))
    }
}
