use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use log::debug;
use parking_lot::Mutex;

use crate::common::{PageId, Result, StrataError, TableId};

/// Whole-page synchronous storage underneath the buffer manager.
///
/// Page `n` of table `t` is the `n`th `page_size()` chunk of that table's
/// storage. Reading a page that was never written yields zeros.
pub trait DiskManager: Send + Sync {
    fn page_size(&self) -> usize;

    /// Reads page `page_id` into `data`, which must be `page_size()` bytes.
    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()>;

    /// Writes `data`, which must be `page_size()` bytes, as page `page_id`.
    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Makes `page_id` exist on disk, zero-filled.
    fn allocate_page(&self, page_id: PageId) -> Result<()>;

    /// Number of pages the table's storage currently spans.
    fn num_pages(&self, table_id: TableId) -> Result<u32>;
}

pub(crate) fn check_page_len(page_size: usize, actual: usize) -> Result<()> {
    if actual != page_size {
        return Err(StrataError::PageSizeMismatch {
            expected: page_size,
            actual,
        });
    }
    Ok(())
}

/// DiskManager backed by one heap file per table, `table_<id>.dat` in a
/// directory.
pub struct FileDiskManager {
    /// Directory holding the table files
    dir: PathBuf,
    page_size: usize,
    /// Open table files, opened on first use
    files: Mutex<HashMap<TableId, File>>,
    /// Number of disk reads performed
    num_reads: AtomicU32,
    /// Number of disk writes performed
    num_writes: AtomicU32,
}

impl FileDiskManager {
    /// Creates a disk manager over `dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P, page_size: usize) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;

        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            page_size,
            files: Mutex::new(HashMap::new()),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    /// Path of the heap file for `table_id`.
    pub fn table_path(&self, table_id: TableId) -> PathBuf {
        self.dir.join(format!("table_{}.dat", table_id))
    }

    fn with_file<T>(&self, table_id: TableId, f: impl FnOnce(&mut File) -> Result<T>) -> Result<T> {
        let mut files = self.files.lock();
        let file = match files.entry(table_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let path = self.table_path(table_id);
                debug!("opening heap file {}", path.display());
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(path)?;
                entry.insert(file)
            }
        };
        f(file)
    }

    fn offset(&self, page_id: PageId) -> u64 {
        page_id.page_number() as u64 * self.page_size as u64
    }

    /// Returns the number of disk reads performed.
    pub fn get_num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of disk writes performed.
    pub fn get_num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Flushes every open table file to stable storage.
    pub fn sync(&self) -> Result<()> {
        for file in self.files.lock().values() {
            file.sync_all()?;
        }
        Ok(())
    }
}

impl DiskManager for FileDiskManager {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        check_page_len(self.page_size, data.len())?;
        let offset = self.offset(page_id);

        self.with_file(page_id.table_id(), |file| {
            file.seek(SeekFrom::Start(offset))?;

            // Reading beyond the end of the file yields zeros
            let mut filled = 0;
            while filled < data.len() {
                let n = file.read(&mut data[filled..])?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            data[filled..].fill(0);
            Ok(())
        })?;

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        check_page_len(self.page_size, data.len())?;
        let offset = self.offset(page_id);

        self.with_file(page_id.table_id(), |file| {
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(data)?;
            file.flush()?;
            Ok(())
        })?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn allocate_page(&self, page_id: PageId) -> Result<()> {
        let zeros = vec![0u8; self.page_size];
        self.write_page(page_id, &zeros)
    }

    fn num_pages(&self, table_id: TableId) -> Result<u32> {
        let len = self.with_file(table_id, |file| Ok(file.metadata()?.len()))?;
        Ok((len / self.page_size as u64) as u32)
    }
}

impl Drop for FileDiskManager {
    fn drop(&mut self) {
        // Ensure all data is flushed to disk
        for file in self.files.get_mut().values() {
            let _ = file.sync_all();
        }
    }
}
