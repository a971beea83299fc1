use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{trace, warn};
use parking_lot::Mutex;
use rand::Rng;

use super::{LockMode, LockTableEntry, TransactionId};
use crate::common::{PageId, Result, StrataError, DEFAULT_LOCK_TIMEOUT_MS};

/// Page-level strict two-phase lock manager.
///
/// Requests on one page are granted in FIFO order, except that a holder asking
/// to upgrade to exclusive goes to the front of the queue. Deadlocks are not
/// detected as cycles: a request that waits longer than the timeout (plus a
/// random jitter of up to half the timeout) is withdrawn and reported as a
/// deadlock, and the caller is expected to abort.
pub struct LockManager {
    /// Lock table; entries are created on first use and never removed
    table: Mutex<HashMap<PageId, LockTableEntry>>,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn deadline(&self) -> Instant {
        let max_jitter = self.timeout.as_micros() as u64 / 2;
        let jitter = if max_jitter == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..max_jitter)
        };
        Instant::now() + self.timeout + Duration::from_micros(jitter)
    }

    /// Blocks until `tid` holds `page_id` in `mode` (or stronger).
    ///
    /// Returns `Deadlock` if the wait times out; the request is then gone from
    /// the queue.
    pub fn acquire_lock(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<()> {
        let deadline = self.deadline();
        let mut table = self.table.lock();

        let entry = table.entry(page_id).or_default();
        if entry.holds(tid, mode) {
            return Ok(());
        }
        entry.enqueue(tid, mode);
        entry.grant_pending();
        let cv = entry.condvar();

        loop {
            let entry = table.entry(page_id).or_default();
            if entry.holds(tid, mode) {
                trace!("{} granted {} on {}", tid, mode, page_id);
                return Ok(());
            }

            if cv.wait_until(&mut table, deadline).timed_out() {
                let entry = table.entry(page_id).or_default();
                if entry.holds(tid, mode) {
                    trace!("{} granted {} on {}", tid, mode, page_id);
                    return Ok(());
                }
                entry.cancel_request(tid, mode);
                warn!(
                    "{} timed out waiting for {} on {}; suspecting deadlock",
                    tid, mode, page_id
                );
                return Err(StrataError::Deadlock { tid, page_id });
            }
        }
    }

    /// Whether `tid` holds `page_id` in `mode`. Exclusive satisfies a shared query.
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        self.table
            .lock()
            .get(&page_id)
            .map_or(false, |entry| entry.holds(tid, mode))
    }

    /// Releases the lock `tid` holds on `page_id` and wakes the waiters.
    pub fn release_lock(&self, tid: TransactionId, page_id: PageId) -> Result<()> {
        let mut table = self.table.lock();
        let released = table
            .get_mut(&page_id)
            .map_or(false, |entry| entry.release(tid));
        if !released {
            return Err(StrataError::LockNotHeld { tid, page_id });
        }
        trace!("{} released {}", tid, page_id);
        Ok(())
    }

    /// Releases every lock `tid` holds. Returns the pages that were released.
    pub fn release_all_locks(&self, tid: TransactionId) -> Vec<PageId> {
        let mut table = self.table.lock();
        let mut released: Vec<PageId> = table
            .iter_mut()
            .filter_map(|(page_id, entry)| entry.release(tid).then_some(*page_id))
            .collect();
        released.sort();
        if !released.is_empty() {
            trace!("{} released {} locks", tid, released.len());
        }
        released
    }

    /// Pages on which `tid` currently holds a lock, in page order.
    pub fn pages_locked_by(&self, tid: TransactionId) -> Vec<PageId> {
        let table = self.table.lock();
        let mut pages: Vec<PageId> = table
            .iter()
            .filter(|(_, entry)| entry.is_held_by(tid))
            .map(|(page_id, _)| *page_id)
            .collect();
        pages.sort();
        pages
    }

    /// Transactions involved with `page_id`: the holders, then the queued
    /// requesters in queue order.
    pub fn transactions_on(&self, page_id: PageId) -> Vec<TransactionId> {
        let table = self.table.lock();
        let entry = match table.get(&page_id) {
            Some(entry) => entry,
            None => return Vec::new(),
        };

        let mut tids: Vec<TransactionId> = entry.holders().copied().collect();
        tids.sort();
        for request in entry.requests() {
            if !tids.contains(&request.tid) {
                tids.push(request.tid);
            }
        }
        tids
    }

    /// Mode `page_id` is currently granted in, None if unheld.
    pub fn lock_mode(&self, page_id: PageId) -> Option<LockMode> {
        self.table.lock().get(&page_id).and_then(|entry| entry.mode())
    }

    /// Number of requests waiting on `page_id`.
    pub fn queued_requests(&self, page_id: PageId) -> usize {
        self.table
            .lock()
            .get(&page_id)
            .map_or(0, |entry| entry.requests().count())
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS))
    }
}
