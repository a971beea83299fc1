use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Condvar;

use super::{LockMode, TransactionId};

/// A pending lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    pub tid: TransactionId,
    pub mode: LockMode,
}

/// Lock state of one page: who holds it, in which mode, and who is waiting.
///
/// Exclusive mode has exactly one holder; no holders means no mode.
#[derive(Debug)]
pub struct LockTableEntry {
    /// Granted mode, None while nobody holds the lock
    mode: Option<LockMode>,
    holders: HashSet<TransactionId>,
    /// Pending requests; the head is the next candidate for a grant
    requests: VecDeque<LockRequest>,
    /// Waiters on this page park here
    cv: Arc<Condvar>,
}

impl LockTableEntry {
    pub fn new() -> Self {
        Self {
            mode: None,
            holders: HashSet::new(),
            requests: VecDeque::new(),
            cv: Arc::new(Condvar::new()),
        }
    }

    pub fn mode(&self) -> Option<LockMode> {
        self.mode
    }

    pub fn holders(&self) -> impl Iterator<Item = &TransactionId> {
        self.holders.iter()
    }

    pub fn requests(&self) -> impl Iterator<Item = &LockRequest> {
        self.requests.iter()
    }

    pub(crate) fn condvar(&self) -> Arc<Condvar> {
        Arc::clone(&self.cv)
    }

    /// Whether `tid` holds the lock in `mode` or a stronger one.
    pub fn holds(&self, tid: TransactionId, mode: LockMode) -> bool {
        self.holders.contains(&tid) && self.mode.map_or(false, |held| held.satisfies(mode))
    }

    pub fn is_held_by(&self, tid: TransactionId) -> bool {
        self.holders.contains(&tid)
    }

    /// Queues a request. An upgrade from a current holder goes to the front.
    pub fn enqueue(&mut self, tid: TransactionId, mode: LockMode) {
        let request = LockRequest { tid, mode };
        if mode == LockMode::Exclusive && self.holders.contains(&tid) {
            self.requests.push_front(request);
        } else {
            self.requests.push_back(request);
        }
    }

    /// Grants requests from the head of the queue for as long as they are
    /// grantable, waking waiters if anything was granted.
    pub fn grant_pending(&mut self) -> bool {
        let mut granted_any = false;

        while let Some(&request) = self.requests.front() {
            let upgrade = request.mode == LockMode::Exclusive
                && self.holders.len() == 1
                && self.holders.contains(&request.tid);
            let grantable = upgrade
                || self.holders.is_empty()
                || (self.mode == Some(LockMode::Shared) && request.mode == LockMode::Shared);
            if !grantable {
                break;
            }

            self.requests.pop_front();
            self.holders.insert(request.tid);
            self.mode = Some(request.mode);
            granted_any = true;
        }

        if granted_any {
            self.cv.notify_all();
        }
        granted_any
    }

    /// Drops `tid` from the holders and re-evaluates the queue.
    /// Returns false if `tid` was not a holder.
    pub fn release(&mut self, tid: TransactionId) -> bool {
        if !self.holders.remove(&tid) {
            return false;
        }
        if self.holders.is_empty() {
            self.mode = None;
        }
        self.grant_pending();
        self.cv.notify_all();
        true
    }

    /// Withdraws a pending request so it can never be granted.
    pub fn cancel_request(&mut self, tid: TransactionId, mode: LockMode) {
        if let Some(pos) = self
            .requests
            .iter()
            .position(|r| r.tid == tid && r.mode == mode)
        {
            self.requests.remove(pos);
        }
        self.grant_pending();
    }
}

impl Default for LockTableEntry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(n: u64) -> TransactionId {
        TransactionId::from_raw(n)
    }

    #[test]
    fn test_shared_grants_together() {
        let mut entry = LockTableEntry::new();
        entry.enqueue(tid(1), LockMode::Shared);
        entry.enqueue(tid(2), LockMode::Shared);
        assert!(entry.grant_pending());

        assert!(entry.holds(tid(1), LockMode::Shared));
        assert!(entry.holds(tid(2), LockMode::Shared));
        assert_eq!(entry.mode(), Some(LockMode::Shared));
    }

    #[test]
    fn test_fifo_blocks_behind_exclusive() {
        let mut entry = LockTableEntry::new();
        entry.enqueue(tid(1), LockMode::Shared);
        entry.grant_pending();
        entry.enqueue(tid(2), LockMode::Exclusive);
        entry.enqueue(tid(3), LockMode::Shared);
        entry.grant_pending();

        // tid 3 is compatible with the holder but waits behind tid 2
        assert!(!entry.is_held_by(tid(3)));
        assert_eq!(entry.requests().count(), 2);

        entry.release(tid(1));
        assert!(entry.holds(tid(2), LockMode::Exclusive));
        assert!(!entry.is_held_by(tid(3)));

        entry.release(tid(2));
        assert!(entry.holds(tid(3), LockMode::Shared));
    }

    #[test]
    fn test_upgrade_goes_first() {
        let mut entry = LockTableEntry::new();
        entry.enqueue(tid(1), LockMode::Shared);
        entry.grant_pending();
        entry.enqueue(tid(2), LockMode::Exclusive);
        entry.enqueue(tid(1), LockMode::Exclusive);

        let head = entry.requests().next().copied();
        assert_eq!(
            head,
            Some(LockRequest {
                tid: tid(1),
                mode: LockMode::Exclusive
            })
        );

        entry.grant_pending();
        assert!(entry.holds(tid(1), LockMode::Exclusive));
        assert_eq!(entry.holders().count(), 1);
    }

    #[test]
    fn test_release_clears_mode() {
        let mut entry = LockTableEntry::new();
        entry.enqueue(tid(1), LockMode::Exclusive);
        entry.grant_pending();

        assert!(entry.release(tid(1)));
        assert_eq!(entry.mode(), None);
        assert!(!entry.release(tid(1)));
    }

    #[test]
    fn test_cancel_request() {
        let mut entry = LockTableEntry::new();
        entry.enqueue(tid(1), LockMode::Exclusive);
        entry.grant_pending();
        entry.enqueue(tid(2), LockMode::Exclusive);
        entry.enqueue(tid(3), LockMode::Shared);

        entry.cancel_request(tid(2), LockMode::Exclusive);
        assert_eq!(entry.requests().count(), 1);

        entry.release(tid(1));
        assert!(entry.holds(tid(3), LockMode::Shared));
        assert!(!entry.is_held_by(tid(2)));
    }
}
