use thiserror::Error;

use super::types::{PageId, RecordId, TableId};
use crate::transaction::TransactionId;

/// Coarse classification of a [`StrataError`].
///
/// Every error falls into exactly one of these; none of them is retried inside
/// the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No evictable frame was found for a pin miss
    CacheExhausted,
    /// Pin/unpin/lock bookkeeping was used inconsistently by the caller
    InvalidState,
    /// A lock wait exceeded its deadline; the transaction must abort
    Deadlock,
    /// Page bytes or a tuple did not match the expected format
    Format,
    /// The disk collaborator failed
    Io,
}

/// Storage engine error types
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("Page {0} is not in the buffer pool")]
    PageNotCached(PageId),

    #[error("Page {0} is not pinned")]
    PageNotPinned(PageId),

    #[error("Page {page_id} is not pinned by {tid}")]
    PageNotPinnedBy { tid: TransactionId, page_id: PageId },

    #[error("{tid} holds no lock on {page_id}")]
    LockNotHeld { tid: TransactionId, page_id: PageId },

    #[error("Deadlock suspected: {tid} timed out waiting for a lock on {page_id}")]
    Deadlock { tid: TransactionId, page_id: PageId },

    #[error("Tuple schema does not match the page schema")]
    SchemaMismatch,

    #[error("Value {value} does not fit column type {data_type}")]
    ValueTypeMismatch { value: String, data_type: String },

    #[error("Slot {0} is already occupied")]
    SlotOccupied(u16),

    #[error("Slot {0} is empty")]
    EmptySlot(u16),

    #[error("Invalid slot ID: {0}")]
    InvalidSlotId(u16),

    #[error("Page is full")]
    PageFull,

    #[error("Tuple has no record id")]
    MissingRecordId,

    #[error("Tuple belongs to {actual}, not {expected}")]
    RecordNotOnPage { expected: PageId, actual: PageId },

    #[error("Record {record_id} is not in table {table_id}")]
    RecordNotInTable { record_id: RecordId, table_id: TableId },

    #[error("Unsupported layout: {capacity} slots of {tuple_size} bytes in {page_size}")]
    UnsupportedLayout {
        page_size: usize,
        tuple_size: usize,
        capacity: usize,
    },

    #[error("Page data is {actual} bytes, expected {expected}")]
    PageSizeMismatch { expected: usize, actual: usize },

    #[error("Malformed page: {0}")]
    Malformed(String),
}

impl StrataError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StrataError::Io(_) | StrataError::DiskScheduler(_) => ErrorKind::Io,
            StrataError::BufferPoolFull => ErrorKind::CacheExhausted,
            StrataError::PageNotCached(_)
            | StrataError::PageNotPinned(_)
            | StrataError::PageNotPinnedBy { .. }
            | StrataError::LockNotHeld { .. } => ErrorKind::InvalidState,
            StrataError::Deadlock { .. } => ErrorKind::Deadlock,
            StrataError::SchemaMismatch
            | StrataError::ValueTypeMismatch { .. }
            | StrataError::SlotOccupied(_)
            | StrataError::EmptySlot(_)
            | StrataError::InvalidSlotId(_)
            | StrataError::PageFull
            | StrataError::MissingRecordId
            | StrataError::RecordNotOnPage { .. }
            | StrataError::RecordNotInTable { .. }
            | StrataError::UnsupportedLayout { .. }
            | StrataError::PageSizeMismatch { .. }
            | StrataError::Malformed(_) => ErrorKind::Format,
        }
    }

    /// True when the caller is expected to abort its transaction.
    pub fn is_deadlock(&self) -> bool {
        self.kind() == ErrorKind::Deadlock
    }
}

pub type Result<T> = std::result::Result<T, StrataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let page_id = PageId::new(1, 2);
        let tid = TransactionId::from_raw(7);

        assert_eq!(StrataError::BufferPoolFull.kind(), ErrorKind::CacheExhausted);
        assert_eq!(
            StrataError::PageNotPinned(page_id).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            StrataError::LockNotHeld { tid, page_id }.kind(),
            ErrorKind::InvalidState
        );
        assert!(StrataError::Deadlock { tid, page_id }.is_deadlock());
        assert_eq!(StrataError::PageFull.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_error_display() {
        let err = StrataError::Deadlock {
            tid: TransactionId::from_raw(3),
            page_id: PageId::new(0, 9),
        };
        assert_eq!(
            err.to_string(),
            "Deadlock suspected: Txn(3) timed out waiting for a lock on PageId(0:9)"
        );
    }
}
