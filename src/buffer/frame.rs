use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{FrameId, PageId};
use crate::storage::page::PageHandle;

/// Frame manages a single slot of the buffer pool: at most one cached page
/// plus the metadata the clock replacer looks at.
///
/// Frames live inside the buffer manager's state mutex, so the fields are
/// plain values.
pub struct Frame<P> {
    /// The frame ID (index in the buffer pool)
    frame_id: FrameId,
    /// The page held by this frame, None if the frame is free
    page: Option<(PageId, PageHandle<P>)>,
    /// Number of outstanding pins
    pin_count: u32,
    /// Whether the page has been modified since it was read or last flushed
    is_dirty: bool,
    /// Clock reference bit, set on every pin hit
    recently_used: bool,
}

impl<P> Frame<P> {
    /// Creates a new, free frame.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page: None,
            pin_count: 0,
            is_dirty: false,
            recently_used: false,
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the page ID stored in this frame.
    pub fn page_id(&self) -> Option<PageId> {
        self.page.as_ref().map(|(page_id, _)| *page_id)
    }

    pub fn page(&self) -> Option<&PageHandle<P>> {
        self.page.as_ref().map(|(_, handle)| handle)
    }

    pub fn is_free(&self) -> bool {
        self.page.is_none()
    }

    /// Places a freshly loaded page in the frame with one pin held.
    pub fn install(&mut self, page_id: PageId, page: P) {
        self.page = Some((page_id, Arc::new(RwLock::new(page))));
        self.pin_count = 1;
        self.is_dirty = false;
        self.recently_used = false;
    }

    /// Returns the current pin count.
    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    /// Increments the pin count and returns the new value.
    pub fn pin(&mut self) -> u32 {
        self.pin_count += 1;
        self.recently_used = true;
        self.pin_count
    }

    /// Decrements the pin count and returns the new value.
    /// Returns None if the pin count was already 0.
    pub fn unpin(&mut self) -> Option<u32> {
        if self.pin_count == 0 {
            return None;
        }
        self.pin_count -= 1;
        Some(self.pin_count)
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    /// Returns whether the page is dirty.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Sets the dirty flag.
    pub fn set_dirty(&mut self, dirty: bool) {
        self.is_dirty = dirty;
    }

    pub fn recently_used(&self) -> bool {
        self.recently_used
    }

    pub fn set_recently_used(&mut self, recently_used: bool) {
        self.recently_used = recently_used;
    }

    /// Empties the frame, dropping the page without writing it.
    pub fn reset(&mut self) {
        self.page = None;
        self.pin_count = 0;
        self.is_dirty = false;
        self.recently_used = false;
    }
}
