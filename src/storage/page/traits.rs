use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::common::{PageId, Result};

/// A cached page as the buffer manager sees it: identity and serialization.
///
/// Everything else a page can do is reached through the concrete type the
/// buffer manager is instantiated with.
pub trait Page: Send + Sync + 'static {
    fn id(&self) -> PageId;

    /// Encodes the page to exactly `page_size` bytes.
    fn page_data(&self) -> Result<Bytes>;

    /// Rebuilds the page as it was when the before-image was last taken.
    fn before_image(&self) -> Result<Self>
    where
        Self: Sized;

    /// Snapshots the current contents as the new before-image.
    fn set_before_image(&mut self) -> Result<()>;
}

/// Builds pages from raw bytes on a buffer-pool miss.
pub trait PageMaker: Send + Sync {
    type Page: Page;

    /// Decodes `data` (exactly `page_size()` bytes) into a page with id `page_id`.
    fn make_page(&self, page_id: PageId, data: &[u8]) -> Result<Self::Page>;

    /// A page with no contents, as a freshly allocated page would decode.
    fn empty_page(&self, page_id: PageId) -> Result<Self::Page>;

    fn page_size(&self) -> usize;
}

/// Shared handle to a pinned page. Valid from pin until the matching unpin.
pub type PageHandle<P> = Arc<RwLock<P>>;
