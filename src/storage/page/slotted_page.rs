use std::sync::Arc;

use bytes::Bytes;

use super::slotted_page_format::{bytes_to_page, checked_page_capacity, page_to_bytes};
use super::{Page, PageMaker};
use crate::common::{PageId, RecordId, Result, SlotId, StrataError};
use crate::tuple::{Schema, Tuple};

/// Slotted page with fixed-size tuples.
///
/// The slot count is fixed at construction from the page size and the schema's
/// tuple size, and is always in `1..=MAX_SLOTS_PER_PAGE` so every slot index
/// fits a [`SlotId`]. A tuple in slot `i` carries the record id `(page_id, i)`.
/// See [`slotted_page_format`](super::slotted_page_format) for the byte layout.
#[derive(Debug, Clone)]
pub struct SlottedPage {
    page_id: PageId,
    schema: Arc<Schema>,
    page_size: usize,
    slots: Vec<Option<Tuple>>,
    /// Encoded page as of the last `set_before_image`
    before_image: Bytes,
}

impl SlottedPage {
    /// Creates an empty page. Fails if the schema's tuples leave the page with
    /// no slot or with more slots than a slot id can address.
    pub fn new(page_id: PageId, schema: Arc<Schema>, page_size: usize) -> Result<Self> {
        let capacity = checked_page_capacity(page_size, schema.tuple_size())?;
        Ok(Self {
            page_id,
            schema,
            page_size,
            slots: vec![None; capacity],
            // An empty page encodes to all zeros
            before_image: Bytes::from(vec![0u8; page_size]),
        })
    }

    /// Decodes a page from its on-disk bytes and takes them as the before-image.
    pub fn from_bytes(
        page_id: PageId,
        schema: Arc<Schema>,
        page_size: usize,
        data: &[u8],
    ) -> Result<Self> {
        let mut page = bytes_to_page(page_id, schema, page_size, data)?;
        page.before_image = Bytes::copy_from_slice(data);
        Ok(page)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn num_empty_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    /// Returns false for out-of-range slots.
    pub fn is_slot_used(&self, slot: SlotId) -> bool {
        matches!(self.slots.get(slot.as_usize()), Some(Some(_)))
    }

    pub fn is_slot_empty(&self, slot: SlotId) -> bool {
        !self.is_slot_used(slot)
    }

    /// Returns the tuple stored in `slot`.
    pub fn tuple(&self, slot: SlotId) -> Result<&Tuple> {
        match self.slots.get(slot.as_usize()) {
            None => Err(StrataError::InvalidSlotId(slot.as_u16())),
            Some(None) => Err(StrataError::EmptySlot(slot.as_u16())),
            Some(Some(tuple)) => Ok(tuple),
        }
    }

    /// Stores a copy of `tuple` in `slot` and sets the tuple's record id.
    pub fn insert_tuple_at(&mut self, slot: SlotId, tuple: &mut Tuple) -> Result<RecordId> {
        match self.slots.get(slot.as_usize()) {
            None => return Err(StrataError::InvalidSlotId(slot.as_u16())),
            Some(Some(_)) => return Err(StrataError::SlotOccupied(slot.as_u16())),
            Some(None) => {}
        }
        if **tuple.schema() != *self.schema {
            return Err(StrataError::SchemaMismatch);
        }

        let record_id = RecordId::new(self.page_id, slot);
        tuple.set_record_id(record_id);
        self.slots[slot.as_usize()] = Some(tuple.clone());
        Ok(record_id)
    }

    /// Stores `tuple` in the lowest-numbered empty slot.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<RecordId> {
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(StrataError::PageFull)?;
        // Capacity never exceeds MAX_SLOTS_PER_PAGE, so the index fits
        self.insert_tuple_at(SlotId::new(slot as u16), tuple)
    }

    /// Removes `tuple` from the slot its record id names and clears the record id.
    pub fn delete_tuple(&mut self, tuple: &mut Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(StrataError::MissingRecordId)?;
        if record_id.page_id != self.page_id {
            return Err(StrataError::RecordNotOnPage {
                expected: self.page_id,
                actual: record_id.page_id,
            });
        }

        let slot = record_id.slot_id;
        match self.slots.get_mut(slot.as_usize()) {
            None => Err(StrataError::InvalidSlotId(slot.as_u16())),
            Some(None) => Err(StrataError::EmptySlot(slot.as_u16())),
            Some(entry) => {
                *entry = None;
                tuple.clear_record_id();
                Ok(())
            }
        }
    }

    /// Occupied tuples in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.slots.iter().flatten()
    }

    /// Installs a decoded tuple without the insert checks.
    pub(super) fn place(&mut self, slot: SlotId, tuple: Tuple) {
        self.slots[slot.as_usize()] = Some(tuple);
    }
}

impl Page for SlottedPage {
    fn id(&self) -> PageId {
        self.page_id
    }

    fn page_data(&self) -> Result<Bytes> {
        page_to_bytes(self)
    }

    fn before_image(&self) -> Result<Self> {
        Self::from_bytes(
            self.page_id,
            self.schema.clone(),
            self.page_size,
            &self.before_image,
        )
    }

    fn set_before_image(&mut self) -> Result<()> {
        self.before_image = self.page_data()?;
        Ok(())
    }
}

/// Builds [`SlottedPage`]s of one schema and page size.
#[derive(Debug, Clone)]
pub struct SlottedPageMaker {
    schema: Arc<Schema>,
    page_size: usize,
}

impl SlottedPageMaker {
    /// Fails if pages of this size cannot hold between one and
    /// `MAX_SLOTS_PER_PAGE` tuples of the schema.
    pub fn new(schema: Arc<Schema>, page_size: usize) -> Result<Self> {
        checked_page_capacity(page_size, schema.tuple_size())?;
        Ok(Self { schema, page_size })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

impl PageMaker for SlottedPageMaker {
    type Page = SlottedPage;

    fn make_page(&self, page_id: PageId, data: &[u8]) -> Result<SlottedPage> {
        SlottedPage::from_bytes(page_id, self.schema.clone(), self.page_size, data)
    }

    fn empty_page(&self, page_id: PageId) -> Result<SlottedPage> {
        SlottedPage::new(page_id, self.schema.clone(), self.page_size)
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}
