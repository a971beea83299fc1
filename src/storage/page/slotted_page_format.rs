//! Byte format of a slotted page.
//!
//! ```text
//! +----------------------+------------------------------+-----------+
//! | Header               | Slots                        | Padding   |
//! | ceil(capacity/8) B   | capacity * tuple_size bytes  | zeros     |
//! +----------------------+------------------------------+-----------+
//! ```
//!
//! Header bit `i` lives in byte `i / 8` with value `1 << (i % 8)` and is set when
//! slot `i` holds a tuple. Empty slots are all zeros.

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::SlottedPage;
use crate::common::{PageId, RecordId, Result, SlotId, StrataError};
use crate::tuple::{Schema, Tuple};

/// Largest slot count a page may have; slot ids are u16.
pub const MAX_SLOTS_PER_PAGE: usize = u16::MAX as usize + 1;

/// Number of tuple slots that fit in a page: every slot costs `tuple_size`
/// bytes plus one header bit.
pub fn compute_page_capacity(page_size: usize, tuple_size: usize) -> usize {
    (page_size * 8) / (tuple_size * 8 + 1)
}

/// Like [`compute_page_capacity`], but fails for layouts with no slot at all
/// or more slots than a [`SlotId`] can address.
pub fn checked_page_capacity(page_size: usize, tuple_size: usize) -> Result<usize> {
    let capacity = compute_page_capacity(page_size, tuple_size);
    if capacity == 0 || capacity > MAX_SLOTS_PER_PAGE {
        return Err(StrataError::UnsupportedLayout {
            page_size,
            tuple_size,
            capacity,
        });
    }
    Ok(capacity)
}

/// Number of header bytes needed for `num_slots` occupancy bits.
pub fn header_size(num_slots: usize) -> usize {
    (num_slots + 7) / 8
}

pub fn is_slot_used(slot: usize, header: &[u8]) -> bool {
    header
        .get(slot / 8)
        .map_or(false, |byte| byte & (1 << (slot % 8)) != 0)
}

pub fn mark_slot(slot: usize, header: &mut [u8], used: bool) {
    let mask = 1u8 << (slot % 8);
    if used {
        header[slot / 8] |= mask;
    } else {
        header[slot / 8] &= !mask;
    }
}

/// Encodes `page` to exactly `page.page_size()` bytes.
pub fn page_to_bytes(page: &SlottedPage) -> Result<Bytes> {
    let page_size = page.page_size();
    let num_slots = page.num_slots();
    let tuple_size = page.schema().tuple_size();

    let mut header = vec![0u8; header_size(num_slots)];
    for slot in 0..num_slots {
        if page.is_slot_used(SlotId::new(slot as u16)) {
            mark_slot(slot, &mut header, true);
        }
    }

    let mut buf = BytesMut::with_capacity(page_size);
    buf.put_slice(&header);
    for slot in 0..num_slots {
        match page.tuple(SlotId::new(slot as u16)) {
            Ok(tuple) => tuple.write_to(&mut buf)?,
            Err(_) => buf.put_bytes(0, tuple_size),
        }
    }

    if buf.len() > page_size {
        return Err(StrataError::PageSizeMismatch {
            expected: page_size,
            actual: buf.len(),
        });
    }
    buf.put_bytes(0, page_size - buf.len());

    Ok(buf.freeze())
}

/// Decodes a page previously produced by [`page_to_bytes`].
pub fn bytes_to_page(
    page_id: PageId,
    schema: Arc<Schema>,
    page_size: usize,
    data: &[u8],
) -> Result<SlottedPage> {
    if data.len() != page_size {
        return Err(StrataError::PageSizeMismatch {
            expected: page_size,
            actual: data.len(),
        });
    }

    let mut page = SlottedPage::new(page_id, schema.clone(), page_size)?;
    let num_slots = page.num_slots();
    let tuple_size = schema.tuple_size();

    let (header, mut cursor) = data.split_at(header_size(num_slots));
    for bit in num_slots..header.len() * 8 {
        if is_slot_used(bit, header) {
            return Err(StrataError::Malformed(format!(
                "header bit {} set beyond capacity {}",
                bit, num_slots
            )));
        }
    }

    for slot in 0..num_slots {
        if is_slot_used(slot, header) {
            let mut tuple = Tuple::read_from(schema.clone(), &mut cursor)?;
            let slot_id = SlotId::new(slot as u16);
            tuple.set_record_id(RecordId::new(page_id, slot_id));
            page.place(slot_id, tuple);
        } else {
            if cursor[..tuple_size].iter().any(|b| *b != 0) {
                return Err(StrataError::Malformed(format!(
                    "empty slot {} of {} has a non-zero payload",
                    slot, page_id
                )));
            }
            cursor.advance(tuple_size);
        }
    }

    Ok(page)
}
