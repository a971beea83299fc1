//! Integration tests for the slotted page format

use std::sync::Arc;

use strata::common::{ErrorKind, PageId, SlotId, StrataError};
use strata::storage::page::slotted_page_format::{
    bytes_to_page, compute_page_capacity, header_size, is_slot_used, MAX_SLOTS_PER_PAGE,
};
use strata::storage::page::{Page, PageMaker, SlottedPage, SlottedPageMaker};
use strata::tuple::{DataType, Schema, Tuple, TupleBuilder, Value};

fn wide_schema() -> Arc<Schema> {
    Schema::builder()
        .column("flag", DataType::Boolean)
        .column("tiny", DataType::TinyInt)
        .column("small", DataType::SmallInt)
        .column("id", DataType::Integer)
        .column("big", DataType::BigInt)
        .column("ratio", DataType::Float)
        .column("score", DataType::Double)
        .column("name", DataType::Char(12))
        .column("created", DataType::Timestamp)
        .build_arc()
}

fn wide_tuple(schema: &Arc<Schema>, i: i32) -> Tuple {
    TupleBuilder::new(schema.clone())
        .value(i % 2 == 0)
        .value(i as i8)
        .value(-(i as i16))
        .value(i)
        .value(i as i64 * 1_000_000_007)
        .value(i as f32 / 4.0)
        .value(i as f64 * 0.5)
        .value(format!("row-{}", i))
        .value(Value::Timestamp(1_700_000_000_000_000 + i as i64))
        .build()
        .unwrap()
}

#[test]
fn test_round_trip_all_types() {
    let schema = wide_schema();
    let page_id = PageId::new(3, 7);
    let mut page = SlottedPage::new(page_id, schema.clone(), 1024).unwrap();

    for i in [0, 3, 4, 9] {
        page.insert_tuple_at(SlotId::new(i as u16), &mut wide_tuple(&schema, i))
            .unwrap();
    }

    let bytes = page.page_data().unwrap();
    assert_eq!(bytes.len(), 1024);

    let decoded = bytes_to_page(page_id, schema.clone(), 1024, &bytes).unwrap();
    assert_eq!(decoded.num_slots(), page.num_slots());
    for i in 0..page.num_slots() {
        let slot = SlotId::new(i as u16);
        assert_eq!(decoded.is_slot_used(slot), page.is_slot_used(slot));
        if page.is_slot_used(slot) {
            let tuple = decoded.tuple(slot).unwrap();
            assert_eq!(tuple, page.tuple(slot).unwrap());
            assert_eq!(tuple.record_id().unwrap().slot_id, slot);
        }
    }

    // Re-encoding is idempotent
    assert_eq!(decoded.page_data().unwrap(), bytes);
}

#[test]
fn test_capacity_bounds() {
    for page_size in [64usize, 100, 512, 4096, 8192] {
        for tuple_size in [1usize, 3, 8, 13, 50, 60] {
            let capacity = compute_page_capacity(page_size, tuple_size);
            let per_slot = tuple_size * 8 + 1;
            assert!(capacity * per_slot <= page_size * 8);
            assert!(page_size * 8 < (capacity + 1) * per_slot);
            assert!(header_size(capacity) + capacity * tuple_size <= page_size);
        }
    }
}

#[test]
fn test_header_bit_layout() {
    let schema = Schema::builder().column("v", DataType::TinyInt).build_arc();
    let maker = SlottedPageMaker::new(schema.clone(), 64).unwrap();
    let mut page = maker.empty_page(PageId::new(0, 0)).unwrap();

    for slot in [0u16, 7, 8, 10] {
        let mut tuple = TupleBuilder::new(schema.clone())
            .value(slot as i8)
            .build()
            .unwrap();
        page.insert_tuple_at(SlotId::new(slot), &mut tuple).unwrap();
    }

    let bytes = page.page_data().unwrap();
    assert_eq!(bytes[0], 0b1000_0001);
    assert_eq!(bytes[1], 0b0000_0101);
    assert!(is_slot_used(10, &bytes));
    assert!(!is_slot_used(9, &bytes));
}

#[test]
fn test_maker_rejects_corrupt_pages() {
    let schema = Schema::builder().column("v", DataType::Integer).build_arc();
    let maker = SlottedPageMaker::new(schema, 128).unwrap();
    let page_id = PageId::new(0, 0);

    assert!(matches!(
        maker.make_page(page_id, &[0u8; 100]),
        Err(StrataError::PageSizeMismatch { .. })
    ));

    // Payload in an empty slot
    let mut data = vec![0u8; 128];
    data[header_size(31)] = 1;
    assert!(matches!(
        maker.make_page(page_id, &data),
        Err(StrataError::Malformed(_))
    ));
}

#[test]
fn test_before_image_survives_changes() {
    let schema = wide_schema();
    let maker = SlottedPageMaker::new(schema.clone(), 512).unwrap();
    let page_id = PageId::new(1, 1);

    let mut page = maker.empty_page(page_id).unwrap();
    page.insert_tuple(&mut wide_tuple(&schema, 1)).unwrap();
    page.set_before_image().unwrap();

    let mut second = wide_tuple(&schema, 2);
    page.insert_tuple(&mut second).unwrap();
    page.delete_tuple(&mut second).unwrap();
    page.insert_tuple(&mut wide_tuple(&schema, 3)).unwrap();

    let before = page.before_image().unwrap();
    assert_eq!(before.id(), page_id);
    assert_eq!(before.iter().count(), 1);
    assert_eq!(page.iter().count(), 2);
}

#[test]
fn test_slot_count_limited_to_slot_id_range() {
    // Zero-width tuples cost one header bit each
    let schema = Schema::builder().build_arc();

    // 8200 * 8 = 65600 slots, more than a slot id can name
    let err = SlottedPageMaker::new(schema.clone(), 8200).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(matches!(
        err,
        StrataError::UnsupportedLayout {
            capacity: 65600,
            ..
        }
    ));
    assert!(SlottedPage::new(PageId::new(0, 0), schema.clone(), 8200).is_err());

    // 8192 * 8 = 65536 slots, the largest layout accepted
    let page_id = PageId::new(2, 0);
    let maker = SlottedPageMaker::new(schema.clone(), 8192).unwrap();
    let mut page = maker.empty_page(page_id).unwrap();
    assert_eq!(page.num_slots(), MAX_SLOTS_PER_PAGE);

    let mut last = Tuple::new(schema.clone(), Vec::new()).unwrap();
    let record_id = page.insert_tuple_at(SlotId::new(u16::MAX), &mut last).unwrap();
    assert_eq!(record_id.slot_id, SlotId::new(u16::MAX));
    let first = page
        .insert_tuple(&mut Tuple::new(schema.clone(), Vec::new()).unwrap())
        .unwrap();
    assert_eq!(first.slot_id, SlotId::new(0));

    let bytes = page.page_data().unwrap();
    assert_eq!(bytes[8191], 0b1000_0000);
    let decoded = maker.make_page(page_id, &bytes).unwrap();
    assert_eq!(decoded.iter().count(), 2);
    assert_eq!(
        decoded.tuple(SlotId::new(u16::MAX)).unwrap().record_id(),
        Some(record_id)
    );
}
