//! Exercises the engine under a non-default page size. These tests change
//! the process-wide page size, so they live in their own test binary and
//! run serially.

use serial_test::serial;
use slate::buffer_pool::BufferPool;
use slate::catalog::Catalog;
use slate::heap_file::HeapFile;
use slate::page::{slots_per_page, HeapPage};
use slate::transaction::TransactionId;
use slate::tuple::{Field, Tuple, TupleDesc, Type};
use slate::PageId;
use std::sync::Arc;
use tempfile::tempdir;

fn desc() -> Arc<TupleDesc> {
    Arc::new(TupleDesc::unnamed(&[Type::Int, Type::Int]))
}

fn row(a: i32, b: i32) -> Tuple {
    Tuple::new(desc(), vec![Field::Int(a), Field::Int(b)]).unwrap()
}

#[test]
#[serial]
fn slot_math_tracks_the_page_size() {
    slate::set_page_size(1024);
    // floor(1024 * 8 / 65) slots for 8-byte tuples.
    assert_eq!(slots_per_page(&desc()), 126);

    slate::set_page_size(slate::DEFAULT_PAGE_SIZE);
    assert_eq!(slots_per_page(&desc()), 504);
}

#[test]
#[serial]
fn small_pages_round_trip_through_the_file() {
    slate::set_page_size(512);
    let dir = tempdir().unwrap();
    let d = desc();
    let file = HeapFile::open(dir.path().join("small.tbl"), d.clone()).unwrap();

    let pid = PageId {
        table: file.id(),
        page_no: 0,
    };
    let mut page = file.read_page(pid).unwrap();
    let n = page.slot_count();
    for i in 0..n {
        page.insert_tuple(row(i as i32, -(i as i32))).unwrap();
    }
    file.write_page(&page).unwrap();

    let reloaded = file.read_page(pid).unwrap();
    assert_eq!(reloaded.iter().count(), n);
    assert_eq!(reloaded.to_bytes().len(), 512);
    assert_eq!(reloaded.to_bytes(), page.to_bytes());
    assert_eq!(
        HeapPage::from_bytes(pid, d, &page.to_bytes())
            .unwrap()
            .to_bytes(),
        page.to_bytes()
    );

    slate::set_page_size(slate::DEFAULT_PAGE_SIZE);
}

#[test]
#[serial]
fn inserts_spill_onto_new_small_pages() {
    slate::set_page_size(256);
    let dir = tempdir().unwrap();
    let d = desc();
    let file = HeapFile::open(dir.path().join("spill.tbl"), d.clone()).unwrap();
    let catalog = Arc::new(Catalog::new());
    let table = catalog.add_table(file.clone(), "spill");
    let pool = Arc::new(BufferPool::new(8, catalog));

    let per_page = slots_per_page(&d);
    let total = per_page * 2 + 3;
    let tid = TransactionId::new();
    for i in 0..total {
        pool.insert_tuple(tid, table, row(i as i32, 0)).unwrap();
    }
    pool.transaction_complete(tid, true).unwrap();
    assert_eq!(file.num_pages().unwrap(), 3);

    let t2 = TransactionId::new();
    let mut iter = file.scan(t2, pool.clone());
    let mut count = 0;
    while iter.next().unwrap().is_some() {
        count += 1;
    }
    pool.transaction_complete(t2, true).unwrap();
    assert_eq!(count, total);

    slate::set_page_size(slate::DEFAULT_PAGE_SIZE);
}
