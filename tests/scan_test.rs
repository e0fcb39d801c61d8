mod common;

use common::{insert_committed_rows, new_empty_table, scan_first_column, setup};
use minidb::{
    storage::{HeapPage, Tuple},
    transaction::Transaction,
    Database,
};
use rand::Rng;
use tempfile::TempDir;

/// Inserting into a file with zero pages creates page 0, and a later
/// transaction sees exactly the committed rows.
#[test]
fn test_insert_scan_round_trip() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table = new_empty_table(&db, &dir, "round_trip", 1);
    assert_eq!(table.num_pages().unwrap(), 0);

    insert_committed_rows(&db, &table, &[1, 2, 3], 1);
    assert_eq!(table.num_pages().unwrap(), 1);

    let tx = Transaction::new();
    assert_eq!(scan_first_column(&db, &table, &tx), vec![1, 2, 3]);
    tx.commit(&db).unwrap();
}

/// A scanned tuple carries the record id of the slot it was placed into.
#[test]
fn test_scanned_tuples_carry_record_ids() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table = new_empty_table(&db, &dir, "record_ids", 2);
    insert_committed_rows(&db, &table, &[5], 2);

    let tx = Transaction::new();
    let mut iter = table.iter(&db, &tx);
    let tuple = iter.next_tuple().unwrap().unwrap();
    let record_id = tuple.get_record_id().unwrap();
    assert_eq!(record_id.pid.table_id, table.get_id());
    assert_eq!(record_id.pid.page_index, 0);
    assert_eq!(record_id.slot, 0);
    tx.commit(&db).unwrap();
}

/// An aborted insert is invisible to later scans.
#[test]
fn test_abort_rolls_back_insert() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table = new_empty_table(&db, &dir, "abort", 1);
    insert_committed_rows(&db, &table, &[1, 2, 3], 1);

    let t3 = Transaction::new();
    db.buffer_pool()
        .insert_tuple(&db, &t3, table.get_id(), &Tuple::new_int_tuple(4, 1))
        .unwrap();
    t3.abort(&db).unwrap();

    let t4 = Transaction::new();
    assert_eq!(scan_first_column(&db, &table, &t4), vec![1, 2, 3]);
    t4.commit(&db).unwrap();
}

/// Filling the last page forces a new page to be appended, and the scan
/// still sees every row.
#[test]
fn test_full_page_appends_a_new_one() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table = new_empty_table(&db, &dir, "growth", 2);

    let slots = HeapPage::calculate_slots_count(table.get_schema());
    let values: Vec<i32> = (0..slots as i32 + 1).collect();
    insert_committed_rows(&db, &table, &values, 2);

    assert_eq!(table.num_pages().unwrap(), 2);

    let tx = Transaction::new();
    assert_eq!(scan_first_column(&db, &table, &tx), values);
    tx.commit(&db).unwrap();
}

/// Random values come back from a scan exactly as inserted, duplicates
/// included.
#[test]
fn test_scan_returns_random_inserts() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table = new_empty_table(&db, &dir, "random", 2);

    let mut rng = rand::thread_rng();
    let values: Vec<i32> = (0..200).map(|_| rng.gen_range(0..100)).collect();
    insert_committed_rows(&db, &table, &values, 2);

    let mut expected = values;
    expected.sort();

    let tx = Transaction::new();
    assert_eq!(scan_first_column(&db, &table, &tx), expected);
    tx.commit(&db).unwrap();
}

/// The scan iterator restarts from page 0 on rewind.
#[test]
fn test_scan_rewind() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table = new_empty_table(&db, &dir, "rewind", 1);
    insert_committed_rows(&db, &table, &[7, 8], 1);

    let tx = Transaction::new();
    let mut iter = table.iter(&db, &tx);
    assert!(iter.next_tuple().unwrap().is_some());
    assert!(iter.next_tuple().unwrap().is_some());
    assert!(iter.next_tuple().unwrap().is_none());

    iter.rewind();
    let mut count = 0;
    while iter.next_tuple().unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 2);
    tx.commit(&db).unwrap();
}

/// Deletes become visible on commit and are undone by abort.
#[test]
fn test_delete_visibility() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table = new_empty_table(&db, &dir, "delete", 1);
    insert_committed_rows(&db, &table, &[1, 2, 3], 1);

    // delete the row holding 2 and commit
    let t1 = Transaction::new();
    let mut iter = table.iter(&db, &t1);
    let mut victim = None;
    while let Some(tuple) = iter.next_tuple().unwrap() {
        if tuple == Tuple::new_int_tuple(2, 1) {
            victim = Some(tuple);
        }
    }
    db.buffer_pool()
        .delete_tuple(&db, &t1, &victim.unwrap())
        .unwrap();
    t1.commit(&db).unwrap();

    let t2 = Transaction::new();
    assert_eq!(scan_first_column(&db, &table, &t2), vec![1, 3]);
    t2.commit(&db).unwrap();

    // delete the row holding 1 but abort; the row stays
    let t3 = Transaction::new();
    let mut iter = table.iter(&db, &t3);
    let mut victim = None;
    while let Some(tuple) = iter.next_tuple().unwrap() {
        if tuple == Tuple::new_int_tuple(1, 1) {
            victim = Some(tuple);
        }
    }
    db.buffer_pool()
        .delete_tuple(&db, &t3, &victim.unwrap())
        .unwrap();
    t3.abort(&db).unwrap();

    let t4 = Transaction::new();
    assert_eq!(scan_first_column(&db, &table, &t4), vec![1, 3]);
    t4.commit(&db).unwrap();
}

/// Page writes survive a file round trip byte for byte.
#[test]
fn test_write_page_read_page_round_trip() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table = new_empty_table(&db, &dir, "page_io", 2);

    let pid = minidb::storage::HeapPageID::new(table.get_id(), 0);
    let mut page = HeapPage::new(&pid, &HeapPage::empty_page_data(), table.get_schema()).unwrap();
    for v in 0..5 {
        page.insert_tuple(&Tuple::new_int_tuple(v, 2)).unwrap();
    }
    table.write_page(&page).unwrap();

    let reloaded = table.read_page(&pid).unwrap();
    assert_eq!(reloaded.get_page_data(), page.get_page_data());
    assert_eq!(reloaded.tuples_count(), 5);
}

/// Reading past the end of the file is an io error.
#[test]
fn test_read_past_end_is_io_error() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table = new_empty_table(&db, &dir, "past_end", 1);

    let pid = minidb::storage::HeapPageID::new(table.get_id(), 3);
    assert!(matches!(
        table.read_page(&pid),
        Err(minidb::error::DbError::Io(_))
    ));
}
