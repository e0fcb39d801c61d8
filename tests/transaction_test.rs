mod common;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Barrier,
    },
    thread,
    time::Duration,
};

use common::{insert_committed_rows, new_empty_table, scan_first_column, setup};
use minidb::{
    error::DbError,
    storage::{HeapPageID, Tuple},
    transaction::{Permission, Transaction},
    utils::HandyRwLock,
    Database,
};
use tempfile::TempDir;

/// Readers share a page; a writer waits for every reader to leave.
#[test]
fn test_read_write_coexistence() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table = new_empty_table(&db, &dir, "coexist", 2);
    insert_committed_rows(&db, &table, &[1], 2);

    let pid = HeapPageID::new(table.get_id(), 0);

    let t1 = Transaction::new();
    let t2 = Transaction::new();
    db.buffer_pool()
        .get_page(&db, &t1, &pid, Permission::ReadOnly)
        .unwrap();
    // a second reader is granted right away
    db.buffer_pool()
        .get_page(&db, &t2, &pid, Permission::ReadOnly)
        .unwrap();

    let (sender, receiver) = crossbeam::channel::bounded(1);
    thread::scope(|s| {
        s.spawn(|| {
            let t3 = Transaction::new();
            db.buffer_pool()
                .get_page(&db, &t3, &pid, Permission::ReadWrite)
                .unwrap();
            sender.send(()).unwrap();
            t3.commit(&db).unwrap();
        });

        // the writer stays blocked while either reader holds the latch
        assert!(receiver.recv_timeout(Duration::from_millis(300)).is_err());
        t1.commit(&db).unwrap();
        assert!(receiver.recv_timeout(Duration::from_millis(300)).is_err());
        t2.commit(&db).unwrap();
        assert!(receiver.recv_timeout(Duration::from_secs(5)).is_ok());
    });
}

/// Two transactions that read each other's page and then try to write it
/// would deadlock; exactly one of them is refused at its lock call.
#[test]
fn test_deadlock_is_prevented() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table_p = new_empty_table(&db, &dir, "p", 2);
    let table_q = new_empty_table(&db, &dir, "q", 2);
    insert_committed_rows(&db, &table_p, &[1], 2);
    insert_committed_rows(&db, &table_q, &[1], 2);

    let p = HeapPageID::new(table_p.get_id(), 0);
    let q = HeapPageID::new(table_q.get_id(), 0);

    let barrier = Barrier::new(2);
    let aborted = AtomicUsize::new(0);

    let worker = |first: HeapPageID, second: HeapPageID| {
        let tx = Transaction::new();
        db.buffer_pool()
            .get_page(&db, &tx, &first, Permission::ReadOnly)
            .unwrap();
        // both transactions hold their read latch before either writes
        barrier.wait();
        match db
            .buffer_pool()
            .get_page(&db, &tx, &second, Permission::ReadWrite)
        {
            Ok(_) => tx.commit(&db).unwrap(),
            Err(DbError::TransactionAborted) => {
                aborted.fetch_add(1, Ordering::SeqCst);
                tx.abort(&db).unwrap();
            }
            Err(e) => panic!("unexpected error: {}", e),
        }
    };

    thread::scope(|s| {
        s.spawn(|| worker(p, q));
        s.spawn(|| worker(q, p));
    });

    assert_eq!(aborted.load(Ordering::SeqCst), 1);
}

/// NO-STEAL: an uncommitted insert never reaches the disk. FORCE: commit
/// puts it there before returning, byte for byte.
#[test]
fn test_no_steal_and_force() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table = new_empty_table(&db, &dir, "durability", 2);
    let path = dir.path().join("durability.db");

    let tx = Transaction::new();
    for v in 0..3 {
        db.buffer_pool()
            .insert_tuple(&db, &tx, table.get_id(), &Tuple::new_int_tuple(v, 2))
            .unwrap();
    }

    // the freshly allocated page is on disk, but with every slot empty
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), minidb::BufferPool::get_page_size());
    assert!(bytes.iter().all(|b| *b == 0));

    tx.commit(&db).unwrap();

    // after commit the disk matches the cached page exactly
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes[0] & 0b111, 0b111);

    let t2 = Transaction::new();
    let pid = HeapPageID::new(table.get_id(), 0);
    let page_pod = db
        .buffer_pool()
        .get_page(&db, &t2, &pid, Permission::ReadOnly)
        .unwrap();
    assert_eq!(page_pod.rl().get_page_data(), bytes);
    t2.commit(&db).unwrap();
}

/// A transaction that already reads a page may upgrade to writing it; as
/// the sole reader it must not block.
#[test]
fn test_upgrade_by_sole_reader() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table = new_empty_table(&db, &dir, "upgrade", 2);
    insert_committed_rows(&db, &table, &[1], 2);

    let pid = HeapPageID::new(table.get_id(), 0);
    let tx = Transaction::new();
    db.buffer_pool()
        .get_page(&db, &tx, &pid, Permission::ReadOnly)
        .unwrap();
    assert!(db.buffer_pool().holds_lock(&tx, &pid));

    db.buffer_pool()
        .get_page(&db, &tx, &pid, Permission::ReadWrite)
        .unwrap();
    db.buffer_pool()
        .insert_tuple(&db, &tx, table.get_id(), &Tuple::new_int_tuple(2, 2))
        .unwrap();
    tx.commit(&db).unwrap();

    let t2 = Transaction::new();
    assert_eq!(scan_first_column(&db, &table, &t2), vec![1, 2]);
    t2.commit(&db).unwrap();

    assert!(!db.buffer_pool().holds_lock(&tx, &pid));
}

/// Re-requesting a mode that is already held is a no-op, and completing a
/// transaction twice is safe because the lock set empties on the first
/// call.
#[test]
fn test_idempotent_acquisition_and_completion() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table = new_empty_table(&db, &dir, "idempotent", 2);
    insert_committed_rows(&db, &table, &[1], 2);

    let pid = HeapPageID::new(table.get_id(), 0);
    let tx = Transaction::new();
    for _ in 0..3 {
        db.buffer_pool()
            .get_page(&db, &tx, &pid, Permission::ReadWrite)
            .unwrap();
    }
    // a read request after a write is covered by the held write latch
    db.buffer_pool()
        .get_page(&db, &tx, &pid, Permission::ReadOnly)
        .unwrap();

    tx.commit(&db).unwrap();
    tx.commit(&db).unwrap();

    // the page is free again for others
    let t2 = Transaction::new();
    db.buffer_pool()
        .get_page(&db, &t2, &pid, Permission::ReadWrite)
        .unwrap();
    t2.commit(&db).unwrap();
}

/// An early release hands the latch over before the transaction ends.
#[test]
fn test_release_page_early() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table = new_empty_table(&db, &dir, "early", 2);
    insert_committed_rows(&db, &table, &[1], 2);

    let pid = HeapPageID::new(table.get_id(), 0);
    let t1 = Transaction::new();
    db.buffer_pool()
        .get_page(&db, &t1, &pid, Permission::ReadWrite)
        .unwrap();

    db.buffer_pool().release_page(&t1, &pid);
    assert!(!db.buffer_pool().holds_lock(&t1, &pid));

    // another writer gets through while t1 is still running
    let t2 = Transaction::new();
    db.buffer_pool()
        .get_page(&db, &t2, &pid, Permission::ReadWrite)
        .unwrap();
    t2.commit(&db).unwrap();
    t1.commit(&db).unwrap();
}

/// Many writers bumping the same one-page table serialize through the
/// page latch and never lose an update.
#[test]
fn test_concurrent_inserts_on_one_table() {
    setup();
    let db = Database::new();
    let dir = TempDir::new().unwrap();
    let table = new_empty_table(&db, &dir, "contended", 2);

    let workers = 16;
    thread::scope(|s| {
        for i in 0..workers {
            let db = &db;
            let table = &table;
            s.spawn(move || {
                let tx = Transaction::new();
                db.buffer_pool()
                    .insert_tuple(db, &tx, table.get_id(), &Tuple::new_int_tuple(i, 2))
                    .unwrap();
                tx.commit(db).unwrap();
            });
        }
    });

    let tx = Transaction::new();
    let values = scan_first_column(&db, &table, &tx);
    assert_eq!(values, (0..workers).collect::<Vec<i32>>());
    tx.commit(&db).unwrap();
}
