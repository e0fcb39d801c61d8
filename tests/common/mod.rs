// not every test binary uses every helper
#![allow(dead_code)]

use std::sync::Arc;

use minidb::{
    storage::{Field, HeapFile, Schema, Tuple},
    transaction::Transaction,
    utils, Database,
};
use tempfile::TempDir;

/// Set up log configurations. Safe to call from every test.
pub fn setup() {
    utils::init_log();
}

/// Create an empty heap table backed by `{name}.db` inside the temp dir
/// and register it with the catalog.
pub fn new_empty_table(db: &Database, dir: &TempDir, name: &str, columns: usize) -> Arc<HeapFile> {
    let path = dir.path().join(format!("{}.db", name));
    let schema = Schema::small_int_schema(columns, name);
    let file = Arc::new(HeapFile::new(path, schema).unwrap());
    db.catalog().add_table(Arc::clone(&file), name);
    file
}

/// Insert one committed row per value, each row repeating the value across
/// every column.
pub fn insert_committed_rows(db: &Database, file: &Arc<HeapFile>, values: &[i32], columns: usize) {
    let tx = Transaction::new();
    for &v in values {
        db.buffer_pool()
            .insert_tuple(db, &tx, file.get_id(), &Tuple::new_int_tuple(v, columns))
            .unwrap();
    }
    tx.commit(db).unwrap();
}

/// Scan the table under the given transaction and return the first column
/// of every tuple, sorted.
pub fn scan_first_column(db: &Database, file: &Arc<HeapFile>, tx: &Transaction) -> Vec<i32> {
    let mut iter = file.iter(db, tx);
    let mut values = Vec::new();
    while let Some(tuple) = iter.next_tuple().unwrap() {
        let &Field::Int32(v) = tuple.get_field(0) else {
            panic!("expected an int column");
        };
        values.push(v);
    }
    values.sort();
    values
}
