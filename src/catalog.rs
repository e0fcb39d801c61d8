use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    error::{DbError, DbResult},
    storage::{HeapFile, Schema},
    utils::HandyRwLock,
};

struct CatalogEntry {
    file: Arc<HeapFile>,
    name: String,
}

/// The table registry: table id to heap file and name. Rebuilt in-process;
/// nothing about it is persisted.
pub struct Catalog {
    tables: RwLock<HashMap<u32, CatalogEntry>>,
}

impl Catalog {
    pub(crate) fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Register a table. A table with the same id (same backing file) is
    /// replaced.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str) {
        let entry = CatalogEntry {
            name: name.to_string(),
            file: file.clone(),
        };
        self.tables.wl().insert(file.get_id(), entry);
    }

    pub fn get_file(&self, table_id: u32) -> DbResult<Arc<HeapFile>> {
        self.tables
            .rl()
            .get(&table_id)
            .map(|entry| entry.file.clone())
            .ok_or_else(|| DbError::db(format!("no table with id {}", table_id)))
    }

    pub fn get_table_name(&self, table_id: u32) -> DbResult<String> {
        self.tables
            .rl()
            .get(&table_id)
            .map(|entry| entry.name.clone())
            .ok_or_else(|| DbError::db(format!("no table with id {}", table_id)))
    }

    pub fn get_schema(&self, table_id: u32) -> DbResult<Schema> {
        Ok(self.get_file(table_id)?.get_schema().clone())
    }

    pub fn table_ids(&self) -> Vec<u32> {
        self.tables.rl().keys().cloned().collect()
    }
}
