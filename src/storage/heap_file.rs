use std::{
    collections::hash_map::DefaultHasher,
    fs::{File, OpenOptions},
    hash::{Hash, Hasher},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
    sync::{Arc, Mutex},
};

use log::debug;

use super::{
    heap_page::HeapPage,
    page_id::HeapPageID,
    schema::Schema,
    tuple::Tuple,
};
use crate::{
    buffer_pool::BufferPool,
    database::Database,
    error::{DbError, DbResult},
    transaction::{Permission, Transaction},
    types::Pod,
    utils::HandyRwLock,
};

/// An unordered table: a disk file holding a contiguous run of
/// [`HeapPage`]s. All page access from transactions goes through the buffer
/// pool; only `read_page`/`write_page` touch the file itself.
pub struct HeapFile {
    file: Mutex<File>,
    table_id: u32,
    schema: Schema,
}

impl HeapFile {
    /// Open (or create) the backing file. The table id is a stable hash of
    /// the absolute path, so reopening the same file yields the same id.
    pub fn new<P: AsRef<Path>>(path: P, schema: Schema) -> DbResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())?;

        let absolute = path.as_ref().canonicalize()?;
        let mut hasher = DefaultHasher::new();
        absolute.hash(&mut hasher);
        let table_id = hasher.finish() as u32;

        Ok(Self {
            file: Mutex::new(file),
            table_id,
            schema,
        })
    }

    pub fn get_id(&self) -> u32 {
        self.table_id
    }

    pub fn get_schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_pages(&self) -> DbResult<usize> {
        let len = self.file.lock().unwrap().metadata()?.len();
        Ok(len as usize / BufferPool::get_page_size())
    }

    /// Read one page worth of bytes at the page's offset. A read past the
    /// end of the file (or a short read) surfaces as an io error.
    pub fn read_page(&self, pid: &HeapPageID) -> DbResult<HeapPage> {
        if pid.table_id != self.table_id {
            return Err(DbError::db(format!(
                "{} does not belong to table {}",
                pid, self.table_id
            )));
        }

        let page_size = BufferPool::get_page_size();
        let mut buf = vec![0u8; page_size];
        {
            let mut file = self.file.lock().unwrap();
            file.seek(SeekFrom::Start((pid.page_index * page_size) as u64))?;
            file.read_exact(&mut buf)?;
        }
        debug!("read {} from disk", pid);
        HeapPage::new(pid, &buf, &self.schema)
    }

    /// Write the page at its offset, extending the file if the page lies
    /// past the current end.
    pub fn write_page(&self, page: &HeapPage) -> DbResult<()> {
        let page_size = BufferPool::get_page_size();
        let pid = page.get_pid();

        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((pid.page_index * page_size) as u64))?;
        file.write_all(&page.get_page_data())?;
        debug!("wrote {} to disk", pid);
        Ok(())
    }

    /// Insert the tuple into the first page with a free slot, allocating a
    /// fresh page at the end of the file when every page is full. Returns
    /// the pages dirtied by the operation.
    pub fn insert_tuple(
        &self,
        db: &Database,
        tx: &Transaction,
        tuple: &Tuple,
    ) -> DbResult<Vec<Pod<HeapPage>>> {
        for i in 0..self.num_pages()? {
            let pid = HeapPageID::new(self.table_id, i);
            let page_pod = db
                .buffer_pool()
                .get_page(db, tx, &pid, Permission::ReadWrite)?;

            let mut page = page_pod.wl();
            if page.empty_slots_count() > 0 {
                page.insert_tuple(tuple)?;
                drop(page);
                return Ok(vec![page_pod]);
            }
            // The page stays write-latched until the transaction completes
            // even though we are not touching it, per strict 2PL.
        }

        // Every existing page is full. Persist a fresh empty page first so
        // num_pages grows, then insert through the buffer pool under a
        // write latch. An abort leaves the empty page on disk, which is
        // harmless.
        let pid = HeapPageID::new(self.table_id, self.num_pages()?);
        let empty = HeapPage::new(&pid, &HeapPage::empty_page_data(), &self.schema)?;
        self.write_page(&empty)?;
        debug!("table {} extended with {}", self.table_id, pid);

        let page_pod = db
            .buffer_pool()
            .get_page(db, tx, &pid, Permission::ReadWrite)?;
        page_pod.wl().insert_tuple(tuple)?;
        Ok(vec![page_pod])
    }

    /// Delete the tuple named by its record id. Returns the dirtied page.
    pub fn delete_tuple(
        &self,
        db: &Database,
        tx: &Transaction,
        tuple: &Tuple,
    ) -> DbResult<Vec<Pod<HeapPage>>> {
        let record_id = tuple
            .get_record_id()
            .ok_or_else(|| DbError::db("tuple carries no record id"))?;
        if record_id.pid.table_id != self.table_id {
            return Err(DbError::db(format!(
                "record id {:?} does not belong to table {}",
                record_id, self.table_id
            )));
        }

        let page_pod = db
            .buffer_pool()
            .get_page(db, tx, &record_id.pid, Permission::ReadWrite)?;
        page_pod.wl().delete_tuple(&record_id)?;
        Ok(vec![page_pod])
    }

    /// A restartable scan over every tuple of the table, in page and slot
    /// order, fetching pages read-only through the buffer pool. Concurrent
    /// inserts that extend the file may or may not be observed.
    pub fn iter<'d>(self: &Arc<Self>, db: &'d Database, tx: &Transaction) -> HeapFileIterator<'d> {
        HeapFileIterator {
            db,
            file: Arc::clone(self),
            tx: *tx,
            page_cursor: 0,
            page_tuples: Vec::new().into_iter(),
        }
    }
}

pub struct HeapFileIterator<'d> {
    db: &'d Database,
    file: Arc<HeapFile>,
    tx: Transaction,

    page_cursor: usize,
    page_tuples: std::vec::IntoIter<Tuple>,
}

impl HeapFileIterator<'_> {
    /// The next tuple of the scan, or `None` when the table is exhausted.
    pub fn next_tuple(&mut self) -> DbResult<Option<Tuple>> {
        loop {
            if let Some(tuple) = self.page_tuples.next() {
                return Ok(Some(tuple));
            }

            if self.page_cursor >= self.file.num_pages()? {
                return Ok(None);
            }

            let pid = HeapPageID::new(self.file.get_id(), self.page_cursor);
            self.page_cursor += 1;

            let page_pod = self
                .db
                .buffer_pool()
                .get_page(self.db, &self.tx, &pid, Permission::ReadOnly)?;
            let tuples: Vec<Tuple> = page_pod.rl().iter().collect();
            self.page_tuples = tuples.into_iter();
        }
    }

    /// Restart the scan from page 0.
    pub fn rewind(&mut self) {
        self.page_cursor = 0;
        self.page_tuples = Vec::new().into_iter();
    }
}
