use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, RwLock,
    },
};

use log::debug;

use crate::{
    database::Database,
    error::{DbError, DbResult},
    storage::{HeapPage, HeapPageID, Tuple},
    transaction::{PageLock, Permission, Transaction, TransactionID, WaitsForGraph},
    types::{ConcurrentHashMap, Pod, ResultPod},
    utils::HandyRwLock,
};

/// Bytes per page, including the header.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default page capacity of a buffer pool.
pub const DEFAULT_PAGES: usize = 50;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// The in-memory page cache in front of the heap files.
///
/// Every page access goes through [`BufferPool::get_page`], which also
/// acquires the per-page latch for the requesting transaction. The pool
/// runs NO-STEAL (a dirty page is never evicted or written before its
/// transaction commits) and FORCE (commit flushes every page the
/// transaction dirtied before returning).
pub struct BufferPool {
    capacity: usize,
    cache: Mutex<PageCache>,
    locks: ConcurrentHashMap<HeapPageID, Arc<PageLock>>,
    holdings: ConcurrentHashMap<(TransactionID, HeapPageID), Arc<Mutex<LockHolding>>>,
    waits_for: Mutex<WaitsForGraph>,
}

/// Cached pages plus their insertion order, which the eviction scan
/// follows.
struct PageCache {
    pages: HashMap<HeapPageID, Pod<HeapPage>>,
    fifo: VecDeque<HeapPageID>,
}

impl PageCache {
    fn install(&mut self, pid: HeapPageID, pod: Pod<HeapPage>) {
        if self.pages.insert(pid, pod).is_none() {
            self.fifo.push_back(pid);
        }
    }

    fn remove(&mut self, pid: &HeapPageID) {
        if self.pages.remove(pid).is_some() {
            self.fifo.retain(|cached| cached != pid);
        }
    }
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            cache: Mutex::new(PageCache {
                pages: HashMap::new(),
                fifo: VecDeque::new(),
            }),
            locks: ConcurrentHashMap::new(),
            holdings: ConcurrentHashMap::new(),
            waits_for: Mutex::new(WaitsForGraph::new()),
        }
    }

    pub fn get_page_size() -> usize {
        PAGE_SIZE.load(Ordering::Relaxed)
    }

    /// Only meant for tests; pages written with one size cannot be read
    /// with another.
    pub fn set_page_size(page_size: usize) {
        PAGE_SIZE.store(page_size, Ordering::Relaxed);
    }

    /// Retrieve the page with the associated permission, loading it from
    /// its heap file on a miss (evicting a clean page when the pool is
    /// full). Blocks until the page latch is grantable; fails with
    /// `TransactionAborted` when blocking would deadlock.
    pub fn get_page(
        &self,
        db: &Database,
        tx: &Transaction,
        pid: &HeapPageID,
        perm: Permission,
    ) -> ResultPod<HeapPage> {
        let page_pod = {
            let mut cache = self.cache.lock().unwrap();
            match cache.pages.get(pid) {
                Some(pod) => pod.clone(),
                None => {
                    if cache.pages.len() >= self.capacity {
                        Self::evict_page(&mut cache)?;
                    }
                    let file = db.catalog().get_file(pid.table_id)?;
                    let pod = Arc::new(RwLock::new(file.read_page(pid)?));
                    cache.install(*pid, pod.clone());
                    pod
                }
            }
        };

        let lock = self
            .locks
            .get_or_insert(pid, |pid| Ok(Arc::new(PageLock::new(*pid))))?;
        let holding = self
            .holdings
            .get_or_insert(&(tx.get_id(), *pid), |_| {
                Ok(Arc::new(Mutex::new(LockHolding::new(tx.get_id(), lock))))
            })?;
        holding.lock().unwrap().update(&self.waits_for, perm)?;

        Ok(page_pod)
    }

    /// Evict the first clean page in insertion order. NO-STEAL: dirty pages
    /// are pinned until their transaction completes, and when everything is
    /// dirty the pool is out of options.
    fn evict_page(cache: &mut PageCache) -> DbResult<()> {
        let victim = cache
            .fifo
            .iter()
            .position(|pid| {
                cache
                    .pages
                    .get(pid)
                    .map_or(false, |pod| pod.rl().is_dirty().is_none())
            })
            .ok_or_else(|| DbError::db("all pages are dirty"))?;

        // a clean page matches its on-disk bytes, so no flush is needed
        let pid = cache.fifo[victim];
        cache.fifo.remove(victim);
        cache.pages.remove(&pid);
        debug!("evicted {}", pid);
        Ok(())
    }

    /// Route an insert through the table's heap file, then cache the
    /// dirtied pages and stamp them with the transaction.
    pub fn insert_tuple(
        &self,
        db: &Database,
        tx: &Transaction,
        table_id: u32,
        tuple: &Tuple,
    ) -> DbResult<()> {
        let file = db.catalog().get_file(table_id)?;
        for page_pod in file.insert_tuple(db, tx, tuple)? {
            self.ensure_cached(&page_pod)?;
            page_pod.wl().mark_dirty(Some(tx.get_id()));
        }
        Ok(())
    }

    /// Route a delete through the heap file owning the tuple's page, then
    /// cache the dirtied pages and stamp them with the transaction.
    pub fn delete_tuple(&self, db: &Database, tx: &Transaction, tuple: &Tuple) -> DbResult<()> {
        let record_id = tuple
            .get_record_id()
            .ok_or_else(|| DbError::db("tuple carries no record id"))?;
        let file = db.catalog().get_file(record_id.pid.table_id)?;
        for page_pod in file.delete_tuple(db, tx, tuple)? {
            self.ensure_cached(&page_pod)?;
            page_pod.wl().mark_dirty(Some(tx.get_id()));
        }
        Ok(())
    }

    fn ensure_cached(&self, page_pod: &Pod<HeapPage>) -> DbResult<()> {
        let pid = page_pod.rl().get_pid();
        let mut cache = self.cache.lock().unwrap();
        if !cache.pages.contains_key(&pid) && cache.pages.len() >= self.capacity {
            Self::evict_page(&mut cache)?;
        }
        cache.install(pid, page_pod.clone());
        Ok(())
    }

    /// Commit or abort the transaction.
    ///
    /// Commit forces every page the transaction write-latched to disk and
    /// clears its dirty bit. Abort discards the cached copies instead, so
    /// the next reader reloads the committed bytes from disk. Either way
    /// every latch the transaction holds is released afterwards, making
    /// this the single release point of strict 2PL.
    pub fn transaction_complete(
        &self,
        db: &Database,
        tx: &Transaction,
        commit: bool,
    ) -> DbResult<()> {
        let tid = tx.get_id();
        let held: Vec<(TransactionID, HeapPageID)> = self
            .holdings
            .keys()
            .into_iter()
            .filter(|(holder, _)| *holder == tid)
            .collect();

        for (_, pid) in &held {
            let Some(holding) = self.holdings.get(&(tid, *pid)) else {
                continue;
            };
            if !holding.lock().unwrap().is_exclusive() {
                continue;
            }
            if commit {
                self.flush_page(db, pid)?;
            } else {
                self.discard_page(pid);
            }
        }

        for key in held {
            if let Some(holding) = self.holdings.remove(&key) {
                holding.lock().unwrap().unlock(&self.waits_for);
            }
        }

        debug!("{} {}", tx, if commit { "committed" } else { "aborted" });
        Ok(())
    }

    /// True if the transaction currently holds a latch on the page.
    pub fn holds_lock(&self, tx: &Transaction, pid: &HeapPageID) -> bool {
        self.holdings
            .get(&(tx.get_id(), *pid))
            .map_or(false, |holding| holding.lock().unwrap().is_held())
    }

    /// Release one page latch early. Breaking two-phase locking is risky;
    /// the only safe caller is one that has not observed or modified any
    /// state guarded by the latch.
    pub fn release_page(&self, tx: &Transaction, pid: &HeapPageID) {
        if let Some(holding) = self.holdings.remove(&(tx.get_id(), *pid)) {
            holding.lock().unwrap().unlock(&self.waits_for);
        }
    }

    /// Write the page back to its heap file if it is cached and dirty.
    pub fn flush_page(&self, db: &Database, pid: &HeapPageID) -> DbResult<()> {
        let page_pod = {
            let cache = self.cache.lock().unwrap();
            cache.pages.get(pid).cloned()
        };
        let Some(page_pod) = page_pod else {
            return Ok(());
        };

        if page_pod.rl().is_dirty().is_none() {
            return Ok(());
        }

        let file = db.catalog().get_file(pid.table_id)?;
        file.write_page(&page_pod.rl())?;
        page_pod.wl().mark_dirty(None);
        Ok(())
    }

    /// Flush every cached dirty page.
    ///
    /// NB: be careful using this routine; it writes dirty data to disk and
    /// therefore breaks NO-STEAL when uncommitted transactions are around.
    pub fn flush_all_pages(&self, db: &Database) -> DbResult<()> {
        let pids: Vec<HeapPageID> = {
            let cache = self.cache.lock().unwrap();
            cache.fifo.iter().cloned().collect()
        };
        for pid in pids {
            self.flush_page(db, &pid)?;
        }
        Ok(())
    }

    /// Drop the cached copy of the page without writing it.
    pub fn discard_page(&self, pid: &HeapPageID) {
        let mut cache = self.cache.lock().unwrap();
        cache.remove(pid);
    }

    /// True if the page currently sits in the cache. Mostly useful to
    /// observe eviction behavior from tests.
    pub fn is_cached(&self, pid: &HeapPageID) -> bool {
        self.cache.lock().unwrap().pages.contains_key(pid)
    }

    pub fn cached_pages_count(&self) -> usize {
        self.cache.lock().unwrap().pages.len()
    }
}

/// The latch a transaction holds on one page, with idempotent
/// re-acquisition: repeated requests for a mode already covered are no-ops,
/// and a read-then-write sequence turns into an upgrade.
struct LockHolding {
    tid: TransactionID,
    lock: Arc<PageLock>,
    mode: Option<Permission>,
}

impl LockHolding {
    fn new(tid: TransactionID, lock: Arc<PageLock>) -> Self {
        Self {
            tid,
            lock,
            mode: None,
        }
    }

    fn update(&mut self, graph: &Mutex<WaitsForGraph>, perm: Permission) -> DbResult<()> {
        match (self.mode, perm) {
            (None, Permission::ReadOnly) => {
                self.lock.lock_read(graph, self.tid)?;
                self.mode = Some(Permission::ReadOnly);
            }
            (None, Permission::ReadWrite) => {
                self.lock.lock_write(graph, self.tid)?;
                self.mode = Some(Permission::ReadWrite);
            }
            (Some(Permission::ReadOnly), Permission::ReadWrite) => {
                self.lock.upgrade(graph, self.tid)?;
                self.mode = Some(Permission::ReadWrite);
            }
            // the held mode already covers the request
            _ => {}
        }
        Ok(())
    }

    fn is_held(&self) -> bool {
        self.mode.is_some()
    }

    fn is_exclusive(&self) -> bool {
        self.mode == Some(Permission::ReadWrite)
    }

    fn unlock(&mut self, graph: &Mutex<WaitsForGraph>) {
        match self.mode.take() {
            Some(Permission::ReadOnly) => self.lock.unlock_read(graph, self.tid),
            Some(Permission::ReadWrite) => self.lock.unlock_write(graph, self.tid),
            None => {}
        }
    }
}
