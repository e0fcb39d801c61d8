use std::sync::{Condvar, Mutex};

use log::debug;

use super::{wait_for_graph::WaitsForGraph, TransactionID};
use crate::{
    error::{DbError, DbResult},
    storage::HeapPageID,
};

#[derive(Default)]
struct LockState {
    readers: usize,
    writer: bool,
    // the single upgrade token; holding it serializes concurrent upgrades
    upgrading: bool,
}

/// A per-page reader/writer lock with upgrade.
///
/// Any number of readers may hold the lock together; a writer is exclusive.
/// A reader may upgrade to writer: it takes the upgrade token, gives up its
/// own read count and waits for the remaining readers to drain. Before any
/// of the three acquire paths blocks it consults the waits-for graph, and
/// fails with `TransactionAborted` instead of entering a deadlock.
pub struct PageLock {
    pid: HeapPageID,
    state: Mutex<LockState>,
    cond: Condvar,
}

impl PageLock {
    pub(crate) fn new(pid: HeapPageID) -> Self {
        Self {
            pid,
            state: Mutex::new(LockState::default()),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn lock_read(
        &self,
        graph: &Mutex<WaitsForGraph>,
        tid: TransactionID,
    ) -> DbResult<()> {
        if graph.lock().unwrap().wait(tid, self.pid, false) {
            return Err(DbError::TransactionAborted);
        }

        let mut state = self.state.lock().unwrap();
        while state.writer || state.upgrading {
            state = self.cond.wait(state).unwrap();
        }
        state.readers += 1;
        drop(state);

        graph.lock().unwrap().acquire(tid, self.pid, false);
        debug!("tx_{} read-latched {}", tid, self.pid);
        Ok(())
    }

    pub(crate) fn unlock_read(&self, graph: &Mutex<WaitsForGraph>, tid: TransactionID) {
        let mut state = self.state.lock().unwrap();
        state.readers -= 1;
        drop(state);
        self.cond.notify_all();

        graph.lock().unwrap().release(tid, self.pid, false);
        debug!("tx_{} released read latch on {}", tid, self.pid);
    }

    pub(crate) fn lock_write(
        &self,
        graph: &Mutex<WaitsForGraph>,
        tid: TransactionID,
    ) -> DbResult<()> {
        if graph.lock().unwrap().wait(tid, self.pid, true) {
            return Err(DbError::TransactionAborted);
        }

        let mut state = self.state.lock().unwrap();
        while state.readers > 0 || state.writer || state.upgrading {
            state = self.cond.wait(state).unwrap();
        }
        state.writer = true;
        drop(state);

        graph.lock().unwrap().acquire(tid, self.pid, true);
        debug!("tx_{} write-latched {}", tid, self.pid);
        Ok(())
    }

    pub(crate) fn unlock_write(&self, graph: &Mutex<WaitsForGraph>, tid: TransactionID) {
        let mut state = self.state.lock().unwrap();
        state.writer = false;
        drop(state);
        self.cond.notify_all();

        graph.lock().unwrap().release(tid, self.pid, true);
        debug!("tx_{} released write latch on {}", tid, self.pid);
    }

    /// Turn a held read latch into a write latch.
    ///
    /// While waiting for the exclusive phase the transaction still figures
    /// as a reader among the lock's holders, but its pending wait counts as
    /// a write; this is what lets the graph see two concurrent upgraders as
    /// a cycle and refuse the second one.
    pub(crate) fn upgrade(&self, graph: &Mutex<WaitsForGraph>, tid: TransactionID) -> DbResult<()> {
        if graph.lock().unwrap().wait(tid, self.pid, true) {
            return Err(DbError::TransactionAborted);
        }

        let mut state = self.state.lock().unwrap();
        while state.upgrading {
            state = self.cond.wait(state).unwrap();
        }
        state.upgrading = true;
        // give up our own read count; the latch is not yet released in the
        // waits-for graph
        state.readers -= 1;
        while state.readers > 0 || state.writer {
            state = self.cond.wait(state).unwrap();
        }
        state.writer = true;
        state.upgrading = false;
        drop(state);
        self.cond.notify_all();

        let mut graph = graph.lock().unwrap();
        graph.release(tid, self.pid, false);
        graph.acquire(tid, self.pid, true);
        debug!("tx_{} upgraded latch on {}", tid, self.pid);
        Ok(())
    }
}
