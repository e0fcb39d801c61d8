use std::collections::{HashMap, HashSet};

use log::debug;

use super::TransactionID;
use crate::storage::HeapPageID;

/// The waits-for graph used for deadlock prevention.
///
/// Nodes are transactions and page locks. A transaction has at most one
/// pending wait (it is driven by a single thread); a lock has any number of
/// holders, each in read or write mode. All three operations run under the
/// single mutex wrapping this struct, so they are atomic with respect to
/// each other.
pub(crate) struct WaitsForGraph {
    // the lock (and mode) each transaction is currently blocked on
    waits: HashMap<TransactionID, (HeapPageID, bool)>,

    // current holders of each lock, with the mode they hold
    holders: HashMap<HeapPageID, HashSet<(TransactionID, bool)>>,
}

impl WaitsForGraph {
    pub(crate) fn new() -> Self {
        Self {
            waits: HashMap::new(),
            holders: HashMap::new(),
        }
    }

    /// Record that `tid` is about to block on `pid` in the given mode.
    /// Returns true iff granting the wait would close a cycle; in that case
    /// the pending edge is removed again and the caller must abort instead
    /// of blocking.
    pub(crate) fn wait(&mut self, tid: TransactionID, pid: HeapPageID, write: bool) -> bool {
        self.waits.insert(tid, (pid, write));

        let mut visited = HashSet::new();
        if self.reaches(tid, tid, &mut visited) {
            debug!("tx_{} waiting for {} would deadlock", tid, pid);
            self.waits.remove(&tid);
            return true;
        }
        false
    }

    /// Walk from `cur`'s pending wait through the lock's holders and their
    /// own pending waits; true iff the walk comes back to `start`.
    fn reaches(
        &self,
        start: TransactionID,
        cur: TransactionID,
        visited: &mut HashSet<TransactionID>,
    ) -> bool {
        let Some(&(pid, write)) = self.waits.get(&cur) else {
            return false;
        };
        let Some(holders) = self.holders.get(&pid) else {
            return false;
        };

        for &(holder, holder_write) in holders {
            // a read wait is not blocked by existing readers
            if !write && !holder_write {
                continue;
            }
            // holding the lock oneself (e.g. while upgrading) is not an edge
            if holder == cur {
                continue;
            }
            if holder == start {
                return true;
            }
            if visited.insert(holder) && self.reaches(start, holder, visited) {
                return true;
            }
        }
        false
    }

    /// The wait was granted: clear the pending edge, record the holding.
    pub(crate) fn acquire(&mut self, tid: TransactionID, pid: HeapPageID, write: bool) {
        self.waits.remove(&tid);
        self.holders.entry(pid).or_default().insert((tid, write));
    }

    pub(crate) fn release(&mut self, tid: TransactionID, pid: HeapPageID, write: bool) {
        if let Some(holders) = self.holders.get_mut(&pid) {
            holders.remove(&(tid, write));
            if holders.is_empty() {
                self.holders.remove(&pid);
            }
        }
    }
}
