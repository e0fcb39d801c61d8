use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{database::Database, error::DbResult};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

pub type TransactionID = u64;

/// The permission a caller requests on a page. `ReadOnly` maps to a shared
/// latch, `ReadWrite` to an exclusive one.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

/// A transaction handle. Each active transaction is driven by exactly one
/// thread; the handle itself is a copyable id.
#[derive(Eq, Hash, PartialEq, Clone, Copy)]
pub struct Transaction {
    // increases monotonically by 1
    id: TransactionID,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            id: NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn get_id(&self) -> TransactionID {
        self.id
    }

    /// Flush every page this transaction dirtied, then release its locks.
    pub fn commit(&self, db: &Database) -> DbResult<()> {
        db.buffer_pool().transaction_complete(db, self, true)
    }

    /// Drop every cached page this transaction dirtied, then release its
    /// locks. Required after a `TransactionAborted` error.
    pub fn abort(&self, db: &Database) -> DbResult<()> {
        db.buffer_pool().transaction_complete(db, self, false)
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tx_{}", self.id)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
