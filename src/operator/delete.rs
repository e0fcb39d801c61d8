use super::{OpIterator, OpState};
use crate::{
    database::Database,
    error::{DbError, DbResult},
    storage::{Field, FieldItem, Schema, Tuple, Type},
    transaction::Transaction,
};

/// Single-shot operator: the first `next` drains the child, deletes every
/// tuple it yields through the buffer pool, and emits the delete count.
pub struct Delete<'d> {
    db: &'d Database,
    tx: Transaction,
    child: Box<dyn OpIterator + 'd>,

    called: bool,
    state: OpState,
    lookahead: Option<Tuple>,
}

impl<'d> Delete<'d> {
    pub fn new(db: &'d Database, tx: &Transaction, child: Box<dyn OpIterator + 'd>) -> Self {
        Self {
            db,
            tx: *tx,
            child,
            called: false,
            state: OpState::Closed,
            lookahead: None,
        }
    }

    fn produce(&mut self) -> DbResult<Option<Tuple>> {
        if self.called {
            return Ok(None);
        }
        self.called = true;

        let mut count = 0;
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            self.db.buffer_pool().delete_tuple(self.db, &self.tx, &tuple)?;
            count += 1;
        }

        let tuple = Tuple::new(self.get_schema(), vec![Field::Int32(count)])?;
        Ok(Some(tuple))
    }
}

impl OpIterator for Delete<'_> {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        self.state = OpState::Open;
        self.lookahead = None;
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        match self.state {
            OpState::Closed => Err(DbError::db("delete is not open")),
            OpState::Exhausted => Ok(false),
            OpState::Open => {
                if self.lookahead.is_none() {
                    self.lookahead = self.produce()?;
                    if self.lookahead.is_none() {
                        self.state = OpState::Exhausted;
                    }
                }
                Ok(self.lookahead.is_some())
            }
        }
    }

    fn next(&mut self) -> DbResult<Tuple> {
        if !self.has_next()? {
            return Err(DbError::no_such_element("delete already ran"));
        }
        Ok(self.lookahead.take().unwrap())
    }

    /// The count is emitted once per operator, not once per open.
    fn rewind(&mut self) -> DbResult<()> {
        self.state = OpState::Open;
        self.lookahead = None;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.state = OpState::Closed;
        self.lookahead = None;
    }

    fn get_schema(&self) -> Schema {
        Schema::new(vec![FieldItem::new(Type::Int32, "count")])
    }
}
