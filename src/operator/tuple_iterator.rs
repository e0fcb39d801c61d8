use super::{OpIterator, OpState};
use crate::{
    error::{DbError, DbResult},
    storage::{Schema, Tuple},
};

/// An operator over an in-memory list of tuples; backs the aggregate's
/// materialized result set.
pub struct TupleIterator {
    schema: Schema,
    tuples: Vec<Tuple>,
    cursor: usize,
    state: OpState,
}

impl TupleIterator {
    pub fn new(schema: Schema, tuples: Vec<Tuple>) -> Self {
        Self {
            schema,
            tuples,
            cursor: 0,
            state: OpState::Closed,
        }
    }
}

impl OpIterator for TupleIterator {
    fn open(&mut self) -> DbResult<()> {
        self.cursor = 0;
        self.state = OpState::Open;
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        match self.state {
            OpState::Closed => Err(DbError::db("tuple iterator is not open")),
            _ => Ok(self.cursor < self.tuples.len()),
        }
    }

    fn next(&mut self) -> DbResult<Tuple> {
        if !self.has_next()? {
            return Err(DbError::no_such_element("tuple iterator exhausted"));
        }
        let tuple = self.tuples[self.cursor].clone();
        self.cursor += 1;
        Ok(tuple)
    }

    fn rewind(&mut self) -> DbResult<()> {
        if self.state == OpState::Closed {
            return Err(DbError::db("tuple iterator is not open"));
        }
        self.cursor = 0;
        self.state = OpState::Open;
        Ok(())
    }

    fn close(&mut self) {
        self.state = OpState::Closed;
    }

    fn get_schema(&self) -> Schema {
        self.schema.clone()
    }
}
