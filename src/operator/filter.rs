use super::{OpIterator, OpState, Predicate};
use crate::{
    error::{DbError, DbResult},
    storage::{Schema, Tuple},
};

/// Propagates the child's tuples that satisfy a predicate.
pub struct Filter<'d> {
    predicate: Predicate,
    child: Box<dyn OpIterator + 'd>,

    state: OpState,
    lookahead: Option<Tuple>,
}

impl<'d> Filter<'d> {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator + 'd>) -> Self {
        Self {
            predicate,
            child,
            state: OpState::Closed,
            lookahead: None,
        }
    }

    fn produce(&mut self) -> DbResult<Option<Tuple>> {
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            if self.predicate.matches(&tuple) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }
}

impl OpIterator for Filter<'_> {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        self.state = OpState::Open;
        self.lookahead = None;
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        match self.state {
            OpState::Closed => Err(DbError::db("filter is not open")),
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
            return Err(DbError::no_such_element("filter exhausted"));
        }
        Ok(self.lookahead.take().unwrap())
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.child.rewind()?;
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
        self.child.get_schema()
    }
}
