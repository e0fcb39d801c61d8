use super::{JoinPredicate, OpIterator, OpState};
use crate::{
    error::{DbError, DbResult},
    storage::{Schema, Tuple},
};

/// Nested-loops join: for each outer tuple the inner child is rewound and
/// drained, emitting the concatenation whenever the predicate holds.
pub struct Join<'d> {
    predicate: JoinPredicate,
    outer: Box<dyn OpIterator + 'd>,
    inner: Box<dyn OpIterator + 'd>,

    outer_tuple: Option<Tuple>,
    state: OpState,
    lookahead: Option<Tuple>,
}

impl<'d> Join<'d> {
    pub fn new(
        predicate: JoinPredicate,
        outer: Box<dyn OpIterator + 'd>,
        inner: Box<dyn OpIterator + 'd>,
    ) -> Self {
        Self {
            predicate,
            outer,
            inner,
            outer_tuple: None,
            state: OpState::Closed,
            lookahead: None,
        }
    }

    fn produce(&mut self) -> DbResult<Option<Tuple>> {
        loop {
            if self.outer_tuple.is_none() {
                if !self.outer.has_next()? {
                    return Ok(None);
                }
                self.outer_tuple = Some(self.outer.next()?);
            }
            let left = self.outer_tuple.clone().unwrap();

            while self.inner.has_next()? {
                let right = self.inner.next()?;
                if self.predicate.matches(&left, &right) {
                    return Ok(Some(Tuple::merge(&left, &right)));
                }
            }

            // inner exhausted for this outer tuple; restart it for the next
            self.outer_tuple = None;
            self.inner.rewind()?;
        }
    }
}

impl OpIterator for Join<'_> {
    fn open(&mut self) -> DbResult<()> {
        self.outer.open()?;
        self.inner.open()?;
        self.outer_tuple = None;
        self.state = OpState::Open;
        self.lookahead = None;
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        match self.state {
            OpState::Closed => Err(DbError::db("join is not open")),
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
            return Err(DbError::no_such_element("join exhausted"));
        }
        Ok(self.lookahead.take().unwrap())
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.outer.rewind()?;
        self.inner.rewind()?;
        self.outer_tuple = None;
        self.state = OpState::Open;
        self.lookahead = None;
        Ok(())
    }

    fn close(&mut self) {
        self.outer.close();
        self.inner.close();
        self.outer_tuple = None;
        self.state = OpState::Closed;
        self.lookahead = None;
    }

    fn get_schema(&self) -> Schema {
        Schema::merge(&self.outer.get_schema(), &self.inner.get_schema())
    }
}
