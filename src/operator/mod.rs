mod aggregate;
mod delete;
mod filter;
mod insert;
mod join;
mod predicate;
mod seq_scan;
mod tuple_iterator;

pub use aggregate::{Aggregate, AggregateOp, Aggregator, IntegerAggregator, StringAggregator};
pub use delete::Delete;
pub use filter::Filter;
pub use insert::Insert;
pub use join::Join;
pub use predicate::{JoinPredicate, Op, Predicate};
pub use seq_scan::SeqScan;
pub use tuple_iterator::TupleIterator;

use crate::{error::DbResult, storage::Schema, storage::Tuple};

/// Where an operator sits in its lifecycle. `Exhausted` only means the
/// lookahead came back empty; `rewind` returns the operator to `Open`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum OpState {
    Closed,
    Open,
    Exhausted,
}

/// The pull-iterator contract every operator implements.
///
/// `open` must run before anything else; `next` after `has_next` returned
/// false fails with `NoSuchElement`. Operators are single state machines
/// with a one-tuple lookahead; there is no inheritance hook.
pub trait OpIterator {
    fn open(&mut self) -> DbResult<()>;
    fn has_next(&mut self) -> DbResult<bool>;
    fn next(&mut self) -> DbResult<Tuple>;
    fn rewind(&mut self) -> DbResult<()>;
    fn close(&mut self);

    /// Schema of the tuples this operator emits.
    fn get_schema(&self) -> Schema;
}
