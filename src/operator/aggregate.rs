use std::collections::HashMap;

use super::{OpIterator, OpState, TupleIterator};
use crate::{
    error::{DbError, DbResult},
    storage::{Field, FieldItem, Schema, Tuple, Type},
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl AggregateOp {
    fn name(&self) -> &'static str {
        match self {
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Count => "count",
        }
    }
}

/// Groups are keyed by the group-by field; when there is no grouping every
/// tuple falls into a single synthetic group.
fn group_key(gfield: Option<usize>, tuple: &Tuple) -> Field {
    match gfield {
        Some(g) => tuple.get_field(g).clone(),
        None => Field::Int32(0),
    }
}

fn result_schema(gfield_type: Option<Type>, agg_name: &str) -> Schema {
    match gfield_type {
        Some(t) => Schema::new(vec![
            FieldItem::new(t, "group_val"),
            FieldItem::new(Type::Int32, agg_name),
        ]),
        None => Schema::new(vec![FieldItem::new(Type::Int32, agg_name)]),
    }
}

/// Computes one aggregate over a stream of int fields.
///
/// AVG carries sum and count separately and divides only when the result
/// set is materialized.
pub struct IntegerAggregator {
    gfield: Option<usize>,
    gfield_type: Option<Type>,
    afield: usize,
    op: AggregateOp,

    values: HashMap<Field, i64>,
    counts: HashMap<Field, i64>,
    // remembers insertion order so results are deterministic
    group_order: Vec<Field>,
}

impl IntegerAggregator {
    pub fn new(
        gfield: Option<usize>,
        gfield_type: Option<Type>,
        afield: usize,
        op: AggregateOp,
    ) -> Self {
        Self {
            gfield,
            gfield_type,
            afield,
            op,
            values: HashMap::new(),
            counts: HashMap::new(),
            group_order: Vec::new(),
        }
    }

    pub fn merge_tuple_into_group(&mut self, tuple: &Tuple) -> DbResult<()> {
        let key = group_key(self.gfield, tuple);
        let &Field::Int32(v) = tuple.get_field(self.afield) else {
            return Err(DbError::db("aggregate field is not an int"));
        };
        let v = v as i64;

        if !self.counts.contains_key(&key) {
            self.group_order.push(key.clone());
        }
        *self.counts.entry(key.clone()).or_insert(0) += 1;

        match self.op {
            AggregateOp::Min => {
                let slot = self.values.entry(key).or_insert(i64::MAX);
                *slot = (*slot).min(v);
            }
            AggregateOp::Max => {
                let slot = self.values.entry(key).or_insert(i64::MIN);
                *slot = (*slot).max(v);
            }
            AggregateOp::Sum | AggregateOp::Avg => {
                *self.values.entry(key).or_insert(0) += v;
            }
            AggregateOp::Count => {}
        }
        Ok(())
    }

    pub fn results(&self) -> DbResult<TupleIterator> {
        let schema = result_schema(self.gfield_type, self.op.name());
        let mut tuples = Vec::with_capacity(self.group_order.len());
        for key in &self.group_order {
            let aggregate = match self.op {
                AggregateOp::Min | AggregateOp::Max | AggregateOp::Sum => self.values[key],
                AggregateOp::Avg => self.values[key] / self.counts[key],
                AggregateOp::Count => self.counts[key],
            };
            let aggregate = Field::Int32(aggregate as i32);
            let fields = match self.gfield {
                Some(_) => vec![key.clone(), aggregate],
                None => vec![aggregate],
            };
            tuples.push(Tuple::new(schema.clone(), fields)?);
        }
        Ok(TupleIterator::new(schema, tuples))
    }
}

/// String fields only support COUNT.
pub struct StringAggregator {
    gfield: Option<usize>,
    gfield_type: Option<Type>,

    counts: HashMap<Field, i64>,
    group_order: Vec<Field>,
}

impl StringAggregator {
    pub fn new(gfield: Option<usize>, gfield_type: Option<Type>, op: AggregateOp) -> DbResult<Self> {
        if op != AggregateOp::Count {
            return Err(DbError::db(format!(
                "{} is not supported over strings",
                op.name()
            )));
        }
        Ok(Self {
            gfield,
            gfield_type,
            counts: HashMap::new(),
            group_order: Vec::new(),
        })
    }

    pub fn merge_tuple_into_group(&mut self, tuple: &Tuple) {
        let key = group_key(self.gfield, tuple);
        if !self.counts.contains_key(&key) {
            self.group_order.push(key.clone());
        }
        *self.counts.entry(key).or_insert(0) += 1;
    }

    pub fn results(&self) -> DbResult<TupleIterator> {
        let schema = result_schema(self.gfield_type, AggregateOp::Count.name());
        let mut tuples = Vec::with_capacity(self.group_order.len());
        for key in &self.group_order {
            let aggregate = Field::Int32(self.counts[key] as i32);
            let fields = match self.gfield {
                Some(_) => vec![key.clone(), aggregate],
                None => vec![aggregate],
            };
            tuples.push(Tuple::new(schema.clone(), fields)?);
        }
        Ok(TupleIterator::new(schema, tuples))
    }
}

/// Tagged dispatch over the two accumulator kinds; which one is built
/// depends on the type of the aggregated field.
pub enum Aggregator {
    Int(IntegerAggregator),
    Str(StringAggregator),
}

impl Aggregator {
    fn merge_tuple_into_group(&mut self, tuple: &Tuple) -> DbResult<()> {
        match self {
            Aggregator::Int(a) => a.merge_tuple_into_group(tuple),
            Aggregator::Str(a) => {
                a.merge_tuple_into_group(tuple);
                Ok(())
            }
        }
    }

    fn results(&self) -> DbResult<TupleIterator> {
        match self {
            Aggregator::Int(a) => a.results(),
            Aggregator::Str(a) => a.results(),
        }
    }
}

/// Group-by aggregation over a single column. The child is fully drained
/// on `open`; `next` then walks the materialized groups.
pub struct Aggregate<'d> {
    child: Box<dyn OpIterator + 'd>,
    afield: usize,
    gfield: Option<usize>,
    op: AggregateOp,

    results: Option<TupleIterator>,
    state: OpState,
    lookahead: Option<Tuple>,
}

impl<'d> Aggregate<'d> {
    pub fn new(
        child: Box<dyn OpIterator + 'd>,
        afield: usize,
        gfield: Option<usize>,
        op: AggregateOp,
    ) -> Self {
        Self {
            child,
            afield,
            gfield,
            op,
            results: None,
            state: OpState::Closed,
            lookahead: None,
        }
    }

    fn produce(&mut self) -> DbResult<Option<Tuple>> {
        let Some(results) = self.results.as_mut() else {
            return Ok(None);
        };
        if results.has_next()? {
            Ok(Some(results.next()?))
        } else {
            Ok(None)
        }
    }
}

impl OpIterator for Aggregate<'_> {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;

        let child_schema = self.child.get_schema();
        let gfield_type = self.gfield.map(|g| child_schema.get_field_type(g));
        let mut aggregator = match child_schema.get_field_type(self.afield) {
            Type::Int32 => Aggregator::Int(IntegerAggregator::new(
                self.gfield,
                gfield_type,
                self.afield,
                self.op,
            )),
            Type::String => {
                Aggregator::Str(StringAggregator::new(self.gfield, gfield_type, self.op)?)
            }
        };

        while self.child.has_next()? {
            let tuple = self.child.next()?;
            aggregator.merge_tuple_into_group(&tuple)?;
        }
        self.child.close();

        let mut results = aggregator.results()?;
        results.open()?;
        self.results = Some(results);
        self.state = OpState::Open;
        self.lookahead = None;
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        match self.state {
            OpState::Closed => Err(DbError::db("aggregate is not open")),
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
            return Err(DbError::no_such_element("aggregate exhausted"));
        }
        Ok(self.lookahead.take().unwrap())
    }

    fn rewind(&mut self) -> DbResult<()> {
        match self.results.as_mut() {
            Some(results) => results.rewind()?,
            None => return Err(DbError::db("aggregate is not open")),
        }
        self.state = OpState::Open;
        self.lookahead = None;
        Ok(())
    }

    fn close(&mut self) {
        self.results = None;
        self.state = OpState::Closed;
        self.lookahead = None;
    }

    fn get_schema(&self) -> Schema {
        let child_schema = self.child.get_schema();
        result_schema(
            self.gfield.map(|g| child_schema.get_field_type(g)),
            self.op.name(),
        )
    }
}
