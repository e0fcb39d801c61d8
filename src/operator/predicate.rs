use crate::storage::{Field, Tuple};

/// The six comparison operators.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Op {
    Equals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    NotEquals,
}

/// Compares one field of a tuple against a constant.
#[derive(Clone)]
pub struct Predicate {
    pub field_index: usize,
    pub op: Op,
    pub operand: Field,
}

impl Predicate {
    pub fn new(field_index: usize, op: Op, operand: &Field) -> Self {
        Self {
            field_index,
            op,
            operand: operand.clone(),
        }
    }

    pub fn matches(&self, tuple: &Tuple) -> bool {
        tuple.get_field(self.field_index).compare(self.op, &self.operand)
    }
}

/// Compares one field of an outer tuple against one field of an inner
/// tuple.
#[derive(Clone)]
pub struct JoinPredicate {
    pub field_index1: usize,
    pub op: Op,
    pub field_index2: usize,
}

impl JoinPredicate {
    pub fn new(field_index1: usize, op: Op, field_index2: usize) -> Self {
        Self {
            field_index1,
            op,
            field_index2,
        }
    }

    pub fn matches(&self, left: &Tuple, right: &Tuple) -> bool {
        left.get_field(self.field_index1)
            .compare(self.op, right.get_field(self.field_index2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Field;

    #[test]
    fn test_predicate_matches() {
        let tuple = Tuple::new_int_tuple(7, 2);
        assert!(Predicate::new(0, Op::Equals, &Field::Int32(7)).matches(&tuple));
        assert!(Predicate::new(0, Op::GreaterThan, &Field::Int32(3)).matches(&tuple));
        assert!(!Predicate::new(1, Op::LessThan, &Field::Int32(7)).matches(&tuple));
        assert!(Predicate::new(1, Op::NotEquals, &Field::Int32(8)).matches(&tuple));
    }

    #[test]
    fn test_join_predicate_matches() {
        let left = Tuple::new_int_tuple(5, 1);
        let right = Tuple::new_int_tuple(9, 2);
        assert!(JoinPredicate::new(0, Op::LessThan, 1).matches(&left, &right));
        assert!(!JoinPredicate::new(0, Op::Equals, 0).matches(&left, &right));
    }
}
