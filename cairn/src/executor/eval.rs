use slate::tuple::{Field, Tuple};
use std::cmp::Ordering;

/// Comparison operators for predicates. `Like` is substring containment
/// and only holds between string fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl PredOp {
    fn compare(self, lhs: &Field, rhs: &Field) -> bool {
        match (self, lhs, rhs) {
            (PredOp::Like, Field::Str(l), Field::Str(r)) => l.contains(r.as_str()),
            (PredOp::Like, _, _) => false,
            (op, Field::Int(l), Field::Int(r)) => op.ordered(l.cmp(r)),
            (op, Field::Str(l), Field::Str(r)) => op.ordered(l.cmp(r)),
            // Ordered comparisons across field kinds never hold.
            _ => false,
        }
    }

    fn ordered(self, ord: Ordering) -> bool {
        match self {
            PredOp::Eq => ord.is_eq(),
            PredOp::Ne => ord.is_ne(),
            PredOp::Lt => ord.is_lt(),
            PredOp::Le => ord.is_le(),
            PredOp::Gt => ord.is_gt(),
            PredOp::Ge => ord.is_ge(),
            PredOp::Like => unreachable!("like is handled before ordering"),
        }
    }
}

/// A comparison between one tuple field and a constant operand.
#[derive(Clone, Debug)]
pub struct Predicate {
    field: usize,
    op: PredOp,
    operand: Field,
}

impl Predicate {
    pub fn new(field: usize, op: PredOp, operand: Field) -> Predicate {
        Predicate { field, op, operand }
    }

    /// Whether the tuple satisfies the comparison.
    pub fn matches(&self, tuple: &Tuple) -> bool {
        self.op.compare(tuple.field(self.field), &self.operand)
    }
}

/// A comparison between a field of a left tuple and a field of a right one.
#[derive(Clone, Debug)]
pub struct JoinPredicate {
    left_field: usize,
    op: PredOp,
    right_field: usize,
}

impl JoinPredicate {
    pub fn new(left_field: usize, op: PredOp, right_field: usize) -> JoinPredicate {
        JoinPredicate {
            left_field,
            op,
            right_field,
        }
    }

    pub fn matches(&self, left: &Tuple, right: &Tuple) -> bool {
        self.op
            .compare(left.field(self.left_field), right.field(self.right_field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slate::tuple::{TupleDesc, Type};
    use std::sync::Arc;

    fn tuple(fields: Vec<Field>) -> Tuple {
        let types: Vec<Type> = fields
            .iter()
            .map(|f| match f {
                Field::Int(_) => Type::Int,
                Field::Str(_) => Type::String(16),
            })
            .collect();
        Tuple::new(Arc::new(TupleDesc::unnamed(&types)), fields).unwrap()
    }

    #[test]
    fn integer_comparisons() {
        let t = tuple(vec![Field::Int(5)]);
        assert!(Predicate::new(0, PredOp::Eq, Field::Int(5)).matches(&t));
        assert!(Predicate::new(0, PredOp::Ne, Field::Int(6)).matches(&t));
        assert!(Predicate::new(0, PredOp::Lt, Field::Int(6)).matches(&t));
        assert!(Predicate::new(0, PredOp::Ge, Field::Int(5)).matches(&t));
        assert!(!Predicate::new(0, PredOp::Gt, Field::Int(5)).matches(&t));
    }

    #[test]
    fn like_is_substring_containment_on_strings() {
        let t = tuple(vec![Field::Str("database".to_string())]);
        assert!(Predicate::new(0, PredOp::Like, Field::Str("base".to_string())).matches(&t));
        assert!(!Predicate::new(0, PredOp::Like, Field::Str("tables".to_string())).matches(&t));
        // Like never holds for integers.
        let n = tuple(vec![Field::Int(3)]);
        assert!(!Predicate::new(0, PredOp::Like, Field::Int(3)).matches(&n));
    }

    #[test]
    fn mismatched_field_kinds_never_compare_equal() {
        let t = tuple(vec![Field::Int(1)]);
        assert!(!Predicate::new(0, PredOp::Eq, Field::Str("1".to_string())).matches(&t));
    }

    #[test]
    fn join_predicate_compares_across_tuples() {
        let l = tuple(vec![Field::Int(1), Field::Int(9)]);
        let r = tuple(vec![Field::Int(9)]);
        assert!(JoinPredicate::new(1, PredOp::Eq, 0).matches(&l, &r));
        assert!(!JoinPredicate::new(0, PredOp::Eq, 0).matches(&l, &r));
    }
}
