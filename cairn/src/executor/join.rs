use super::eval::JoinPredicate;
use super::{BoxedExecutor, Executor};
use slate::tuple::{Tuple, TupleDesc};
use slate::Result;
use std::sync::Arc;

/// Nested-loop join. The right child is drained into memory when the
/// operator opens; each left tuple is then checked against every buffered
/// right row, emitting the concatenation for each match.
pub struct Join {
    predicate: JoinPredicate,
    left: BoxedExecutor,
    right: BoxedExecutor,
    desc: Arc<TupleDesc>,
    right_rows: Vec<Tuple>,
    left_row: Option<Tuple>,
    right_cursor: usize,
    opened: bool,
}

impl Join {
    pub fn new(predicate: JoinPredicate, left: BoxedExecutor, right: BoxedExecutor) -> Join {
        let desc = Arc::new(TupleDesc::combine(&left.tuple_desc(), &right.tuple_desc()));
        Join {
            predicate,
            left,
            right,
            desc,
            right_rows: Vec::new(),
            left_row: None,
            right_cursor: 0,
            opened: false,
        }
    }
}

impl Executor for Join {
    fn open(&mut self) -> Result<()> {
        self.left.open()?;
        self.right.open()?;
        self.right_rows.clear();
        while let Some(t) = self.right.next()? {
            self.right_rows.push(t);
        }
        self.left_row = self.left.next()?;
        self.right_cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        assert!(self.opened, "next on a join that is not open");
        loop {
            if self.left_row.is_none() {
                return Ok(None);
            }
            while self.right_cursor < self.right_rows.len() {
                let right_idx = self.right_cursor;
                self.right_cursor += 1;
                let left = self.left_row.as_ref().unwrap();
                let right = &self.right_rows[right_idx];
                if self.predicate.matches(left, right) {
                    return Ok(Some(Tuple::combine(self.desc.clone(), left, right)));
                }
            }
            self.left_row = self.left.next()?;
            self.right_cursor = 0;
        }
    }

    fn rewind(&mut self) -> Result<()> {
        assert!(self.opened, "rewind on a join that is not open");
        self.left.rewind()?;
        self.left_row = self.left.next()?;
        self.right_cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.right_rows.clear();
        self.left_row = None;
        self.opened = false;
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.desc.clone()
    }

    fn children(&mut self) -> Vec<&mut BoxedExecutor> {
        vec![&mut self.left, &mut self.right]
    }

    fn set_children(&mut self, children: Vec<BoxedExecutor>) {
        let mut children = children.into_iter();
        self.left = children.next().expect("join expects two children");
        self.right = children.next().expect("join expects two children");
        assert!(children.next().is_none(), "join expects two children");
    }
}
