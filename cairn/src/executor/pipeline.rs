use super::eval::Predicate;
use super::{BoxedExecutor, Executor};
use slate::tuple::{Tuple, TupleDesc};
use slate::Result;
use std::sync::Arc;

/// Passes through the child tuples that satisfy a predicate.
pub struct Filter {
    predicate: Predicate,
    child: BoxedExecutor,
    opened: bool,
}

impl Filter {
    pub fn new(predicate: Predicate, child: BoxedExecutor) -> Filter {
        Filter {
            predicate,
            child,
            opened: false,
        }
    }
}

impl Executor for Filter {
    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        assert!(self.opened, "next on a filter that is not open");
        loop {
            match self.child.next()? {
                Some(t) if self.predicate.matches(&t) => return Ok(Some(t)),
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }

    fn rewind(&mut self) -> Result<()> {
        assert!(self.opened, "rewind on a filter that is not open");
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.child.tuple_desc()
    }

    fn children(&mut self) -> Vec<&mut BoxedExecutor> {
        vec![&mut self.child]
    }

    fn set_children(&mut self, children: Vec<BoxedExecutor>) {
        let mut children = children.into_iter();
        self.child = children.next().expect("filter expects one child");
        assert!(children.next().is_none(), "filter expects one child");
    }
}

/// Projects a subset (or reordering) of the child's columns, by index.
pub struct Project {
    child: BoxedExecutor,
    fields: Vec<usize>,
    desc: Arc<TupleDesc>,
    opened: bool,
}

impl Project {
    pub fn new(child: BoxedExecutor, fields: Vec<usize>) -> Project {
        let input = child.tuple_desc();
        let desc = Arc::new(TupleDesc::new(
            fields.iter().map(|&i| input.columns()[i].clone()).collect(),
        ));
        Project {
            child,
            fields,
            desc,
            opened: false,
        }
    }
}

impl Executor for Project {
    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        assert!(self.opened, "next on a projection that is not open");
        let Some(t) = self.child.next()? else {
            return Ok(None);
        };
        let fields = self.fields.iter().map(|&i| t.field(i).clone()).collect();
        Ok(Some(Tuple::new(self.desc.clone(), fields)?))
    }

    fn rewind(&mut self) -> Result<()> {
        assert!(self.opened, "rewind on a projection that is not open");
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.desc.clone()
    }

    fn children(&mut self) -> Vec<&mut BoxedExecutor> {
        vec![&mut self.child]
    }

    fn set_children(&mut self, children: Vec<BoxedExecutor>) {
        let mut children = children.into_iter();
        self.child = children.next().expect("projection expects one child");
        assert!(children.next().is_none(), "projection expects one child");
    }
}
