use super::{BoxedExecutor, Executor};
use slate::buffer_pool::BufferPool;
use slate::catalog::Catalog;
use slate::transaction::TransactionId;
use slate::tuple::{Field, Tuple, TupleDesc, Type};
use slate::{Database, Error, Result};
use std::sync::Arc;

fn count_desc() -> Arc<TupleDesc> {
    Arc::new(TupleDesc::named(&[(Type::Int, "count")]))
}

/// I/O failures inside a mutation surface as semantic errors; wound-wait
/// aborts pass through so the driver can roll the transaction back.
fn as_db(err: Error) -> Error {
    match err {
        Error::Io(msg) => Error::Db(msg),
        other => other,
    }
}

/// Inserts the child's tuples into the target table through the buffer
/// pool, then produces exactly one tuple holding the insert count.
pub struct Insert {
    pool: Arc<BufferPool>,
    catalog: Arc<Catalog>,
    tid: TransactionId,
    child: BoxedExecutor,
    table_id: u32,
    desc: Arc<TupleDesc>,
    count: i32,
    has_result: bool,
    opened: bool,
}

impl Insert {
    pub fn new(db: &Database, tid: TransactionId, child: BoxedExecutor, table_id: u32) -> Insert {
        Insert {
            pool: db.buffer_pool().clone(),
            catalog: db.catalog().clone(),
            tid,
            child,
            table_id,
            desc: count_desc(),
            count: 0,
            has_result: false,
            opened: false,
        }
    }

    fn run(&mut self) -> Result<()> {
        self.child.open()?;
        self.count = 0;
        let outcome = loop {
            match self.child.next() {
                Ok(Some(t)) => {
                    if let Err(e) = self.pool.insert_tuple(self.tid, self.table_id, t) {
                        break Err(as_db(e));
                    }
                    self.count += 1;
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.child.close();
        outcome?;
        self.has_result = true;
        Ok(())
    }
}

impl Executor for Insert {
    fn open(&mut self) -> Result<()> {
        let table_desc = self.catalog.tuple_desc(self.table_id)?;
        if *self.child.tuple_desc() != *table_desc {
            return Err(Error::Db(
                "child schema does not match the target table".to_string(),
            ));
        }
        self.run()?;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        assert!(self.opened, "next on an insert that is not open");
        if !self.has_result {
            return Ok(None);
        }
        self.has_result = false;
        Ok(Some(Tuple::new(
            self.desc.clone(),
            vec![Field::Int(self.count)],
        )?))
    }

    /// Re-runs the insertion. Harness-only: nothing protects against double
    /// insertion when a live plan is rewound.
    fn rewind(&mut self) -> Result<()> {
        assert!(self.opened, "rewind on an insert that is not open");
        self.run()
    }

    fn close(&mut self) {
        self.has_result = false;
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
        self.child = children.next().expect("insert expects one child");
        assert!(children.next().is_none(), "insert expects one child");
    }
}

/// Deletes the child's tuples from the tables owning them, routing each
/// through the buffer pool by record id, then produces exactly one tuple
/// holding the deletion count.
pub struct Delete {
    pool: Arc<BufferPool>,
    tid: TransactionId,
    child: BoxedExecutor,
    desc: Arc<TupleDesc>,
    count: i32,
    has_result: bool,
    opened: bool,
}

impl Delete {
    pub fn new(db: &Database, tid: TransactionId, child: BoxedExecutor) -> Delete {
        Delete {
            pool: db.buffer_pool().clone(),
            tid,
            child,
            desc: count_desc(),
            count: 0,
            has_result: false,
            opened: false,
        }
    }

    fn run(&mut self) -> Result<()> {
        self.child.open()?;
        self.count = 0;
        let outcome = loop {
            match self.child.next() {
                Ok(Some(t)) => {
                    if let Err(e) = self.pool.delete_tuple(self.tid, &t) {
                        break Err(as_db(e));
                    }
                    self.count += 1;
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.child.close();
        outcome?;
        self.has_result = true;
        Ok(())
    }
}

impl Executor for Delete {
    fn open(&mut self) -> Result<()> {
        self.run()?;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        assert!(self.opened, "next on a delete that is not open");
        if !self.has_result {
            return Ok(None);
        }
        self.has_result = false;
        Ok(Some(Tuple::new(
            self.desc.clone(),
            vec![Field::Int(self.count)],
        )?))
    }

    /// Re-runs the deletion; the same harness-only caveat as Insert.
    fn rewind(&mut self) -> Result<()> {
        assert!(self.opened, "rewind on a delete that is not open");
        self.run()
    }

    fn close(&mut self) {
        self.has_result = false;
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
        self.child = children.next().expect("delete expects one child");
        assert!(children.next().is_none(), "delete expects one child");
    }
}
