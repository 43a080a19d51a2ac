use super::{BoxedExecutor, Executor};
use slate::buffer_pool::BufferPool;
use slate::heap_file::{HeapFile, HeapFileIter};
use slate::transaction::TransactionId;
use slate::tuple::{Tuple, TupleDesc};
use slate::{Database, Result};
use std::sync::Arc;

/// Sequential scan over one table, page by page through the buffer pool
/// under shared locks. An optional alias qualifies the output field names,
/// so downstream operators can tell the two sides of a self-join apart.
pub struct SeqScan {
    pool: Arc<BufferPool>,
    file: Arc<HeapFile>,
    tid: TransactionId,
    desc: Arc<TupleDesc>,
    aliased: bool,
    cursor: Option<HeapFileIter>,
}

impl SeqScan {
    pub fn new(
        db: &Database,
        tid: TransactionId,
        table_id: u32,
        alias: Option<&str>,
    ) -> Result<SeqScan> {
        let file = db.catalog().file(table_id)?;
        let desc = match alias {
            Some(alias) => Arc::new(file.desc().with_alias(alias)),
            None => file.desc().clone(),
        };
        Ok(SeqScan {
            pool: db.buffer_pool().clone(),
            file,
            tid,
            desc,
            aliased: alias.is_some(),
            cursor: None,
        })
    }
}

impl Executor for SeqScan {
    fn open(&mut self) -> Result<()> {
        self.cursor = Some(self.file.scan(self.tid, self.pool.clone()));
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        let cursor = self.cursor.as_mut().expect("next on a scan that is not open");
        let Some(stored) = cursor.next()? else {
            return Ok(None);
        };
        if !self.aliased {
            return Ok(Some(stored));
        }
        let mut out = Tuple::new(self.desc.clone(), stored.fields().to_vec())?;
        out.set_rid(stored.rid());
        Ok(Some(out))
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor
            .as_mut()
            .expect("rewind on a scan that is not open")
            .rewind();
        Ok(())
    }

    fn close(&mut self) {
        self.cursor = None;
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.desc.clone()
    }

    fn children(&mut self) -> Vec<&mut BoxedExecutor> {
        Vec::new()
    }

    fn set_children(&mut self, children: Vec<BoxedExecutor>) {
        assert!(children.is_empty(), "seq scan has no children");
    }
}
