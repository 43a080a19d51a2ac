use crate::error::{Error, Result};
use crate::heap_file::HeapFile;
use crate::tuple::TupleDesc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The table registry: maps table ids and names to their heap files.
/// Read-mostly; written only while tables are being registered.
#[derive(Default)]
pub struct Catalog {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    files: HashMap<u32, Arc<HeapFile>>,
    names: HashMap<String, u32>,
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog::default()
    }

    /// Registers a table under a name, replacing any previous binding of
    /// the same name or id. Returns the table id.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str) -> u32 {
        let id = file.id();
        let mut inner = self.inner.write().unwrap();
        inner.files.insert(id, file);
        inner.names.insert(name.to_string(), id);
        id
    }

    /// The heap file owning the given table id.
    pub fn file(&self, table_id: u32) -> Result<Arc<HeapFile>> {
        self.inner
            .read()
            .unwrap()
            .files
            .get(&table_id)
            .cloned()
            .ok_or_else(|| Error::Db(format!("unknown table id {table_id}")))
    }

    /// The id registered under the given table name.
    pub fn table_id(&self, name: &str) -> Option<u32> {
        self.inner.read().unwrap().names.get(name).copied()
    }

    /// The schema of the given table.
    pub fn tuple_desc(&self, table_id: u32) -> Result<Arc<TupleDesc>> {
        Ok(self.file(table_id)?.desc().clone())
    }
}
