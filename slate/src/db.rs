use crate::buffer_pool::{BufferPool, DEFAULT_POOL_CAPACITY};
use crate::catalog::Catalog;
use crate::heap_file::HeapFile;
use std::sync::Arc;

/// The top-level database handle: the catalog plus the buffer pool wired
/// over it. Passed by reference wherever the storage layer or the operators
/// need either; there is no process-global instance.
pub struct Database {
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPool>,
}

impl Database {
    /// A database with the given buffer-pool capacity.
    pub fn new(pool_capacity: usize) -> Database {
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = Arc::new(BufferPool::new(pool_capacity, catalog.clone()));
        Database {
            catalog,
            buffer_pool,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    /// Registers a heap file under a table name. Returns the table id.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str) -> u32 {
        self.catalog.add_table(file, name)
    }
}

impl Default for Database {
    fn default() -> Self {
        Database::new(DEFAULT_POOL_CAPACITY)
    }
}
