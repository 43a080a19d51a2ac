//! Manages the buffer pool, the bounded cache of heap pages that fronts
//! every page access.
//!
//! All tuple reads and writes go through [`BufferPool::get_page`], which
//! acquires the page lock on behalf of the caller (shared for read-only
//! access, exclusive for read-write). Locks are held until
//! [`BufferPool::transaction_complete`], giving strict two-phase locking.
//! Dirty pages never reach disk before their transaction commits and are
//! all forced when it does (NO-STEAL / FORCE), so committed data survives a
//! clean shutdown without any log.

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::lock_manager::{LockManager, LockMode};
use crate::page::HeapPage;
use crate::transaction::TransactionId;
use crate::tuple::Tuple;
use crate::{slate_debug_log, PageId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

/// Default number of resident pages.
pub const DEFAULT_POOL_CAPACITY: usize = 50;

/// The access level requested for a page; maps onto shared or exclusive
/// page locks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

/// The buffer pool manager.
pub struct BufferPool {
    capacity: usize,
    catalog: Arc<Catalog>,
    lock_manager: LockManager,
    pages: Mutex<HashMap<PageId, Arc<RwLock<HeapPage>>>>,
    dirty: Mutex<HashMap<TransactionId, HashSet<PageId>>>,
}

impl BufferPool {
    pub fn new(capacity: usize, catalog: Arc<Catalog>) -> BufferPool {
        assert!(capacity > 0, "buffer pool capacity must be non-zero");
        BufferPool {
            capacity,
            catalog,
            lock_manager: LockManager::new(),
            pages: Mutex::new(HashMap::new()),
            dirty: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Whether the transaction currently holds a lock on the page.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds_lock(tid, pid)
    }

    /// Returns the requested page, blocking on its lock first. Propagates
    /// [`Error::TransactionAborted`] when the caller loses a wound-wait
    /// conflict. Loads the page from its heap file on a miss, evicting a
    /// clean resident page when the pool is full.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perms: Permissions,
    ) -> Result<Arc<RwLock<HeapPage>>> {
        let mode = match perms {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        };
        self.lock_manager.lock(tid, pid, mode)?;

        if let Some(page) = self.pages.lock().unwrap().get(&pid) {
            return Ok(page.clone());
        }

        // Miss: load outside the map mutex, the read can block.
        let file = self.catalog.file(pid.table)?;
        let loaded = Arc::new(RwLock::new(file.read_page(pid)?));

        let mut pages = self.pages.lock().unwrap();
        if let Some(page) = pages.get(&pid) {
            // Another shared holder loaded it while we read the file.
            return Ok(page.clone());
        }
        if pages.len() >= self.capacity {
            Self::evict_one(&mut pages)?;
        }
        pages.insert(pid, loaded.clone());
        Ok(loaded)
    }

    /// Drops one clean, unreferenced resident page. Dirty pages are never
    /// evicted (NO-STEAL); pages some caller still references are pinned.
    fn evict_one(pages: &mut HashMap<PageId, Arc<RwLock<HeapPage>>>) -> Result<()> {
        let victim = pages
            .iter()
            .find(|(_, page)| Arc::strong_count(page) == 1 && !page.read().unwrap().is_dirty())
            .map(|(pid, _)| *pid);
        match victim {
            Some(pid) => {
                slate_debug_log!("[BufferPool::evict_one] Evicting clean page {pid:?}");
                pages.remove(&pid);
                Ok(())
            }
            None => Err(Error::Db(
                "buffer pool is full: every resident page is dirty or in use".to_string(),
            )),
        }
    }

    /// Inserts through the owning table's heap file and records the dirtied
    /// pages against the transaction.
    pub fn insert_tuple(&self, tid: TransactionId, table_id: u32, tuple: Tuple) -> Result<()> {
        let file = self.catalog.file(table_id)?;
        let dirtied = file.insert_tuple(tid, tuple, self)?;
        self.record_dirty(tid, &dirtied);
        Ok(())
    }

    /// Deletes through the heap file owning the tuple's record id.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let rid = tuple
            .rid()
            .ok_or_else(|| Error::Db("tuple has no record id".to_string()))?;
        let file = self.catalog.file(rid.pid.table)?;
        let dirtied = file.delete_tuple(tid, tuple, self)?;
        self.record_dirty(tid, &dirtied);
        Ok(())
    }

    fn record_dirty(&self, tid: TransactionId, pids: &[PageId]) {
        let mut dirty = self.dirty.lock().unwrap();
        dirty.entry(tid).or_default().extend(pids.iter().copied());
    }

    /// Ends a transaction; must be called exactly once per transaction.
    /// A commit forces every page the transaction dirtied to disk and
    /// cleans it; an abort discards the resident copies so the next access
    /// rereads the last committed image. Both release all page locks.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        slate_debug_log!("[BufferPool::transaction_complete] {tid} commit={commit}");
        let dirtied = self.dirty.lock().unwrap().remove(&tid).unwrap_or_default();
        if commit {
            for pid in &dirtied {
                self.flush_page(*pid)?;
            }
        } else {
            let mut pages = self.pages.lock().unwrap();
            for pid in &dirtied {
                pages.remove(pid);
            }
        }
        self.lock_manager.unlock_all(tid);
        Ok(())
    }

    /// Writes one page back if it is dirty and clears its dirty mark.
    pub fn flush_page(&self, pid: PageId) -> Result<()> {
        let page = self.pages.lock().unwrap().get(&pid).cloned();
        let Some(page) = page else {
            return Ok(());
        };
        let mut guard = page.write().unwrap();
        if guard.is_dirty() {
            let file = self.catalog.file(pid.table)?;
            file.write_page(&guard)?;
            guard.mark_dirty(None);
        }
        Ok(())
    }

    /// Writes every dirty resident page, committed or not. Test-harness
    /// helper; production durability comes from the commit-time force.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pids: Vec<PageId> = self.pages.lock().unwrap().keys().copied().collect();
        for pid in pids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Drops a page from the pool without writing it back.
    pub fn discard_page(&self, pid: PageId) {
        self.pages.lock().unwrap().remove(&pid);
    }
}
