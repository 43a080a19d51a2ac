use crate::buffer_pool::{BufferPool, Permissions};
use crate::error::{Error, Result};
use crate::page::HeapPage;
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};
use crate::{page_size, slate_debug_log, PageId};
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

/// A table stored as a sequence of fixed-size slotted pages in one file.
/// Page k lives at byte offset k * page_size; there is no file header,
/// checksum, or magic number.
///
/// The table id is the crc32 of the backing file's absolute path, so it is
/// stable across runs for the same path. Moving the file changes the id.
pub struct HeapFile {
    file: Mutex<File>,
    path: PathBuf,
    id: u32,
    desc: Arc<TupleDesc>,
}

impl HeapFile {
    /// Opens the backing file, creating it (and its parent directories) if
    /// needed.
    pub fn open<P: AsRef<Path>>(path: P, desc: Arc<TupleDesc>) -> Result<Arc<HeapFile>> {
        let path_ref = path.as_ref();
        slate_debug_log!("[HeapFile::open] Opening table file at: {path_ref:?}");
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path_ref)?;

        let path = path_ref.canonicalize()?;
        let id = crc32fast::hash(path.to_string_lossy().as_bytes());
        slate_debug_log!("[HeapFile::open] Table id {id} for {path:?}");

        Ok(Arc::new(HeapFile {
            file: Mutex::new(file),
            path,
            id,
            desc,
        }))
    }

    /// The stable table id.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// The number of pages currently backed by the file.
    pub fn num_pages(&self) -> Result<u32> {
        let len = self.file.lock().unwrap().metadata()?.len();
        let page = page_size() as u64;
        Ok(((len + page - 1) / page) as u32)
    }

    /// Reads the page at `pid`. An offset at or past end-of-file yields an
    /// empty page, which lets the insert path grow the file; a short final
    /// page is zero-filled.
    pub fn read_page(&self, pid: PageId) -> Result<HeapPage> {
        if pid.table != self.id {
            return Err(Error::Db(format!(
                "page {pid:?} does not belong to table {}",
                self.id
            )));
        }
        let mut file = self.file.lock().unwrap();
        let len = file.metadata()?.len();
        let offset = pid.page_no as u64 * page_size() as u64;
        if offset >= len {
            slate_debug_log!("[HeapFile::read_page] Page {pid:?} is new, returning empty page");
            return Ok(HeapPage::empty(pid, self.desc.clone()));
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; page_size()];
        let mut read = 0;
        while read < data.len() {
            let n = file.read(&mut data[read..])?;
            if n == 0 {
                break;
            }
            read += n;
        }
        drop(file);
        HeapPage::from_bytes(pid, self.desc.clone(), &data)
    }

    /// Writes the page image at its offset, extending the file if needed.
    /// The write is synchronous; this is the engine's only durability
    /// mechanism.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        let pid = page.pid();
        if pid.table != self.id {
            return Err(Error::Db(format!(
                "page {pid:?} does not belong to table {}",
                self.id
            )));
        }
        slate_debug_log!("[HeapFile::write_page] Writing page {pid:?}");
        let data = page.to_bytes();
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(pid.page_no as u64 * page_size() as u64))?;
        file.write_all(&data)?;
        file.sync_all()?;
        Ok(())
    }

    /// Walks pages 0, 1, 2, … under exclusive locks acquired through the
    /// buffer pool until one has a free slot, inserting there. The walk
    /// terminates because the first page past the end of the file reads
    /// back empty. When it lands on such a page the file is extended with
    /// the empty image first, so scans bound by the file length see the
    /// page; the tuple itself stays in the pool until commit. Returns the
    /// dirtied page ids.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        tuple: Tuple,
        pool: &BufferPool,
    ) -> Result<Vec<PageId>> {
        let mut page_no = 0;
        let (pid, page) = loop {
            let pid = PageId {
                table: self.id,
                page_no,
            };
            let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;
            let has_room = page.read().unwrap().empty_slot_count() > 0;
            if has_room {
                break (pid, page);
            }
            page_no += 1;
        };
        let mut guard = page.write().unwrap();
        if pid.page_no >= self.num_pages()? {
            self.write_page(&guard)?;
        }
        guard.insert_tuple(tuple)?;
        guard.mark_dirty(Some(tid));
        Ok(vec![pid])
    }

    /// Deletes the tuple named by its record id, under an exclusive lock on
    /// its page. Returns the dirtied page ids.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        tuple: &Tuple,
        pool: &BufferPool,
    ) -> Result<Vec<PageId>> {
        let rid = tuple
            .rid()
            .ok_or_else(|| Error::Db("tuple has no record id".to_string()))?;
        if rid.pid.table != self.id {
            return Err(Error::Db("tuple belongs to a different table".to_string()));
        }
        let page = pool.get_page(tid, rid.pid, Permissions::ReadWrite)?;
        let mut guard = page.write().unwrap();
        guard.delete_tuple(tuple)?;
        guard.mark_dirty(Some(tid));
        Ok(vec![rid.pid])
    }

    /// A restartable cursor over every stored tuple, in page order.
    pub fn scan(self: &Arc<Self>, tid: TransactionId, pool: Arc<BufferPool>) -> HeapFileIter {
        HeapFileIter {
            file: self.clone(),
            pool,
            tid,
            page_no: 0,
            page: None,
            slot: 0,
        }
    }
}

/// Cursor over a heap file's tuples. Each page is pinned read-only through
/// the buffer pool as the cursor reaches it.
pub struct HeapFileIter {
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    tid: TransactionId,
    page_no: u32,
    page: Option<Arc<RwLock<HeapPage>>>,
    slot: usize,
}

impl HeapFileIter {
    /// The next stored tuple, or `None` at end of file.
    pub fn next(&mut self) -> Result<Option<Tuple>> {
        loop {
            if self.page.is_none() {
                if self.page_no >= self.file.num_pages()? {
                    return Ok(None);
                }
                let pid = PageId {
                    table: self.file.id(),
                    page_no: self.page_no,
                };
                self.page = Some(self.pool.get_page(self.tid, pid, Permissions::ReadOnly)?);
                self.slot = 0;
            }
            {
                let page = self.page.as_ref().unwrap().read().unwrap();
                while self.slot < page.slot_count() {
                    let slot = self.slot;
                    self.slot += 1;
                    if let Some(tuple) = page.tuple_at(slot) {
                        return Ok(Some(tuple.clone()));
                    }
                }
            }
            self.page = None;
            self.page_no += 1;
        }
    }

    /// Restarts the cursor at the first page.
    pub fn rewind(&mut self) {
        self.page_no = 0;
        self.page = None;
        self.slot = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{Field, Type};
    use tempfile::tempdir;

    fn desc() -> Arc<TupleDesc> {
        Arc::new(TupleDesc::unnamed(&[Type::Int, Type::Int]))
    }

    fn row(desc: &Arc<TupleDesc>, a: i32, b: i32) -> Tuple {
        Tuple::new(desc.clone(), vec![Field::Int(a), Field::Int(b)]).unwrap()
    }

    #[test]
    fn ids_are_stable_for_a_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stable.tbl");
        let a = HeapFile::open(&path, desc()).unwrap();
        let b = HeapFile::open(&path, desc()).unwrap();
        let other = HeapFile::open(dir.path().join("other.tbl"), desc()).unwrap();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), other.id());
    }

    #[test]
    fn reading_past_end_of_file_yields_an_empty_page() {
        let dir = tempdir().unwrap();
        let file = HeapFile::open(dir.path().join("t.tbl"), desc()).unwrap();
        assert_eq!(file.num_pages().unwrap(), 0);
        let page = file
            .read_page(PageId {
                table: file.id(),
                page_no: 3,
            })
            .unwrap();
        assert_eq!(page.iter().count(), 0);
        assert_eq!(page.empty_slot_count(), page.slot_count());
    }

    #[test]
    fn written_pages_read_back_bit_for_bit() {
        let dir = tempdir().unwrap();
        let d = desc();
        let file = HeapFile::open(dir.path().join("t.tbl"), d.clone()).unwrap();
        let pid = PageId {
            table: file.id(),
            page_no: 1,
        };
        let mut page = file.read_page(pid).unwrap();
        page.insert_tuple(row(&d, 7, 70)).unwrap();
        file.write_page(&page).unwrap();

        // Writing page 1 extends the file to two pages.
        assert_eq!(file.num_pages().unwrap(), 2);
        let reloaded = file.read_page(pid).unwrap();
        assert_eq!(reloaded.to_bytes(), page.to_bytes());
    }

    #[test]
    fn foreign_pages_are_rejected() {
        let dir = tempdir().unwrap();
        let file = HeapFile::open(dir.path().join("t.tbl"), desc()).unwrap();
        let foreign = PageId {
            table: file.id().wrapping_add(1),
            page_no: 0,
        };
        assert!(file.read_page(foreign).is_err());
    }
}
