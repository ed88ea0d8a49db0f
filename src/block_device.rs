//! The block device: raw, byte-addressable persistence of fixed-size
//! pages keyed by a numeric page id, plus a small string-keyed
//! metadata side-store (spec §4.1). Purely synchronous,
//! non-transactional; the virtual disk is the only layer that knows
//! about transactions.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde_json::Value as MetaValue;

use crate::error::EngineError;
use crate::page::{Page, PageId, PAGE_SIZE};

/// Any backend satisfying "a successful write is visible to all
/// subsequent reads of the same id" can implement this.
pub trait BlockDevice {
    fn read_page(&mut self, id: PageId) -> Result<Page, EngineError>;
    fn write_page(&mut self, id: PageId, page: &Page) -> Result<(), EngineError>;
    fn get_meta(&mut self, key: &str) -> Result<Option<MetaValue>, EngineError>;
    fn set_meta(&mut self, key: &str, value: MetaValue) -> Result<(), EngineError>;
    fn reset(&mut self) -> Result<(), EngineError>;
}

/// An in-process byte map. The default backend, and what the test
/// suite exercises the B-tree and engine invariants against.
#[derive(Default)]
pub struct InMemoryBlockDevice {
    pages: HashMap<PageId, Page>,
    meta: HashMap<String, MetaValue>,
}

impl InMemoryBlockDevice {
    pub fn new() -> Self {
        InMemoryBlockDevice::default()
    }
}

impl BlockDevice for InMemoryBlockDevice {
    fn read_page(&mut self, id: PageId) -> Result<Page, EngineError> {
        Ok(self.pages.get(&id).cloned().unwrap_or_else(Page::zeroed))
    }

    fn write_page(&mut self, id: PageId, page: &Page) -> Result<(), EngineError> {
        self.pages.insert(id, page.clone());
        Ok(())
    }

    fn get_meta(&mut self, key: &str) -> Result<Option<MetaValue>, EngineError> {
        Ok(self.meta.get(key).cloned())
    }

    fn set_meta(&mut self, key: &str, value: MetaValue) -> Result<(), EngineError> {
        self.meta.insert(key.to_string(), value);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), EngineError> {
        self.pages.clear();
        self.meta.clear();
        Ok(())
    }
}

/// A directory of two files: one flat page file addressed by page id,
/// one JSON sidecar holding the metadata side-store. Good enough for
/// single-process durability across runs; no locking, no WAL.
pub struct FileBlockDevice {
    pages_path: PathBuf,
    meta_path: PathBuf,
    file: File,
    meta: HashMap<String, MetaValue>,
}

impl FileBlockDevice {
    pub fn open(pages_path: impl AsRef<Path>, meta_path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let pages_path = pages_path.as_ref().to_path_buf();
        let meta_path = meta_path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&pages_path)
            .map_err(|e| EngineError::Storage(format!("failed to open page file: {e}")))?;

        let meta = if meta_path.exists() {
            let data = std::fs::read_to_string(&meta_path)
                .map_err(|e| EngineError::Storage(format!("failed to read meta file: {e}")))?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            HashMap::new()
        };

        Ok(FileBlockDevice {
            pages_path,
            meta_path,
            file,
            meta,
        })
    }

    fn offset_of(id: PageId) -> u64 {
        // Page 0 is the null sentinel and is never stored; real pages
        // start at 1 and are packed starting at file offset 0.
        (id.saturating_sub(1)) as u64 * PAGE_SIZE as u64
    }

    fn persist_meta(&self) -> Result<(), EngineError> {
        let data = serde_json::to_string(&self.meta)
            .map_err(|e| EngineError::Storage(format!("failed to encode meta: {e}")))?;
        std::fs::write(&self.meta_path, data)
            .map_err(|e| EngineError::Storage(format!("failed to write meta file: {e}")))
    }
}

impl BlockDevice for FileBlockDevice {
    fn read_page(&mut self, id: PageId) -> Result<Page, EngineError> {
        if id == 0 {
            return Ok(Page::zeroed());
        }
        let offset = Self::offset_of(id);
        let len = self
            .file
            .metadata()
            .map_err(|e| EngineError::Storage(format!("failed to stat page file: {e}")))?
            .len();
        if offset + PAGE_SIZE as u64 > len {
            return Ok(Page::zeroed());
        }
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| EngineError::Storage(format!("failed to seek page file: {e}")))?;
        let mut buf = [0u8; PAGE_SIZE];
        self.file
            .read_exact(&mut buf)
            .map_err(|e| EngineError::Storage(format!("failed to read page: {e}")))?;
        Ok(Page::from_bytes(buf))
    }

    fn write_page(&mut self, id: PageId, page: &Page) -> Result<(), EngineError> {
        if id == 0 {
            return Ok(());
        }
        let offset = Self::offset_of(id);
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| EngineError::Storage(format!("failed to seek page file: {e}")))?;
        self.file
            .write_all(page.as_bytes())
            .map_err(|e| EngineError::Storage(format!("failed to write page: {e}")))?;
        self.file
            .flush()
            .map_err(|e| EngineError::Storage(format!("failed to flush page file: {e}")))
    }

    fn get_meta(&mut self, key: &str) -> Result<Option<MetaValue>, EngineError> {
        Ok(self.meta.get(key).cloned())
    }

    fn set_meta(&mut self, key: &str, value: MetaValue) -> Result<(), EngineError> {
        self.meta.insert(key.to_string(), value);
        self.persist_meta()
    }

    fn reset(&mut self) -> Result<(), EngineError> {
        self.file
            .set_len(0)
            .map_err(|e| EngineError::Storage(format!("failed to truncate page file: {e}")))?;
        self.meta.clear();
        self.persist_meta()?;
        // Recreate the handle so the write cursor starts from byte 0.
        self.file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.pages_path)
            .map_err(|e| EngineError::Storage(format!("failed to reopen page file: {e}")))?;
        Ok(())
    }
}
