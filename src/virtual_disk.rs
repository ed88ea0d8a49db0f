//! The transactional page cache / virtual disk (spec §4.2): a
//! write-through cache over a `BlockDevice`, with a transaction buffer
//! providing all-or-nothing commit and discard-on-rollback semantics.
//! The B-tree and row codec are unaware of any of this; they only ever
//! see a consistent page view through `VirtualDisk::read_page`.

use std::collections::HashMap;

use serde_json::Value as MetaValue;

use crate::block_device::BlockDevice;
use crate::error::EngineError;
use crate::page::{Page, PageId};

const MAX_PAGE_ID_KEY: &str = "max_page_id";

/// Per-transaction override of page and metadata writes (spec §9's
/// redesign note: modeled as an `Option<TxState>` rather than two
/// parallel nullable fields).
struct TxState {
    pages: HashMap<PageId, Page>,
    meta: HashMap<String, MetaValue>,
    max_page_id: PageId,
}

pub struct VirtualDisk {
    device: Box<dyn BlockDevice>,
    cache: HashMap<PageId, Page>,
    max_page_id: PageId,
    tx: Option<TxState>,
}

impl VirtualDisk {
    pub fn new(mut device: Box<dyn BlockDevice>) -> Result<Self, EngineError> {
        let max_page_id = Self::load_max_page_id(device.as_mut())?;
        Ok(VirtualDisk {
            device,
            cache: HashMap::new(),
            max_page_id,
            tx: None,
        })
    }

    fn load_max_page_id(device: &mut dyn BlockDevice) -> Result<PageId, EngineError> {
        Ok(device
            .get_meta(MAX_PAGE_ID_KEY)?
            .and_then(|v| v.as_u64())
            .map(|n| n as PageId)
            .unwrap_or(0))
    }

    pub fn read_page(&mut self, id: PageId) -> Result<Page, EngineError> {
        if let Some(tx) = &self.tx {
            if let Some(page) = tx.pages.get(&id) {
                return Ok(page.clone());
            }
        }
        if let Some(page) = self.cache.get(&id) {
            return Ok(page.clone());
        }
        let page = self.device.read_page(id)?;
        self.cache.insert(id, page.clone());
        Ok(page)
    }

    pub fn write_page(&mut self, id: PageId, page: &Page) -> Result<(), EngineError> {
        if let Some(tx) = &mut self.tx {
            // Defensive copy: later mutation of the caller's page must
            // never be visible through the buffer.
            tx.pages.insert(id, page.clone());
            return Ok(());
        }
        self.cache.insert(id, page.clone());
        self.device.write_page(id, page)?;
        if id > self.max_page_id {
            self.max_page_id = id;
            self.persist_max_page_id()?;
        }
        Ok(())
    }

    pub fn allocate_page(&mut self) -> Result<PageId, EngineError> {
        if let Some(tx) = &mut self.tx {
            tx.max_page_id += 1;
            return Ok(tx.max_page_id);
        }
        self.max_page_id += 1;
        self.persist_max_page_id()?;
        Ok(self.max_page_id)
    }

    pub fn get_meta(&mut self, key: &str) -> Result<Option<MetaValue>, EngineError> {
        if let Some(tx) = &self.tx {
            if let Some(value) = tx.meta.get(key) {
                return Ok(Some(value.clone()));
            }
        }
        self.device.get_meta(key)
    }

    pub fn set_meta(&mut self, key: &str, value: MetaValue) -> Result<(), EngineError> {
        if let Some(tx) = &mut self.tx {
            tx.meta.insert(key.to_string(), value);
            return Ok(());
        }
        self.device.set_meta(key, value)
    }

    pub fn begin(&mut self) -> Result<(), EngineError> {
        if self.tx.is_some() {
            return Err(EngineError::TransactionActive);
        }
        self.tx = Some(TxState {
            pages: HashMap::new(),
            meta: HashMap::new(),
            max_page_id: self.max_page_id,
        });
        Ok(())
    }

    pub fn commit(&mut self) -> Result<(), EngineError> {
        let tx = self.tx.take().ok_or(EngineError::NoTransaction)?;

        for (id, page) in tx.pages {
            self.write_page(id, &page)?;
        }
        for (key, value) in tx.meta {
            self.device.set_meta(&key, value)?;
        }
        self.max_page_id = tx.max_page_id;
        self.persist_max_page_id()
    }

    pub fn rollback(&mut self) -> Result<(), EngineError> {
        if self.tx.is_none() {
            return Err(EngineError::NoTransaction);
        }
        self.tx = None;
        self.cache.clear();
        self.max_page_id = Self::load_max_page_id(self.device.as_mut())?;
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), EngineError> {
        self.tx = None;
        self.cache.clear();
        self.device.reset()?;
        self.max_page_id = 0;
        Ok(())
    }

    fn persist_max_page_id(&mut self) -> Result<(), EngineError> {
        self.device
            .set_meta(MAX_PAGE_ID_KEY, MetaValue::from(self.max_page_id))
    }
}
