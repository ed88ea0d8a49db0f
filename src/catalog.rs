//! The catalog (spec §3, §6): the persisted description of every known
//! table, stored as a single JSON array under metadata key `tables`.
//!
//! A record missing its `columns` list is corruption, not a fatal
//! error: it is logged and the entry is skipped, the way the engine's
//! own startup is specified to behave (spec §4.5, §7).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as MetaValue;

use crate::codec::{ColumnDefinition, Schema};
use crate::error::EngineError;
use crate::page::PageId;
use crate::value::ColumnType;
use crate::virtual_disk::VirtualDisk;

const TABLES_KEY: &str = "tables";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnRecord {
    name: String,
    #[serde(rename = "type")]
    col_type: String,
    #[serde(rename = "isPrimaryKey", default, skip_serializing_if = "std::ops::Not::not")]
    is_primary_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableRecord {
    name: String,
    columns: Vec<ColumnRecord>,
    #[serde(rename = "pkColumn")]
    pk_column: String,
    #[serde(rename = "rootPageId")]
    root_page_id: PageId,
    seq: u32,
}

/// One table's in-memory bookkeeping: its schema plus the two fields
/// that change over the table's lifetime.
#[derive(Debug, Clone)]
pub struct TableMeta {
    pub schema: Schema,
    pub root_page_id: PageId,
    pub auto_seq: u32,
}

#[derive(Debug, Default)]
pub struct Catalog {
    tables: HashMap<String, TableMeta>,
}

impl Catalog {
    pub fn load(disk: &mut VirtualDisk) -> Result<Catalog, EngineError> {
        let mut tables = HashMap::new();
        if let Some(MetaValue::Array(records)) = disk.get_meta(TABLES_KEY)? {
            for raw in records {
                match serde_json::from_value::<TableRecord>(raw) {
                    Ok(record) => match table_meta_from_record(&record) {
                        Ok((name, meta)) => {
                            tables.insert(name, meta);
                        }
                        Err(e) => {
                            log::warn!("skipping corrupted catalog entry '{}': {e}", record.name);
                        }
                    },
                    Err(e) => {
                        log::warn!("skipping unparseable catalog entry: {e}");
                    }
                }
            }
        }
        Ok(Catalog { tables })
    }

    pub fn get(&self, name: &str) -> Option<&TableMeta> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn create_table(
        &mut self,
        disk: &mut VirtualDisk,
        name: &str,
        schema: Schema,
        root_page_id: PageId,
    ) -> Result<(), EngineError> {
        if self.tables.contains_key(name) {
            return Err(EngineError::TableExists(name.to_string()));
        }
        self.tables.insert(
            name.to_string(),
            TableMeta {
                schema,
                root_page_id,
                auto_seq: 0,
            },
        );
        self.persist(disk)
    }

    /// Updates a table's root page id and/or auto-increment sequence
    /// and re-persists the whole catalog (spec §3: "rewritten whenever
    /// a table is created or a table's auto_seq / root_page_id changes").
    pub fn update_table(
        &mut self,
        disk: &mut VirtualDisk,
        name: &str,
        root_page_id: PageId,
        auto_seq: u32,
    ) -> Result<(), EngineError> {
        let meta = self
            .tables
            .get_mut(name)
            .ok_or_else(|| EngineError::TableNotFound(name.to_string()))?;
        meta.root_page_id = root_page_id;
        meta.auto_seq = auto_seq;
        self.persist(disk)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|s| s.as_str())
    }

    fn persist(&self, disk: &mut VirtualDisk) -> Result<(), EngineError> {
        let records: Vec<TableRecord> = self
            .tables
            .iter()
            .map(|(name, meta)| table_record_from_meta(name, meta))
            .collect();
        let value = serde_json::to_value(&records)
            .map_err(|e| EngineError::Storage(format!("failed to encode catalog: {e}")))?;
        disk.set_meta(TABLES_KEY, value)
    }
}

fn table_meta_from_record(record: &TableRecord) -> Result<(String, TableMeta), EngineError> {
    if record.columns.is_empty() {
        return Err(EngineError::NoPrimaryKey);
    }
    let mut columns = Vec::with_capacity(record.columns.len());
    for col in &record.columns {
        let col_type = match col.col_type.as_str() {
            "INTEGER" => ColumnType::Integer,
            "TEXT" => ColumnType::Text,
            other => {
                return Err(EngineError::Storage(format!("unknown column type '{other}'")))
            }
        };
        columns.push(ColumnDefinition {
            name: col.name.clone(),
            col_type,
            is_primary_key: col.name == record.pk_column,
        });
    }
    let schema = Schema(columns);
    Ok((
        record.name.clone(),
        TableMeta {
            schema,
            root_page_id: record.root_page_id,
            auto_seq: record.seq,
        },
    ))
}

fn table_record_from_meta(name: &str, meta: &TableMeta) -> TableRecord {
    let pk_column = meta
        .schema
        .primary_key_column()
        .map(|c| c.name.clone())
        .unwrap_or_default();
    let columns = meta
        .schema
        .columns()
        .iter()
        .map(|c| ColumnRecord {
            name: c.name.clone(),
            col_type: match c.col_type {
                ColumnType::Integer => "INTEGER".to_string(),
                ColumnType::Text => "TEXT".to_string(),
            },
            is_primary_key: c.is_primary_key,
        })
        .collect();
    TableRecord {
        name: name.to_string(),
        columns,
        pk_column,
        root_page_id: meta.root_page_id,
        seq: meta.auto_seq,
    }
}
