//! Schema-driven row codec (spec §4.4).
//!
//! A row is encoded as the concatenation, in schema column order, of
//! `value_len:u16 (BE) | value_bytes`. Decoding is strictly
//! schema-driven and defensive: a truncated tail yields a partially
//! decoded row rather than a hard error, so the format can evolve
//! without every reader needing to agree on column count.

use byteorder::{BigEndian, ByteOrder};

use crate::error::EngineError;
use crate::value::{ColumnType, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub col_type: ColumnType,
    pub is_primary_key: bool,
}

/// An ordered list of columns. The primary-key column (if any) must be
/// `INTEGER`; enforced by `Engine::create_table`, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema(pub Vec<ColumnDefinition>);

impl Schema {
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.0
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|c| c.name == name)
    }

    pub fn primary_key_index(&self) -> Option<usize> {
        self.0.iter().position(|c| c.is_primary_key)
    }

    pub fn primary_key_column(&self) -> Option<&ColumnDefinition> {
        self.0.iter().find(|c| c.is_primary_key)
    }
}

/// Encodes a full row (one value per schema column, in order) into its
/// compact byte representation.
pub fn encode_row(schema: &Schema, values: &[Value]) -> Result<Vec<u8>, EngineError> {
    if values.len() != schema.0.len() {
        return Err(EngineError::NullValue);
    }

    let mut buf = Vec::new();
    for (col, value) in schema.0.iter().zip(values.iter()) {
        if value.type_of() != col.col_type {
            return Err(EngineError::TypeMismatch {
                column: col.name.clone(),
            });
        }
        match value {
            Value::Integer(n) => {
                let mut len_buf = [0u8; 2];
                BigEndian::write_u16(&mut len_buf, 4);
                buf.extend_from_slice(&len_buf);
                let mut val_buf = [0u8; 4];
                BigEndian::write_i32(&mut val_buf, *n);
                buf.extend_from_slice(&val_buf);
            }
            Value::Text(s) => {
                let bytes = s.as_bytes();
                let mut len_buf = [0u8; 2];
                BigEndian::write_u16(&mut len_buf, bytes.len() as u16);
                buf.extend_from_slice(&len_buf);
                buf.extend_from_slice(bytes);
            }
        }
    }
    Ok(buf)
}

/// Decodes as many leading columns as the buffer has room for. A
/// buffer shorter than `value_len + 2` for some column stops decoding
/// there rather than erroring (spec §4.4).
pub fn decode_row(schema: &Schema, buf: &[u8]) -> Vec<Value> {
    let mut values = Vec::with_capacity(schema.0.len());
    let mut offset = 0usize;

    for col in &schema.0 {
        if buf.len() < offset + 2 {
            break;
        }
        let value_len = BigEndian::read_u16(&buf[offset..offset + 2]) as usize;
        if buf.len() < offset + 2 + value_len {
            break;
        }
        let value_bytes = &buf[offset + 2..offset + 2 + value_len];
        let value = match col.col_type {
            ColumnType::Integer => {
                if value_len != 4 {
                    break;
                }
                Value::Integer(BigEndian::read_i32(value_bytes))
            }
            ColumnType::Text => match std::str::from_utf8(value_bytes) {
                Ok(s) => Value::Text(s.to_string()),
                Err(_) => break,
            },
        };
        values.push(value);
        offset += 2 + value_len;
    }

    values
}
