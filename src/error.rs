//! The engine's error taxonomy (spec §7), realized as a single enum
//! rather than bare strings so callers and tests can match on kind.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum EngineError {
    // -- schema errors --
    #[error("table '{0}' already exists")]
    TableExists(String),
    #[error("table '{0}' does not exist")]
    TableNotFound(String),
    #[error("no primary key column declared")]
    NoPrimaryKey,
    #[error("primary key column must be INTEGER")]
    PkNotInteger,
    #[error("column '{0}' not found")]
    ColumnNotFound(String),
    #[error("column count mismatch: expected {expected}, got {got}")]
    ColumnCountMismatch { expected: usize, got: usize },
    #[error("type mismatch for column '{column}'")]
    TypeMismatch { column: String },
    #[error("cannot update primary key column to a different value")]
    CannotUpdatePk,

    // -- data errors --
    #[error("missing value for a non-primary-key column")]
    NullValue,
    #[error("invalid primary key value")]
    InvalidPkValue,

    // -- storage errors --
    #[error("duplicate key")]
    DuplicateKey,
    #[error("key not found")]
    KeyNotFound,
    #[error("index page full")]
    IndexPageFull,

    // -- transaction errors --
    #[error("a transaction is already active")]
    TransactionActive,
    #[error("no transaction is active")]
    NoTransaction,

    // -- collaborator / storage-backend errors --
    #[error("parse error: {0}")]
    Parse(String),
    #[error("storage error: {0}")]
    Storage(String),
}
