//! The `Command` algebra (spec §6): the value the lexer/parser produce
//! and the only thing `Engine::execute` ever consumes. Everything here
//! is plain data — no behavior, no validation; that lives in
//! `crate::engine`.

use crate::codec::ColumnDefinition;

/// A literal as written in SQL text, before any column-type checking.
/// `Null` is the `NULL` keyword, meaningful only as a primary-key
/// placeholder that triggers auto-increment (spec §4.5 `INSERT`).
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i32),
    Text(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhereCondition {
    pub column: String,
    pub operator: Operator,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Literal,
}

/// `LEFT` is accepted but, per spec §9 open question 4, this engine
/// treats it identically to `INNER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub table: String,
    pub join_type: JoinType,
    pub left_ref: String,
    pub operator: Operator,
    pub right_ref: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateTable {
        table: String,
        columns: Vec<ColumnDefinition>,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        values: Vec<Literal>,
    },
    Select {
        table: String,
        join: Option<JoinClause>,
        where_clause: Vec<WhereCondition>,
    },
    Update {
        table: String,
        assignments: Vec<Assignment>,
        where_clause: Vec<WhereCondition>,
    },
    Delete {
        table: String,
        where_clause: Vec<WhereCondition>,
    },
    Begin,
    Commit,
    Rollback,
}
