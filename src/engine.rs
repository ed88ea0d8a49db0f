//! The engine façade (spec §4.5): binds a `Command` to the catalog,
//! row codec, and B-tree, and implements the nested-loop join and
//! predicate semantics of §4.5.1/§4.5.2.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Command, JoinClause, Literal, Operator, WhereCondition};
use crate::block_device::BlockDevice;
use crate::btree::BTree;
use crate::catalog::Catalog;
use crate::codec::{decode_row, encode_row, Schema};
use crate::error::EngineError;
use crate::value::{ColumnType, Value};
use crate::virtual_disk::VirtualDisk;

/// A decoded row, represented as an ordered list of column-name/value
/// pairs rather than a `HashMap` so a nested-loop join's merge order
/// (spec §4.5.1) is reproducible.
pub type Row = Vec<(String, Value)>;

#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Status(String),
    Rows(Vec<Row>),
}

pub struct Engine {
    disk: Rc<RefCell<VirtualDisk>>,
    catalog: Catalog,
    trees: HashMap<String, BTree>,
}

impl Engine {
    pub fn open(device: Box<dyn BlockDevice>) -> Result<Engine, EngineError> {
        let disk = Rc::new(RefCell::new(VirtualDisk::new(device)?));
        let catalog = Catalog::load(&mut disk.borrow_mut())?;
        let mut engine = Engine {
            disk,
            catalog,
            trees: HashMap::new(),
        };
        engine.rebuild_trees()?;
        Ok(engine)
    }

    fn rebuild_trees(&mut self) -> Result<(), EngineError> {
        self.trees.clear();
        let names: Vec<String> = self.catalog.table_names().map(|s| s.to_string()).collect();
        for name in names {
            let meta = self.catalog.get(&name).expect("just listed by table_names");
            let tree = BTree::new(self.disk.clone(), meta.root_page_id)?;
            self.trees.insert(name, tree);
        }
        Ok(())
    }

    /// Drops and reconstructs the in-memory catalog and B-tree handles
    /// from the persisted catalog (spec §9's `refresh()` primitive),
    /// needed after a rollback discards buffered metadata writes.
    fn refresh(&mut self) -> Result<(), EngineError> {
        self.catalog = Catalog::load(&mut self.disk.borrow_mut())?;
        self.rebuild_trees()
    }

    pub fn execute(&mut self, command: Command) -> Result<CommandResult, EngineError> {
        match command {
            Command::CreateTable { table, columns } => self.create_table(table, columns),
            Command::Insert {
                table,
                columns,
                values,
            } => self.insert(table, columns, values),
            Command::Select {
                table,
                join,
                where_clause,
            } => self.select(&table, join.as_ref(), &where_clause),
            Command::Update {
                table,
                assignments,
                where_clause,
            } => self.update(&table, &assignments, &where_clause),
            Command::Delete { table, where_clause } => self.delete(&table, &where_clause),
            Command::Begin => {
                self.disk.borrow_mut().begin()?;
                Ok(CommandResult::Status("transaction started".to_string()))
            }
            Command::Commit => {
                self.disk.borrow_mut().commit()?;
                Ok(CommandResult::Status("transaction committed".to_string()))
            }
            Command::Rollback => {
                self.disk.borrow_mut().rollback()?;
                self.refresh()?;
                Ok(CommandResult::Status("transaction rolled back".to_string()))
            }
        }
    }

    fn create_table(
        &mut self,
        table: String,
        columns: Vec<crate::codec::ColumnDefinition>,
    ) -> Result<CommandResult, EngineError> {
        if self.catalog.contains(&table) {
            return Err(EngineError::TableExists(table));
        }
        let schema = Schema(columns);
        let pk = schema.primary_key_column().ok_or(EngineError::NoPrimaryKey)?;
        if pk.col_type != ColumnType::Integer {
            return Err(EngineError::PkNotInteger);
        }

        let root_id = self.disk.borrow_mut().allocate_page()?;
        self.catalog
            .create_table(&mut self.disk.borrow_mut(), &table, schema, root_id)?;
        let tree = BTree::new(self.disk.clone(), root_id)?;
        self.trees.insert(table.clone(), tree);

        log::debug!("created table '{table}'");
        Ok(CommandResult::Status(format!("table '{table}' created")))
    }

    fn insert(
        &mut self,
        table: String,
        columns: Option<Vec<String>>,
        values: Vec<Literal>,
    ) -> Result<CommandResult, EngineError> {
        let meta = self
            .catalog
            .get(&table)
            .ok_or_else(|| EngineError::TableNotFound(table.clone()))?
            .clone();
        let schema = &meta.schema;
        let pk_index = schema.primary_key_index().ok_or(EngineError::NoPrimaryKey)?;

        let mut slots: Vec<Option<Literal>> = vec![None; schema.columns().len()];
        match columns {
            Some(names) => {
                if names.len() != values.len() {
                    return Err(EngineError::ColumnCountMismatch {
                        expected: names.len(),
                        got: values.len(),
                    });
                }
                for (name, value) in names.into_iter().zip(values) {
                    let idx = schema
                        .column_index(&name)
                        .ok_or(EngineError::ColumnNotFound(name))?;
                    slots[idx] = Some(value);
                }
            }
            None => {
                if values.len() != schema.columns().len() {
                    return Err(EngineError::ColumnCountMismatch {
                        expected: schema.columns().len(),
                        got: values.len(),
                    });
                }
                for (idx, value) in values.into_iter().enumerate() {
                    slots[idx] = Some(value);
                }
            }
        }

        let tree = self
            .trees
            .get(&table)
            .ok_or_else(|| EngineError::TableNotFound(table.clone()))?;
        let key = match slots[pk_index].take() {
            None | Some(Literal::Null) => {
                let candidate = meta.auto_seq.max(tree.get_max_key()?);
                candidate
                    .checked_add(1)
                    .ok_or(EngineError::InvalidPkValue)?
            }
            Some(Literal::Integer(n)) if n >= 0 => n as u32,
            Some(_) => return Err(EngineError::InvalidPkValue),
        };

        let mut row_values = Vec::with_capacity(schema.columns().len());
        for (idx, col) in schema.columns().iter().enumerate() {
            if idx == pk_index {
                row_values.push(Value::Integer(key as i32));
                continue;
            }
            let literal = slots[idx].take().ok_or(EngineError::NullValue)?;
            row_values.push(literal_to_value(&literal, col.col_type, &col.name)?);
        }

        let encoded = encode_row(schema, &row_values)?;
        let tree = self.trees.get_mut(&table).expect("checked above");
        tree.insert(key, &encoded)?;

        let new_auto_seq = meta.auto_seq.max(key);
        self.catalog.update_table(
            &mut self.disk.borrow_mut(),
            &table,
            tree.root_page_id(),
            new_auto_seq,
        )?;

        log::debug!("inserted pk={key} into '{table}'");
        Ok(CommandResult::Status("1 row inserted".to_string()))
    }

    fn select(
        &self,
        table: &str,
        join: Option<&JoinClause>,
        where_clause: &[WhereCondition],
    ) -> Result<CommandResult, EngineError> {
        let rows = self.scan_rows(table)?;

        let rows = match join {
            None => rows,
            Some(join) => {
                let right_rows = self.scan_rows(&join.table)?;
                let mut merged = Vec::new();
                for l in &rows {
                    for r in &right_rows {
                        if evaluate_join_condition(join, table, l, r) {
                            merged.push(merge_rows(l, &join.table, r));
                        }
                    }
                }
                merged
            }
        };

        let right_table = join.map(|j| j.table.as_str());
        let filtered: Vec<Row> = rows
            .into_iter()
            .filter(|row| evaluate_where(where_clause, row, right_table))
            .collect();

        log::trace!("select on '{table}' returned {} rows", filtered.len());
        Ok(CommandResult::Rows(filtered))
    }

    fn scan_rows(&self, table: &str) -> Result<Vec<Row>, EngineError> {
        let meta = self
            .catalog
            .get(table)
            .ok_or_else(|| EngineError::TableNotFound(table.to_string()))?;
        let tree = self
            .trees
            .get(table)
            .ok_or_else(|| EngineError::TableNotFound(table.to_string()))?;
        Ok(tree
            .get_all()?
            .into_iter()
            .map(|(_, payload)| row_from_values(&meta.schema, decode_row(&meta.schema, &payload)))
            .collect())
    }

    fn update(
        &mut self,
        table: &str,
        assignments: &[crate::ast::Assignment],
        where_clause: &[WhereCondition],
    ) -> Result<CommandResult, EngineError> {
        let meta = self
            .catalog
            .get(table)
            .ok_or_else(|| EngineError::TableNotFound(table.to_string()))?
            .clone();
        let schema = &meta.schema;
        let pk_index = schema.primary_key_index().ok_or(EngineError::NoPrimaryKey)?;

        let tree = self
            .trees
            .get(table)
            .ok_or_else(|| EngineError::TableNotFound(table.to_string()))?;
        let all = tree.get_all()?;

        let mut updated = 0usize;
        for (key, payload) in all {
            let mut values = decode_row(schema, &payload);
            let row = row_from_values(schema, values.clone());
            if !evaluate_where(where_clause, &row, None) {
                continue;
            }

            for assignment in assignments {
                let idx = schema
                    .column_index(&assignment.column)
                    .ok_or_else(|| EngineError::ColumnNotFound(assignment.column.clone()))?;
                let new_value = literal_to_value(
                    &assignment.value,
                    schema.columns()[idx].col_type,
                    &assignment.column,
                )?;
                if idx == pk_index && new_value != values[idx] {
                    return Err(EngineError::CannotUpdatePk);
                }
                values[idx] = new_value;
            }

            let encoded = encode_row(schema, &values)?;
            let tree = self.trees.get_mut(table).expect("checked above");
            tree.delete(key)?;
            tree.insert(key, &encoded)?;
            updated += 1;
        }

        if updated > 0 {
            let tree = self.trees.get(table).expect("checked above");
            self.catalog.update_table(
                &mut self.disk.borrow_mut(),
                table,
                tree.root_page_id(),
                meta.auto_seq,
            )?;
        }

        log::debug!("updated {updated} row(s) in '{table}'");
        Ok(CommandResult::Status(format!("{updated} rows updated")))
    }

    fn delete(
        &mut self,
        table: &str,
        where_clause: &[WhereCondition],
    ) -> Result<CommandResult, EngineError> {
        let meta = self
            .catalog
            .get(table)
            .ok_or_else(|| EngineError::TableNotFound(table.to_string()))?
            .clone();
        let schema = &meta.schema;

        let tree = self
            .trees
            .get(table)
            .ok_or_else(|| EngineError::TableNotFound(table.to_string()))?;
        let all = tree.get_all()?;

        let mut deleted = 0usize;
        for (key, payload) in all {
            let values = decode_row(schema, &payload);
            let row = row_from_values(schema, values);
            if !evaluate_where(where_clause, &row, None) {
                continue;
            }
            let tree = self.trees.get_mut(table).expect("checked above");
            tree.delete(key)?;
            deleted += 1;
        }

        log::debug!("deleted {deleted} row(s) from '{table}'");
        Ok(CommandResult::Status(format!("{deleted} rows deleted")))
    }
}

fn literal_to_value(literal: &Literal, expected: ColumnType, column: &str) -> Result<Value, EngineError> {
    match (literal, expected) {
        (Literal::Integer(n), ColumnType::Integer) => Ok(Value::Integer(*n)),
        (Literal::Text(s), ColumnType::Text) => Ok(Value::Text(s.clone())),
        (Literal::Null, _) => Err(EngineError::NullValue),
        _ => Err(EngineError::TypeMismatch {
            column: column.to_string(),
        }),
    }
}

fn row_from_values(schema: &Schema, values: Vec<Value>) -> Row {
    schema
        .columns()
        .iter()
        .zip(values)
        .map(|(col, value)| (col.name.clone(), value))
        .collect()
}

fn row_get<'a>(row: &'a Row, key: &str) -> Option<&'a Value> {
    row.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

/// Merges `right` into `left` (spec §4.5.1): a conflicting key from
/// `right` is kept under `"{right_table}.{key}"` instead of
/// overwriting the left-hand value.
fn merge_rows(left: &Row, right_table: &str, right: &Row) -> Row {
    let mut merged = left.clone();
    for (key, value) in right {
        if row_get(&merged, key).is_some() {
            merged.push((format!("{right_table}.{key}"), value.clone()));
        } else {
            merged.push((key.clone(), value.clone()));
        }
    }
    merged
}

fn literal_to_raw_value(literal: &Literal) -> Option<Value> {
    match literal {
        Literal::Integer(n) => Some(Value::Integer(*n)),
        Literal::Text(s) => Some(Value::Text(s.clone())),
        Literal::Null => None,
    }
}

/// Weak equality: a string that parses as a number compares equal to
/// that number (spec §4.5.2).
fn weak_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => a == b,
        (Value::Text(a), Value::Text(b)) => a == b,
        _ => matches!((left.as_i64(), right.as_i64()), (Some(a), Some(b)) if a == b),
    }
}

fn compare_values(op: Operator, left: &Value, right: &Value) -> bool {
    if op == Operator::Eq {
        return weak_eq(left, right);
    }
    match (left.as_i64(), right.as_i64()) {
        (Some(a), Some(b)) => match op {
            Operator::Lt => a < b,
            Operator::Gt => a > b,
            Operator::Le => a <= b,
            Operator::Ge => a >= b,
            Operator::Eq => unreachable!(),
        },
        _ => false,
    }
}

/// Column-reference resolution for a where-clause condition (spec
/// §4.5.2): a plain column name first, then, for a post-join row,
/// the right table's renamed form.
fn lookup_where_value<'a>(row: &'a Row, column: &str, right_table: Option<&str>) -> Option<&'a Value> {
    if let Some(v) = row_get(row, column) {
        return Some(v);
    }
    right_table.and_then(|t| row_get(row, &format!("{t}.{column}")))
}

fn evaluate_where(conditions: &[WhereCondition], row: &Row, right_table: Option<&str>) -> bool {
    conditions.iter().all(|cond| {
        let Some(actual) = lookup_where_value(row, &cond.column, right_table) else {
            return false;
        };
        let Some(expected) = literal_to_raw_value(&cond.value) else {
            return false;
        };
        compare_values(cond.operator, actual, &expected)
    })
}

/// Column-reference resolution for a join condition (spec §4.5.1).
fn resolve_join_ref(reference: &str, left_table: &str, l: &Row, right_table: &str, r: &Row) -> Value {
    if let Some(v) = row_get(l, reference) {
        return v.clone();
    }
    if let Some(v) = row_get(r, reference) {
        return v.clone();
    }
    if let Some((t, c)) = reference.split_once('.') {
        if t == left_table {
            if let Some(v) = row_get(l, c) {
                return v.clone();
            }
        }
        if t == right_table {
            if let Some(v) = row_get(r, c) {
                return v.clone();
            }
        }
    }
    Value::Text(reference.to_string())
}

fn evaluate_join_condition(join: &JoinClause, left_table: &str, l: &Row, r: &Row) -> bool {
    // join.join_type is accepted but not branched on: LEFT is treated
    // identically to INNER (spec §9 open question 4).
    let left_val = resolve_join_ref(&join.left_ref, left_table, l, &join.table, r);
    let right_val = resolve_join_ref(&join.right_ref, left_table, l, &join.table, r);
    compare_values(join.operator, &left_val, &right_val)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Assignment, JoinClause, JoinType, Literal, Operator, WhereCondition};
    use crate::block_device::InMemoryBlockDevice;
    use crate::codec::ColumnDefinition;

    fn users_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition {
                name: "id".into(),
                col_type: ColumnType::Integer,
                is_primary_key: true,
            },
            ColumnDefinition {
                name: "name".into(),
                col_type: ColumnType::Text,
                is_primary_key: false,
            },
            ColumnDefinition {
                name: "age".into(),
                col_type: ColumnType::Integer,
                is_primary_key: false,
            },
        ]
    }

    fn new_engine() -> Engine {
        Engine::open(Box::new(InMemoryBlockDevice::new())).unwrap()
    }

    fn insert_user(engine: &mut Engine, id: i32, name: &str, age: i32) {
        engine
            .execute(Command::Insert {
                table: "users".to_string(),
                columns: None,
                values: vec![
                    Literal::Integer(id),
                    Literal::Text(name.to_string()),
                    Literal::Integer(age),
                ],
            })
            .unwrap();
    }

    #[test]
    fn basic_crud_scenario() {
        let mut engine = new_engine();
        engine
            .execute(Command::CreateTable {
                table: "users".to_string(),
                columns: users_columns(),
            })
            .unwrap();
        insert_user(&mut engine, 1, "Alice", 30);
        insert_user(&mut engine, 2, "Bob", 25);

        let result = engine
            .execute(Command::Select {
                table: "users".to_string(),
                join: None,
                where_clause: vec![],
            })
            .unwrap();
        match result {
            CommandResult::Rows(rows) => assert_eq!(rows.len(), 2),
            _ => panic!("expected rows"),
        }

        let result = engine
            .execute(Command::Select {
                table: "users".to_string(),
                join: None,
                where_clause: vec![WhereCondition {
                    column: "age".to_string(),
                    operator: Operator::Gt,
                    value: Literal::Integer(28),
                }],
            })
            .unwrap();
        match result {
            CommandResult::Rows(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(row_get(&rows[0], "name"), Some(&Value::Text("Alice".to_string())));
            }
            _ => panic!("expected rows"),
        }

        engine
            .execute(Command::Update {
                table: "users".to_string(),
                assignments: vec![Assignment {
                    column: "age".to_string(),
                    value: Literal::Integer(31),
                }],
                where_clause: vec![WhereCondition {
                    column: "id".to_string(),
                    operator: Operator::Eq,
                    value: Literal::Integer(1),
                }],
            })
            .unwrap();

        let result = engine
            .execute(Command::Select {
                table: "users".to_string(),
                join: None,
                where_clause: vec![WhereCondition {
                    column: "id".to_string(),
                    operator: Operator::Eq,
                    value: Literal::Integer(1),
                }],
            })
            .unwrap();
        match result {
            CommandResult::Rows(rows) => {
                assert_eq!(row_get(&rows[0], "age"), Some(&Value::Integer(31)));
            }
            _ => panic!("expected rows"),
        }

        engine
            .execute(Command::Delete {
                table: "users".to_string(),
                where_clause: vec![WhereCondition {
                    column: "id".to_string(),
                    operator: Operator::Eq,
                    value: Literal::Integer(2),
                }],
            })
            .unwrap();

        let result = engine
            .execute(Command::Select {
                table: "users".to_string(),
                join: None,
                where_clause: vec![],
            })
            .unwrap();
        match result {
            CommandResult::Rows(rows) => assert_eq!(rows.len(), 1),
            _ => panic!("expected rows"),
        }
    }

    #[test]
    fn auto_increment_picks_next_key() {
        let mut engine = new_engine();
        engine
            .execute(Command::CreateTable {
                table: "users".to_string(),
                columns: users_columns(),
            })
            .unwrap();
        insert_user(&mut engine, 1, "Alice", 30);
        insert_user(&mut engine, 2, "Bob", 25);

        engine
            .execute(Command::Insert {
                table: "users".to_string(),
                columns: Some(vec!["name".to_string(), "age".to_string()]),
                values: vec![Literal::Text("Charlie".to_string()), Literal::Integer(20)],
            })
            .unwrap();

        let result = engine
            .execute(Command::Select {
                table: "users".to_string(),
                join: None,
                where_clause: vec![WhereCondition {
                    column: "name".to_string(),
                    operator: Operator::Eq,
                    value: Literal::Text("Charlie".to_string()),
                }],
            })
            .unwrap();
        match result {
            CommandResult::Rows(rows) => {
                assert_eq!(row_get(&rows[0], "id"), Some(&Value::Integer(3)));
            }
            _ => panic!("expected rows"),
        }
    }

    #[test]
    fn rollback_discards_mutations() {
        let mut engine = new_engine();
        engine
            .execute(Command::CreateTable {
                table: "users".to_string(),
                columns: users_columns(),
            })
            .unwrap();
        insert_user(&mut engine, 1, "Alice", 30);

        engine.execute(Command::Begin).unwrap();
        insert_user(&mut engine, 4, "Dave", 40);
        engine.execute(Command::Rollback).unwrap();

        let result = engine
            .execute(Command::Select {
                table: "users".to_string(),
                join: None,
                where_clause: vec![WhereCondition {
                    column: "name".to_string(),
                    operator: Operator::Eq,
                    value: Literal::Text("Dave".to_string()),
                }],
            })
            .unwrap();
        match result {
            CommandResult::Rows(rows) => assert!(rows.is_empty()),
            _ => panic!("expected rows"),
        }
    }

    #[test]
    fn join_merges_matching_rows() {
        let mut engine = new_engine();
        engine
            .execute(Command::CreateTable {
                table: "users".to_string(),
                columns: users_columns(),
            })
            .unwrap();
        insert_user(&mut engine, 1, "Alice", 30);
        insert_user(&mut engine, 5, "Eve", 50);

        engine
            .execute(Command::CreateTable {
                table: "orders".to_string(),
                columns: vec![
                    ColumnDefinition {
                        name: "oid".into(),
                        col_type: ColumnType::Integer,
                        is_primary_key: true,
                    },
                    ColumnDefinition {
                        name: "uid".into(),
                        col_type: ColumnType::Integer,
                        is_primary_key: false,
                    },
                    ColumnDefinition {
                        name: "item".into(),
                        col_type: ColumnType::Text,
                        is_primary_key: false,
                    },
                ],
            })
            .unwrap();
        engine
            .execute(Command::Insert {
                table: "orders".to_string(),
                columns: None,
                values: vec![Literal::Integer(100), Literal::Integer(1), Literal::Text("Laptop".into())],
            })
            .unwrap();
        engine
            .execute(Command::Insert {
                table: "orders".to_string(),
                columns: None,
                values: vec![Literal::Integer(101), Literal::Integer(5), Literal::Text("Phone".into())],
            })
            .unwrap();

        let result = engine
            .execute(Command::Select {
                table: "users".to_string(),
                join: Some(JoinClause {
                    table: "orders".to_string(),
                    join_type: JoinType::Inner,
                    left_ref: "users.id".to_string(),
                    operator: Operator::Eq,
                    right_ref: "orders.uid".to_string(),
                }),
                where_clause: vec![],
            })
            .unwrap();

        match result {
            CommandResult::Rows(rows) => {
                assert_eq!(rows.len(), 2);
                assert!(rows.iter().any(|r| row_get(r, "name") == Some(&Value::Text("Alice".into()))
                    && row_get(r, "item") == Some(&Value::Text("Laptop".into()))));
                assert!(rows.iter().any(|r| row_get(r, "name") == Some(&Value::Text("Eve".into()))
                    && row_get(r, "item") == Some(&Value::Text("Phone".into()))));
            }
            _ => panic!("expected rows"),
        }
    }
}
