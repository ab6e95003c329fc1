// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed records and the table maps that describe how they are stored.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::LookalikeError;
use crate::types::{Row, Value};

/// A typed record that maps onto a registered table.
///
/// Records are moved into the write batcher as trait objects, so the trait
/// is object safe and records must be `'static`.
pub trait Record: Send + Sync + fmt::Debug + 'static {
    /// Name of the table this record is stored in.
    fn table_name(&self) -> &'static str;

    /// Column/value pairs, key columns included.
    fn columns(&self) -> Vec<(&'static str, Value)>;

    /// Receives the key the database assigned on insert into an
    /// auto-increment table.
    fn set_key(&mut self, _key: i64) {}
}

/// Materialization of a typed value from a result row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self, LookalikeError>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self, LookalikeError> {
        Ok(row.clone())
    }
}

/// Declared SQL type of a column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Blob,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Storage description of one table: columns, keys and indexes.
///
/// Built with the chained setters and handed to
/// [`Executor::add_table_with_name`](crate::traits::Executor::add_table_with_name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMap {
    name: String,
    columns: Vec<ColumnDef>,
    keys: Vec<String>,
    auto_increment: bool,
    indexes: Vec<IndexDef>,
}

impl TableMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            keys: Vec::new(),
            auto_increment: false,
            indexes: Vec::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            column_type,
        });
        self
    }

    /// Declare the key columns. `auto_increment` only applies to a single
    /// integer key, whose value is then assigned by the database on insert.
    pub fn set_keys(mut self, auto_increment: bool, keys: &[&str]) -> Self {
        self.keys = keys.iter().map(|k| k.to_string()).collect();
        self.auto_increment = auto_increment && self.keys.len() == 1;
        self
    }

    pub fn add_index(self, name: impl Into<String>, columns: &[&str]) -> Self {
        self.push_index(name.into(), columns, false)
    }

    pub fn add_unique_index(self, name: impl Into<String>, columns: &[&str]) -> Self {
        self.push_index(name.into(), columns, true)
    }

    fn push_index(mut self, name: String, columns: &[&str], unique: bool) -> Self {
        self.indexes.push(IndexDef {
            name,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    pub fn is_key(&self, column: &str) -> bool {
        self.keys.iter().any(|k| k.eq_ignore_ascii_case(column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_increment_requires_single_key() {
        let single = TableMap::new("t")
            .column("id", ColumnType::Integer)
            .set_keys(true, &["id"]);
        assert!(single.auto_increment());

        let composite = TableMap::new("t")
            .column("a", ColumnType::Integer)
            .column("b", ColumnType::Integer)
            .set_keys(true, &["a", "b"]);
        assert!(!composite.auto_increment());
        assert!(composite.is_key("B"));
    }

    #[test]
    fn indexes_keep_declaration_order() {
        let map = TableMap::new("hashes")
            .add_index("hashes_hash", &["hash"])
            .add_unique_index("hashes_path", &["path"]);
        let names: Vec<_> = map.indexes().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["hashes_hash", "hashes_path"]);
        assert!(map.indexes()[1].unique);
    }

    #[test]
    fn column_type_renders_as_sql() {
        assert_eq!(ColumnType::Integer.to_string(), "INTEGER");
        assert_eq!(ColumnType::Text.to_string(), "TEXT");
    }
}
