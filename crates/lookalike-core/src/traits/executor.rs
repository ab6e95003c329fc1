// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The database executor boundary.
//!
//! An executor turns records and query strings into statements against the
//! underlying database. It does no locking of its own: callers only touch it
//! while holding a granted ticket from the scheduler.

use async_trait::async_trait;

use crate::error::LookalikeError;
use crate::traits::record::{Record, TableMap};
use crate::types::{Args, Row, Value};

/// Direct (non-transactional) access to the database.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Register a table map under its name, replacing any earlier map.
    fn add_table_with_name(&self, table: TableMap) -> Result<(), LookalikeError>;

    /// Create every registered table that does not exist yet.
    async fn create_tables_if_not_exists(&self) -> Result<(), LookalikeError>;

    /// Create every index declared on the registered tables.
    async fn create_index(&self) -> Result<(), LookalikeError>;

    /// Run a query and materialize all rows.
    async fn select(&self, query: &str, args: &Args) -> Result<Vec<Row>, LookalikeError>;

    /// Run a query that must return exactly one row.
    async fn select_one(&self, query: &str, args: &Args) -> Result<Row, LookalikeError> {
        let mut rows = self.select(query, args).await?;
        match rows.len() {
            0 => Err(LookalikeError::NoRows),
            1 => Ok(rows.remove(0)),
            count => Err(LookalikeError::MultipleRows { count }),
        }
    }

    /// First column of the first row as a nullable integer. No rows reads
    /// as `None`.
    async fn select_null_int(
        &self,
        query: &str,
        args: &Args,
    ) -> Result<Option<i64>, LookalikeError> {
        let rows = self.select(query, args).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        match row.values().first() {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Integer(v)) => Ok(Some(*v)),
            Some(_) => Err(LookalikeError::ColumnType {
                column: row.columns().first().cloned().unwrap_or_default(),
                expected: "integer",
            }),
        }
    }

    /// First column of the first row as an integer; NULL and no rows read as 0.
    async fn select_int(&self, query: &str, args: &Args) -> Result<i64, LookalikeError> {
        Ok(self.select_null_int(query, args).await?.unwrap_or(0))
    }

    /// Insert a record. Returns the assigned key for auto-increment tables.
    async fn insert(&self, record: &dyn Record) -> Result<Option<i64>, LookalikeError>;

    /// Update a record by its key columns. Returns the number of rows changed.
    async fn update(&self, record: &dyn Record) -> Result<u64, LookalikeError>;

    /// Delete a record by its key columns. Returns the number of rows removed.
    async fn delete(&self, record: &dyn Record) -> Result<u64, LookalikeError>;

    /// Execute a raw statement. Returns the number of rows changed.
    async fn exec(&self, query: &str, args: &Args) -> Result<u64, LookalikeError>;

    /// Open a transaction. Only one may be open at a time.
    async fn begin(&self) -> Result<Box<dyn ExecutorTransaction>, LookalikeError>;

    /// Flush any write-ahead state into the main database file.
    async fn checkpoint(&self) -> Result<(), LookalikeError> {
        Ok(())
    }
}

/// An open transaction. Dropping it without `commit` or `rollback` leaves
/// the outcome to the implementation, which should roll back.
#[async_trait]
pub trait ExecutorTransaction: Send {
    async fn exec(&mut self, query: &str, args: &Args) -> Result<u64, LookalikeError>;

    async fn insert(&mut self, record: &dyn Record) -> Result<(), LookalikeError>;

    async fn update(&mut self, record: &dyn Record) -> Result<u64, LookalikeError>;

    async fn delete(&mut self, record: &dyn Record) -> Result<u64, LookalikeError>;

    async fn commit(self: Box<Self>) -> Result<(), LookalikeError>;

    async fn rollback(self: Box<Self>) -> Result<(), LookalikeError>;
}
