// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite executor.
//!
//! All statements run on tokio-rusqlite's single background connection
//! thread. The executor does no locking of its own; the ticket scheduler
//! decides who may use it and when.

mod statement;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lookalike_config::model::StorageConfig;
use lookalike_core::{Args, Executor, ExecutorTransaction, LookalikeError, Record, Row, TableMap};
use tokio_rusqlite::Connection;
use tracing::{debug, warn};

pub use statement::{Statement, TableRegistry};

/// Convert a tokio-rusqlite error into [`LookalikeError::Storage`].
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> LookalikeError {
    LookalikeError::Storage {
        source: Box::new(e),
    }
}

/// [`Executor`] over one SQLite connection.
#[derive(Debug)]
pub struct SqliteExecutor {
    conn: Connection,
    tables: TableRegistry,
    path: Option<PathBuf>,
    /// Bumped on the connection thread by every `begin`.
    epoch: Arc<AtomicU64>,
}

impl SqliteExecutor {
    /// Open (or create) the database file named in `config` and apply the
    /// connection PRAGMAs.
    pub async fn open(config: &StorageConfig) -> Result<Self, LookalikeError> {
        let path = PathBuf::from(&config.database_path);
        let conn = Connection::open(&path)
            .await
            .map_err(|e| LookalikeError::Storage { source: Box::new(e) })?;

        let wal = config.wal_mode;
        let cache_kib = i64::from(config.cache_size_kib);
        let busy = Duration::from_millis(config.busy_timeout_ms);
        let journal_mode = conn
            .call(move |conn| -> Result<String, rusqlite::Error> {
                conn.busy_timeout(busy)?;
                // Negative cache_size is in KiB rather than pages.
                conn.pragma_update(None, "cache_size", -cache_kib)?;
                if wal {
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                } else {
                    conn.pragma_query_value(None, "journal_mode", |row| row.get(0))
                }
            })
            .await
            .map_err(map_tr_err)?;

        debug!(
            path = %path.display(),
            journal_mode = journal_mode.as_str(),
            cache_size_kib = config.cache_size_kib,
            "SQLite database opened"
        );
        Ok(Self {
            conn,
            tables: TableRegistry::default(),
            path: Some(path),
            epoch: Arc::default(),
        })
    }

    /// Private in-memory database, for tests and tooling.
    pub async fn open_in_memory() -> Result<Self, LookalikeError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| LookalikeError::Storage { source: Box::new(e) })?;
        Ok(Self {
            conn,
            tables: TableRegistry::default(),
            path: None,
            epoch: Arc::default(),
        })
    }

    /// Location of the database file; `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn run_ddl(&self, statements: Vec<String>) -> Result<(), LookalikeError> {
        if statements.is_empty() {
            return Ok(());
        }
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                for sql in &statements {
                    conn.execute_batch(sql)?;
                }
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn run_statement(&self, statement: Statement) -> Result<u64, LookalikeError> {
        self.conn
            .call(move |conn| statement::execute_statement(conn, &statement))
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl Executor for SqliteExecutor {
    fn add_table_with_name(&self, table: TableMap) -> Result<(), LookalikeError> {
        debug!(table = table.name(), "table registered");
        self.tables.register(table);
        Ok(())
    }

    async fn create_tables_if_not_exists(&self) -> Result<(), LookalikeError> {
        let statements = self.tables.create_tables()?;
        self.run_ddl(statements).await
    }

    async fn create_index(&self) -> Result<(), LookalikeError> {
        let statements = self.tables.create_indexes();
        self.run_ddl(statements).await
    }

    async fn select(&self, query: &str, args: &Args) -> Result<Vec<Row>, LookalikeError> {
        let query = query.to_string();
        let args = args.clone();
        self.conn
            .call(move |conn| statement::query_rows(conn, &query, &args))
            .await
            .map_err(map_tr_err)
    }

    async fn insert(&self, record: &dyn Record) -> Result<Option<i64>, LookalikeError> {
        let (statement, assigns_key) = self.tables.insert(record)?;
        self.conn
            .call(move |conn| -> Result<Option<i64>, rusqlite::Error> {
                statement::execute_statement(conn, &statement)?;
                Ok(assigns_key.then(|| conn.last_insert_rowid()))
            })
            .await
            .map_err(map_tr_err)
    }

    async fn update(&self, record: &dyn Record) -> Result<u64, LookalikeError> {
        match self.tables.update(record)? {
            Some(statement) => self.run_statement(statement).await,
            None => Ok(0),
        }
    }

    async fn delete(&self, record: &dyn Record) -> Result<u64, LookalikeError> {
        let statement = self.tables.delete(record)?;
        self.run_statement(statement).await
    }

    async fn exec(&self, query: &str, args: &Args) -> Result<u64, LookalikeError> {
        let query = query.to_string();
        let args = args.clone();
        self.conn
            .call(move |conn| statement::execute(conn, &query, &args))
            .await
            .map_err(map_tr_err)
    }

    async fn begin(&self) -> Result<Box<dyn ExecutorTransaction>, LookalikeError> {
        let epoch = Arc::clone(&self.epoch);
        let id = self
            .conn
            .call(move |conn| -> Result<u64, rusqlite::Error> {
                if !conn.is_autocommit() {
                    // Left over from a transaction that was dropped unfinished.
                    conn.execute_batch("ROLLBACK")?;
                }
                conn.execute_batch("BEGIN IMMEDIATE")?;
                Ok(epoch.fetch_add(1, Ordering::AcqRel) + 1)
            })
            .await
            .map_err(map_tr_err)?;

        Ok(Box::new(SqliteTransaction {
            conn: self.conn.clone(),
            tables: self.tables.clone(),
            epoch: Arc::clone(&self.epoch),
            id,
            finished: false,
        }))
    }

    async fn checkpoint(&self) -> Result<(), LookalikeError> {
        if self.path.is_none() {
            return Ok(());
        }
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

/// An open `BEGIN IMMEDIATE` transaction on the executor's connection.
pub struct SqliteTransaction {
    conn: Connection,
    tables: TableRegistry,
    epoch: Arc<AtomicU64>,
    id: u64,
    finished: bool,
}

impl SqliteTransaction {
    async fn finish(&mut self, sql: &'static str) -> Result<(), LookalikeError> {
        self.finished = true;
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let result = conn.execute_batch(sql);
                if result.is_err() && !conn.is_autocommit() {
                    // A failed COMMIT leaves the transaction open.
                    conn.execute_batch("ROLLBACK")?;
                }
                result
            })
            .await
            .map_err(map_tr_err)
    }

    async fn run_statement(&self, statement: Statement) -> Result<u64, LookalikeError> {
        self.conn
            .call(move |conn| statement::execute_statement(conn, &statement))
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl ExecutorTransaction for SqliteTransaction {
    async fn exec(&mut self, query: &str, args: &Args) -> Result<u64, LookalikeError> {
        let query = query.to_string();
        let args = args.clone();
        self.conn
            .call(move |conn| statement::execute(conn, &query, &args))
            .await
            .map_err(map_tr_err)
    }

    async fn insert(&mut self, record: &dyn Record) -> Result<(), LookalikeError> {
        let (statement, _) = self.tables.insert(record)?;
        self.run_statement(statement).await.map(drop)
    }

    async fn update(&mut self, record: &dyn Record) -> Result<u64, LookalikeError> {
        match self.tables.update(record)? {
            Some(statement) => self.run_statement(statement).await,
            None => Ok(0),
        }
    }

    async fn delete(&mut self, record: &dyn Record) -> Result<u64, LookalikeError> {
        let statement = self.tables.delete(record)?;
        self.run_statement(statement).await
    }

    async fn commit(mut self: Box<Self>) -> Result<(), LookalikeError> {
        self.finish("COMMIT").await
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), LookalikeError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("transaction dropped without commit or rollback, rolling back");
        let conn = self.conn.clone();
        let epoch = Arc::clone(&self.epoch);
        let id = self.id;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let result = conn
                    .call(move |conn| -> Result<(), rusqlite::Error> {
                        // A later `begin` already cleaned up and owns the
                        // connection now.
                        if epoch.load(Ordering::Acquire) == id && !conn.is_autocommit() {
                            conn.execute_batch("ROLLBACK")?;
                        }
                        Ok(())
                    })
                    .await;
                if let Err(e) = result {
                    warn!(error = %e, "rollback of dropped transaction failed");
                }
            });
        }
    }
}
