// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The database facade.
//!
//! Reads, schema operations, and single-row writes take an immediate ticket
//! and run against the executor directly. Mass writes, updates, and deletes
//! are handed to the write batcher and return as soon as they are queued.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use lookalike_core::{Args, Executor, FromRow, LookalikeError, Record, TableMap, TicketClass};
use tracing::debug;

use crate::batcher::{PendingWrite, WriteBatcher};
use crate::panic_message;
use crate::scheduler::TicketScheduler;

/// Scheduled access to one executor.
pub struct Database {
    executor: Arc<dyn Executor>,
    scheduler: Arc<TicketScheduler>,
    batcher: WriteBatcher,
}

impl Database {
    /// Start the scheduler and the write batcher for `executor`.
    pub fn start(executor: Arc<dyn Executor>, blocking: bool) -> Self {
        let scheduler = Arc::new(TicketScheduler::start(blocking));
        let batcher = WriteBatcher::start(Arc::clone(&executor), Arc::clone(&scheduler));
        Self {
            executor,
            scheduler,
            batcher,
        }
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub fn scheduler(&self) -> &TicketScheduler {
        &self.scheduler
    }

    pub fn batcher(&self) -> &WriteBatcher {
        &self.batcher
    }

    /// Run `op` under an immediate ticket. A panic inside `op` comes back as
    /// [`LookalikeError::OperationPanicked`] and the ticket is still released.
    async fn immediate<T, F>(&self, op: F) -> Result<T, LookalikeError>
    where
        F: Future<Output = Result<T, LookalikeError>>,
    {
        let _ticket = self.scheduler.acquire(TicketClass::Immediate).await?;
        match AssertUnwindSafe(op).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(LookalikeError::OperationPanicked {
                message: panic_message(&*panic),
            }),
        }
    }

    // --- schema ---

    pub async fn add_table_with_name(&self, table: TableMap) -> Result<(), LookalikeError> {
        self.immediate(async { self.executor.add_table_with_name(table) })
            .await
    }

    pub async fn create_tables_if_not_exists(&self) -> Result<(), LookalikeError> {
        self.immediate(self.executor.create_tables_if_not_exists())
            .await
    }

    pub async fn create_index(&self) -> Result<(), LookalikeError> {
        self.immediate(self.executor.create_index()).await
    }

    // --- reads ---

    pub async fn select<T: FromRow>(&self, query: &str, args: &Args) -> Result<Vec<T>, LookalikeError> {
        let rows = self.immediate(self.executor.select(query, args)).await?;
        rows.iter().map(T::from_row).collect()
    }

    pub async fn select_one<T: FromRow>(&self, query: &str, args: &Args) -> Result<T, LookalikeError> {
        let row = self.immediate(self.executor.select_one(query, args)).await?;
        T::from_row(&row)
    }

    pub async fn select_int(&self, query: &str, args: &Args) -> Result<i64, LookalikeError> {
        self.immediate(self.executor.select_int(query, args)).await
    }

    pub async fn select_null_int(
        &self,
        query: &str,
        args: &Args,
    ) -> Result<Option<i64>, LookalikeError> {
        self.immediate(self.executor.select_null_int(query, args))
            .await
    }

    // --- immediate writes ---

    /// Insert one record and write back the key assigned by the database.
    pub async fn insert<R: Record>(&self, record: &mut R) -> Result<(), LookalikeError> {
        let key = self.immediate(self.executor.insert(&*record)).await?;
        if let Some(key) = key {
            record.set_key(key);
        }
        Ok(())
    }

    pub async fn exec(&self, query: &str, args: &Args) -> Result<u64, LookalikeError> {
        self.immediate(self.executor.exec(query, args)).await
    }

    // --- batched writes ---

    /// Queue inserts for all `records`. Nothing is reported about persistence.
    pub fn insert_mass<R, I>(&self, records: I) -> Result<(), LookalikeError>
    where
        R: Record,
        I: IntoIterator<Item = R>,
    {
        for record in records {
            self.batcher.enqueue(PendingWrite::Insert(Box::new(record)))?;
        }
        Ok(())
    }

    pub fn update<R: Record>(&self, record: R) -> Result<(), LookalikeError> {
        self.batcher.enqueue(PendingWrite::Update(Box::new(record)))
    }

    pub fn delete<R: Record>(&self, record: R) -> Result<(), LookalikeError> {
        self.batcher.enqueue(PendingWrite::Delete(Box::new(record)))
    }

    pub fn exec_mass(&self, query: impl Into<String>, args: Args) -> Result<(), LookalikeError> {
        self.batcher.enqueue(PendingWrite::RawExec {
            query: query.into(),
            args,
        })
    }

    /// Wait until every write queued before this call has been committed or
    /// discarded.
    pub async fn flush(&self) -> Result<(), LookalikeError> {
        let target = self.batcher.enqueued();
        for class in [TicketClass::Immediate, TicketClass::Deferred, TicketClass::Immediate] {
            self.scheduler.acquire(class).await?.release();
        }
        self.batcher.wait_settled(target).await?;
        debug!(settled = target, "flush complete");
        Ok(())
    }

    /// Commit queued writes, stop both background loops, and checkpoint.
    pub async fn shutdown(&self) -> Result<(), LookalikeError> {
        self.batcher.stop().await;
        self.scheduler.stop().await;
        self.executor.checkpoint().await?;
        debug!("database shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookalike_core::{Row, Value};
    use lookalike_test_utils::ScriptedExecutor;

    #[derive(Debug, Clone)]
    struct Item {
        id: i64,
        name: &'static str,
    }

    impl Record for Item {
        fn table_name(&self) -> &'static str {
            "items"
        }

        fn columns(&self) -> Vec<(&'static str, Value)> {
            vec![("id", self.id.into()), ("name", self.name.into())]
        }

        fn set_key(&mut self, key: i64) {
            self.id = key;
        }
    }

    #[tokio::test]
    async fn insert_writes_back_assigned_key() {
        let executor = Arc::new(ScriptedExecutor::new().with_assigned_keys(100));
        let db = Database::start(executor.clone(), true);

        let mut item = Item { id: 0, name: "a" };
        db.insert(&mut item).await.unwrap();
        assert_eq!(item.id, 100);

        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn select_maps_rows() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.push_rows(vec![
            Row::from_pairs([("n", 1i64)]),
            Row::from_pairs([("n", 2i64)]),
        ]);
        let db = Database::start(executor.clone(), true);

        let rows: Vec<Row> = db.select("SELECT n FROM t", &Args::None).await.unwrap();
        assert_eq!(rows.len(), 2);
        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn panicking_operation_is_converted_and_ticket_released() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.panic_on("explode");
        let db = Database::start(executor.clone(), true);

        let err = db.exec("explode", &Args::None).await.unwrap_err();
        assert!(matches!(err, LookalikeError::OperationPanicked { .. }));
        assert_eq!(db.scheduler().outstanding(), 0);

        // The scheduler keeps serving other callers.
        db.exec("UPDATE t SET x = 1", &Args::None).await.unwrap();
        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn batched_writes_after_shutdown_are_refused() {
        let executor = Arc::new(ScriptedExecutor::new());
        let db = Database::start(executor.clone(), true);
        db.shutdown().await.unwrap();

        let err = db.update(Item { id: 1, name: "x" }).unwrap_err();
        assert!(matches!(err, LookalikeError::BatcherStopped));
        let err = db.exec("SELECT 1", &Args::None).await.unwrap_err();
        assert!(matches!(err, LookalikeError::SchedulerStopped));
    }

    #[tokio::test]
    async fn shutdown_commits_queued_writes() {
        let executor = Arc::new(ScriptedExecutor::new());
        let db = Database::start(executor.clone(), true);

        db.insert_mass([Item { id: 1, name: "a" }, Item { id: 2, name: "b" }])
            .unwrap();
        db.shutdown().await.unwrap();

        assert_eq!(executor.committed().len(), 2);
        assert_eq!(executor.checkpoints(), 1);
    }
}
