// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted in-memory executor for deterministic testing.
//!
//! `ScriptedExecutor` implements `Executor` without a database. Direct calls
//! count as immediate work; an open transaction counts as deferred work.
//! Whenever the two overlap, or two transactions are open at once, the
//! overlap counter goes up.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lookalike_core::{
    Args, Executor, ExecutorTransaction, LookalikeError, Record, Row, TableMap, Value,
};
use parking_lot::Mutex;
use tracing::trace;

/// One write as applied to the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum AppliedWrite {
    Exec {
        query: String,
        args: Args,
    },
    Insert {
        table: &'static str,
        columns: Vec<(&'static str, Value)>,
    },
    Update {
        table: &'static str,
        columns: Vec<(&'static str, Value)>,
    },
    Delete {
        table: &'static str,
        columns: Vec<(&'static str, Value)>,
    },
}

impl AppliedWrite {
    fn exec(query: &str, args: &Args) -> Self {
        AppliedWrite::Exec {
            query: query.to_string(),
            args: args.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppliedWrite::Exec { .. } => "exec",
            AppliedWrite::Insert { .. } => "insert",
            AppliedWrite::Update { .. } => "update",
            AppliedWrite::Delete { .. } => "delete",
        }
    }

    pub fn table(&self) -> Option<&'static str> {
        match self {
            AppliedWrite::Exec { .. } => None,
            AppliedWrite::Insert { table, .. }
            | AppliedWrite::Update { table, .. }
            | AppliedWrite::Delete { table, .. } => Some(table),
        }
    }

    /// Value of a record column; `None` for raw statements.
    pub fn column(&self, name: &str) -> Option<&Value> {
        match self {
            AppliedWrite::Exec { .. } => None,
            AppliedWrite::Insert { columns, .. }
            | AppliedWrite::Update { columns, .. }
            | AppliedWrite::Delete { columns, .. } => columns
                .iter()
                .find(|(column, _)| *column == name)
                .map(|(_, value)| value),
        }
    }
}

type FailurePredicate = Box<dyn Fn(&AppliedWrite) -> bool + Send + Sync>;

#[derive(Default)]
struct State {
    tables: Vec<String>,
    rows: VecDeque<Vec<Row>>,
    queries: Vec<String>,
    committed: Vec<AppliedWrite>,
    failures: Vec<FailurePredicate>,
    panics: Vec<String>,
    begun: u64,
    commits: u64,
    rollbacks: u64,
    checkpoints: u64,
}

#[derive(Default)]
struct Activity {
    immediate: AtomicUsize,
    deferred: AtomicUsize,
    overlaps: AtomicUsize,
    peak_immediate: AtomicUsize,
}

impl Activity {
    fn enter_immediate(self: &Arc<Self>) -> ActiveGuard {
        if self.deferred.load(Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let now = self.immediate.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_immediate.fetch_max(now, Ordering::SeqCst);
        ActiveGuard {
            activity: Arc::clone(self),
            deferred: false,
        }
    }

    fn enter_deferred(self: &Arc<Self>) -> ActiveGuard {
        if self.immediate.load(Ordering::SeqCst) > 0 || self.deferred.load(Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.deferred.fetch_add(1, Ordering::SeqCst);
        ActiveGuard {
            activity: Arc::clone(self),
            deferred: true,
        }
    }

    fn check_deferred(&self) {
        if self.immediate.load(Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Leaves the active section on drop, also when the operation panics.
struct ActiveGuard {
    activity: Arc<Activity>,
    deferred: bool,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let counter = if self.deferred {
            &self.activity.deferred
        } else {
            &self.activity.immediate
        };
        counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory executor with scripted results.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    state: Arc<Mutex<State>>,
    activity: Arc<Activity>,
    latency: Option<Duration>,
    next_key: Option<Arc<AtomicI64>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every operation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Report assigned keys for inserts, counting up from `first`.
    pub fn with_assigned_keys(mut self, first: i64) -> Self {
        self.next_key = Some(Arc::new(AtomicI64::new(first)));
        self
    }

    /// Result rows for the next `select`. Unscripted selects return no rows.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.state.lock().rows.push_back(rows);
    }

    /// Fail every write matching `predicate`.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&AppliedWrite) -> bool + Send + Sync + 'static,
    {
        self.state.lock().failures.push(Box::new(predicate));
    }

    /// Panic inside `select`/`exec` when the query text equals `query`.
    pub fn panic_on(&self, query: &str) {
        self.state.lock().panics.push(query.to_string());
    }

    /// Writes applied outside transactions plus writes of committed
    /// transactions, in application order.
    pub fn committed(&self) -> Vec<AppliedWrite> {
        self.state.lock().committed.clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().queries.clone()
    }

    pub fn tables(&self) -> Vec<String> {
        self.state.lock().tables.clone()
    }

    /// Times immediate and deferred work ran at the same moment.
    pub fn overlaps(&self) -> usize {
        self.activity.overlaps.load(Ordering::SeqCst)
    }

    /// Highest number of immediate operations seen running together.
    pub fn peak_immediate(&self) -> usize {
        self.activity.peak_immediate.load(Ordering::SeqCst)
    }

    /// `(begun, committed, rolled back)` transaction counts.
    pub fn transactions(&self) -> (u64, u64, u64) {
        let state = self.state.lock();
        (state.begun, state.commits, state.rollbacks)
    }

    pub fn checkpoints(&self) -> u64 {
        self.state.lock().checkpoints
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_panic(&self, query: &str) {
        let scripted = self.state.lock().panics.iter().any(|q| q == query);
        if scripted {
            panic!("scripted panic on `{query}`");
        }
    }

    fn check_failure(&self, write: &AppliedWrite) -> Result<(), LookalikeError> {
        if self.state.lock().failures.iter().any(|f| f(write)) {
            trace!(kind = write.kind(), "scripted failure");
            return Err(LookalikeError::Storage {
                source: format!("scripted {} failure", write.kind()).into(),
            });
        }
        Ok(())
    }

    async fn apply_direct(&self, write: AppliedWrite) -> Result<(), LookalikeError> {
        let _active = self.activity.enter_immediate();
        self.pause().await;
        self.check_failure(&write)?;
        self.state.lock().committed.push(write);
        Ok(())
    }
}

fn record_write(
    kind: fn(&'static str, Vec<(&'static str, Value)>) -> AppliedWrite,
    record: &dyn Record,
) -> AppliedWrite {
    kind(record.table_name(), record.columns())
}

fn insert_of(table: &'static str, columns: Vec<(&'static str, Value)>) -> AppliedWrite {
    AppliedWrite::Insert { table, columns }
}

fn update_of(table: &'static str, columns: Vec<(&'static str, Value)>) -> AppliedWrite {
    AppliedWrite::Update { table, columns }
}

fn delete_of(table: &'static str, columns: Vec<(&'static str, Value)>) -> AppliedWrite {
    AppliedWrite::Delete { table, columns }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    fn add_table_with_name(&self, table: TableMap) -> Result<(), LookalikeError> {
        let mut state = self.state.lock();
        let name = table.name().to_string();
        if !state.tables.contains(&name) {
            state.tables.push(name);
        }
        Ok(())
    }

    async fn create_tables_if_not_exists(&self) -> Result<(), LookalikeError> {
        let _active = self.activity.enter_immediate();
        self.pause().await;
        Ok(())
    }

    async fn create_index(&self) -> Result<(), LookalikeError> {
        let _active = self.activity.enter_immediate();
        self.pause().await;
        Ok(())
    }

    async fn select(&self, query: &str, _args: &Args) -> Result<Vec<Row>, LookalikeError> {
        let _active = self.activity.enter_immediate();
        self.check_panic(query);
        self.pause().await;
        let mut state = self.state.lock();
        state.queries.push(query.to_string());
        Ok(state.rows.pop_front().unwrap_or_default())
    }

    async fn insert(&self, record: &dyn Record) -> Result<Option<i64>, LookalikeError> {
        self.apply_direct(record_write(insert_of, record)).await?;
        Ok(self
            .next_key
            .as_ref()
            .map(|key| key.fetch_add(1, Ordering::SeqCst)))
    }

    async fn update(&self, record: &dyn Record) -> Result<u64, LookalikeError> {
        self.apply_direct(record_write(update_of, record)).await?;
        Ok(1)
    }

    async fn delete(&self, record: &dyn Record) -> Result<u64, LookalikeError> {
        self.apply_direct(record_write(delete_of, record)).await?;
        Ok(1)
    }

    async fn exec(&self, query: &str, args: &Args) -> Result<u64, LookalikeError> {
        self.check_panic(query);
        self.apply_direct(AppliedWrite::exec(query, args)).await?;
        Ok(1)
    }

    async fn begin(&self) -> Result<Box<dyn ExecutorTransaction>, LookalikeError> {
        let active = self.activity.enter_deferred();
        self.state.lock().begun += 1;
        Ok(Box::new(ScriptedTransaction {
            executor: self.clone(),
            pending: Vec::new(),
            _active: active,
        }))
    }

    async fn checkpoint(&self) -> Result<(), LookalikeError> {
        self.state.lock().checkpoints += 1;
        Ok(())
    }
}

struct ScriptedTransaction {
    executor: ScriptedExecutor,
    pending: Vec<AppliedWrite>,
    _active: ActiveGuard,
}

impl ScriptedTransaction {
    async fn stage(&mut self, write: AppliedWrite) -> Result<(), LookalikeError> {
        self.executor.activity.check_deferred();
        self.executor.pause().await;
        self.executor.check_failure(&write)?;
        self.pending.push(write);
        Ok(())
    }
}

#[async_trait]
impl ExecutorTransaction for ScriptedTransaction {
    async fn exec(&mut self, query: &str, args: &Args) -> Result<u64, LookalikeError> {
        self.executor.check_panic(query);
        self.stage(AppliedWrite::exec(query, args)).await?;
        Ok(1)
    }

    async fn insert(&mut self, record: &dyn Record) -> Result<(), LookalikeError> {
        self.stage(record_write(insert_of, record)).await
    }

    async fn update(&mut self, record: &dyn Record) -> Result<u64, LookalikeError> {
        self.stage(record_write(update_of, record)).await?;
        Ok(1)
    }

    async fn delete(&mut self, record: &dyn Record) -> Result<u64, LookalikeError> {
        self.stage(record_write(delete_of, record)).await?;
        Ok(1)
    }

    async fn commit(self: Box<Self>) -> Result<(), LookalikeError> {
        let mut state = self.executor.state.lock();
        state.commits += 1;
        state.committed.extend(self.pending.iter().cloned());
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LookalikeError> {
        self.executor.state.lock().rollbacks += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Pair(i64);

    impl Record for Pair {
        fn table_name(&self) -> &'static str {
            "pairs"
        }

        fn columns(&self) -> Vec<(&'static str, Value)> {
            vec![("id", self.0.into())]
        }
    }

    #[tokio::test]
    async fn transaction_writes_only_land_on_commit() {
        let executor = ScriptedExecutor::new();
        let mut tx = executor.begin().await.unwrap();
        tx.insert(&Pair(1)).await.unwrap();
        assert!(executor.committed().is_empty());
        tx.commit().await.unwrap();
        assert_eq!(executor.committed().len(), 1);
        assert_eq!(executor.committed()[0].column("id"), Some(&Value::Integer(1)));

        let mut tx = executor.begin().await.unwrap();
        tx.insert(&Pair(2)).await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(executor.committed().len(), 1);
        assert_eq!(executor.transactions(), (2, 1, 1));
    }

    #[tokio::test]
    async fn direct_work_during_transaction_counts_as_overlap() {
        let executor = ScriptedExecutor::new();
        let tx = executor.begin().await.unwrap();
        executor.exec("UPDATE x SET y = 1", &Args::None).await.unwrap();
        assert_eq!(executor.overlaps(), 1);
        drop(tx);

        executor.exec("UPDATE x SET y = 2", &Args::None).await.unwrap();
        assert_eq!(executor.overlaps(), 1);
    }

    #[tokio::test]
    async fn scripted_failures_and_rows() {
        let executor = ScriptedExecutor::new().with_assigned_keys(10);
        executor.fail_when(|w| w.column("id") == Some(&Value::Integer(13)));
        executor.push_rows(vec![Row::from_pairs([("n", 1i64)])]);

        assert_eq!(executor.insert(&Pair(1)).await.unwrap(), Some(10));
        assert!(executor.insert(&Pair(13)).await.is_err());
        assert_eq!(executor.select("q", &Args::None).await.unwrap().len(), 1);
        assert!(executor.select("q", &Args::None).await.unwrap().is_empty());
        assert_eq!(executor.queries(), ["q", "q"]);
    }
}
