// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write batching.
//!
//! Writes are queued without waiting for persistence. One background task
//! drains whatever is queued, takes a deferred ticket, and applies the whole
//! batch in a single transaction. The first failing operation rolls back the
//! batch and the rest of it is discarded.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use lookalike_core::{Args, Executor, ExecutorTransaction, LookalikeError, Record, TicketClass};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::panic_message;
use crate::scheduler::TicketScheduler;

/// A write waiting in the batch queue.
#[derive(Debug)]
pub enum PendingWrite {
    RawExec { query: String, args: Args },
    Insert(Box<dyn Record>),
    Update(Box<dyn Record>),
    Delete(Box<dyn Record>),
}

impl PendingWrite {
    pub fn kind(&self) -> &'static str {
        match self {
            PendingWrite::RawExec { .. } => "exec",
            PendingWrite::Insert(_) => "insert",
            PendingWrite::Update(_) => "update",
            PendingWrite::Delete(_) => "delete",
        }
    }

    async fn apply(&self, tx: &mut dyn ExecutorTransaction) -> Result<(), LookalikeError> {
        match self {
            PendingWrite::RawExec { query, args } => tx.exec(query, args).await.map(drop),
            PendingWrite::Insert(record) => tx.insert(record.as_ref()).await,
            PendingWrite::Update(record) => tx.update(record.as_ref()).await.map(drop),
            PendingWrite::Delete(record) => tx.delete(record.as_ref()).await.map(drop),
        }
    }
}

/// Counters describing what the batch loop has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub batches_committed: u64,
    pub batches_aborted: u64,
    pub writes_committed: u64,
    pub writes_discarded: u64,
}

#[derive(Default)]
struct Counters {
    batches_committed: AtomicU64,
    batches_aborted: AtomicU64,
    writes_committed: AtomicU64,
    writes_discarded: AtomicU64,
}

struct Inner {
    sender: Mutex<Option<mpsc::UnboundedSender<PendingWrite>>>,
    enqueued: AtomicU64,
    settled: watch::Sender<u64>,
    counters: Counters,
}

impl Inner {
    fn settle(&self, count: u64) {
        self.settled.send_modify(|settled| *settled += count);
    }
}

/// Queue of pending writes plus the task that commits them in batches.
pub struct WriteBatcher {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WriteBatcher {
    /// Spawn the batch loop on the current tokio runtime.
    pub fn start(executor: Arc<dyn Executor>, scheduler: Arc<TicketScheduler>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (settled, _) = watch::channel(0);
        let inner = Arc::new(Inner {
            sender: Mutex::new(Some(tx)),
            enqueued: AtomicU64::new(0),
            settled,
            counters: Counters::default(),
        });

        let task = tokio::spawn(run(Arc::clone(&inner), executor, scheduler, rx));
        debug!("write batcher started");

        Self {
            inner,
            task: Mutex::new(Some(task)),
        }
    }

    /// Queue a write. Success only means the write was queued.
    pub fn enqueue(&self, write: PendingWrite) -> Result<(), LookalikeError> {
        let sender = self.inner.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(LookalikeError::BatcherStopped);
        };
        self.inner.enqueued.fetch_add(1, Ordering::AcqRel);
        if sender.send(write).is_err() {
            // Count it as settled so flush does not wait on it forever.
            self.inner.settle(1);
            return Err(LookalikeError::BatcherStopped);
        }
        Ok(())
    }

    /// Writes accepted since start.
    pub fn enqueued(&self) -> u64 {
        self.inner.enqueued.load(Ordering::Acquire)
    }

    /// Writes the loop has finished with, committed or discarded.
    pub fn settled(&self) -> u64 {
        *self.inner.settled.borrow()
    }

    /// Wait until at least `target` writes have settled.
    pub async fn wait_settled(&self, target: u64) -> Result<(), LookalikeError> {
        let mut settled = self.inner.settled.subscribe();
        settled
            .wait_for(|count| *count >= target)
            .await
            .map(drop)
            .map_err(|_| LookalikeError::BatcherStopped)
    }

    pub fn stats(&self) -> BatchStats {
        let c = &self.inner.counters;
        BatchStats {
            batches_committed: c.batches_committed.load(Ordering::Relaxed),
            batches_aborted: c.batches_aborted.load(Ordering::Relaxed),
            writes_committed: c.writes_committed.load(Ordering::Relaxed),
            writes_discarded: c.writes_discarded.load(Ordering::Relaxed),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.sender.lock().is_some()
    }

    /// Refuse new writes, commit everything already queued, and wait for
    /// the loop to exit. The scheduler must still be running.
    pub async fn stop(&self) {
        drop(self.inner.sender.lock().take());
        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            error!(error = %e, "write batcher task failed");
        }
    }
}

impl Drop for WriteBatcher {
    fn drop(&mut self) {
        // The loop holds `inner` too; closing the queue is what ends it.
        drop(self.inner.sender.lock().take());
    }
}

async fn run(
    inner: Arc<Inner>,
    executor: Arc<dyn Executor>,
    scheduler: Arc<TicketScheduler>,
    mut queue: mpsc::UnboundedReceiver<PendingWrite>,
) {
    while let Some(first) = queue.recv().await {
        let mut batch = vec![first];
        while let Ok(write) = queue.try_recv() {
            batch.push(write);
        }
        let size = batch.len() as u64;

        let outcome = AssertUnwindSafe(commit_batch(executor.as_ref(), &scheduler, &batch))
            .catch_unwind()
            .await;
        let counters = &inner.counters;
        match outcome {
            Ok(Ok(())) => {
                counters.batches_committed.fetch_add(1, Ordering::Relaxed);
                counters.writes_committed.fetch_add(size, Ordering::Relaxed);
                debug!(batch_size = size, "write batch committed");
            }
            Ok(Err(e)) => {
                counters.batches_aborted.fetch_add(1, Ordering::Relaxed);
                counters.writes_discarded.fetch_add(size, Ordering::Relaxed);
                error!(batch_size = size, error = %e, "write batch discarded");
            }
            Err(panic) => {
                counters.batches_aborted.fetch_add(1, Ordering::Relaxed);
                counters.writes_discarded.fetch_add(size, Ordering::Relaxed);
                error!(
                    batch_size = size,
                    panic = %panic_message(&*panic),
                    "write batch panicked"
                );
            }
        }
        drop(batch);
        inner.settle(size);
    }
    debug!("write batcher stopped");
}

async fn commit_batch(
    executor: &dyn Executor,
    scheduler: &TicketScheduler,
    batch: &[PendingWrite],
) -> Result<(), LookalikeError> {
    let _ticket = scheduler.acquire(TicketClass::Deferred).await?;
    let mut tx = executor.begin().await?;

    let applied = AssertUnwindSafe(apply_all(tx.as_mut(), batch))
        .catch_unwind()
        .await;
    let failure = match applied {
        Ok(Ok(())) => return tx.commit().await,
        Ok(Err(e)) => e,
        Err(panic) => LookalikeError::OperationPanicked {
            message: panic_message(&*panic),
        },
    };

    if let Err(e) = tx.rollback().await {
        error!(error = %e, "rollback of write batch failed");
    }
    Err(failure)
}

async fn apply_all(
    tx: &mut dyn ExecutorTransaction,
    batch: &[PendingWrite],
) -> Result<(), LookalikeError> {
    for (index, write) in batch.iter().enumerate() {
        if let Err(e) = write.apply(tx).await {
            warn!(index, kind = write.kind(), error = %e, "batched write failed, rolling back");
            return Err(LookalikeError::BatchAborted {
                index,
                kind: write.kind(),
                source: Box::new(e),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Noop;

    impl Record for Noop {
        fn table_name(&self) -> &'static str {
            "noop"
        }

        fn columns(&self) -> Vec<(&'static str, lookalike_core::Value)> {
            Vec::new()
        }
    }

    #[test]
    fn pending_write_kinds() {
        let exec = PendingWrite::RawExec {
            query: "DELETE FROM similar".into(),
            args: Args::None,
        };
        assert_eq!(exec.kind(), "exec");
        assert_eq!(PendingWrite::Insert(Box::new(Noop)).kind(), "insert");
        assert_eq!(PendingWrite::Update(Box::new(Noop)).kind(), "update");
        assert_eq!(PendingWrite::Delete(Box::new(Noop)).kind(), "delete");
    }
}
