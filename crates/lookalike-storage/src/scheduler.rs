// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-class ticket scheduler.
//!
//! Immediate tickets may run together. A deferred ticket runs alone: it is
//! granted only once every immediate ticket has been released, and nothing
//! else is granted until it is released in turn. A single background task
//! is the only consumer of both ticket queues.
//!
//! Loop, per round:
//! 1. grant every immediate ticket already queued;
//! 2. wait until all granted tickets are released;
//! 3. wait for the next ticket on either queue and grant it. A deferred
//!    grant is waited out before the next round. When both queues are
//!    ready, the deferred ticket goes first.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lookalike_core::{LookalikeError, TicketClass};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::barrier::CompletionBarrier;
use crate::token::{Token, TokenPool, TokenState};

type TicketQueue = mpsc::UnboundedReceiver<Arc<Token>>;

struct Shared {
    immediate: mpsc::UnboundedSender<Arc<Token>>,
    deferred: mpsc::UnboundedSender<Arc<Token>>,
    pool: TokenPool,
    barrier: CompletionBarrier,
    blocking: bool,
    cancel: CancellationToken,
    immediate_grants: AtomicU64,
    deferred_grants: AtomicU64,
}

impl Shared {
    /// Grant a dequeued ticket. Returns `false` for an abandoned ticket,
    /// whose token goes straight back to the pool.
    fn grant(&self, token: Arc<Token>, class: TicketClass) -> bool {
        self.barrier.add();
        if token.grant() {
            match class {
                TicketClass::Immediate => self.immediate_grants.fetch_add(1, Ordering::Relaxed),
                TicketClass::Deferred => self.deferred_grants.fetch_add(1, Ordering::Relaxed),
            };
            trace!(%class, outstanding = self.barrier.count(), "ticket granted");
            true
        } else {
            self.barrier.done();
            trace!(%class, "skipping abandoned ticket");
            self.pool.put(token);
            false
        }
    }

    fn release(&self, token: Arc<Token>) {
        self.pool.put(token);
        self.barrier.done();
    }

    /// Wake a ticket left in a queue at shutdown.
    fn retire(&self, token: Arc<Token>) {
        if !token.close() {
            // Abandoned while queued; nobody else will return it.
            self.pool.put(token);
        }
    }
}

/// Grants database tickets to callers in immediate/deferred order.
pub struct TicketScheduler {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TicketScheduler {
    /// Spawn the scheduler loop on the current tokio runtime.
    ///
    /// With `blocking` off every request is granted as immediate.
    pub fn start(blocking: bool) -> Self {
        let (immediate_tx, immediate_rx) = mpsc::unbounded_channel();
        let (deferred_tx, deferred_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            immediate: immediate_tx,
            deferred: deferred_tx,
            pool: TokenPool::new(),
            barrier: CompletionBarrier::new(),
            blocking,
            cancel: CancellationToken::new(),
            immediate_grants: AtomicU64::new(0),
            deferred_grants: AtomicU64::new(0),
        });

        let task = tokio::spawn(run(Arc::clone(&shared), immediate_rx, deferred_rx));
        debug!(blocking, "ticket scheduler started");

        Self {
            shared,
            task: Mutex::new(Some(task)),
        }
    }

    /// Queue a ticket. The returned [`Ticket`] resolves once granted.
    pub fn request_ticket(&self, class: TicketClass) -> Result<Ticket, LookalikeError> {
        if self.shared.cancel.is_cancelled() {
            return Err(LookalikeError::SchedulerStopped);
        }
        let class = if self.shared.blocking {
            class
        } else {
            TicketClass::Immediate
        };

        let token = self.shared.pool.get();
        let queue = match class {
            TicketClass::Immediate => &self.shared.immediate,
            TicketClass::Deferred => &self.shared.deferred,
        };
        if queue.send(Arc::clone(&token)).is_err() {
            // The loop has exited and closed its queues.
            self.shared.pool.put(token);
            return Err(LookalikeError::SchedulerStopped);
        }

        trace!(%class, "ticket requested");
        Ok(Ticket {
            token: Some(token),
            class,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Request a ticket and wait for the grant.
    pub async fn acquire(&self, class: TicketClass) -> Result<TicketGuard, LookalikeError> {
        self.request_ticket(class)?.granted().await
    }

    /// Whether Deferred tickets get exclusive access.
    pub fn is_blocking(&self) -> bool {
        self.shared.blocking
    }

    /// Granted tickets not yet released.
    pub fn outstanding(&self) -> usize {
        self.shared.barrier.count()
    }

    pub fn tokens_created(&self) -> usize {
        self.shared.pool.created()
    }

    pub fn tokens_available(&self) -> usize {
        self.shared.pool.available()
    }

    /// Total grants per class since start.
    pub fn grants(&self, class: TicketClass) -> u64 {
        match class {
            TicketClass::Immediate => self.shared.immediate_grants.load(Ordering::Relaxed),
            TicketClass::Deferred => self.shared.deferred_grants.load(Ordering::Relaxed),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.shared.cancel.is_cancelled()
    }

    /// Stop granting. Tickets still queued resolve to
    /// [`LookalikeError::SchedulerStopped`]; tickets already granted stay
    /// valid until released.
    pub async fn stop(&self) {
        self.shared.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            error!(error = %e, "ticket scheduler task failed");
        }
    }
}

impl Drop for TicketScheduler {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

async fn run(shared: Arc<Shared>, mut immediate: TicketQueue, mut deferred: TicketQueue) {
    let cancel = shared.cancel.clone();

    'rounds: loop {
        while let Ok(token) = immediate.try_recv() {
            shared.grant(token, TicketClass::Immediate);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break 'rounds,
            _ = shared.barrier.wait() => {}
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break 'rounds,
            Some(token) = deferred.recv() => {
                if shared.grant(token, TicketClass::Deferred) {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break 'rounds,
                        _ = shared.barrier.wait() => {}
                    }
                }
            }
            Some(token) = immediate.recv() => {
                shared.grant(token, TicketClass::Immediate);
            }
        }
    }

    immediate.close();
    deferred.close();
    let mut retired = 0usize;
    while let Ok(token) = immediate.try_recv() {
        shared.retire(token);
        retired += 1;
    }
    while let Ok(token) = deferred.try_recv() {
        shared.retire(token);
        retired += 1;
    }
    debug!(retired, "ticket scheduler stopped");
}

/// A queued ticket. Await [`Ticket::granted`] to get the grant.
///
/// Dropping a ticket before it is granted abandons it; dropping it after
/// the grant releases it.
pub struct Ticket {
    token: Option<Arc<Token>>,
    class: TicketClass,
    shared: Arc<Shared>,
}

impl Ticket {
    pub fn class(&self) -> TicketClass {
        self.class
    }

    pub fn is_granted(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| t.state() == TokenState::Granted)
    }

    /// Wait for the grant.
    pub async fn granted(mut self) -> Result<TicketGuard, LookalikeError> {
        let state = match &self.token {
            Some(token) => token.wait().await,
            None => return Err(LookalikeError::Internal("ticket already consumed".into())),
        };
        match state {
            TokenState::Granted => Ok(TicketGuard {
                token: self.token.take(),
                class: self.class,
                shared: Arc::clone(&self.shared),
            }),
            TokenState::Closed => Err(LookalikeError::SchedulerStopped),
            other => Err(LookalikeError::Internal(format!(
                "ticket woke in unexpected state {other:?}"
            ))),
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        if token.abandon() {
            trace!(class = %self.class, "ticket abandoned before grant");
            return;
        }
        match token.state() {
            TokenState::Granted => self.shared.release(token),
            TokenState::Closed => self.shared.pool.put(token),
            _ => {}
        }
    }
}

/// A granted ticket. The grant is released exactly once, on
/// [`TicketGuard::release`] or drop.
pub struct TicketGuard {
    token: Option<Arc<Token>>,
    class: TicketClass,
    shared: Arc<Shared>,
}

impl TicketGuard {
    pub fn class(&self) -> TicketClass {
        self.class
    }

    pub fn release(self) {}
}

impl Drop for TicketGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            trace!(class = %self.class, "ticket released");
            self.shared.release(token);
        }
    }
}

impl std::fmt::Debug for TicketGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketGuard")
            .field("class", &self.class)
            .finish()
    }
}

impl std::fmt::Debug for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticket")
            .field("class", &self.class)
            .field("granted", &self.is_granted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn immediate_tickets_are_granted_together() {
        let scheduler = TicketScheduler::start(true);
        assert!(scheduler.is_blocking());
        let a = scheduler.request_ticket(TicketClass::Immediate).unwrap();
        let b = scheduler.request_ticket(TicketClass::Immediate).unwrap();
        let a = a.granted().await.unwrap();
        let b = b.granted().await.unwrap();
        assert_eq!(scheduler.outstanding(), 2);
        drop(a);
        drop(b);
        assert_eq!(scheduler.outstanding(), 0);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn deferred_waits_for_immediate_release() {
        let scheduler = TicketScheduler::start(true);
        let reader = scheduler.acquire(TicketClass::Immediate).await.unwrap();

        let writer = scheduler.request_ticket(TicketClass::Deferred).unwrap();
        settle().await;
        assert!(!writer.is_granted());

        reader.release();
        let writer = tokio::time::timeout(Duration::from_secs(1), writer.granted())
            .await
            .expect("deferred ticket should be granted")
            .unwrap();
        assert_eq!(writer.class(), TicketClass::Deferred);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn non_blocking_mode_grants_everything_as_immediate() {
        let scheduler = TicketScheduler::start(false);
        assert!(!scheduler.is_blocking());
        let a = scheduler.request_ticket(TicketClass::Deferred).unwrap();
        let b = scheduler.request_ticket(TicketClass::Deferred).unwrap();
        let a = a.granted().await.unwrap();
        let b = b.granted().await.unwrap();
        assert_eq!(a.class(), TicketClass::Immediate);
        assert_eq!(b.class(), TicketClass::Immediate);
        assert_eq!(scheduler.grants(TicketClass::Deferred), 0);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn abandoned_ticket_is_recycled() {
        let scheduler = TicketScheduler::start(true);
        let holder = scheduler.acquire(TicketClass::Immediate).await.unwrap();
        let waiting = scheduler.request_ticket(TicketClass::Deferred).unwrap();
        drop(waiting);

        holder.release();
        settle().await;
        assert_eq!(scheduler.outstanding(), 0);
        assert_eq!(scheduler.tokens_available(), scheduler.tokens_created());
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn stop_wakes_queued_tickets() {
        let scheduler = TicketScheduler::start(true);
        let holder = scheduler.acquire(TicketClass::Immediate).await.unwrap();
        let queued = scheduler.request_ticket(TicketClass::Deferred).unwrap();

        scheduler.stop().await;
        let err = queued.granted().await.unwrap_err();
        assert!(matches!(err, LookalikeError::SchedulerStopped));

        drop(holder);
        assert!(matches!(
            scheduler.request_ticket(TicketClass::Immediate),
            Err(LookalikeError::SchedulerStopped)
        ));
        assert_eq!(scheduler.tokens_available(), scheduler.tokens_created());
    }
}
