// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counter of granted-but-unreleased tickets.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Tracks outstanding granted tickets and lets the scheduler wait until all
/// of them are released.
#[derive(Debug, Default)]
pub struct CompletionBarrier {
    count: AtomicUsize,
    zero: Notify,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn done(&self) {
        let prev = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "completion barrier released below zero");
        if prev == 1 {
            self.zero.notify_waiters();
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Resolve once the count is zero.
    pub async fn wait(&self) {
        loop {
            let notified = self.zero.notified();
            tokio::pin!(notified);
            // Register before reading the count so a concurrent `done`
            // cannot slip between the check and the await.
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_returns_immediately_at_zero() {
        let barrier = CompletionBarrier::new();
        barrier.wait().await;
    }

    #[tokio::test]
    async fn wait_blocks_until_last_done() {
        let barrier = Arc::new(CompletionBarrier::new());
        barrier.add();
        barrier.add();

        let waiter = {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move { barrier.wait().await })
        };

        barrier.done();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        barrier.done();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
        assert_eq!(barrier.count(), 0);
    }
}
