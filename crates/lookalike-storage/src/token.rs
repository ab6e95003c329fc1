// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot grant signals and the pool that recycles them.
//!
//! A [`Token`] moves from `Waiting` to exactly one of `Granted`, `Abandoned`
//! or `Closed`. Whichever side wins that transition decides who hands the
//! token back to the [`TokenPool`]:
//!
//! * `Granted`: the caller, when it releases its ticket.
//! * `Abandoned`: the scheduler, when it dequeues the dead ticket.
//! * `Closed`: the caller, after observing the shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

const WAITING: u8 = 0;
const GRANTED: u8 = 1;
const ABANDONED: u8 = 2;
const CLOSED: u8 = 3;

/// Observable state of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Waiting,
    Granted,
    Abandoned,
    Closed,
}

impl TokenState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            GRANTED => TokenState::Granted,
            ABANDONED => TokenState::Abandoned,
            CLOSED => TokenState::Closed,
            _ => TokenState::Waiting,
        }
    }
}

/// A reusable one-shot binary signal.
#[derive(Debug)]
pub struct Token {
    state: AtomicU8,
    notify: Notify,
}

impl Token {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(WAITING),
            notify: Notify::new(),
        }
    }

    pub fn state(&self) -> TokenState {
        TokenState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Signal the waiter. Returns `false` if the token already left `Waiting`.
    pub fn grant(&self) -> bool {
        self.finish(GRANTED)
    }

    /// Mark the token dead because its waiter went away.
    pub fn abandon(&self) -> bool {
        self.finish(ABANDONED)
    }

    /// Wake the waiter with a shutdown notice.
    pub fn close(&self) -> bool {
        self.finish(CLOSED)
    }

    fn finish(&self, to: u8) -> bool {
        let won = self
            .state
            .compare_exchange(WAITING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            // notify_one keeps a permit when nobody is parked yet.
            self.notify.notify_one();
        }
        won
    }

    /// Wait until the token leaves `Waiting` and return the final state.
    pub async fn wait(&self) -> TokenState {
        loop {
            let state = self.state();
            if state != TokenState::Waiting {
                return state;
            }
            // A stale permit from a previous use only causes one extra
            // round through the loop.
            self.notify.notified().await;
        }
    }

    fn reset(&self) {
        self.state.store(WAITING, Ordering::Release);
    }
}

/// Free list of [`Token`]s.
///
/// The pool never holds more tokens than it has created.
#[derive(Debug, Default)]
pub struct TokenPool {
    idle: Mutex<Vec<Arc<Token>>>,
    created: AtomicUsize,
}

impl TokenPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take an idle token, or create one when the pool is empty.
    pub fn get(&self) -> Arc<Token> {
        if let Some(token) = self.idle.lock().pop() {
            token.reset();
            return token;
        }
        self.created.fetch_add(1, Ordering::Relaxed);
        Arc::new(Token::new())
    }

    /// Return a token. Each token must come back once per `get`.
    pub fn put(&self, token: Arc<Token>) {
        let mut idle = self.idle.lock();
        debug_assert!(
            idle.len() < self.created.load(Ordering::Relaxed),
            "token pool holds more tokens than it created"
        );
        debug_assert!(
            !idle.iter().any(|t| Arc::ptr_eq(t, &token)),
            "token returned to the pool twice"
        );
        idle.push(token);
    }

    /// Tokens ever created by this pool.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Tokens currently idle in the pool.
    pub fn available(&self) -> usize {
        self.idle.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn only_the_first_transition_wins() {
        let token = Token::new();
        assert!(token.abandon());
        assert!(!token.grant());
        assert!(!token.close());
        assert_eq!(token.state(), TokenState::Abandoned);
    }

    #[tokio::test]
    async fn grant_before_wait_is_not_lost() {
        let token = Token::new();
        assert!(token.grant());
        assert_eq!(token.wait().await, TokenState::Granted);
    }

    #[tokio::test]
    async fn wait_wakes_on_close() {
        let token = Arc::new(Token::new());
        let waiter = {
            let token = Arc::clone(&token);
            tokio::spawn(async move { token.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(token.close());
        assert_eq!(waiter.await.unwrap(), TokenState::Closed);
    }

    #[test]
    fn pool_recycles_and_resets_tokens() {
        let pool = TokenPool::new();
        let a = pool.get();
        let b = pool.get();
        assert_eq!(pool.created(), 2);
        assert_eq!(pool.available(), 0);

        assert!(a.grant());
        pool.put(a);
        pool.put(b);
        assert_eq!(pool.available(), 2);

        let c = pool.get();
        assert_eq!(c.state(), TokenState::Waiting);
        assert_eq!(pool.created(), 2);
        assert_eq!(pool.available(), 1);
    }
}
