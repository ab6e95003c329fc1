// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled access to a single-writer SQLite database.
//!
//! Every caller goes through a [`Database`], which takes a ticket from the
//! [`TicketScheduler`] before touching the executor. Reads and single-row
//! writes run under immediate tickets and may overlap each other. Batched
//! writes are queued on the [`WriteBatcher`] and committed together under a
//! deferred ticket, which excludes all other work.

mod barrier;
mod token;

pub mod backup;
pub mod batcher;
pub mod database;
pub mod models;
pub mod queries;
pub mod scheduler;
pub mod sqlite;
pub mod store;

pub use batcher::{BatchStats, PendingWrite, WriteBatcher};
pub use database::Database;
pub use models::*;
pub use scheduler::{Ticket, TicketGuard, TicketScheduler};
pub use sqlite::SqliteExecutor;
pub use store::ImageStore;

use std::any::Any;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
