// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for lookalike.
//!
//! This crate provides the error type, the dynamically typed values and rows
//! that cross the database boundary, and the executor/record traits that the
//! storage layer schedules access to.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::LookalikeError;
pub use types::{Args, FromValue, Row, TicketClass, Value};

pub use traits::{
    ColumnType, Executor, ExecutorTransaction, FromRow, Record, TableMap,
};
