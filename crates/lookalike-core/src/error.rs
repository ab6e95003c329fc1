// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the lookalike workspace.

use thiserror::Error;

/// The primary error type used across the executor traits, the scheduler and
/// the database facade.
#[derive(Debug, Error)]
pub enum LookalikeError {
    /// Storage backend errors (connection failure, constraint violation, bad SQL).
    #[error("storage error: {source}")]
    Storage {
        /// Underlying driver error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A single-row query matched nothing.
    #[error("no rows returned")]
    NoRows,

    /// A single-row query matched more than one row.
    #[error("expected one row, query returned {count}")]
    MultipleRows {
        /// Number of rows the query produced.
        count: usize,
    },

    /// A record refers to a table that was never registered with the executor.
    #[error("table `{table}` is not registered")]
    UnknownTable {
        /// Name the record reported.
        table: String,
    },

    /// Update or delete on a table without key columns.
    #[error("table `{table}` has no key columns")]
    NoKeys {
        /// Table that was registered without keys.
        table: String,
    },

    /// A record does not provide a column its table map requires.
    #[error("record for table `{table}` is missing column `{column}`")]
    MissingColumn {
        /// Table the record maps to.
        table: String,
        /// Column the record did not supply.
        column: String,
    },

    /// A result row has no column with the requested name.
    #[error("column `{column}` not found in result row")]
    ColumnNotFound {
        /// Requested column name.
        column: String,
    },

    /// A result column holds a value of an unexpected type.
    #[error("column `{column}` has unexpected type, expected {expected}")]
    ColumnType {
        /// Column that was read.
        column: String,
        /// Type the caller asked for.
        expected: &'static str,
    },

    /// The ticket scheduler has been stopped; no further tickets are granted.
    #[error("ticket scheduler is not running")]
    SchedulerStopped,

    /// The write batcher has been stopped; no further writes are accepted.
    #[error("write batcher is not running")]
    BatcherStopped,

    /// A granted database operation panicked. The ticket was still released.
    #[error("database operation panicked: {message}")]
    OperationPanicked {
        /// Panic payload, when it was a string.
        message: String,
    },

    /// An operation inside a write batch failed and the batch was rolled back.
    #[error("batch aborted at operation {index} ({kind}): {source}")]
    BatchAborted {
        /// Position of the failing operation within the batch.
        index: usize,
        /// Operation kind: `insert`, `update`, `delete` or `exec`.
        kind: &'static str,
        /// Error the operation returned.
        source: Box<LookalikeError>,
    },

    /// Copying the database file to its `.bak` sibling failed.
    #[error("backup of `{path}` failed: {source}")]
    Backup {
        /// Database file that was being backed up.
        path: String,
        /// I/O failure from the copy.
        source: std::io::Error,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
