// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions at the database executor boundary.

pub mod executor;
pub mod record;

pub use executor::{Executor, ExecutorTransaction};
pub use record::{ColumnDef, ColumnType, FromRow, IndexDef, Record, TableMap};
