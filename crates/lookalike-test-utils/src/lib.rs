// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for lookalike.
//!
//! Provides an in-memory executor for fast, deterministic tests of the
//! ticket scheduler and the write batcher without a real database.
//!
//! # Components
//!
//! - [`ScriptedExecutor`] - records applied writes, detects overlapping
//!   immediate/deferred work, and injects failures, panics and latency
//! - [`AppliedWrite`] - one write as seen by the executor

pub mod executor;

pub use executor::{AppliedWrite, ScriptedExecutor};
