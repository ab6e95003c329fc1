// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the stored image tables.

pub mod images;
pub mod similar;
