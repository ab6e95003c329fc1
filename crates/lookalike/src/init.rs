// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lookalike init`: create the database file and its tables.

use lookalike_config::StorageConfig;
use lookalike_core::LookalikeError;
use lookalike_storage::ImageStore;
use tracing::{debug, info};

/// Open the store (which creates tables and indexes) and close it again.
/// Running it on an existing database is harmless.
pub async fn run_init(config: &StorageConfig) -> Result<(), LookalikeError> {
    debug!(path = %config.database_path, "initializing image database");
    let store = ImageStore::open(config.clone()).await?;
    store.shutdown().await?;
    info!(path = %config.database_path, "image database initialized");
    eprintln!("Initialized image database at {}", config.database_path);
    Ok(())
}
