// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lookalike backup` command implementation.
//!
//! Goes through the image store rather than copying the file directly, so
//! queued writes are committed and the WAL is checkpointed before the copy.

use std::path::Path;

use lookalike_config::StorageConfig;
use lookalike_core::LookalikeError;
use lookalike_storage::ImageStore;
use tracing::{info, warn};

/// Back up the configured database to `<database_path>.bak`.
pub async fn run_backup(config: &StorageConfig) -> Result<(), LookalikeError> {
    if !Path::new(&config.database_path).exists() {
        warn!(path = %config.database_path, "backup requested for a missing database");
        return Err(LookalikeError::Backup {
            path: config.database_path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "database not found"),
        });
    }

    let store = ImageStore::open(config.clone()).await?;
    let result = store.backup().await;
    store.shutdown().await?;

    match result? {
        Some(target) => {
            let size = std::fs::metadata(&target).map(|m| m.len()).unwrap_or(0);
            let size_mb = size as f64 / (1024.0 * 1024.0);
            info!(backup = %target.display(), bytes = size, "backup complete");
            eprintln!(
                "Backup complete: {size_mb:.1} MB written to {}",
                target.display()
            );
        }
        None => {
            info!("no database path configured, skipping backup");
            eprintln!("No database path configured, nothing to back up");
        }
    }
    Ok(())
}
