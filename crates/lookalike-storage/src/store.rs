// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The image store: a scheduled SQLite database with the image tables
//! registered and created.

use std::path::PathBuf;
use std::sync::Arc;

use lookalike_config::model::StorageConfig;
use lookalike_core::{Executor, LookalikeError, TicketClass};
use tracing::{debug, info};

use crate::backup;
use crate::database::Database;
use crate::models::{ImageHash, SimilarPair};
use crate::sqlite::SqliteExecutor;

/// Image store backed by SQLite.
pub struct ImageStore {
    config: StorageConfig,
    db: Database,
}

impl ImageStore {
    /// Open the database file from `config`, create the image tables and
    /// indexes, and take a backup first when `backup_on_open` is set.
    pub async fn open(config: StorageConfig) -> Result<Self, LookalikeError> {
        if config.backup_on_open && std::path::Path::new(&config.database_path).exists() {
            let path = config.database_path.clone();
            tokio::task::spawn_blocking(move || backup::create_backup(&path))
                .await
                .map_err(|e| LookalikeError::Internal(format!("backup task failed: {e}")))??;
        }

        let executor = SqliteExecutor::open(&config).await?;
        let store = Self::with_executor(config, Arc::new(executor)).await?;
        info!(path = %store.config.database_path, "image store opened");
        Ok(store)
    }

    /// Build a store around an already opened executor.
    pub async fn with_executor(
        config: StorageConfig,
        executor: Arc<dyn Executor>,
    ) -> Result<Self, LookalikeError> {
        let db = Database::start(executor, config.blocking_mode);
        db.add_table_with_name(ImageHash::table()).await?;
        db.add_table_with_name(SimilarPair::table()).await?;
        db.create_tables_if_not_exists().await?;
        db.create_index().await?;
        debug!("image tables ready");
        Ok(Self { config, db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Wait for every queued write to settle.
    pub async fn flush(&self) -> Result<(), LookalikeError> {
        self.db.flush().await
    }

    /// Flush, then copy the database file while holding a deferred ticket
    /// so nothing touches it mid-copy.
    pub async fn backup(&self) -> Result<Option<PathBuf>, LookalikeError> {
        self.db.flush().await?;
        let _ticket = self.db.scheduler().acquire(TicketClass::Deferred).await?;
        self.db.executor().checkpoint().await?;

        let path = self.config.database_path.clone();
        tokio::task::spawn_blocking(move || backup::create_backup(&path))
            .await
            .map_err(|e| LookalikeError::Internal(format!("backup task failed: {e}")))?
    }

    /// Commit queued writes, stop scheduling, and checkpoint the WAL.
    pub async fn shutdown(&self) -> Result<(), LookalikeError> {
        self.db.shutdown().await?;
        info!("image store closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{images, similar};
    use tempfile::tempdir;

    fn config(path: &std::path::Path) -> StorageConfig {
        StorageConfig {
            database_path: path.to_str().unwrap().to_string(),
            ..StorageConfig::default()
        }
    }

    fn image(id: i64, hash: i64, path: &str) -> ImageHash {
        ImageHash {
            id,
            hash,
            path: path.to_string(),
        }
    }

    #[tokio::test]
    async fn open_creates_tables_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("store.db");
        let store = ImageStore::open(config(&db_path)).await.unwrap();
        assert!(db_path.exists());
        assert_eq!(images::image_count(store.database()).await.unwrap(), 0);
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn images_and_pairs_round_trip() {
        let dir = tempdir().unwrap();
        let store = ImageStore::open(config(&dir.path().join("rt.db"))).await.unwrap();
        let db = store.database();

        images::add_image(db, image(1, 0x0f0f, "a.png")).unwrap();
        images::add_image(db, image(2, 0x0f0e, "b.png")).unwrap();
        similar::add_similar(db, 1, 2, 1).unwrap();
        store.flush().await.unwrap();

        assert_eq!(images::image_count(db).await.unwrap(), 2);
        assert_eq!(
            images::image_by_hash(db, 0x0f0e).await.unwrap(),
            Some(image(2, 0x0f0e, "b.png"))
        );
        assert_eq!(images::image_by_id(db, 9).await.unwrap(), None);
        assert_eq!(
            similar::similar_to(db, 1).await.unwrap(),
            vec![SimilarPair {
                id: 1,
                id_similar: 2,
                dist: 1
            }]
        );

        images::move_image(db, image(1, 0x0f0f, "moved.png")).unwrap();
        images::remove_image(db, image(2, 0, "")).unwrap();
        similar::clear_similar(db).unwrap();
        store.flush().await.unwrap();

        assert_eq!(
            images::image_by_id(db, 1).await.unwrap().map(|i| i.path),
            Some("moved.png".to_string())
        );
        assert_eq!(images::image_count(db).await.unwrap(), 1);
        assert!(similar::similar_to(db, 1).await.unwrap().is_empty());
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn backup_copies_flushed_data() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("bk.db");
        let store = ImageStore::open(config(&db_path)).await.unwrap();
        images::add_image(store.database(), image(1, 5, "x.png")).unwrap();

        let target = store.backup().await.unwrap().unwrap();
        assert_eq!(target, dir.path().join("bk.db.bak"));
        store.shutdown().await.unwrap();

        let copy = ImageStore::open(config(&target)).await.unwrap();
        assert_eq!(images::image_count(copy.database()).await.unwrap(), 1);
        copy.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn backup_on_open_snapshots_existing_file() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("boot.db");
        let store = ImageStore::open(config(&db_path)).await.unwrap();
        images::add_image(store.database(), image(1, 5, "x.png")).unwrap();
        store.shutdown().await.unwrap();

        let reopened = ImageStore::open(StorageConfig {
            backup_on_open: true,
            ..config(&db_path)
        })
        .await
        .unwrap();
        assert!(dir.path().join("boot.db.bak").exists());
        reopened.shutdown().await.unwrap();
    }
}
