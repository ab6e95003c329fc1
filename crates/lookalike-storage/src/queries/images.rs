// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image hash operations.

use lookalike_core::{Args, LookalikeError};

use crate::database::Database;
use crate::models::ImageHash;

/// Queue an image for insertion with the next write batch.
pub fn add_image(db: &Database, image: ImageHash) -> Result<(), LookalikeError> {
    db.insert_mass([image])
}

/// Queue a path change for an already stored image.
pub fn move_image(db: &Database, image: ImageHash) -> Result<(), LookalikeError> {
    db.update(image)
}

/// Queue removal of an image.
pub fn remove_image(db: &Database, image: ImageHash) -> Result<(), LookalikeError> {
    db.delete(image)
}

/// First image with the given hash.
pub async fn image_by_hash(db: &Database, hash: i64) -> Result<Option<ImageHash>, LookalikeError> {
    optional(
        db.select_one(
            "SELECT id, hash, path FROM hashes WHERE hash = :hash LIMIT 1",
            &Args::named([("hash", hash)]),
        )
        .await,
    )
}

pub async fn image_by_id(db: &Database, id: i64) -> Result<Option<ImageHash>, LookalikeError> {
    optional(
        db.select_one(
            "SELECT id, hash, path FROM hashes WHERE id = :id",
            &Args::named([("id", id)]),
        )
        .await,
    )
}

pub async fn image_count(db: &Database) -> Result<i64, LookalikeError> {
    db.select_int("SELECT COUNT(*) FROM hashes", &Args::None)
        .await
}

fn optional<T>(result: Result<T, LookalikeError>) -> Result<Option<T>, LookalikeError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(LookalikeError::NoRows) => Ok(None),
        Err(e) => Err(e),
    }
}
