// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Similarity pair operations.

use lookalike_core::{Args, LookalikeError};

use crate::database::Database;
use crate::models::SimilarPair;

/// Queue a similarity pair for insertion with the next write batch.
pub fn add_similar(db: &Database, id: i64, id_similar: i64, dist: i64) -> Result<(), LookalikeError> {
    db.insert_mass([SimilarPair {
        id,
        id_similar,
        dist,
    }])
}

/// Queue removal of every pair, ahead of a fresh comparison run.
pub fn clear_similar(db: &Database) -> Result<(), LookalikeError> {
    db.exec_mass("DELETE FROM similar", Args::None)
}

pub async fn pair_count(db: &Database) -> Result<i64, LookalikeError> {
    db.select_int("SELECT COUNT(*) FROM similar", &Args::None)
        .await
}

/// Pairs recorded for `id`, closest first.
pub async fn similar_to(db: &Database, id: i64) -> Result<Vec<SimilarPair>, LookalikeError> {
    db.select(
        "SELECT id, id_similar, dist FROM similar WHERE id = :id ORDER BY dist, id_similar",
        &Args::named([("id", id)]),
    )
    .await
}
