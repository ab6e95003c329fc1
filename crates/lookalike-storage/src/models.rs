// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stored image records and their table maps.

use lookalike_core::{ColumnType, FromRow, LookalikeError, Record, Row, TableMap, Value};

pub const HASHES_TABLE: &str = "hashes";
pub const SIMILAR_TABLE: &str = "similar";

/// A hashed image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHash {
    pub id: i64,
    /// Perceptual hash, stored as the signed reinterpretation of its bits.
    pub hash: i64,
    pub path: String,
}

impl ImageHash {
    pub fn table() -> TableMap {
        TableMap::new(HASHES_TABLE)
            .column("id", ColumnType::Integer)
            .column("hash", ColumnType::Integer)
            .column("path", ColumnType::Text)
            .set_keys(false, &["id"])
            .add_index("hashes_hash", &["hash"])
            .add_index("hashes_path", &["path"])
    }
}

impl Record for ImageHash {
    fn table_name(&self) -> &'static str {
        HASHES_TABLE
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("hash", self.hash.into()),
            ("path", self.path.as_str().into()),
        ]
    }
}

impl FromRow for ImageHash {
    fn from_row(row: &Row) -> Result<Self, LookalikeError> {
        Ok(Self {
            id: row.get("id")?,
            hash: row.get("hash")?,
            path: row.get("path")?,
        })
    }
}

/// `id` looks like `id_similar` at distance `dist`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilarPair {
    pub id: i64,
    pub id_similar: i64,
    pub dist: i64,
}

impl SimilarPair {
    pub fn table() -> TableMap {
        TableMap::new(SIMILAR_TABLE)
            .column("id", ColumnType::Integer)
            .column("id_similar", ColumnType::Integer)
            .column("dist", ColumnType::Integer)
            .add_index("similar_id", &["id"])
            .add_index("similar_idsimilar", &["id_similar"])
    }
}

impl Record for SimilarPair {
    fn table_name(&self) -> &'static str {
        SIMILAR_TABLE
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("id_similar", self.id_similar.into()),
            ("dist", self.dist.into()),
        ]
    }
}

impl FromRow for SimilarPair {
    fn from_row(row: &Row) -> Result<Self, LookalikeError> {
        Ok(Self {
            id: row.get("id")?,
            id_similar: row.get("id_similar")?,
            dist: row.get("dist")?,
        })
    }
}
