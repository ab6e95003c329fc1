// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Byte-for-byte copy of the database file to `<path>.bak`.
//!
//! The copy is only consistent when nothing writes to the file meanwhile;
//! [`ImageStore::backup`](crate::store::ImageStore::backup) takes care of
//! that by holding a deferred ticket.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use lookalike_core::LookalikeError;
use tracing::info;

/// Buffer size used for both sides of the copy.
pub const COPY_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// `<path>.bak`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Copy `path` to `<path>.bak`, replacing any earlier backup.
///
/// Returns the backup location, or `None` when `path` is empty.
pub fn create_backup(path: &str) -> Result<Option<PathBuf>, LookalikeError> {
    if path.is_empty() {
        return Ok(None);
    }
    let source = Path::new(path);
    let target = backup_path(source);
    let fail = |e: io::Error| LookalikeError::Backup {
        path: path.to_string(),
        source: e,
    };

    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, File::open(source).map_err(fail)?);
    let mut writer =
        BufWriter::with_capacity(COPY_BUFFER_SIZE, File::create(&target).map_err(fail)?);
    let bytes = io::copy(&mut reader, &mut writer).map_err(fail)?;
    writer.flush().map_err(fail)?;
    writer.get_ref().sync_all().map_err(fail)?;

    info!(
        source = path,
        target = %target.display(),
        bytes,
        "database backup written"
    );
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    #[test]
    fn empty_path_is_a_no_op() {
        assert!(create_backup("").unwrap().is_none());
    }

    #[test]
    #[traced_test]
    fn copies_bytes_to_bak_sibling() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("images.db");
        let content: Vec<u8> = (0..COPY_BUFFER_SIZE + 4097).map(|i| (i % 251) as u8).collect();
        std::fs::write(&db, &content).unwrap();

        let target = create_backup(db.to_str().unwrap()).unwrap().unwrap();
        assert_eq!(target, dir.path().join("images.db.bak"));
        assert_eq!(std::fs::read(&target).unwrap(), content);
        assert!(logs_contain("database backup written"));
    }

    #[test]
    fn overwrites_previous_backup() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("images.db");
        std::fs::write(&db, b"new").unwrap();
        std::fs::write(dir.path().join("images.db.bak"), b"much older contents").unwrap();

        create_backup(db.to_str().unwrap()).unwrap();
        assert_eq!(std::fs::read(dir.path().join("images.db.bak")).unwrap(), b"new");
    }

    #[test]
    fn missing_source_is_reported() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.db");
        let err = create_backup(missing.to_str().unwrap()).unwrap_err();
        match err {
            LookalikeError::Backup { path, source } => {
                assert!(path.ends_with("missing.db"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected Backup error, got {other:?}"),
        }
        assert!(!backup_path(&missing).exists());
    }
}
