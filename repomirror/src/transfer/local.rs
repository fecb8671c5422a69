//! Local state of a destination file.
//!
//! The partial file itself is the resume checkpoint; there is no manifest.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{SyncError, SyncResult};

/// Number of bytes already present at `path`, or 0 if nothing is there.
///
/// Any error other than "not found" is fatal, as is a directory occupying the
/// destination.
pub fn existing_bytes(path: &Path) -> SyncResult<u64> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Err(SyncError::io(
            path,
            io::Error::new(
                io::ErrorKind::Other,
                "destination is occupied by a directory",
            ),
        )),
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(SyncError::io(path, e)),
    }
}

/// Remove local bytes so the next attempt starts from zero.
pub fn discard(path: &Path) -> SyncResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SyncError::io(path, e)),
    }
}

/// Create the parent directories of a destination file.
pub fn ensure_parent(path: &Path) -> SyncResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| SyncError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_has_zero_bytes() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(existing_bytes(&dir.path().join("absent.bin")).unwrap(), 0);
    }

    #[test]
    fn test_existing_file_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.bin");
        fs::write(&path, vec![7u8; 123]).unwrap();

        assert_eq!(existing_bytes(&path).unwrap(), 123);
    }

    #[test]
    fn test_directory_at_destination_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = existing_bytes(dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
    }

    #[test]
    fn test_discard_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.bin");
        fs::write(&path, b"stale").unwrap();

        discard(&path).unwrap();
        assert!(!path.exists());
        discard(&path).unwrap();
    }

    #[test]
    fn test_ensure_parent_creates_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c/file.bin");

        ensure_parent(&path).unwrap();
        assert!(dir.path().join("a/b/c").is_dir());
    }
}
