//! Durable state for the scanner.
//!
//! Two files back a scan:
//!
//! ```text
//! state.json      # Cursor: feed identifier -> last processed message id
//! findings.csv    # Records: one row per finding, consolidated by message id
//! ```
//!
//! Whole-file writes go through [`write_bytes_atomic`] (write to a sibling
//! temp file, then rename), so an interrupted write leaves the previous
//! version in place.

pub mod cursor;
pub mod records;
pub mod schema;

use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};

// Re-export for convenience
pub use cursor::{CursorState, CursorStore};
pub use records::{ConsolidationReport, RecordStore, SchemaReport};
pub use schema::{ColumnMap, SchemaVersion};

/// Ensure the parent directory of `path` exists.
async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Write bytes atomically (write to temp, then rename).
pub(crate) async fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path).await?;

    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Read bytes, returning None if the file doesn't exist.
pub(crate) async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/test.txt");

        write_bytes_atomic(&path, b"hello").await.unwrap();
        let data = read_bytes(&path).await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let data = read_bytes(&tmp.path().join("nope.txt")).await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("file.json");

        write_bytes_atomic(&path, b"first version").await.unwrap();
        write_bytes_atomic(&path, b"second").await.unwrap();
        assert_eq!(read_bytes(&path).await.unwrap(), Some(b"second".to_vec()));
    }
}
