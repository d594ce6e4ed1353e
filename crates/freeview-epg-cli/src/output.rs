//! Atomic output writing.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Writes `bytes` to `path` so readers never observe a partial file.
///
/// The data goes to a temporary file in the target's directory first, which
/// is then renamed over the target.
///
/// # Errors
///
/// Returns an error if the directory is not writable or the rename fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    file.write_all(bytes)
        .context("failed to write temporary file")?;
    file.as_file()
        .sync_all()
        .context("failed to flush temporary file")?;
    file.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "Wrote guide");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_write_creates_file() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epg.xml");

        // Act
        write_atomic(&path, b"<tv/>\n").unwrap();

        // Assert
        assert_eq!(std::fs::read(&path).unwrap(), b"<tv/>\n");
    }

    #[test]
    fn test_write_replaces_existing_file() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epg.xml");
        std::fs::write(&path, "old contents that are longer").unwrap();

        // Act
        write_atomic(&path, b"new").unwrap();

        // Assert
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("epg.xml");

        // Act
        let result = write_atomic(&path, b"data");

        // Assert
        assert!(result.is_err());
    }
}
