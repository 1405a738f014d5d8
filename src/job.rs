//! Conversion jobs and the input files they own.
//!
//! A [`SourceFile`] is handed to exactly one job and removed exactly once,
//! by the dispatcher, whatever the outcome. Callers that must keep their
//! original stage a copy first ([`SourceFile::stage_copy`]), the same way an
//! upload handler would hand over a spooled temp file.

use crate::classify::{classify_source, SourceKind, TargetFormat};
use crate::error::FileShiftError;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// The on-disk input of a job.
#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    /// Keeps the staging directory alive until the file has been removed.
    staging: Option<TempDir>,
    removed: bool,
}

impl SourceFile {
    /// Take ownership of an existing file. It is deleted after dispatch.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, FileShiftError> {
        let path = path.into();
        if !path.is_file() {
            return Err(FileShiftError::FileNotFound { path });
        }
        Ok(Self {
            path,
            staging: None,
            removed: false,
        })
    }

    /// Copy `original` into a private staging directory and own the copy.
    pub async fn stage_copy(original: &Path) -> Result<Self, FileShiftError> {
        if !original.is_file() {
            return Err(FileShiftError::FileNotFound {
                path: original.to_path_buf(),
            });
        }
        let name = original
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "input".into());
        let dir = TempDir::new().map_err(|e| FileShiftError::Internal(format!("tempdir: {e}")))?;
        let path = dir.path().join(name);
        tokio::fs::copy(original, &path)
            .await
            .map_err(|e| FileShiftError::Internal(format!("staging copy failed: {e}")))?;
        debug!("Staged {} → {}", original.display(), path.display());
        Ok(Self {
            path,
            staging: Some(dir),
            removed: false,
        })
    }

    /// Write in-memory bytes to a private staging directory and own the file.
    pub async fn stage_bytes(bytes: &[u8], filename: &str) -> Result<Self, FileShiftError> {
        let dir = TempDir::new().map_err(|e| FileShiftError::Internal(format!("tempdir: {e}")))?;
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "input".into());
        let path = dir.path().join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| FileShiftError::Internal(format!("staging write failed: {e}")))?;
        Ok(Self {
            path,
            staging: Some(dir),
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole input into memory.
    pub async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }

    /// Delete the input. Consumes the handle so it cannot run twice.
    pub fn remove(mut self) -> io::Result<()> {
        self.removed = true;
        let result = match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        };
        // Dropping the staging dir removes anything left beside the file.
        self.staging.take();
        result
    }
}

impl Drop for SourceFile {
    fn drop(&mut self) {
        if !self.removed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to remove input {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

/// One conversion request: consumed by a single dispatch call.
#[derive(Debug)]
pub struct ConversionJob {
    pub input: SourceFile,
    pub content_type: String,
    pub kind: SourceKind,
    pub target: TargetFormat,
    pub original_filename: String,
}

impl ConversionJob {
    /// Build a job, classifying the source from its declared content type.
    pub fn new(
        input: SourceFile,
        content_type: impl Into<String>,
        target: TargetFormat,
        original_filename: impl Into<String>,
    ) -> Self {
        let content_type = content_type.into();
        let kind = classify_source(&content_type);
        Self {
            input,
            content_type,
            kind,
            target,
            original_filename: original_filename.into(),
        }
    }

    /// File stem used to name the output, reduced to a safe character set.
    pub fn output_stem(&self) -> String {
        let stem = Path::new(&self.original_filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let safe: String = stem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .take(64)
            .collect();
        if safe.trim_matches('_').is_empty() {
            "converted".to_string()
        } else {
            safe
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn staged_copy_leaves_original_alone() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("notes.txt");
        std::fs::write(&original, b"hello").unwrap();

        let staged = SourceFile::stage_copy(&original).await.unwrap();
        let staged_path = staged.path().to_path_buf();
        assert_ne!(staged_path, original);
        assert_eq!(staged.read().await.unwrap(), b"hello");

        staged.remove().unwrap();
        assert!(!staged_path.exists());
        assert!(original.exists());
    }

    #[test]
    fn from_path_requires_a_file() {
        let err = SourceFile::from_path("/definitely/not/here.bin").unwrap_err();
        assert!(matches!(err, FileShiftError::FileNotFound { .. }));
    }

    #[test]
    fn drop_removes_unconsumed_input() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("in.bin");
        std::fs::write(&p, b"x").unwrap();
        {
            let _src = SourceFile::from_path(&p).unwrap();
        }
        assert!(!p.exists());
    }

    #[test]
    fn output_stem_is_sanitised() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("in.bin");
        std::fs::write(&p, b"x").unwrap();
        let job = ConversionJob::new(
            SourceFile::from_path(&p).unwrap(),
            "text/plain",
            TargetFormat::Pdf,
            "../my report (final).txt",
        );
        assert_eq!(job.kind, SourceKind::PlainText);
        assert_eq!(job.output_stem(), "my_report__final_");
    }
}
