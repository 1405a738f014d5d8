//! Scoped on-disk intermediates and atomic output placement.
//!
//! Strategies produce bytes; they never write the final output themselves.
//! The two file-system concerns that remain live here:
//!
//! * [`Scratch`] — a per-strategy directory for intermediate files (page
//!   rasters). Everything inside is removed when it is dropped, on success,
//!   failure or panic alike.
//! * [`place_output`] — writes the winning bytes to a uniquely named file in
//!   the output directory via temp-file-then-persist, so a half-written
//!   output is never visible under its final name.

use crate::error::FileShiftError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Temporary directory for one strategy's intermediate files.
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::Builder::new().prefix("fileshift-").tempdir()?,
        })
    }

    /// Write an intermediate file inside the scratch directory.
    pub fn write(&self, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let p = self.dir.path().join(name);
        std::fs::write(&p, bytes)?;
        Ok(p)
    }
}

/// Persist `bytes` as `<stem>-<random>.<ext>` inside `output_dir`.
pub fn place_output(
    output_dir: &Path,
    stem: &str,
    extension: &str,
    bytes: &[u8],
) -> Result<PathBuf, FileShiftError> {
    let write_err = |source: std::io::Error| FileShiftError::OutputWriteFailed {
        path: output_dir.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(output_dir).map_err(write_err)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!("{stem}-"))
        .suffix(&format!(".{extension}"))
        .rand_bytes(8)
        .tempfile_in(output_dir)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    let (_file, path) = tmp.keep().map_err(|e| write_err(e.error))?;
    debug!("Placed output {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}
