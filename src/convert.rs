//! One-call conversion entry points.
//!
//! These wrap [`Dispatcher`] for callers that hold a path or a byte buffer
//! rather than a job. The caller's data is always staged into a private copy
//! first: dispatch removes its input, and that input must never be the
//! caller's original file.

use crate::classify::{sniff_content_type, TargetFormat};
use crate::config::ConverterConfig;
use crate::dispatch::Dispatcher;
use crate::error::FileShiftError;
use crate::job::{ConversionJob, SourceFile};
use crate::outcome::ConversionOutcome;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Bytes read from the start of a file to sniff its content type.
const SNIFF_LEN: usize = 512;

/// Convert a file on disk.
///
/// The content type is sniffed from the file's leading bytes, falling back
/// to its extension. The file itself is left untouched.
///
/// # Errors
/// Returns `Err` only when the job cannot be set up (missing file, staging
/// failure). Conversion failures are reported in the outcome.
pub async fn convert_file(
    path: impl AsRef<Path>,
    target: TargetFormat,
    config: &ConverterConfig,
) -> Result<ConversionOutcome, FileShiftError> {
    let path = path.as_ref();
    let content_type = sniff_file(path).await?;
    debug!("{}: sniffed {}", path.display(), content_type);

    let input = SourceFile::stage_copy(path).await?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let dispatcher = Dispatcher::new(config.clone())?;
    Ok(dispatcher
        .dispatch(ConversionJob::new(input, content_type, target, filename))
        .await)
}

/// Convert an in-memory upload with a declared content type.
pub async fn convert_bytes(
    bytes: &[u8],
    filename: &str,
    content_type: &str,
    target: TargetFormat,
    config: &ConverterConfig,
) -> Result<ConversionOutcome, FileShiftError> {
    let input = SourceFile::stage_bytes(bytes, filename).await?;
    let dispatcher = Dispatcher::new(config.clone())?;
    Ok(dispatcher
        .dispatch(ConversionJob::new(input, content_type, target, filename))
        .await)
}

/// Synchronous wrapper around [`convert_file`].
///
/// Creates a temporary tokio runtime. Do not call from within an async context.
pub fn convert_sync(
    path: impl AsRef<Path>,
    target: TargetFormat,
    config: &ConverterConfig,
) -> Result<ConversionOutcome, FileShiftError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| FileShiftError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_file(path, target, config))
}

/// Guess the content type of a file from its head bytes and extension.
pub async fn sniff_file(path: &Path) -> Result<&'static str, FileShiftError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|_| FileShiftError::FileNotFound {
            path: path.to_path_buf(),
        })?;
    let mut head = vec![0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = file
            .read(&mut head[filled..])
            .await
            .map_err(|e| FileShiftError::Internal(format!("reading {}: {e}", path.display())))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    head.truncate(filled);
    Ok(sniff_content_type(path, &head))
}
