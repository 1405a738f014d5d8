//! Error types for the fileshift library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`FileShiftError`] — **Fatal**: the job cannot be attempted at all
//!   (unknown target name, no strategy chain for the source kind, bad
//!   configuration). Reported before any strategy runs.
//!
//! * [`StrategyError`] — **Non-fatal**: a single strategy in a chain failed
//!   (codec rejected the input, remote job failed). The dispatcher moves on
//!   to the next strategy and only surfaces the error of the last one.
//!
//! Neither type escapes [`crate::dispatch::Dispatcher::dispatch`]: both are
//! rendered into the `error` field of [`crate::outcome::ConversionOutcome`].

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors returned by the fileshift library.
#[derive(Debug, Error)]
pub enum FileShiftError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The requested target is not one of the enumerated formats.
    #[error("Invalid target format '{value}'. Valid formats: {}", valid.join(", "))]
    InvalidTargetFormat { value: String, valid: Vec<String> },

    /// The source kind has no strategy chain for the requested target.
    #[error("{message}")]
    UnsupportedConversion { message: String },

    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure of one strategy inside a chain.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StrategyError {
    /// A local capability rejected the input or the requested format.
    #[error("{0}")]
    Capability(String),

    /// The source file is structurally invalid.
    #[error("{0}")]
    MalformedInput(String),

    /// The source had no usable content.
    #[error("{0}")]
    EmptyDocument(String),

    /// Text extraction failed for a reason other than a parse failure.
    #[error("Text extraction failed: {0}")]
    Extraction(String),

    /// No remote credential is configured.
    #[error("Remote conversion service is not configured")]
    RemoteUnavailable,

    /// The remote service reported a failed task or returned no output.
    #[error("Remote conversion failed: {0}")]
    RemoteJob(String),

    /// Uploading to or downloading from the remote service failed.
    #[error("Remote transfer failed: {0}")]
    RemoteTransfer(String),
}

impl StrategyError {
    /// Short machine-readable tag, used in logs and progress events.
    pub fn kind(&self) -> &'static str {
        match self {
            StrategyError::Capability(_) => "capability",
            StrategyError::MalformedInput(_) => "malformed_input",
            StrategyError::EmptyDocument(_) => "empty_document",
            StrategyError::Extraction(_) => "extraction",
            StrategyError::RemoteUnavailable => "remote_unavailable",
            StrategyError::RemoteJob(_) => "remote_job",
            StrategyError::RemoteTransfer(_) => "remote_transfer",
        }
    }
}

impl From<image::ImageError> for StrategyError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Decoding(d) => {
                StrategyError::MalformedInput(format!("Image could not be decoded: {d}"))
            }
            other => StrategyError::Capability(format!("Image codec error: {other}")),
        }
    }
}

impl From<zip::result::ZipError> for StrategyError {
    fn from(e: zip::result::ZipError) -> Self {
        StrategyError::MalformedInput(format!("Word document container is invalid: {e}"))
    }
}
