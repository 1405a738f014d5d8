//! # fileshift
//!
//! Convert uploaded files between image, PDF, plain-text and Word formats.
//!
//! Every (source kind, target format) pair maps to an ordered chain of
//! strategies. A remote conversion service (CloudConvert) is tried first
//! where it gives better fidelity; local capabilities back it up, so the
//! crate works with no network credential at all.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (path + declared content type + target name)
//!  │
//!  ├─ 1. Classify  content type → SourceKind, target name → TargetFormat
//!  ├─ 2. Plan      (kind, target) → [remote?, local, local…]
//!  ├─ 3. Attempt   first success wins; failures fall through (spawn_blocking)
//!  ├─ 4. Place     winning bytes → <stem>-<random>.<ext> in the output dir
//!  └─ 5. Report    ConversionOutcome { success, filename | error }
//! ```
//!
//! The input file is removed exactly once per job, whatever the outcome.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fileshift::{convert_file, ConverterConfig, TargetFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Remote strategy enabled only when an API key is configured.
//!     let config = ConverterConfig::builder()
//!         .output_dir("converted")
//!         .build()?;
//!     let outcome = convert_file("report.docx", TargetFormat::Pdf, &config).await?;
//!     match outcome.into_result() {
//!         Ok(path) => println!("wrote {}", path.display()),
//!         Err(e) => eprintln!("failed: {e}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `fileshift` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! PDF reading needs the native pdfium library at runtime. Point
//! [`ConverterConfig::pdfium_lib_path`] (or `PDFIUM_LIB_PATH` for the CLI) at
//! it, or install it on the system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod classify;
pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod outcome;
pub mod progress;
pub mod scratch;
pub mod strategies;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{dispatch_all, BatchResult, OutcomeStream};
pub use classify::{
    classify_source, original_format_label, supported_targets, validate_target, SourceKind,
    TargetFormat,
};
pub use config::{ConverterConfig, ConverterConfigBuilder};
pub use convert::{convert_bytes, convert_file, convert_sync};
pub use dispatch::Dispatcher;
pub use error::{FileShiftError, StrategyError};
pub use job::{ConversionJob, SourceFile};
pub use outcome::ConversionOutcome;
pub use progress::{ConversionObserver, NoopObserver, ProgressObserver};
pub use strategies::remote::{CloudConvertClient, RemoteConverter};
pub use strategies::{LocalStrategy, Strategy};
