//! Observer trait for job and strategy events.
//!
//! Inject an [`Arc<dyn ConversionObserver>`] via
//! [`crate::config::ConverterConfigBuilder::progress`] to receive events as
//! the dispatcher walks a strategy chain.
//!
//! # Example
//!
//! ```rust
//! use fileshift::{ConversionObserver, ConverterConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FailureCounter {
//!     failures: AtomicUsize,
//! }
//!
//! impl ConversionObserver for FailureCounter {
//!     fn on_strategy_failed(&self, _filename: &str, strategy: &str, error: &str) {
//!         self.failures.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{strategy} failed: {error}");
//!     }
//! }
//!
//! let counter = Arc::new(FailureCounter { failures: AtomicUsize::new(0) });
//!
//! let config = ConverterConfig::builder()
//!     .progress(counter as Arc<dyn ConversionObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::outcome::ConversionOutcome;
use std::sync::Arc;

/// Called by the dispatcher as it processes each job.
///
/// Implementations must be `Send + Sync`: batch dispatch runs jobs
/// concurrently and events from different jobs may interleave. All methods
/// have no-op defaults so callers only override what they care about.
pub trait ConversionObserver: Send + Sync {
    /// Called once per job before any strategy runs.
    fn on_job_start(&self, filename: &str, target: &str) {
        let _ = (filename, target);
    }

    /// Called before a strategy is attempted.
    fn on_strategy_start(&self, filename: &str, strategy: &str) {
        let _ = (filename, strategy);
    }

    /// Called when a strategy is left out of the chain (remote without credential).
    fn on_strategy_skipped(&self, filename: &str, strategy: &str) {
        let _ = (filename, strategy);
    }

    /// Called when a strategy fails. A later strategy may still succeed.
    fn on_strategy_failed(&self, filename: &str, strategy: &str, error: &str) {
        let _ = (filename, strategy, error);
    }

    /// Called exactly once per job with the final outcome.
    fn on_job_complete(&self, filename: &str, outcome: &ConversionOutcome) {
        let _ = (filename, outcome);
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopObserver;

impl ConversionObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ConverterConfig`].
pub type ProgressObserver = Arc<dyn ConversionObserver>;
