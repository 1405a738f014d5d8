//! Concurrent dispatch of many jobs, streaming outcomes as they finish.
//!
//! Jobs share nothing but the dispatcher, so they run with a bounded
//! `buffer_unordered` fan-out. Outcomes arrive in completion order; each
//! carries the name of the input it belongs to.

use crate::dispatch::Dispatcher;
use crate::job::ConversionJob;
use crate::outcome::ConversionOutcome;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// Default number of jobs in flight.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Outcome of one job in a batch.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// The job's original filename.
    pub input_name: String,
    pub outcome: ConversionOutcome,
}

/// A boxed stream of batch results.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = BatchResult> + Send>>;

/// Dispatch `jobs` with at most `concurrency` running at once.
pub fn dispatch_all(
    dispatcher: Arc<Dispatcher>,
    jobs: Vec<ConversionJob>,
    concurrency: usize,
) -> OutcomeStream {
    let concurrency = concurrency.max(1);
    info!("Dispatching {} jobs (concurrency {})", jobs.len(), concurrency);

    let s = stream::iter(jobs)
        .map(move |job| {
            let dispatcher = Arc::clone(&dispatcher);
            async move {
                let input_name = job.original_filename.clone();
                let outcome = dispatcher.dispatch(job).await;
                BatchResult {
                    input_name,
                    outcome,
                }
            }
        })
        .buffer_unordered(concurrency);

    Box::pin(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::TargetFormat;
    use crate::config::ConverterConfig;
    use crate::job::SourceFile;

    #[tokio::test]
    async fn every_job_yields_one_result() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let config = ConverterConfig::builder().output_dir(&out).build().unwrap();
        let dispatcher = Arc::new(Dispatcher::new(config).unwrap());

        let mut jobs = Vec::new();
        for i in 0..6 {
            let p = dir.path().join(format!("in-{i}.txt"));
            std::fs::write(&p, format!("file {i}")).unwrap();
            let target = if i % 2 == 0 { TargetFormat::Txt } else { TargetFormat::Png };
            jobs.push(ConversionJob::new(
                SourceFile::from_path(&p).unwrap(),
                "text/plain",
                target,
                format!("in-{i}.txt"),
            ));
        }

        let results: Vec<BatchResult> = dispatch_all(dispatcher, jobs, 2).collect().await;
        assert_eq!(results.len(), 6);
        let ok = results.iter().filter(|r| r.outcome.success).count();
        assert_eq!(ok, 3);
        for r in &results {
            assert!(!dir.path().join(&r.input_name).exists());
        }
    }
}
