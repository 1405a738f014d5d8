//! The conversion dispatcher: picks a strategy chain and walks it.
//!
//! Each (source kind, target) pair maps to an ordered list of strategies.
//! The first success wins. A failure is logged and the next strategy is
//! tried; when the chain is exhausted only the last failure is reported.
//! The remote strategy is left out silently when it has no credential.
//!
//! Whatever happens, the job's input file is removed exactly once and the
//! caller gets a [`ConversionOutcome`], never an error.

use crate::classify::{
    kind_noun, original_format_label, supported_targets, validate_target, SourceKind,
    TargetFormat,
};
use crate::config::ConverterConfig;
use crate::error::{FileShiftError, StrategyError};
use crate::job::{ConversionJob, SourceFile};
use crate::outcome::ConversionOutcome;
use crate::progress::{ConversionObserver, NoopObserver};
use crate::scratch::place_output;
use crate::strategies::remote::{CloudConvertClient, RemoteConverter};
use crate::strategies::{run_local, LocalRequest, LocalStrategy, Strategy};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs conversion jobs against one configuration.
pub struct Dispatcher {
    config: ConverterConfig,
    remote: Arc<dyn RemoteConverter>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("remote_configured", &self.remote.is_configured())
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher whose remote strategy is a [`CloudConvertClient`]
    /// built from `config`.
    pub fn new(config: ConverterConfig) -> Result<Self, FileShiftError> {
        let remote = Arc::new(CloudConvertClient::from_config(&config)?);
        Ok(Self { config, remote })
    }

    /// Replace the remote service.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteConverter>) -> Self {
        self.remote = remote;
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Strategy chain for a pair, or `None` when the pair is unsupported.
    pub fn plan(kind: SourceKind, target: TargetFormat) -> Option<Vec<Strategy>> {
        use LocalStrategy::*;
        use Strategy::{Local, Remote};

        let chain = match (kind, target) {
            (SourceKind::Image, t) if t.is_image() => vec![Local(ImageRecode)],
            (SourceKind::Image, TargetFormat::Pdf) => vec![Remote, Local(ImageToPdf)],
            (SourceKind::Pdf, t) if t.is_image() => vec![Remote, Local(PdfRasterize)],
            (SourceKind::Pdf, TargetFormat::Txt) => vec![Local(PdfText)],
            (SourceKind::Pdf, TargetFormat::Word) => {
                vec![Remote, Local(PdfSnapshotToWord), Local(PdfTextToWord)]
            }
            (SourceKind::WordDocument, TargetFormat::Pdf) => vec![Remote, Local(WordTextToPdf)],
            (SourceKind::WordDocument, TargetFormat::Word) => vec![Local(Passthrough)],
            (SourceKind::PlainText, TargetFormat::Pdf) => vec![Local(TextToPdf)],
            (SourceKind::PlainText, TargetFormat::Txt) => vec![Local(Passthrough)],
            _ => return None,
        };
        Some(chain)
    }

    /// Validate a raw target name, then dispatch.
    ///
    /// An invalid target still consumes (removes) the input.
    pub async fn dispatch_request(
        &self,
        input: SourceFile,
        content_type: &str,
        raw_target: &str,
        original_filename: &str,
    ) -> ConversionOutcome {
        match validate_target(raw_target) {
            Ok(target) => {
                self.dispatch(ConversionJob::new(
                    input,
                    content_type,
                    target,
                    original_filename,
                ))
                .await
            }
            Err(e) => {
                warn!("{}: {}", original_filename, e);
                if let Err(io) = input.remove() {
                    warn!("Failed to remove input for {}: {}", original_filename, io);
                }
                let outcome = ConversionOutcome::failure(
                    Some(original_format_label(content_type)),
                    None,
                    e.to_string(),
                );
                self.observer()
                    .on_job_complete(original_filename, &outcome);
                outcome
            }
        }
    }

    /// Run one job to completion.
    pub async fn dispatch(&self, job: ConversionJob) -> ConversionOutcome {
        let start = Instant::now();
        let stem = job.output_stem();
        let ConversionJob {
            input,
            content_type,
            kind,
            target,
            original_filename,
        } = job;

        let observer = self.observer();
        let original = original_format_label(&content_type);
        info!("Converting {} ({} → {})", original_filename, original, target);
        observer.on_job_start(&original_filename, target.label());

        let produced = self
            .run_chain(&input, &content_type, kind, target, &original_filename, &stem)
            .await;

        let outcome = match produced {
            Ok(bytes) => {
                match place_output(&self.config.output_dir, &stem, target.extension(), &bytes) {
                    Ok(path) => ConversionOutcome::success(path, original.clone(), target.label()),
                    Err(e) => ConversionOutcome::failure(
                        Some(original.clone()),
                        Some(target.label().to_string()),
                        e.to_string(),
                    ),
                }
            }
            Err(message) => ConversionOutcome::failure(
                Some(original.clone()),
                Some(target.label().to_string()),
                message,
            ),
        };

        if let Err(e) = input.remove() {
            warn!("Failed to remove input for {}: {}", original_filename, e);
        }

        match (&outcome.filename, &outcome.error) {
            (Some(name), _) => info!(
                "{}: converted to {} in {}ms",
                original_filename,
                name,
                start.elapsed().as_millis()
            ),
            (None, Some(err)) => info!("{}: conversion failed: {}", original_filename, err),
            (None, None) => {}
        }
        observer.on_job_complete(&original_filename, &outcome);
        outcome
    }

    fn observer(&self) -> Arc<dyn ConversionObserver> {
        self.config
            .progress
            .clone()
            .unwrap_or_else(|| Arc::new(NoopObserver))
    }

    /// Walk the chain; `Ok` carries the first successful output.
    async fn run_chain(
        &self,
        input: &SourceFile,
        content_type: &str,
        kind: SourceKind,
        target: TargetFormat,
        filename: &str,
        title: &str,
    ) -> Result<Vec<u8>, String> {
        let Some(chain) = Self::plan(kind, target) else {
            let e = FileShiftError::UnsupportedConversion {
                message: unsupported_message(kind, content_type),
            };
            return Err(e.to_string());
        };

        let observer = self.observer();
        let remote_ready = self.remote.is_configured();
        let request = LocalRequest::new(
            &self.config,
            target,
            title,
            crate::classify::is_legacy_word(content_type),
        );
        let source_tag = original_format_label(content_type).to_ascii_lowercase();

        let mut bytes: Option<Arc<Vec<u8>>> = None;
        let mut last_failure: Option<(Strategy, StrategyError)> = None;

        for strategy in chain {
            if strategy == Strategy::Remote && !remote_ready {
                debug!("{}: remote service not configured, skipping", filename);
                observer.on_strategy_skipped(filename, strategy.name());
                continue;
            }
            if let Some((prev, err)) = last_failure.take() {
                warn!(
                    "{}: {} failed ({}), falling back to {}",
                    filename, prev, err, strategy
                );
            }

            debug!("{}: trying {}", filename, strategy);
            observer.on_strategy_start(filename, strategy.name());
            let step = Instant::now();

            let result = match strategy {
                Strategy::Remote => {
                    self.remote
                        .convert(input.path(), &source_tag, target.extension())
                        .await
                }
                Strategy::Local(local) => match load(&mut bytes, input).await {
                    Ok(data) => run_local(local, data, request.clone()).await,
                    Err(e) => Err(e),
                },
            };

            match result {
                Ok(out) => {
                    debug!(
                        "{}: {} produced {} bytes in {}ms",
                        filename,
                        strategy,
                        out.len(),
                        step.elapsed().as_millis()
                    );
                    return Ok(out);
                }
                Err(e) => {
                    observer.on_strategy_failed(filename, strategy.name(), &e.to_string());
                    last_failure = Some((strategy, e));
                }
            }
        }

        Err(match last_failure {
            Some((strategy, e)) => {
                debug!("{}: last strategy {} failed [{}]", filename, strategy, e.kind());
                e.to_string()
            }
            None => "No conversion strategy was available".to_string(),
        })
    }
}

/// Read the input once and share it between local strategies.
async fn load(
    cache: &mut Option<Arc<Vec<u8>>>,
    input: &SourceFile,
) -> Result<Arc<Vec<u8>>, StrategyError> {
    if let Some(b) = cache {
        return Ok(b.clone());
    }
    let data = input
        .read()
        .await
        .map_err(|e| StrategyError::Capability(format!("Failed to read input: {e}")))?;
    let data = Arc::new(data);
    *cache = Some(data.clone());
    Ok(data)
}

/// Remediation message for a pair with no chain.
fn unsupported_message(kind: SourceKind, content_type: &str) -> String {
    if kind == SourceKind::Unknown {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        return match essence.split_once('/') {
            Some((family, _)) if !family.is_empty() => format!(
                "{family} files ({essence}) are not supported. \
                 Supported inputs are images, PDF, plain text and Word documents"
            ),
            _ => "Files of this type are not supported. \
                  Supported inputs are images, PDF, plain text and Word documents"
                .to_string(),
        };
    }
    let targets: Vec<&str> = supported_targets(kind).iter().map(|t| t.label()).collect();
    format!(
        "{} files can be converted to: {}",
        kind_noun(kind),
        targets.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_supported_target_has_a_chain() {
        for kind in [
            SourceKind::Image,
            SourceKind::Pdf,
            SourceKind::PlainText,
            SourceKind::WordDocument,
            SourceKind::Unknown,
        ] {
            for target in TargetFormat::ALL {
                let planned = Dispatcher::plan(kind, target).is_some();
                let listed = supported_targets(kind).contains(&target);
                assert_eq!(planned, listed, "{kind:?} → {target:?}");
            }
        }
    }

    #[test]
    fn chains_keep_fallback_order() {
        let chain = Dispatcher::plan(SourceKind::Pdf, TargetFormat::Word).unwrap();
        let names: Vec<_> = chain.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["remote", "pdf-snapshot-to-word", "pdf-text-to-word"]);

        let chain = Dispatcher::plan(SourceKind::Image, TargetFormat::Jpg).unwrap();
        assert_eq!(chain, vec![Strategy::Local(LocalStrategy::ImageRecode)]);
    }

    #[test]
    fn unknown_kind_names_the_family() {
        let msg = unsupported_message(SourceKind::Unknown, "audio/mpeg");
        assert!(msg.starts_with("audio files (audio/mpeg) are not supported"), "got: {msg}");
    }

    #[test]
    fn unsupported_pair_lists_targets() {
        let msg = unsupported_message(SourceKind::PlainText, "text/plain");
        assert_eq!(msg, "Text files can be converted to: PDF, TXT");
    }
}
