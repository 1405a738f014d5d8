//! CLI binary for fileshift.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConverterConfig`, stages each input and prints one outcome per file.

use anyhow::{Context, Result};
use clap::Parser;
use fileshift::convert::sniff_file;
use fileshift::{
    classify_source, dispatch_all, supported_targets, validate_target, ConversionJob,
    ConversionObserver, ConversionOutcome, ConverterConfig, Dispatcher, ProgressObserver,
    SourceFile, SourceKind, TargetFormat,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress observer using indicatif ────────────────────────────────────

/// One bar for the whole batch; strategy fallbacks are printed above it.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(total: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionObserver for CliProgress {
    fn on_strategy_start(&self, filename: &str, strategy: &str) {
        self.bar.set_message(format!("{filename} via {strategy}"));
    }

    fn on_strategy_failed(&self, filename: &str, strategy: &str, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {}  {} {}",
            dim("↷"),
            filename,
            dim(strategy),
            dim(&msg)
        ));
    }

    fn on_job_complete(&self, _filename: &str, _outcome: &ConversionOutcome) {
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Word document to PDF (local text layout, or CloudConvert when a key is set)
  fileshift report.docx --to pdf

  # Several images to WEBP in a given directory
  fileshift -o converted/ *.png --to webp

  # First page of a PDF as PNG
  fileshift slides.pdf --to png

  # Machine-readable outcomes
  fileshift --json scan.pdf --to txt

  # What can this file become?
  fileshift --list-formats paper.pdf

CONVERSIONS:
  Image  → PNG, JPG, WEBP, TIFF, PDF
  PDF    → PNG, JPG, WEBP, TIFF (page 1), TXT, WORD
  Word   → PDF, WORD
  Text   → PDF, TXT

ENVIRONMENT VARIABLES:
  CLOUDCONVERT_API_KEY    Enables the remote conversion service
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  FILESHIFT_OUTPUT_DIR    Default output directory
"#;

/// Convert files between image, PDF, text and Word formats.
#[derive(Parser, Debug)]
#[command(
    name = "fileshift",
    version,
    about = "Convert files between image, PDF, text and Word formats",
    long_about = "Convert files between image (PNG, JPG, WEBP, TIFF), PDF, plain text and Word \
formats. Each conversion tries an ordered list of strategies: the CloudConvert service when an \
API key is configured, then local converters.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input files. Originals are never modified or removed.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Target format: png, jpg, webp, tiff, pdf, txt, word.
    #[arg(short, long, required_unless_present = "list_formats")]
    to: Option<String>,

    /// Directory for converted files.
    #[arg(short, long, env = "FILESHIFT_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Override the detected content type (applies to every input).
    #[arg(long)]
    content_type: Option<String>,

    /// CloudConvert API key. Without it only local strategies run.
    #[arg(long, env = "CLOUDCONVERT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// CloudConvert API base URL.
    #[arg(long, env = "FILESHIFT_REMOTE_URL", default_value = fileshift::config::DEFAULT_REMOTE_BASE_URL)]
    remote_url: String,

    /// Remote request and job timeout in seconds.
    #[arg(long, env = "FILESHIFT_REMOTE_TIMEOUT", default_value_t = 120)]
    remote_timeout: u64,

    /// Path to the pdfium shared library (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Quality for JPEG output (1–100).
    #[arg(long, env = "FILESHIFT_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// DPI for PDF page rendering (72–600).
    #[arg(long, env = "FILESHIFT_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Number of files converted concurrently.
    #[arg(short, long, env = "FILESHIFT_CONCURRENCY", default_value_t = fileshift::batch::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Print the formats each input can be converted to, then exit.
    #[arg(long)]
    list_formats: bool,

    /// Print one JSON outcome per line instead of a summary.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "FILESHIFT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FILESHIFT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "FILESHIFT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would interleave with the progress bar, so they are
    // suppressed while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_formats;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── List-formats mode ────────────────────────────────────────────────
    if cli.list_formats {
        for path in &cli.inputs {
            let content_type = match &cli.content_type {
                Some(ct) => ct.clone(),
                None => sniff_file(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?
                    .to_string(),
            };
            let kind = classify_source(&content_type);
            let targets: Vec<&str> = supported_targets(kind).iter().map(|t| t.label()).collect();
            if kind == SourceKind::Unknown {
                println!("{}  ({})  not supported", path.display(), content_type);
            } else {
                println!("{}  ({})  → {}", path.display(), content_type, targets.join(", "));
            }
        }
        return Ok(());
    }

    let raw_target = cli.to.clone().unwrap_or_default();
    let target: TargetFormat = validate_target(&raw_target).context("Invalid --to value")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress = if show_progress {
        Some(CliProgress::new(cli.inputs.len()))
    } else {
        None
    };
    let config = build_config(&cli, progress.clone().map(|p| p as ProgressObserver))?;
    let dispatcher = Arc::new(Dispatcher::new(config).context("Failed to set up converter")?);

    // ── Stage inputs ─────────────────────────────────────────────────────
    let mut jobs = Vec::with_capacity(cli.inputs.len());
    let mut failed = 0usize;
    for path in &cli.inputs {
        match stage(path, cli.content_type.as_deref(), target).await {
            Ok(job) => jobs.push(job),
            Err(e) => {
                failed += 1;
                report_setup_error(&cli, path, &e);
            }
        }
    }

    // ── Run conversions ──────────────────────────────────────────────────
    let mut results = dispatch_all(dispatcher, jobs, cli.concurrency);
    let mut converted = 0usize;
    while let Some(r) = results.next().await {
        if r.outcome.success {
            converted += 1;
        } else {
            failed += 1;
        }
        if cli.json {
            let mut value =
                serde_json::to_value(&r.outcome).context("Failed to serialise outcome")?;
            value["input"] = serde_json::Value::String(r.input_name.clone());
            println!("{value}");
        } else if !cli.quiet {
            let line = match (&r.outcome.output_path, &r.outcome.error) {
                (Some(out), _) => format!(
                    "{} {}  →  {}",
                    green("✓"),
                    r.input_name,
                    bold(&out.display().to_string())
                ),
                (None, err) => format!(
                    "{} {}  {}",
                    red("✗"),
                    r.input_name,
                    red(err.as_deref().unwrap_or("Conversion failed"))
                ),
            };
            match &progress {
                Some(p) => p.bar.println(line),
                None => eprintln!("{line}"),
            }
        }
    }

    if let Some(p) = &progress {
        p.finish();
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "{}  {} converted, {} failed",
            if failed == 0 { green("✔") } else { red("✘") },
            bold(&converted.to_string()),
            failed
        );
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Copy an input into a private staging file and wrap it in a job.
async fn stage(
    path: &Path,
    content_type: Option<&str>,
    target: TargetFormat,
) -> Result<ConversionJob> {
    let content_type = match content_type {
        Some(ct) => ct.to_string(),
        None => sniff_file(path).await?.to_string(),
    };
    let input = SourceFile::stage_copy(path)
        .await
        .with_context(|| format!("Failed to stage {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(ConversionJob::new(input, content_type, target, filename))
}

fn report_setup_error(cli: &Cli, path: &Path, e: &anyhow::Error) {
    if cli.json {
        let outcome = ConversionOutcome::failure(None, None, format!("{e:#}"));
        if let Ok(mut value) = serde_json::to_value(&outcome) {
            value["input"] = serde_json::Value::String(path.display().to_string());
            println!("{value}");
        }
    } else {
        eprintln!("{} {}  {}", red("✗"), path.display(), red(&format!("{e:#}")));
    }
}

/// Map CLI args to `ConverterConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressObserver>) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .output_dir(&cli.output_dir)
        .remote_base_url(&cli.remote_url)
        .remote_timeout_secs(cli.remote_timeout)
        .image_quality(cli.quality)
        .raster_dpi(cli.dpi);

    if let Some(key) = &cli.api_key {
        builder = builder.remote_api_key(key);
    }
    if let Some(lib) = &cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(p) = progress {
        builder = builder.progress(p);
    }

    builder.build().context("Invalid configuration")
}
