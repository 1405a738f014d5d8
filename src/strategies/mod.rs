//! Conversion strategies.
//!
//! A strategy turns the bytes of one input into the bytes of one output.
//! Strategies never touch the output directory; the dispatcher places the
//! winning result. Local strategies are CPU-bound and run on the blocking
//! pool; the remote strategy is async I/O against [`remote::RemoteConverter`].

pub mod docx;
pub mod image;
pub mod layout;
pub mod pdf;
pub mod pdfgen;
pub mod remote;
pub mod sanitize;

use crate::classify::TargetFormat;
use crate::config::ConverterConfig;
use crate::error::StrategyError;
use crate::scratch::Scratch;
use layout::{paginate, wrap_columns, wrap_measured, PageLayout, TEXT_COLUMNS};
use pdf::RenderBounds;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// One step of a strategy chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The remote conversion service. Skipped when it has no credential.
    Remote,
    Local(LocalStrategy),
}

/// Strategies backed by an in-process capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalStrategy {
    ImageRecode,
    ImageToPdf,
    /// Page 1 only.
    PdfRasterize,
    PdfText,
    PdfSnapshotToWord,
    PdfTextToWord,
    WordTextToPdf,
    TextToPdf,
    Passthrough,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Remote => "remote",
            Strategy::Local(l) => l.name(),
        }
    }
}

impl LocalStrategy {
    pub fn name(self) -> &'static str {
        match self {
            LocalStrategy::ImageRecode => "image-recode",
            LocalStrategy::ImageToPdf => "image-to-pdf",
            LocalStrategy::PdfRasterize => "pdf-rasterize",
            LocalStrategy::PdfText => "pdf-text",
            LocalStrategy::PdfSnapshotToWord => "pdf-snapshot-to-word",
            LocalStrategy::PdfTextToWord => "pdf-text-to-word",
            LocalStrategy::WordTextToPdf => "word-text-to-pdf",
            LocalStrategy::TextToPdf => "text-to-pdf",
            LocalStrategy::Passthrough => "passthrough",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a local strategy reads, owned so it can move to the blocking pool.
#[derive(Debug, Clone)]
pub struct LocalRequest {
    pub target: TargetFormat,
    /// Document title for generated PDFs.
    pub title: String,
    /// Declared as `application/msword`.
    pub legacy_word: bool,
    pub image_quality: u8,
    pub raster: RenderBounds,
    pub snapshot: RenderBounds,
    pub pdfium_lib_path: Option<PathBuf>,
}

impl LocalRequest {
    pub fn new(
        config: &ConverterConfig,
        target: TargetFormat,
        title: &str,
        legacy_word: bool,
    ) -> Self {
        Self {
            target,
            title: title.to_string(),
            legacy_word,
            image_quality: config.image_quality,
            raster: RenderBounds {
                dpi: config.raster_dpi,
                max_width: config.raster_max_width,
                max_height: config.raster_max_height,
            },
            snapshot: RenderBounds {
                dpi: config.snapshot_dpi,
                max_width: config.raster_max_width,
                max_height: config.raster_max_height,
            },
            pdfium_lib_path: config.pdfium_lib_path.clone(),
        }
    }
}

/// Run a local strategy on the blocking pool.
pub async fn run_local(
    strategy: LocalStrategy,
    bytes: Arc<Vec<u8>>,
    request: LocalRequest,
) -> Result<Vec<u8>, StrategyError> {
    tokio::task::spawn_blocking(move || run_blocking(strategy, &bytes, &request))
        .await
        .map_err(|e| {
            StrategyError::Capability(format!("{} task panicked: {}", strategy.name(), e))
        })?
}

/// Blocking body of every local strategy.
pub fn run_blocking(
    strategy: LocalStrategy,
    bytes: &[u8],
    req: &LocalRequest,
) -> Result<Vec<u8>, StrategyError> {
    let lib = req.pdfium_lib_path.as_deref();
    match strategy {
        LocalStrategy::Passthrough => Ok(bytes.to_vec()),

        LocalStrategy::ImageRecode => image::recode(bytes, req.target, req.image_quality),

        LocalStrategy::ImageToPdf => image::to_pdf(bytes, &req.title),

        LocalStrategy::PdfRasterize => {
            let page = pdf::rasterize_first_page(bytes, lib, &req.raster)?;
            image::encode(&page, req.target, req.image_quality)
        }

        LocalStrategy::PdfText => Ok(pdf::extract_text(bytes, lib)?.into_bytes()),

        LocalStrategy::PdfSnapshotToWord => {
            let scratch = Scratch::new()
                .map_err(|e| StrategyError::Capability(format!("Scratch directory: {e}")))?;
            let rasters = pdf::snapshot_pages(bytes, lib, &req.snapshot, &scratch)?;

            let mut doc = docx::DocxBuilder::new();
            for (i, raster) in rasters.iter().enumerate() {
                if i > 0 {
                    doc.page_break();
                }
                let png = std::fs::read(&raster.path).map_err(|e| {
                    StrategyError::Capability(format!("Reading page raster {}: {e}", i + 1))
                })?;
                doc.image(png, raster.width, raster.height);
            }
            debug!("Snapshot document: {} pages", rasters.len());
            doc.build()
        }

        LocalStrategy::PdfTextToWord => {
            let pages = pdf::extract_page_texts(bytes, lib)?;
            page_texts_to_docx(&pages)
        }

        LocalStrategy::WordTextToPdf => {
            if req.legacy_word || docx::is_ole_container(bytes) {
                return Err(StrategyError::Capability(docx::LEGACY_DOC_MESSAGE.to_string()));
            }
            let raw = docx::extract_raw_text(bytes)?;
            if raw.trim().is_empty() {
                return Err(StrategyError::EmptyDocument(
                    "Word document contains no text".into(),
                ));
            }
            let text = sanitize::sanitize_text(&raw);
            let layout = PageLayout::extracted_text();
            let lines = wrap_measured(&text, layout.font_size, layout.content_width());
            let pages = paginate(lines, layout.lines_per_page());
            Ok(pdfgen::text_pages_to_pdf(&req.title, &pages, &layout))
        }

        LocalStrategy::TextToPdf => {
            let layout = PageLayout::plain_text();
            let pages = plain_text_pages(bytes, &layout);
            Ok(pdfgen::text_pages_to_pdf(&req.title, &pages, &layout))
        }
    }
}

/// One monospace paragraph per PDF page, page breaks between them.
pub fn page_texts_to_docx(pages: &[String]) -> Result<Vec<u8>, StrategyError> {
    if pages.is_empty() {
        return Err(StrategyError::EmptyDocument("PDF has no pages".into()));
    }
    let mut doc = docx::DocxBuilder::new();
    for (i, text) in pages.iter().enumerate() {
        if i > 0 {
            doc.page_break();
        }
        let normalised = text.replace("\r\n", "\n").replace('\r', "\n");
        doc.monospace_lines(normalised.lines().map(str::to_string).collect());
    }
    doc.build()
}

/// Lay plain text out in pages: one drawn line per input line, long lines
/// wrapped at [`TEXT_COLUMNS`].
pub fn plain_text_pages(bytes: &[u8], layout: &PageLayout) -> Vec<Vec<String>> {
    let text = sanitize::font_safe_text(&String::from_utf8_lossy(bytes));
    paginate(wrap_columns(&text, TEXT_COLUMNS), layout.lines_per_page())
}
