//! PDF reading via pdfium: page count, rasterisation and text extraction.
//!
//! Every function here is blocking and must run inside `spawn_blocking`.
//! pdfium keeps thread-local state, so each call binds its own instance
//! instead of sharing one across the runtime's worker threads.

use crate::error::StrategyError;
use crate::scratch::Scratch;
use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolution and pixel bounds for rendering pages.
#[derive(Debug, Clone, Copy)]
pub struct RenderBounds {
    pub dpi: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl RenderBounds {
    /// Pixel width for a page `width_pts` wide, capped at `max_width`.
    fn target_width(&self, width_pts: f32) -> i32 {
        let px = (width_pts * self.dpi as f32 / 72.0).round() as u32;
        px.clamp(1, self.max_width) as i32
    }
}

/// One rendered page written to a scratch directory.
#[derive(Debug, Clone)]
pub struct PageRaster {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Bind the pdfium library: an explicit file or directory, else the system one.
pub fn bind(lib_path: Option<&Path>) -> Result<Pdfium, StrategyError> {
    let bindings = match lib_path {
        Some(p) if p.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(p))
        }
        Some(p) => Pdfium::bind_to_library(p),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| {
        StrategyError::Capability(format!("PDF engine (pdfium) is not available: {e}"))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Map a pdfium load failure onto the strategy error taxonomy.
fn load_error(e: PdfiumError) -> StrategyError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        StrategyError::MalformedInput("PDF is encrypted or password-protected".into())
    } else if err_str.contains("Format") || err_str.contains("File") {
        StrategyError::MalformedInput("PDF could not be parsed; the file may be corrupted".into())
    } else {
        StrategyError::Capability(format!("PDF could not be opened: {err_str}"))
    }
}

fn open<'a>(pdfium: &'a Pdfium, bytes: &'a [u8]) -> Result<PdfDocument<'a>, StrategyError> {
    pdfium.load_pdf_from_byte_slice(bytes, None).map_err(load_error)
}

fn render_page(
    page: &PdfPage<'_>,
    bounds: &RenderBounds,
    number: usize,
) -> Result<DynamicImage, StrategyError> {
    let render_config = PdfRenderConfig::new()
        .set_target_width(bounds.target_width(page.width().value))
        .set_maximum_height(bounds.max_height as i32);

    let bitmap = page.render_with_config(&render_config).map_err(|e| {
        StrategyError::Capability(format!("Rendering page {number} failed: {:?}", e))
    })?;
    let image = bitmap.as_image();
    if image.width() == 0 || image.height() == 0 {
        return Err(StrategyError::Capability(format!(
            "Rendering page {number} produced an empty image"
        )));
    }
    debug!(
        "Rendered page {} → {}x{} px",
        number,
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Render page 1 to an image.
pub fn rasterize_first_page(
    bytes: &[u8],
    lib_path: Option<&Path>,
    bounds: &RenderBounds,
) -> Result<DynamicImage, StrategyError> {
    let pdfium = bind(lib_path)?;
    let document = open(&pdfium, bytes)?;
    let pages = document.pages();
    if pages.len() == 0 {
        return Err(StrategyError::EmptyDocument("PDF has no pages".into()));
    }
    let page = pages
        .first()
        .map_err(|e| StrategyError::Capability(format!("Page 1 unavailable: {:?}", e)))?;
    render_page(&page, bounds, 1)
}

/// Render every page to a PNG file inside `scratch`.
///
/// Fails fast with [`StrategyError::EmptyDocument`] on a zero-page document.
pub fn snapshot_pages(
    bytes: &[u8],
    lib_path: Option<&Path>,
    bounds: &RenderBounds,
    scratch: &Scratch,
) -> Result<Vec<PageRaster>, StrategyError> {
    let pdfium = bind(lib_path)?;
    let document = open(&pdfium, bytes)?;
    let pages = document.pages();
    let total = pages.len() as usize;
    if total == 0 {
        return Err(StrategyError::EmptyDocument("PDF has no pages".into()));
    }
    info!("PDF loaded: {} pages", total);

    let mut rasters = Vec::with_capacity(total);
    for (idx, page) in pages.iter().enumerate() {
        let image = render_page(&page, bounds, idx + 1)?;
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        let path = scratch
            .write(&format!("page-{:04}.png", idx + 1), &png)
            .map_err(|e| StrategyError::Capability(format!("Scratch write failed: {e}")))?;
        rasters.push(PageRaster {
            path,
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(rasters)
}

fn page_text(page: &PdfPage<'_>, number: usize) -> Result<String, StrategyError> {
    page.text()
        .map(|t| t.all())
        .map_err(|e| StrategyError::Extraction(format!("page {number}: {:?}", e)))
}

/// Text of every page, in page order.
pub fn extract_page_texts(
    bytes: &[u8],
    lib_path: Option<&Path>,
) -> Result<Vec<String>, StrategyError> {
    let pdfium = bind(lib_path)?;
    let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        match load_error(e) {
            StrategyError::Capability(detail) => StrategyError::Extraction(detail),
            other => other,
        }
    })?;
    document
        .pages()
        .iter()
        .enumerate()
        .map(|(idx, page)| page_text(&page, idx + 1))
        .collect()
}

/// Whole-document text, pages separated by a form feed.
pub fn extract_text(bytes: &[u8], lib_path: Option<&Path>) -> Result<String, StrategyError> {
    let pages = extract_page_texts(bytes, lib_path)?;
    debug!("Extracted text from {} pages", pages.len());
    Ok(pages.join("\n\u{000C}\n"))
}
