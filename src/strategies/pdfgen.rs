//! PDF generation with `printpdf`: laid-out text pages and single-image pages.
//!
//! printpdf 0.8 is data-oriented: a document is a list of `PdfPage`s, each
//! holding a `Vec<Op>`, serialised by `PdfDocument::save()`.

use super::layout::PageLayout;
use image::DynamicImage;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage, RawImageData,
    RawImageFormat, TextItem, XObjectTransform,
};
use tracing::debug;

/// Page size used when an image reports no usable dimensions.
pub const DEFAULT_IMAGE_PAGE: (f32, f32) = (612.0, 792.0);

fn mm(pt: f32) -> Mm {
    Mm(pt * 25.4 / 72.0)
}

/// Render pre-paginated lines, each drawn left-aligned at the margin.
pub fn text_pages_to_pdf(title: &str, pages: &[Vec<String>], layout: &PageLayout) -> Vec<u8> {
    let mut doc = PdfDocument::new(title);
    let mut pdf_pages = Vec::with_capacity(pages.len().max(1));

    for lines in pages {
        let mut ops: Vec<Op> = Vec::with_capacity(lines.len() * 5);
        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let (x, y) = layout.line_origin(i);
            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point { x: Pt(x), y: Pt(y) },
            });
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(layout.font_size),
                font: layout.font,
            });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(line.clone())],
                font: layout.font,
            });
            ops.push(Op::EndTextSection);
        }
        pdf_pages.push(PdfPage::new(mm(layout.width), mm(layout.height), ops));
    }

    if pdf_pages.is_empty() {
        pdf_pages.push(PdfPage::new(mm(layout.width), mm(layout.height), Vec::new()));
    }

    doc.with_pages(pdf_pages);
    debug!("Text PDF: {} pages", doc.pages.len());

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    doc.save(&PdfSaveOptions::default(), &mut warnings)
}

/// Embed an image in a single page sized to its pixel dimensions (1 px = 1 pt).
pub fn image_to_pdf(title: &str, img: &DynamicImage) -> Vec<u8> {
    let (w, h) = (img.width(), img.height());
    let (page_w, page_h) = if w == 0 || h == 0 {
        DEFAULT_IMAGE_PAGE
    } else {
        (w as f32, h as f32)
    };

    let rgb = img.to_rgb8();
    let raw = RawImage {
        pixels: RawImageData::U8(rgb.into_raw()),
        width: w as usize,
        height: h as usize,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    };

    let mut doc = PdfDocument::new(title);
    let xobject_id = doc.add_image(&raw);

    // At 72 dpi one pixel maps to one point, so no scaling is needed.
    let ops = vec![Op::UseXobject {
        id: xobject_id,
        transform: XObjectTransform {
            translate_x: Some(Pt(0.0)),
            translate_y: Some(Pt(0.0)),
            scale_x: Some(1.0),
            scale_y: Some(1.0),
            dpi: Some(72.0),
            rotate: None,
        },
    }];

    doc.with_pages(vec![PdfPage::new(mm(page_w), mm(page_h), ops)]);
    debug!("Image PDF: {}x{} px → {}x{} pt page", w, h, page_w, page_h);

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    doc.save(&PdfSaveOptions::default(), &mut warnings)
}
