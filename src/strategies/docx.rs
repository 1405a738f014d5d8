//! Word document capability: raw-text extraction and DOCX generation.
//!
//! A `.docx` file is a zip container of WordprocessingML parts. Reading only
//! needs `word/document.xml`; writing emits the minimum set of parts Word
//! and LibreOffice accept: content types, package relationships, the main
//! document, its relationships and any embedded page images.
//!
//! Legacy binary `.doc` files (OLE compound documents) are not readable here.

use crate::error::StrategyError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Message used whenever a legacy `.doc` reaches a local strategy.
pub const LEGACY_DOC_MESSAGE: &str = "Legacy .doc files can only be converted by the remote \
conversion service, and it did not produce a result. Save the document as .docx and try again.";

const OLE_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];

/// True when `bytes` look like an OLE compound document (legacy `.doc`).
pub fn is_ole_container(bytes: &[u8]) -> bool {
    bytes.starts_with(&OLE_MAGIC)
}

// ── Reading ──────────────────────────────────────────────────────────────────

/// Extract the raw text of a `.docx`: one line per paragraph, explicit
/// breaks as newlines, tabs preserved.
pub fn extract_raw_text(bytes: &[u8]) -> Result<String, StrategyError> {
    if is_ole_container(bytes) {
        return Err(StrategyError::Capability(LEGACY_DOC_MESSAGE.to_string()));
    }

    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| {
            StrategyError::MalformedInput(
                "Word document has no main document part; the file may be corrupted".into(),
            )
        })?
        .read_to_string(&mut xml)
        .map_err(|e| StrategyError::MalformedInput(format!("Word document is unreadable: {e}")))?;

    document_text(&xml)
}

/// Walk the WordprocessingML body and collect run text.
///
/// Tabs and breaks only count inside a run (`w:r`); a `w:tab` inside
/// paragraph properties is a tab stop, not content.
fn document_text(xml: &str) -> Result<String, StrategyError> {
    let malformed = |e: quick_xml::Error| {
        StrategyError::MalformedInput(format!("Word document XML is malformed: {e}"))
    };

    let mut reader = Reader::from_str(xml);
    let mut text = String::with_capacity(xml.len() / 4);
    let mut run_depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:r" => run_depth += 1,
                b"w:t" if run_depth > 0 => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:r" => run_depth = run_depth.saturating_sub(1),
                b"w:t" => in_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" if run_depth > 0 => text.push('\t'),
                b"w:br" | b"w:cr" if run_depth > 0 => text.push('\n'),
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => text.push_str(&t.unescape().map_err(malformed)?),
            Event::CData(c) if in_text => text.push_str(&String::from_utf8_lossy(&c)),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

// ── Writing ──────────────────────────────────────────────────────────────────

const EMU_PER_INCH: u64 = 914_400;
/// Usable width on a Letter page with half-inch margins.
const MAX_IMAGE_CX: u64 = EMU_PER_INCH * 15 / 2;
/// Usable height, leaving room for the paragraph mark.
const MAX_IMAGE_CY: u64 = EMU_PER_INCH * 19 / 2;

/// One block of generated content.
#[derive(Debug, Clone)]
enum Block {
    /// A paragraph with one run per line and explicit breaks between them.
    Lines { lines: Vec<String>, monospace: bool },
    /// A paragraph holding one PNG image.
    Image { png: Vec<u8>, width: u32, height: u32 },
    PageBreak,
}

/// Builds a `.docx` from text paragraphs and page images.
#[derive(Debug, Default)]
pub struct DocxBuilder {
    blocks: Vec<Block>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a paragraph of lines in the body font.
    pub fn lines(&mut self, lines: Vec<String>) -> &mut Self {
        self.blocks.push(Block::Lines {
            lines,
            monospace: false,
        });
        self
    }

    /// Add a paragraph of lines in a fixed-width font.
    pub fn monospace_lines(&mut self, lines: Vec<String>) -> &mut Self {
        self.blocks.push(Block::Lines {
            lines,
            monospace: true,
        });
        self
    }

    /// Add a PNG image, scaled to fit the page while keeping its aspect ratio.
    pub fn image(&mut self, png: Vec<u8>, width: u32, height: u32) -> &mut Self {
        self.blocks.push(Block::Image { png, width, height });
        self
    }

    pub fn page_break(&mut self) -> &mut Self {
        self.blocks.push(Block::PageBreak);
        self
    }

    /// Serialise to `.docx` bytes.
    pub fn build(&self) -> Result<Vec<u8>, StrategyError> {
        let mut body = String::new();
        let mut rels = String::new();
        let mut media: Vec<(String, &[u8])> = Vec::new();

        for block in &self.blocks {
            match block {
                Block::Lines { lines, monospace } => {
                    body.push_str("<w:p>");
                    let last = lines.len().saturating_sub(1);
                    for (i, line) in lines.iter().enumerate() {
                        body.push_str("<w:r>");
                        if *monospace {
                            body.push_str(
                                r#"<w:rPr><w:rFonts w:ascii="Courier New" w:hAnsi="Courier New" w:cs="Courier New"/><w:sz w:val="20"/></w:rPr>"#,
                            );
                        }
                        body.push_str(r#"<w:t xml:space="preserve">"#);
                        body.push_str(&escape_xml(line));
                        body.push_str("</w:t>");
                        if i < last {
                            body.push_str("<w:br/>");
                        }
                        body.push_str("</w:r>");
                    }
                    body.push_str("</w:p>");
                }
                Block::Image { png, width, height } => {
                    let n = media.len() + 1;
                    let rid = format!("rIdImg{n}");
                    let (cx, cy) = fit_emu(*width, *height);
                    rels.push_str(&format!(
                        r#"<Relationship Id="{rid}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image{n}.png"/>"#
                    ));
                    body.push_str(&inline_image_xml(n, &rid, cx, cy));
                    media.push((format!("word/media/image{n}.png"), png.as_slice()));
                }
                Block::PageBreak => {
                    body.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
                }
            }
        }

        let document = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
                r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
                r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
                r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
                r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                "<w:body>{}",
                r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/>"#,
                r#"<w:pgMar w:top="720" w:right="720" w:bottom="720" w:left="720" w:header="360" w:footer="360" w:gutter="0"/>"#,
                "</w:sectPr></w:body></w:document>"
            ),
            body
        );

        let document_rels = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
        );

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let mut put = |name: &str, data: &[u8], opts: SimpleFileOptions| -> Result<(), StrategyError> {
            zip.start_file(name, opts)?;
            zip.write_all(data).map_err(|e| {
                StrategyError::Capability(format!("Failed to write Word document part {name}: {e}"))
            })
        };

        put("[Content_Types].xml", CONTENT_TYPES.as_bytes(), options)?;
        put("_rels/.rels", PACKAGE_RELS.as_bytes(), options)?;
        put("word/document.xml", document.as_bytes(), options)?;
        put("word/_rels/document.xml.rels", document_rels.as_bytes(), options)?;
        for (name, data) in &media {
            put(name, data, stored)?;
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Default Extension="png" ContentType="image/png"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    "</Types>"
);

const PACKAGE_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    "</Relationships>"
);

fn inline_image_xml(n: usize, rid: &str, cx: u64, cy: u64) -> String {
    format!(
        concat!(
            "<w:p><w:r><w:drawing>",
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:docPr id="{n}" name="Page {n}"/>"#,
            r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
            r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic><pic:nvPicPr><pic:cNvPr id="{n}" name="image{n}.png"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rid}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic>"#,
            "</a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"
        ),
        n = n,
        rid = rid,
        cx = cx,
        cy = cy
    )
}

/// Scale pixel dimensions (at 96 dpi) to EMUs that fit the page box.
fn fit_emu(width: u32, height: u32) -> (u64, u64) {
    let w = width.max(1) as f64 * EMU_PER_INCH as f64 / 96.0;
    let h = height.max(1) as f64 * EMU_PER_INCH as f64 / 96.0;
    let scale = (MAX_IMAGE_CX as f64 / w).min(MAX_IMAGE_CY as f64 / h).min(1.0);
    ((w * scale).round() as u64, (h * scale).round() as u64)
}

/// Escape run text, dropping characters XML 1.0 cannot carry.
fn escape_xml(s: &str) -> Cow<'_, str> {
    let valid = |c: char| matches!(c, '\t' | '\n' | '\r') || c as u32 >= 0x20;
    if s.chars().all(valid) {
        quick_xml::escape::escape(s)
    } else {
        let kept: String = s.chars().filter(|&c| valid(c)).collect();
        Cow::Owned(quick_xml::escape::escape(kept.as_str()).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_document_reads_back() {
        let mut b = DocxBuilder::new();
        b.monospace_lines(vec!["first line".into(), "a < b & c".into()]);
        b.page_break();
        b.lines(vec!["second page".into()]);
        let bytes = b.build().unwrap();
        assert!(bytes.starts_with(b"PK"));

        let text = extract_raw_text(&bytes).unwrap();
        assert!(text.contains("first line\na < b & c"), "got: {text:?}");
        assert!(text.contains("second page"), "got: {text:?}");
    }

    #[test]
    fn image_parts_are_packaged() {
        let mut b = DocxBuilder::new();
        b.image(vec![0x89, b'P', b'N', b'G'], 1200, 1600);
        let bytes = b.build().unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert!(archive.by_name("word/media/image1.png").is_ok());
        let mut rels = String::new();
        archive
            .by_name("word/_rels/document.xml.rels")
            .unwrap()
            .read_to_string(&mut rels)
            .unwrap();
        assert!(rels.contains("rIdImg1"));
    }

    #[test]
    fn legacy_doc_is_rejected_with_remote_hint() {
        let bytes = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
        let err = extract_raw_text(&bytes).unwrap_err();
        assert!(matches!(err, StrategyError::Capability(_)));
        assert!(err.to_string().contains("Legacy .doc"));
        assert!(err.to_string().contains("remote conversion service"));
    }

    #[test]
    fn garbage_is_malformed() {
        let err = extract_raw_text(b"not a zip at all").unwrap_err();
        assert!(matches!(err, StrategyError::MalformedInput(_)));
    }

    fn docx_with_body(body: &str) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        write!(
            zip,
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        )
        .unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn self_closing_text_element_is_empty() {
        let bytes = docx_with_body(
            r#"<w:p><w:r><w:t xml:space="preserve"/></w:r></w:p><w:p><w:r><w:t>Hello</w:t></w:r></w:p>"#,
        );
        let text = extract_raw_text(&bytes).unwrap();
        assert!(!text.contains("<w:"), "got: {text:?}");
        assert_eq!(text, "\nHello\n");
    }

    #[test]
    fn tab_stops_are_not_content() {
        let bytes = docx_with_body(concat!(
            r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr>"#,
            r#"<w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p><w:p/>"#,
        ));
        assert_eq!(extract_raw_text(&bytes).unwrap(), "a\tb\nc\n\n");
    }

    #[test]
    fn entities_are_decoded() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>&lt;a&gt; &amp;amp; &#233;&#x41;</w:t></w:r></w:p>",
        );
        assert_eq!(extract_raw_text(&bytes).unwrap(), "<a> &amp; éA\n");
    }

    #[test]
    fn broken_xml_is_malformed() {
        let bytes = docx_with_body("<w:p><w:r><w:t>open</w:r></w:p>");
        let err = extract_raw_text(&bytes).unwrap_err();
        assert!(matches!(err, StrategyError::MalformedInput(_)), "got {err:?}");
    }

    #[test]
    fn control_characters_are_dropped_on_write() {
        assert_eq!(escape_xml("a\u{1}<b>\tc"), "a&lt;b&gt;\tc");
    }

    #[test]
    fn images_fit_the_page_box() {
        let (cx, cy) = fit_emu(1200, 1600);
        assert!(cx <= MAX_IMAGE_CX && cy <= MAX_IMAGE_CY);
        let (cx, cy) = fit_emu(96, 96);
        assert_eq!((cx, cy), (EMU_PER_INCH, EMU_PER_INCH));
    }
}
