//! Format classification: content type → [`SourceKind`], raw string →
//! [`TargetFormat`].
//!
//! Both enumerations are closed. Everything downstream matches on them
//! exhaustively, so adding a format is a compile-time checklist rather than
//! a hunt for string comparisons.

use crate::error::FileShiftError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Coarse category of an input file, derived from its declared content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Image,
    Pdf,
    PlainText,
    WordDocument,
    Unknown,
}

/// One of the seven formats a caller may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetFormat {
    Png,
    Jpg,
    Webp,
    Tiff,
    Pdf,
    Txt,
    Word,
}

impl TargetFormat {
    /// Every target, in the order they are listed to users.
    pub const ALL: [TargetFormat; 7] = [
        TargetFormat::Png,
        TargetFormat::Jpg,
        TargetFormat::Webp,
        TargetFormat::Tiff,
        TargetFormat::Pdf,
        TargetFormat::Txt,
        TargetFormat::Word,
    ];

    /// Upper-case label used in outcomes and error messages.
    pub fn label(self) -> &'static str {
        match self {
            TargetFormat::Png => "PNG",
            TargetFormat::Jpg => "JPG",
            TargetFormat::Webp => "WEBP",
            TargetFormat::Tiff => "TIFF",
            TargetFormat::Pdf => "PDF",
            TargetFormat::Txt => "TXT",
            TargetFormat::Word => "WORD",
        }
    }

    /// File extension written for this target.
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Png => "png",
            TargetFormat::Jpg => "jpg",
            TargetFormat::Webp => "webp",
            TargetFormat::Tiff => "tiff",
            TargetFormat::Pdf => "pdf",
            TargetFormat::Txt => "txt",
            TargetFormat::Word => "docx",
        }
    }

    /// Whether this target is a raster image format.
    pub fn is_image(self) -> bool {
        matches!(
            self,
            TargetFormat::Png | TargetFormat::Jpg | TargetFormat::Webp | TargetFormat::Tiff
        )
    }

    /// Matching `image` crate format for raster targets.
    pub fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            TargetFormat::Png => Some(image::ImageFormat::Png),
            TargetFormat::Jpg => Some(image::ImageFormat::Jpeg),
            TargetFormat::Webp => Some(image::ImageFormat::WebP),
            TargetFormat::Tiff => Some(image::ImageFormat::Tiff),
            _ => None,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for TargetFormat {
    type Err = FileShiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_target(s)
    }
}

/// Map a declared content type to a [`SourceKind`].
///
/// Total: anything unrecognised (including an empty string) is
/// [`SourceKind::Unknown`]. Parameters (`; charset=...`) and case are ignored.
pub fn classify_source(content_type: &str) -> SourceKind {
    match essence(content_type).as_str() {
        "image/png" | "image/jpeg" | "image/jpg" | "image/pjpeg" | "image/webp"
        | "image/tiff" | "image/gif" | "image/bmp" | "image/x-ms-bmp" => SourceKind::Image,
        "application/pdf" | "application/x-pdf" => SourceKind::Pdf,
        "text/plain" => SourceKind::PlainText,
        "application/msword"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            SourceKind::WordDocument
        }
        _ => SourceKind::Unknown,
    }
}

/// Validate a raw target name against the closed enumeration.
///
/// Matching is case-insensitive; `JPEG` is accepted for `JPG` and `DOCX` for
/// `WORD`, the two spellings users type most often.
pub fn validate_target(raw: &str) -> Result<TargetFormat, FileShiftError> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "PNG" => Ok(TargetFormat::Png),
        "JPG" | "JPEG" => Ok(TargetFormat::Jpg),
        "WEBP" => Ok(TargetFormat::Webp),
        "TIFF" => Ok(TargetFormat::Tiff),
        "PDF" => Ok(TargetFormat::Pdf),
        "TXT" => Ok(TargetFormat::Txt),
        "WORD" | "DOCX" => Ok(TargetFormat::Word),
        _ => Err(FileShiftError::InvalidTargetFormat {
            value: raw.to_string(),
            valid: TargetFormat::ALL.iter().map(|t| t.label().to_string()).collect(),
        }),
    }
}

/// Targets that have a strategy chain for the given source kind.
pub fn supported_targets(kind: SourceKind) -> &'static [TargetFormat] {
    use TargetFormat::*;
    match kind {
        SourceKind::Image => &[Png, Jpg, Webp, Tiff, Pdf],
        SourceKind::Pdf => &[Png, Jpg, Webp, Tiff, Txt, Word],
        SourceKind::WordDocument => &[Pdf, Word],
        SourceKind::PlainText => &[Pdf, Txt],
        SourceKind::Unknown => &[],
    }
}

/// Human-facing noun for a source kind, used in remediation hints.
pub fn kind_noun(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Image => "Image",
        SourceKind::Pdf => "PDF",
        SourceKind::PlainText => "Text",
        SourceKind::WordDocument => "Word",
        SourceKind::Unknown => "Unknown",
    }
}

/// Short label for the original format, e.g. `PNG`, `JPG`, `DOCX`.
pub fn original_format_label(content_type: &str) -> String {
    let essence = essence(content_type);
    match essence.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "JPG".to_string(),
        "image/x-ms-bmp" => "BMP".to_string(),
        "application/x-pdf" => "PDF".to_string(),
        "text/plain" => "TXT".to_string(),
        "application/msword" => "DOC".to_string(),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            "DOCX".to_string()
        }
        other => match other.split_once('/') {
            Some((_, sub)) if !sub.is_empty() => sub.to_ascii_uppercase(),
            _ => "UNKNOWN".to_string(),
        },
    }
}

/// True when the content type declares a legacy binary `.doc` file.
pub fn is_legacy_word(content_type: &str) -> bool {
    essence(content_type) == "application/msword"
}

/// Guess a content type from the first bytes of a file, falling back to its
/// extension. Returns `application/octet-stream` when nothing matches.
pub fn sniff_content_type(path: &Path, head: &[u8]) -> &'static str {
    if head.starts_with(b"%PDF") {
        return "application/pdf";
    }
    if head.starts_with(&[0x89, b'P', b'N', b'G']) {
        return "image/png";
    }
    if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WEBP" {
        return "image/webp";
    }
    if head.starts_with(b"II*\0") || head.starts_with(b"MM\0*") {
        return "image/tiff";
    }
    if head.starts_with(b"GIF8") {
        return "image/gif";
    }
    if is_bmp_header(head) {
        return "image/bmp";
    }
    if head.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
        return "application/msword";
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        "txt" | "text" | "log" | "md" => "text/plain",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

/// `BM` alone is too weak (plenty of text starts with it), so the rest of
/// the 14-byte file header has to hold up: zero reserved words and a pixel
/// data offset past the smallest possible headers, inside the file.
fn is_bmp_header(head: &[u8]) -> bool {
    if head.len() < 14 || !head.starts_with(b"BM") {
        return false;
    }
    let le = |at: usize| u32::from_le_bytes([head[at], head[at + 1], head[at + 2], head[at + 3]]);
    let file_size = le(2);
    let pixel_offset = le(10);
    head[6..10] == [0, 0, 0, 0] && pixel_offset >= 26 && pixel_offset < file_size
}

fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}
