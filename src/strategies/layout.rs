//! Text layout for generated PDFs: line wrapping and pagination.
//!
//! Everything here is pure (`&str → Vec<String>`), so page breaks and wrap
//! points can be tested without producing a PDF. [`super::pdfgen`] turns the
//! resulting pages into drawing operations.

use printpdf::BuiltinFont;

/// US Letter width in points.
pub const PAGE_WIDTH: f32 = 612.0;
/// US Letter height in points.
pub const PAGE_HEIGHT: f32 = 792.0;
/// Margin on every side, in points.
pub const PAGE_MARGIN: f32 = 50.0;

/// Column budget for plain-text wrapping.
pub const TEXT_COLUMNS: usize = 80;

/// Page geometry and font for one generated document.
#[derive(Debug, Clone, Copy)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    pub font: BuiltinFont,
    pub font_size: f32,
    pub line_height: f32,
}

impl PageLayout {
    /// Letter page with 50 pt margins and a 1.5× line height.
    pub fn letter(font: BuiltinFont, font_size: f32) -> Self {
        Self {
            width: PAGE_WIDTH,
            height: PAGE_HEIGHT,
            margin: PAGE_MARGIN,
            font,
            font_size,
            line_height: font_size * 1.5,
        }
    }

    /// Layout used for plain-text input: monospace so 80 columns fit the width.
    pub fn plain_text() -> Self {
        Self::letter(BuiltinFont::Courier, 10.0)
    }

    /// Layout used for text extracted from Word documents.
    pub fn extracted_text() -> Self {
        Self::letter(BuiltinFont::Helvetica, 12.0)
    }

    pub fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    pub fn lines_per_page(&self) -> usize {
        (((self.height - 2.0 * self.margin) / self.line_height).floor() as usize).max(1)
    }

    /// Baseline origin of the `line`-th line on a page (0-based).
    pub fn line_origin(&self, line: usize) -> (f32, f32) {
        let y = self.height - self.margin - self.font_size - line as f32 * self.line_height;
        (self.margin, y)
    }
}

/// Wrap text at a fixed column budget.
///
/// Each input line is broken at the last space that keeps the piece within
/// `columns` characters; a run without any space is hard-broken at the limit.
/// Blank input lines are preserved as empty lines.
pub fn wrap_columns(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut out = Vec::new();

    for raw in text.lines() {
        let mut rest: Vec<char> = raw.trim_end().chars().collect();
        if rest.is_empty() {
            out.push(String::new());
            continue;
        }
        while rest.len() > columns {
            let window = &rest[..=columns];
            match window.iter().rposition(|c| *c == ' ') {
                Some(pos) if pos > 0 => {
                    out.push(rest[..pos].iter().collect::<String>().trim_end().to_string());
                    rest.drain(..=pos);
                }
                _ => {
                    out.push(rest[..columns].iter().collect());
                    rest.drain(..columns);
                }
            }
        }
        out.push(rest.into_iter().collect());
    }

    out
}

/// Greedy word wrap against measured Helvetica glyph widths.
///
/// `max_width` and the result are in points at `font_size`. Words wider than
/// a whole line are broken character by character.
pub fn wrap_measured(text: &str, font_size: f32, max_width: f32) -> Vec<String> {
    let mut out = Vec::new();

    for paragraph in text.lines() {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            out.push(String::new());
            continue;
        }

        let mut line = String::new();
        for word in words {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if text_width(&candidate, font_size) <= max_width {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                out.push(std::mem::take(&mut line));
            }
            if text_width(word, font_size) <= max_width {
                line = word.to_string();
            } else {
                for ch in word.chars() {
                    let mut next = line.clone();
                    next.push(ch);
                    if !line.is_empty() && text_width(&next, font_size) > max_width {
                        out.push(std::mem::take(&mut line));
                        line.push(ch);
                    } else {
                        line = next;
                    }
                }
            }
        }
        if !line.is_empty() {
            out.push(line);
        }
    }

    out
}

/// Split wrapped lines into pages. Always yields at least one (possibly blank) page.
pub fn paginate(lines: Vec<String>, per_page: usize) -> Vec<Vec<String>> {
    let per_page = per_page.max(1);
    let mut pages: Vec<Vec<String>> = Vec::new();
    let mut iter = lines.into_iter().peekable();
    while iter.peek().is_some() {
        pages.push(iter.by_ref().take(per_page).collect());
    }
    if pages.is_empty() {
        pages.push(Vec::new());
    }
    pages
}

/// Width of `text` in points when set in Helvetica at `font_size`.
pub fn text_width(text: &str, font_size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| glyph_width(c) as u32).sum();
    units as f32 * font_size / 1000.0
}

/// Helvetica advance widths (1/1000 em) for printable ASCII, from the
/// standard AFM metrics.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

fn glyph_width(c: char) -> u16 {
    let code = c as u32;
    if (32..=126).contains(&code) {
        HELVETICA_WIDTHS[(code - 32) as usize]
    } else {
        556
    }
}
