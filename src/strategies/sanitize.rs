//! Clean text so it can be set in a standard PDF font.
//!
//! The built-in PDF fonts only cover WinAnsi. [`font_safe_text`] does the
//! minimum for that and keeps every line, blank ones included:
//!
//! 1. Normalise line endings (CRLF / CR → LF)
//! 2. Transliterate typographic punctuation to ASCII
//! 3. Strip control characters (except tab and newline) and private-use code points
//! 4. Expand tabs
//!
//! [`sanitize_text`] is for text pulled out of Word documents. On top of the
//! above it trims trailing whitespace per line and collapses runs of blank
//! lines.

use once_cell::sync::Lazy;
use regex::Regex;

/// Make text drawable without changing its line structure.
pub fn font_safe_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = transliterate_punctuation(&s);
    strip_unprintable(&s).replace('\t', TAB)
}

/// Full cleanup for extracted document text.
pub fn sanitize_text(input: &str) -> String {
    let s = font_safe_text(input);
    let s = tidy_lines(&s);
    collapse_blank_lines(&s)
}

const TAB: &str = "    ";

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn transliterate_punctuation(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => out.push('"'),
            '\u{2013}' | '\u{2012}' | '\u{2212}' => out.push('-'),
            '\u{2014}' | '\u{2015}' => out.push_str("--"),
            '\u{2022}' | '\u{25CF}' | '\u{25E6}' | '\u{2023}' | '\u{2043}' => out.push('*'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\u{2007}' | '\u{202F}' => out.push(' '),
            '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' => {}
            other => out.push(other),
        }
    }
    out
}

static RE_UNPRINTABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F\x{E000}-\x{F8FF}\x{F0000}-\x{FFFFD}\x{100000}-\x{10FFFD}]")
        .unwrap()
});

fn strip_unprintable(input: &str) -> String {
    RE_UNPRINTABLE.replace_all(input, "").into_owned()
}

fn tidy_lines(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUNS.replace_all(input, "\n\n").into_owned()
}
