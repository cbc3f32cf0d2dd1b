//! Line-ending canonicalization and whitespace-insensitive line comparison
//!
//! Normalization is for *comparison only*: every line keeps its original
//! bytes, and the normalized view is consulted when deciding whether two
//! lines should be treated as equal. Both the generator (stable line
//! identity) and the validator (fuzzy anchor matching) go through here.

use crate::document::Document;

/// Split text into lines, treating `\r\n`, `\n\r`, lone `\n`, and lone `\r`
/// each as a single line break.
pub fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\n' => {
                if chars.peek() == Some(&'\r') {
                    chars.next();
                }
                lines.push(std::mem::take(&mut current));
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                lines.push(std::mem::take(&mut current));
            }
            other => current.push(other),
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

/// The comparison key for a line: trailing whitespace stripped, everything
/// else verbatim.
pub fn compare_key(line: &str) -> &str {
    line.trim_end()
}

/// Fuzzy line equality: exact after trailing-whitespace normalization.
pub fn lines_match(a: &str, b: &str) -> bool {
    compare_key(a) == compare_key(b)
}

/// A line paired with its comparison form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLine {
    raw: String,
    cmp_len: usize,
}

impl NormalizedLine {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let cmp_len = raw.trim_end().len();
        Self { raw, cmp_len }
    }

    /// The line exactly as it appears in the document.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The form used for equality checks.
    pub fn for_compare(&self) -> &str {
        &self.raw[..self.cmp_len]
    }

    /// Whether trailing whitespace was stripped for comparison.
    pub fn was_stripped(&self) -> bool {
        self.cmp_len != self.raw.len()
    }
}

/// A document viewed through its comparison keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDocument {
    lines: Vec<NormalizedLine>,
}

impl NormalizedDocument {
    pub fn lines(&self) -> &[NormalizedLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Comparison keys for every line, in order.
    pub fn compare_keys(&self) -> Vec<&str> {
        self.lines.iter().map(NormalizedLine::for_compare).collect()
    }
}

/// Build the comparison view of a document. Never fails; an empty document
/// yields a zero-line view.
pub fn normalize(document: &Document) -> NormalizedDocument {
    NormalizedDocument {
        lines: document
            .lines()
            .iter()
            .map(|line| NormalizedLine::new(line.clone()))
            .collect(),
    }
}
