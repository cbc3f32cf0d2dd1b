//! Document value type: an ordered sequence of lines with positional identity

use crate::normalize;
use serde::{Deserialize, Serialize};

/// An in-memory text document as an ordered sequence of lines.
///
/// Line identity is positional (1-based), not content-addressed. The document
/// remembers whether its source text ended with a newline so that `to_text`
/// reproduces untouched input byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    lines: Vec<String>,
    trailing_newline: bool,
}

impl Document {
    /// Build a document from raw text, canonicalizing line endings.
    pub fn from_text(text: &str) -> Self {
        Self {
            trailing_newline: text.ends_with('\n') || text.ends_with('\r'),
            lines: normalize::split_lines(text),
        }
    }

    /// Build a document from pre-split lines. Assumes a trailing newline.
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            trailing_newline: true,
        }
    }

    pub fn with_trailing_newline(mut self, trailing_newline: bool) -> Self {
        self.trailing_newline = trailing_newline;
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 1-based line access.
    pub fn line(&self, number: usize) -> Option<&str> {
        if number == 0 {
            return None;
        }
        self.lines.get(number - 1).map(String::as_str)
    }

    pub fn has_trailing_newline(&self) -> bool {
        self.trailing_newline
    }

    /// Render the document back to text with `\n` endings.
    pub fn to_text(&self) -> String {
        let mut text = self.lines.join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            text.push('\n');
        }
        text
    }

    /// Line-by-line equality, ignoring trailing-newline bookkeeping.
    pub fn same_lines(&self, other: &Document) -> bool {
        self.lines == other.lines
    }
}
