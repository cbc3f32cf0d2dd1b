//! Patch and hunk model plus the unified-diff wire format
//!
//! A `Patch` is the boundary artifact of the engine: the generator produces
//! one, the validator and applier consume one, and `to_unified`/`parse`
//! move it across the textual boundary in a unified-diff-compatible form.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors while parsing patch text into a structured `Patch`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: hunk appears before any file header (--- / +++)")]
    MissingHeader { line: usize },

    #[error("line {line}: invalid hunk header: {text}")]
    BadHunkHeader { line: usize, text: String },

    #[error("line {line}: unrecognized line prefix: {text}")]
    BadLinePrefix { line: usize, text: String },

    #[error(
        "hunk {hunk_index}: body does not satisfy header counts -{original_count},+{modified_count}"
    )]
    CountMismatch {
        hunk_index: usize,
        original_count: usize,
        modified_count: usize,
    },

    #[error("line {line}: patch text names a second target; a patch has exactly one")]
    MultipleTargets { line: usize },
}

/// One contiguous change region with its surrounding unchanged context.
///
/// Count invariants (checked by the validator, preserved by the parser):
/// `original_count` = context + removed lines, `modified_count` = context +
/// added lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    /// 1-based start of the hunk in the original document (0 permitted for
    /// a zero-count insertion point, per unified-diff convention)
    pub original_start: usize,
    pub original_count: usize,
    /// 1-based start of the corresponding range in the result
    pub modified_start: usize,
    pub modified_count: usize,

    /// Unchanged lines anchoring the change on each side
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,

    pub removed_lines: Vec<String>,
    pub added_lines: Vec<String>,
}

impl Hunk {
    /// Number of original-side lines actually present in the hunk.
    pub fn original_len(&self) -> usize {
        self.context_before.len() + self.removed_lines.len() + self.context_after.len()
    }

    /// Number of result-side lines actually present in the hunk.
    pub fn modified_len(&self) -> usize {
        self.context_before.len() + self.added_lines.len() + self.context_after.len()
    }

    /// Whether the recorded counts agree with the stored line sequences.
    pub fn counts_consistent(&self) -> bool {
        self.original_count == self.original_len() && self.modified_count == self.modified_len()
    }

    /// Net line-count change this hunk introduces.
    pub fn net_delta(&self) -> isize {
        self.added_lines.len() as isize - self.removed_lines.len() as isize
    }

    /// The lines this hunk expects to find contiguously in the original,
    /// in order: context before, removed lines, context after.
    pub fn anchor_lines(&self) -> impl Iterator<Item = &str> {
        self.context_before
            .iter()
            .chain(self.removed_lines.iter())
            .chain(self.context_after.iter())
            .map(String::as_str)
    }

    /// 0-based position in the original where the anchor is expected to
    /// begin. For a zero-count hunk, `original_start` names the line the
    /// insertion follows, which is already the 0-based insertion index.
    pub(crate) fn anchor_start(&self) -> usize {
        if self.original_count == 0 {
            self.original_start
        } else {
            self.original_start.saturating_sub(1)
        }
    }
}

/// Aggregate line counts for a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatchStats {
    pub hunks: usize,
    pub added_lines: usize,
    pub removed_lines: usize,
    pub context_lines: usize,
}

/// An ordered collection of hunks against one logical target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Logical target identifier (document name or path)
    pub target: String,
    /// Optional human-readable description, serialized before the headers
    pub description: Option<String>,
    /// Hunks in ascending `original_start` order, non-overlapping
    pub hunks: Vec<Hunk>,
}

impl Patch {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            description: None,
            hunks: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// A zero-hunk patch is a valid no-op.
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    pub fn stats(&self) -> PatchStats {
        let mut stats = PatchStats {
            hunks: self.hunks.len(),
            ..PatchStats::default()
        };
        for hunk in &self.hunks {
            stats.added_lines += hunk.added_lines.len();
            stats.removed_lines += hunk.removed_lines.len();
            stats.context_lines += hunk.context_before.len() + hunk.context_after.len();
        }
        stats
    }

    /// Net line-count change across all hunks.
    pub fn net_delta(&self) -> isize {
        self.hunks.iter().map(Hunk::net_delta).sum()
    }

    /// Serialize to unified-diff text. A zero-hunk patch serializes to its
    /// headers alone.
    pub fn to_unified(&self) -> String {
        let mut out = String::new();
        if let Some(description) = &self.description {
            for line in description.lines() {
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push_str(&format!("--- a/{}\n", self.target));
        out.push_str(&format!("+++ b/{}\n", self.target));
        for hunk in &self.hunks {
            out.push_str(&format!(
                "@@ -{},{} +{},{} @@\n",
                hunk.original_start, hunk.original_count, hunk.modified_start, hunk.modified_count
            ));
            for line in &hunk.context_before {
                out.push(' ');
                out.push_str(line);
                out.push('\n');
            }
            for line in &hunk.removed_lines {
                out.push('-');
                out.push_str(line);
                out.push('\n');
            }
            for line in &hunk.added_lines {
                out.push('+');
                out.push_str(line);
                out.push('\n');
            }
            for line in &hunk.context_after {
                out.push(' ');
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }

    /// Structural parse of unified-diff text.
    ///
    /// Accepts standard interleaved-context hunk bodies: the leading and
    /// trailing context runs become `context_before`/`context_after`, and
    /// interior context lines fold into both `removed_lines` and
    /// `added_lines`, which preserves both counts and apply semantics.
    /// Header/body count disagreement is an error; entirely empty text
    /// parses to a zero-hunk patch.
    pub fn parse(text: &str) -> Result<Patch, ParseError> {
        let header_re = Regex::new(r"^(---|\+\+\+)\s+(?:[ab]/)?(.*)$").unwrap();
        let hunk_re = Regex::new(r"^@@\s+-(\d+)(?:,(\d+))?\s+\+(\d+)(?:,(\d+))?\s+@@").unwrap();

        let lines: Vec<&str> = text.lines().collect();
        let mut target: Option<String> = None;
        let mut seen_header = false;
        let mut description_lines: Vec<&str> = Vec::new();
        let mut hunks: Vec<Hunk> = Vec::new();

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];

            if line.starts_with("diff ") || line.starts_with("index ") {
                i += 1;
                continue;
            }

            // "\ No newline at end of file" after a hunk's final body line
            if line.starts_with('\\') {
                i += 1;
                continue;
            }

            if let Some(caps) = header_re.captures(line) {
                if &caps[1] == "---" {
                    if seen_header {
                        return Err(ParseError::MultipleTargets { line: i + 1 });
                    }
                    seen_header = true;
                } else {
                    if target.is_some() {
                        return Err(ParseError::MultipleTargets { line: i + 1 });
                    }
                    target = Some(caps[2].trim().to_string());
                }
                i += 1;
                continue;
            }

            if line.starts_with("@@") {
                if !seen_header {
                    return Err(ParseError::MissingHeader { line: i + 1 });
                }
                let caps = hunk_re
                    .captures(line)
                    .ok_or_else(|| ParseError::BadHunkHeader {
                        line: i + 1,
                        text: line.to_string(),
                    })?;
                let header_line = i + 1;
                let field = |index: usize, default: usize| -> Result<usize, ParseError> {
                    match caps.get(index) {
                        Some(m) => m.as_str().parse().map_err(|_| ParseError::BadHunkHeader {
                            line: header_line,
                            text: line.to_string(),
                        }),
                        None => Ok(default),
                    }
                };
                let original_start = field(1, 0)?;
                let original_count = field(2, 1)?;
                let modified_start = field(3, 0)?;
                let modified_count = field(4, 1)?;

                i += 1;
                let body = read_hunk_body(
                    &lines,
                    &mut i,
                    hunks.len(),
                    original_count,
                    modified_count,
                )?;
                hunks.push(assemble_hunk(
                    original_start,
                    original_count,
                    modified_start,
                    modified_count,
                    body,
                ));
                continue;
            }

            if !seen_header {
                if !line.is_empty() {
                    description_lines.push(line);
                }
                i += 1;
                continue;
            }

            if line.is_empty() {
                i += 1;
                continue;
            }

            return Err(ParseError::BadLinePrefix {
                line: i + 1,
                text: line.to_string(),
            });
        }

        if !seen_header && hunks.is_empty() && !text.trim().is_empty() {
            return Err(ParseError::MissingHeader { line: 1 });
        }

        let description = if description_lines.is_empty() {
            None
        } else {
            Some(description_lines.join("\n"))
        };

        Ok(Patch {
            target: target.unwrap_or_default(),
            description,
            hunks,
        })
    }

    /// Auxiliary structured form, for callers that move patches as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Patch> {
        serde_json::from_str(text)
    }
}

enum BodyLine {
    Context(String),
    Removed(String),
    Added(String),
}

/// Consume exactly the body lines the hunk header promised, classifying by
/// prefix. `\` markers are skipped; a bare empty line is accepted as an
/// empty context line (LLM-produced diffs routinely drop the leading space).
fn read_hunk_body(
    lines: &[&str],
    i: &mut usize,
    hunk_index: usize,
    original_count: usize,
    modified_count: usize,
) -> Result<Vec<BodyLine>, ParseError> {
    let mut remaining_original = original_count;
    let mut remaining_modified = modified_count;
    let mut body = Vec::new();

    let mismatch = || ParseError::CountMismatch {
        hunk_index,
        original_count,
        modified_count,
    };

    while remaining_original > 0 || remaining_modified > 0 {
        let Some(&line) = lines.get(*i) else {
            return Err(mismatch());
        };

        if line.starts_with('\\') {
            // "\ No newline at end of file"
            *i += 1;
            continue;
        }

        if let Some(content) = line.strip_prefix('+') {
            if remaining_modified == 0 {
                return Err(mismatch());
            }
            remaining_modified -= 1;
            body.push(BodyLine::Added(content.to_string()));
        } else if let Some(content) = line.strip_prefix('-') {
            if remaining_original == 0 {
                return Err(mismatch());
            }
            remaining_original -= 1;
            body.push(BodyLine::Removed(content.to_string()));
        } else {
            let content = if let Some(content) = line.strip_prefix(' ') {
                content
            } else if line.is_empty() {
                ""
            } else {
                return Err(ParseError::BadLinePrefix {
                    line: *i + 1,
                    text: line.to_string(),
                });
            };
            if remaining_original == 0 || remaining_modified == 0 {
                return Err(mismatch());
            }
            remaining_original -= 1;
            remaining_modified -= 1;
            body.push(BodyLine::Context(content.to_string()));
        }

        *i += 1;
    }

    Ok(body)
}

fn assemble_hunk(
    original_start: usize,
    original_count: usize,
    modified_start: usize,
    modified_count: usize,
    body: Vec<BodyLine>,
) -> Hunk {
    let leading = body
        .iter()
        .take_while(|line| matches!(line, BodyLine::Context(_)))
        .count();
    let trailing = body[leading..]
        .iter()
        .rev()
        .take_while(|line| matches!(line, BodyLine::Context(_)))
        .count();
    let body_len = body.len();

    let mut context_before = Vec::with_capacity(leading);
    let mut context_after = Vec::with_capacity(trailing);
    let mut removed_lines = Vec::new();
    let mut added_lines = Vec::new();

    for (position, line) in body.into_iter().enumerate() {
        if position < leading {
            if let BodyLine::Context(content) = line {
                context_before.push(content);
            }
        } else if position >= body_len - trailing {
            if let BodyLine::Context(content) = line {
                context_after.push(content);
            }
        } else {
            match line {
                BodyLine::Context(content) => {
                    removed_lines.push(content.clone());
                    added_lines.push(content);
                }
                BodyLine::Removed(content) => removed_lines.push(content),
                BodyLine::Added(content) => added_lines.push(content),
            }
        }
    }

    Hunk {
        original_start,
        original_count,
        modified_start,
        modified_count,
        context_before,
        context_after,
        removed_lines,
        added_lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hunk() -> Hunk {
        Hunk {
            original_start: 1,
            original_count: 3,
            modified_start: 1,
            modified_count: 3,
            context_before: vec!["<div>".into()],
            context_after: vec!["</div>".into()],
            removed_lines: vec!["<p>A</p>".into()],
            added_lines: vec!["<p>B</p>".into()],
        }
    }

    #[test]
    fn test_serialize_single_hunk() {
        let patch = Patch {
            target: "report.html".into(),
            description: None,
            hunks: vec![sample_hunk()],
        };
        let expected = "--- a/report.html\n\
                        +++ b/report.html\n\
                        @@ -1,3 +1,3 @@\n \
                        <div>\n\
                        -<p>A</p>\n\
                        +<p>B</p>\n \
                        </div>\n";
        assert_eq!(patch.to_unified(), expected);
    }

    #[test]
    fn test_parse_round_trip() {
        let patch = Patch {
            target: "report.html".into(),
            description: Some("swap paragraph".into()),
            hunks: vec![sample_hunk()],
        };
        let parsed = Patch::parse(&patch.to_unified()).unwrap();
        assert_eq!(parsed, patch);
    }

    #[test]
    fn test_parse_multiple_hunks() {
        let text = "--- a/lib.rs\n\
                    +++ b/lib.rs\n\
                    @@ -1,2 +1,3 @@\n\
                    +// header\n \
                    pub fn foo() {}\n \
                    pub fn bar() {}\n\
                    @@ -10,3 +11,4 @@\n \
                    fn test_foo() {\n \
                    foo();\n\
                    +    bar();\n \
                    }\n";
        let patch = Patch::parse(text).unwrap();
        assert_eq!(patch.target, "lib.rs");
        assert_eq!(patch.hunks.len(), 2);
        assert_eq!(patch.hunks[0].original_start, 1);
        assert_eq!(patch.hunks[0].added_lines, vec!["// header"]);
        assert_eq!(patch.hunks[1].original_start, 10);
    }

    #[test]
    fn test_parse_interleaved_context_folds() {
        // Standard unified diff with context between the change runs.
        let text = "--- a/f\n\
                    +++ b/f\n\
                    @@ -1,4 +1,4 @@\n\
                    -old1\n\
                    +new1\n \
                    keep\n\
                    -old2\n\
                    +new2\n \
                    tail\n";
        let patch = Patch::parse(text).unwrap();
        let hunk = &patch.hunks[0];
        assert!(hunk.context_before.is_empty());
        assert_eq!(hunk.context_after, vec!["tail"]);
        assert_eq!(hunk.removed_lines, vec!["old1", "keep", "old2"]);
        assert_eq!(hunk.added_lines, vec!["new1", "keep", "new2"]);
        assert!(hunk.counts_consistent());
    }

    #[test]
    fn test_parse_count_mismatch_rejected() {
        let text = "--- a/f\n\
                    +++ b/f\n\
                    @@ -1,5 +1,5 @@\n \
                    only\n\
                    -one\n\
                    +two\n";
        let result = Patch::parse(text);
        assert!(matches!(result, Err(ParseError::CountMismatch { .. })));
    }

    #[test]
    fn test_parse_bad_hunk_header() {
        let text = "--- a/f\n+++ b/f\n@@ nonsense @@\n";
        let result = Patch::parse(text);
        assert!(matches!(result, Err(ParseError::BadHunkHeader { .. })));
    }

    #[test]
    fn test_parse_hunk_before_header() {
        let text = "@@ -1,1 +1,1 @@\n-x\n+y\n";
        let result = Patch::parse(text);
        assert!(matches!(result, Err(ParseError::MissingHeader { .. })));
    }

    #[test]
    fn test_parse_empty_text_is_noop_patch() {
        let patch = Patch::parse("").unwrap();
        assert!(patch.is_empty());
        assert!(patch.target.is_empty());
    }

    #[test]
    fn test_parse_header_only_is_noop_patch() {
        let patch = Patch::parse("--- a/f.html\n+++ b/f.html\n").unwrap();
        assert!(patch.is_empty());
        assert_eq!(patch.target, "f.html");
    }

    #[test]
    fn test_zero_hunk_round_trip() {
        let patch = Patch::new("f.html");
        let parsed = Patch::parse(&patch.to_unified()).unwrap();
        assert_eq!(parsed, patch);
    }

    #[test]
    fn test_parse_second_target_rejected() {
        let text = "--- a/f\n+++ b/f\n--- a/g\n+++ b/g\n";
        let result = Patch::parse(text);
        assert!(matches!(result, Err(ParseError::MultipleTargets { .. })));
    }

    #[test]
    fn test_parse_omitted_count_defaults_to_one() {
        let text = "--- a/f\n+++ b/f\n@@ -1 +1 @@\n-x\n+y\n";
        let patch = Patch::parse(text).unwrap();
        assert_eq!(patch.hunks[0].original_count, 1);
        assert_eq!(patch.hunks[0].modified_count, 1);
    }

    #[test]
    fn test_parse_blank_body_line_is_empty_context() {
        let text = "--- a/f\n\
                    +++ b/f\n\
                    @@ -1,3 +1,3 @@\n \
                    top\n\
                    \n \
                    bottom\n";
        let patch = Patch::parse(text).unwrap();
        let hunk = &patch.hunks[0];
        assert_eq!(hunk.context_before, vec!["top", "", "bottom"]);
        assert!(hunk.counts_consistent());
    }

    #[test]
    fn test_parse_no_newline_marker_skipped() {
        let text = "--- a/f\n\
                    +++ b/f\n\
                    @@ -1,1 +1,1 @@\n\
                    -old\n\
                    \\ No newline at end of file\n\
                    +new\n";
        let patch = Patch::parse(text).unwrap();
        assert_eq!(patch.hunks[0].removed_lines, vec!["old"]);
        assert_eq!(patch.hunks[0].added_lines, vec!["new"]);
    }

    #[test]
    fn test_parse_no_newline_marker_at_hunk_end_skipped() {
        // The marker's usual position: after the last body line of the
        // final hunk.
        let text = "--- a/f\n\
                    +++ b/f\n\
                    @@ -1,1 +1,1 @@\n\
                    -old\n\
                    +new\n\
                    \\ No newline at end of file\n";
        let patch = Patch::parse(text).unwrap();
        assert_eq!(patch.hunks.len(), 1);
        assert_eq!(patch.hunks[0].removed_lines, vec!["old"]);
        assert_eq!(patch.hunks[0].added_lines, vec!["new"]);
    }

    #[test]
    fn test_stats() {
        let patch = Patch {
            target: "f".into(),
            description: None,
            hunks: vec![sample_hunk()],
        };
        let stats = patch.stats();
        assert_eq!(stats.hunks, 1);
        assert_eq!(stats.added_lines, 1);
        assert_eq!(stats.removed_lines, 1);
        assert_eq!(stats.context_lines, 2);
        assert_eq!(patch.net_delta(), 0);
    }

    #[test]
    fn test_json_round_trip() {
        let patch = Patch {
            target: "f".into(),
            description: Some("d".into()),
            hunks: vec![sample_hunk()],
        };
        let json = patch.to_json().unwrap();
        assert_eq!(Patch::from_json(&json).unwrap(), patch);
    }

    #[test]
    fn test_counts_consistent() {
        let mut hunk = sample_hunk();
        assert!(hunk.counts_consistent());
        hunk.original_count = 7;
        assert!(!hunk.counts_consistent());
    }
}
