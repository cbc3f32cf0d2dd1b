//! Diff generation: line alignment grouped into context-anchored hunks

use std::ops::Range;

use crate::document::Document;
use crate::normalize;
use crate::options::PatchOptions;
use crate::patch::{Hunk, Patch};
use tracing::debug;

/// Computes a patch describing how to turn one document into another.
///
/// Pure: the same inputs and options always produce the same patch, and
/// neither document is mutated.
#[derive(Debug, Default)]
pub struct DiffGenerator {
    options: PatchOptions,
}

/// A run of non-matching lines, as half-open 0-based ranges on each side.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChangeBlock {
    original: Range<usize>,
    modified: Range<usize>,
}

impl DiffGenerator {
    pub fn new(options: PatchOptions) -> Self {
        Self { options }
    }

    /// Compute a patch transforming `original` into `modified`.
    ///
    /// Identical documents yield a zero-hunk patch, which is a valid no-op.
    /// Lines differing only in trailing whitespace are treated as equal.
    pub fn generate(&self, original: &Document, modified: &Document, target: &str) -> Patch {
        let normalized_original = normalize::normalize(original);
        let normalized_modified = normalize::normalize(modified);
        let a = normalized_original.compare_keys();
        let b = normalized_modified.compare_keys();

        let matches = if a.len().max(b.len()) > self.options.large_document_threshold {
            myers_matches(&a, &b)
        } else {
            lcs_matches(&a, &b)
        };

        let blocks = merge_blocks(
            change_blocks(&matches, a.len(), b.len()),
            self.options.context_lines,
        );

        let hunks = blocks
            .iter()
            .map(|block| self.build_hunk(original, modified, block))
            .collect();

        let patch = Patch {
            target: target.to_string(),
            description: None,
            hunks,
        };
        let stats = patch.stats();
        debug!(
            patch_target = target,
            hunks = stats.hunks,
            added = stats.added_lines,
            removed = stats.removed_lines,
            "generated patch"
        );
        patch
    }

    fn build_hunk(&self, original: &Document, modified: &Document, block: &ChangeBlock) -> Hunk {
        let context = self.options.context_lines;
        let original_lines = original.lines();
        let modified_lines = modified.lines();

        let before = block.original.start.min(context);
        let after = context.min(original_lines.len() - block.original.end);
        let context_start = block.original.start - before;

        let context_before = original_lines[context_start..block.original.start].to_vec();
        let context_after =
            original_lines[block.original.end..block.original.end + after].to_vec();
        let removed_lines = original_lines[block.original.clone()].to_vec();
        let added_lines = modified_lines[block.modified.clone()].to_vec();

        let original_count = context_before.len() + removed_lines.len() + context_after.len();
        let modified_count = context_before.len() + added_lines.len() + context_after.len();
        let original_start = if original_count == 0 {
            block.original.start
        } else {
            context_start + 1
        };
        let modified_start = if modified_count == 0 {
            block.modified.start
        } else {
            block.modified.start - before + 1
        };

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
}

/// Turn an ordered match list into the runs of lines between matches.
fn change_blocks(
    matches: &[(usize, usize)],
    original_len: usize,
    modified_len: usize,
) -> Vec<ChangeBlock> {
    let mut blocks = Vec::new();
    let mut original_at = 0;
    let mut modified_at = 0;

    for &(a, b) in matches {
        if a > original_at || b > modified_at {
            blocks.push(ChangeBlock {
                original: original_at..a,
                modified: modified_at..b,
            });
        }
        original_at = a + 1;
        modified_at = b + 1;
    }

    if original_len > original_at || modified_len > modified_at {
        blocks.push(ChangeBlock {
            original: original_at..original_len,
            modified: modified_at..modified_len,
        });
    }

    blocks
}

/// Merge blocks whose context windows would overlap. The matched lines in
/// the gap fold into both sides of the merged block, since a hunk has no
/// interior context.
fn merge_blocks(blocks: Vec<ChangeBlock>, context_lines: usize) -> Vec<ChangeBlock> {
    let mut merged: Vec<ChangeBlock> = Vec::with_capacity(blocks.len());
    for block in blocks {
        if let Some(last) = merged.last_mut() {
            let gap = block.original.start - last.original.end;
            if gap < context_lines * 2 {
                last.original.end = block.original.end;
                last.modified.end = block.modified.end;
                continue;
            }
        }
        merged.push(block);
    }
    merged
}

/// Classic dynamic-programming LCS over lines. Returns matched index pairs
/// in ascending order. Ties prefer consuming the original side, which keeps
/// deletions contiguous and close to their original position.
fn lcs_matches(a: &[&str], b: &[&str]) -> Vec<(usize, usize)> {
    let n = a.len();
    let m = b.len();
    if n == 0 || m == 0 {
        return Vec::new();
    }

    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in 1..=n {
        for j in 1..=m {
            table[i * width + j] = if a[i - 1] == b[j - 1] {
                table[(i - 1) * width + (j - 1)] + 1
            } else {
                table[(i - 1) * width + j].max(table[i * width + (j - 1)])
            };
        }
    }

    let mut matches = Vec::new();
    let mut i = n;
    let mut j = m;
    while i > 0 && j > 0 {
        if a[i - 1] == b[j - 1] && table[i * width + j] == table[(i - 1) * width + (j - 1)] + 1 {
            matches.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if table[(i - 1) * width + j] >= table[i * width + (j - 1)] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    matches.reverse();
    matches
}

/// Greedy O(N*D) forward variant (Myers) for documents past the size
/// threshold, where the quadratic table would be too expensive.
fn myers_matches(a: &[&str], b: &[&str]) -> Vec<(usize, usize)> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = n + m;
    if max == 0 {
        return Vec::new();
    }

    let offset = max;
    let width = (2 * max + 1) as usize;
    let mut frontier = vec![0isize; width];
    let mut trace: Vec<Vec<isize>> = Vec::new();
    let mut depth = 0isize;

    'outer: for d in 0..=max {
        trace.push(frontier.clone());
        let mut k = -d;
        while k <= d {
            let ki = (k + offset) as usize;
            let mut x = if k == -d || (k != d && frontier[ki - 1] < frontier[ki + 1]) {
                frontier[ki + 1]
            } else {
                frontier[ki - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            frontier[ki] = x;
            if x >= n && y >= m {
                depth = d;
                break 'outer;
            }
            k += 2;
        }
    }

    let mut matches = Vec::new();
    let mut x = n;
    let mut y = m;
    let mut d = depth;
    while d >= 0 {
        let previous = &trace[d as usize];
        let k = x - y;
        let ki = (k + offset) as usize;
        let previous_k = if k == -d || (k != d && previous[ki - 1] < previous[ki + 1]) {
            k + 1
        } else {
            k - 1
        };
        let previous_x = previous[(previous_k + offset) as usize];
        let previous_y = previous_x - previous_k;

        while x > previous_x && y > previous_y {
            x -= 1;
            y -= 1;
            matches.push((x as usize, y as usize));
        }
        x = previous_x;
        y = previous_y;
        d -= 1;
    }
    matches.reverse();
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(lines: &[&str]) -> Document {
        Document::from_lines(lines.iter().map(|s| s.to_string()).collect())
    }

    fn generate(original: &Document, modified: &Document) -> Patch {
        DiffGenerator::new(PatchOptions::default()).generate(original, modified, "test.html")
    }

    #[test]
    fn test_identical_documents_yield_empty_patch() {
        let d = doc(&["<div>", "<p>A</p>", "</div>"]);
        let patch = generate(&d, &d);
        assert!(patch.is_empty());
        assert_eq!(patch.target, "test.html");
    }

    #[test]
    fn test_single_replacement() {
        let original = doc(&["<div>", "<p>A</p>", "</div>"]);
        let modified = doc(&["<div>", "<p>B</p>", "</div>"]);
        let patch = generate(&original, &modified);

        assert_eq!(patch.hunks.len(), 1);
        let hunk = &patch.hunks[0];
        assert_eq!(hunk.original_start, 1);
        assert_eq!(hunk.original_count, 3);
        assert_eq!(hunk.modified_start, 1);
        assert_eq!(hunk.modified_count, 3);
        assert_eq!(hunk.context_before, vec!["<div>"]);
        assert_eq!(hunk.context_after, vec!["</div>"]);
        assert_eq!(hunk.removed_lines, vec!["<p>A</p>"]);
        assert_eq!(hunk.added_lines, vec!["<p>B</p>"]);
    }

    #[test]
    fn test_pure_insertion() {
        let original = doc(&["a", "b"]);
        let modified = doc(&["a", "new", "b"]);
        let patch = generate(&original, &modified);

        assert_eq!(patch.hunks.len(), 1);
        let hunk = &patch.hunks[0];
        assert!(hunk.removed_lines.is_empty());
        assert_eq!(hunk.added_lines, vec!["new"]);
        assert_eq!(hunk.context_before, vec!["a"]);
        assert_eq!(hunk.context_after, vec!["b"]);
        assert!(hunk.counts_consistent());
    }

    #[test]
    fn test_pure_deletion() {
        let original = doc(&["a", "gone", "b"]);
        let modified = doc(&["a", "b"]);
        let patch = generate(&original, &modified);

        let hunk = &patch.hunks[0];
        assert_eq!(hunk.removed_lines, vec!["gone"]);
        assert!(hunk.added_lines.is_empty());
        assert!(hunk.counts_consistent());
    }

    #[test]
    fn test_insertion_into_empty_document() {
        let original = doc(&[]);
        let modified = doc(&["only"]);
        let patch = generate(&original, &modified);

        let hunk = &patch.hunks[0];
        assert_eq!(hunk.original_start, 0);
        assert_eq!(hunk.original_count, 0);
        assert_eq!(hunk.modified_start, 1);
        assert_eq!(hunk.modified_count, 1);
        assert_eq!(hunk.added_lines, vec!["only"]);
    }

    #[test]
    fn test_nearby_changes_merge_into_one_hunk() {
        // Two changes separated by a single matching line: the context
        // windows overlap, so one hunk comes out with the gap folded in.
        let original = doc(&["a", "x1", "keep", "x2", "b"]);
        let modified = doc(&["a", "y1", "keep", "y2", "b"]);
        let patch = generate(&original, &modified);

        assert_eq!(patch.hunks.len(), 1);
        let hunk = &patch.hunks[0];
        assert_eq!(hunk.removed_lines, vec!["x1", "keep", "x2"]);
        assert_eq!(hunk.added_lines, vec!["y1", "keep", "y2"]);
        assert!(hunk.counts_consistent());
    }

    #[test]
    fn test_distant_changes_stay_separate() {
        let mut original_lines = vec!["start"];
        let filler: Vec<String> = (0..10).map(|i| format!("filler{i}")).collect();
        original_lines.extend(filler.iter().map(String::as_str));
        original_lines.push("end");

        let mut modified_lines = original_lines.clone();
        modified_lines[0] = "START";
        let last = modified_lines.len() - 1;
        modified_lines[last] = "END";

        let patch = generate(&doc(&original_lines), &doc(&modified_lines));
        assert_eq!(patch.hunks.len(), 2);
        assert!(patch.hunks[0].original_start < patch.hunks[1].original_start);
    }

    #[test]
    fn test_trailing_whitespace_is_not_a_change() {
        let original = doc(&["a", "b"]);
        let modified = doc(&["a   ", "b\t"]);
        let patch = generate(&original, &modified);
        assert!(patch.is_empty());
    }

    #[test]
    fn test_myers_agrees_with_lcs() {
        let original = doc(&["a", "b", "c", "d", "e", "f", "g"]);
        let modified = doc(&["a", "B", "c", "e", "f", "new", "g"]);

        let quadratic = generate(&original, &modified);
        let greedy = DiffGenerator::new(PatchOptions {
            large_document_threshold: 0,
            ..PatchOptions::default()
        })
        .generate(&original, &modified, "test.html");

        // The two alignments may differ in tie-breaks, but the patches must
        // describe the same transformation.
        assert_eq!(
            apply_naive(&original, &greedy),
            apply_naive(&original, &quadratic)
        );
        assert_eq!(apply_naive(&original, &quadratic), modified.lines());
    }

    #[test]
    fn test_myers_empty_sides() {
        assert!(myers_matches(&[], &[]).is_empty());
        assert!(myers_matches(&["a"], &[]).is_empty());
        assert!(myers_matches(&[], &["a"]).is_empty());
        assert_eq!(myers_matches(&["a"], &["a"]), vec![(0, 0)]);
    }

    #[test]
    fn test_lcs_prefers_contiguous_deletions() {
        let matches = lcs_matches(&["a", "b", "a"], &["a"]);
        assert_eq!(matches.len(), 1);
    }

    /// Reference reconstruction straight from the hunk ranges; the real
    /// applier goes through context search and is tested separately.
    fn apply_naive(original: &Document, patch: &Patch) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut cursor = 0usize;
        for hunk in &patch.hunks {
            let start = hunk.anchor_start();
            out.extend_from_slice(&original.lines()[cursor..start]);
            out.extend(hunk.context_before.iter().cloned());
            out.extend(hunk.added_lines.iter().cloned());
            out.extend(hunk.context_after.iter().cloned());
            cursor = start + hunk.original_len();
        }
        out.extend_from_slice(&original.lines()[cursor..]);
        out
    }
}
