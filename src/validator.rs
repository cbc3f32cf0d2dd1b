//! Structural and contextual patch validation
//!
//! Two tiers: structural (the patch is internally well-formed) and
//! contextual (every hunk's anchor still matches a given target document).
//! Contextual matching is fuzzy in two bounded ways: lines compare equal
//! after trailing-whitespace normalization, and an anchor may sit up to
//! `search_window` lines away from its recorded offset. Neither tier ever
//! mutates the target.

use std::fmt;

use crate::document::Document;
use crate::normalize;
use crate::options::PatchOptions;
use crate::patch::Patch;
use thiserror::Error;
use tracing::debug;

/// Why a hunk was rejected (or, for `DriftedAnchor`, flagged).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FindingReason {
    #[error(
        "recorded counts disagree with hunk contents: original {recorded_original} vs {actual_original}, modified {recorded_modified} vs {actual_modified}"
    )]
    CountMismatch {
        recorded_original: usize,
        actual_original: usize,
        recorded_modified: usize,
        actual_modified: usize,
    },

    #[error(
        "hunk is not in ascending original order (starts at line {start}, previous hunk starts at {previous_start})"
    )]
    OutOfOrder { start: usize, previous_start: usize },

    #[error(
        "hunk overlaps the previous hunk in original coordinates (starts at line {start}, previous hunk ends at line {previous_end})"
    )]
    Overlap { start: usize, previous_end: usize },

    #[error(
        "context not found near line {expected_line} (searched lines {search_start}-{search_end}); expected:\n{expected}\nfound:\n{found}"
    )]
    ContextNotFound {
        expected_line: usize,
        search_start: usize,
        search_end: usize,
        expected: String,
        found: String,
    },

    /// Warning tier: the anchor matched, but not where the hunk said.
    #[error("anchor located {drift} line(s) away from its recorded position")]
    DriftedAnchor { drift: isize },

    /// Internal-consistency failure: a located region overlaps one already
    /// consumed by an earlier hunk. Never recoverable by the caller.
    #[error("hunk region overlaps a region already consumed by an earlier hunk")]
    RegionConflict,
}

/// One validation observation, tied to the hunk it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFinding {
    pub hunk_index: usize,
    pub reason: FindingReason,
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hunk {}: {}", self.hunk_index, self.reason)
    }
}

/// Outcome of `DiffValidator::validate`. Warnings are non-fatal
/// observations (currently only anchor drift within the search window).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid {
        warnings: Vec<ValidationFinding>,
    },
    Invalid {
        findings: Vec<ValidationFinding>,
        warnings: Vec<ValidationFinding>,
    },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid { .. })
    }

    /// Fatal findings, in hunk order. Empty when valid.
    pub fn findings(&self) -> &[ValidationFinding] {
        match self {
            ValidationResult::Valid { .. } => &[],
            ValidationResult::Invalid { findings, .. } => findings,
        }
    }

    pub fn warnings(&self) -> &[ValidationFinding] {
        match self {
            ValidationResult::Valid { warnings } | ValidationResult::Invalid { warnings, .. } => {
                warnings
            }
        }
    }
}

/// Where a hunk's anchor was found in the target (0-based, with length).
#[derive(Debug, Clone, Copy)]
pub(crate) struct LocatedHunk {
    pub start: usize,
    pub len: usize,
}

/// Result of anchoring every hunk of a patch against a target.
#[derive(Debug)]
pub(crate) struct Location {
    /// Meaningful only when `findings` is empty
    pub located: Vec<LocatedHunk>,
    pub findings: Vec<ValidationFinding>,
    pub warnings: Vec<ValidationFinding>,
}

#[derive(Debug, Default)]
pub struct DiffValidator {
    options: PatchOptions,
}

impl DiffValidator {
    pub fn new(options: PatchOptions) -> Self {
        Self { options }
    }

    /// Validate a patch. With no target, only the structural tier runs
    /// (pre-persistence check); with a target, both tiers run.
    pub fn validate(&self, patch: &Patch, target: Option<&Document>) -> ValidationResult {
        let findings = structural_findings(patch);
        if !findings.is_empty() {
            debug!(count = findings.len(), "patch failed structural validation");
            return ValidationResult::Invalid {
                findings,
                warnings: Vec::new(),
            };
        }

        let Some(target) = target else {
            return ValidationResult::Valid {
                warnings: Vec::new(),
            };
        };

        let location = self.locate_hunks(patch, target);
        if location.findings.is_empty() {
            ValidationResult::Valid {
                warnings: location.warnings,
            }
        } else {
            debug!(
                count = location.findings.len(),
                "patch failed contextual validation"
            );
            ValidationResult::Invalid {
                findings: location.findings,
                warnings: location.warnings,
            }
        }
    }

    /// Anchor every hunk against the target. Shared with the applier, which
    /// re-runs this instead of trusting a caller-supplied validation.
    ///
    /// Tracks cumulative drift: once a hunk is found `d` lines from its
    /// recorded offset, later hunks are expected `d` lines away too. Hunks
    /// never match inside a region consumed by an earlier hunk.
    pub(crate) fn locate_hunks(&self, patch: &Patch, target: &Document) -> Location {
        let normalized = normalize::normalize(target);
        let keys = normalized.compare_keys();

        let mut located = Vec::with_capacity(patch.hunks.len());
        let mut findings = Vec::new();
        let mut warnings = Vec::new();
        let mut drift = 0isize;
        let mut consumed = 0usize;

        for (hunk_index, hunk) in patch.hunks.iter().enumerate() {
            let pattern: Vec<&str> = hunk.anchor_lines().map(normalize::compare_key).collect();
            let expected = (hunk.anchor_start() as isize + drift).clamp(0, keys.len() as isize)
                as usize;

            if pattern.is_empty() {
                // Pure insertion with no anchor: trust the recorded point.
                let start = expected.max(consumed).min(keys.len());
                located.push(LocatedHunk { start, len: 0 });
                continue;
            }

            match seek(&keys, &pattern, expected, consumed, self.options.search_window) {
                Some(start) => {
                    let hunk_drift = start as isize - expected as isize;
                    if hunk_drift != 0 {
                        debug!(hunk = hunk_index, drift = hunk_drift, "anchor drifted");
                        warnings.push(ValidationFinding {
                            hunk_index,
                            reason: FindingReason::DriftedAnchor { drift: hunk_drift },
                        });
                        drift += hunk_drift;
                    }
                    consumed = start + pattern.len();
                    located.push(LocatedHunk {
                        start,
                        len: pattern.len(),
                    });
                }
                None => {
                    let search_start = expected.saturating_sub(self.options.search_window);
                    let search_end = (expected + self.options.search_window).min(keys.len());
                    let found = target
                        .lines()
                        .iter()
                        .skip(expected.min(target.len()))
                        .take(pattern.len())
                        .cloned()
                        .collect::<Vec<_>>()
                        .join("\n");
                    findings.push(ValidationFinding {
                        hunk_index,
                        reason: FindingReason::ContextNotFound {
                            expected_line: expected + 1,
                            search_start: search_start + 1,
                            search_end: search_end + 1,
                            expected: hunk.anchor_lines().collect::<Vec<_>>().join("\n"),
                            found,
                        },
                    });
                }
            }
        }

        Location {
            located,
            findings,
            warnings,
        }
    }
}

/// Structural tier: counts agree with contents, hunks sorted and
/// non-overlapping in original coordinates. Independent of any target.
fn structural_findings(patch: &Patch) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();
    let mut previous: Option<(usize, usize)> = None;

    for (hunk_index, hunk) in patch.hunks.iter().enumerate() {
        if !hunk.counts_consistent() {
            findings.push(ValidationFinding {
                hunk_index,
                reason: FindingReason::CountMismatch {
                    recorded_original: hunk.original_count,
                    actual_original: hunk.original_len(),
                    recorded_modified: hunk.modified_count,
                    actual_modified: hunk.modified_len(),
                },
            });
        }

        let start = hunk.original_start;
        let end = if hunk.original_count == 0 {
            start
        } else {
            start + hunk.original_count - 1
        };
        if let Some((previous_start, previous_end)) = previous {
            if start < previous_start {
                findings.push(ValidationFinding {
                    hunk_index,
                    reason: FindingReason::OutOfOrder {
                        start,
                        previous_start,
                    },
                });
            } else if start <= previous_end {
                findings.push(ValidationFinding {
                    hunk_index,
                    reason: FindingReason::Overlap {
                        start,
                        previous_end,
                    },
                });
            }
        }
        previous = Some((start, end));
    }

    findings
}

/// Bounded local search for `pattern` in `keys`. Candidate offsets are
/// tried in order of distance from `expected` (0, +1, -1, +2, -2, ...), so
/// an ambiguous anchor resolves to the match closest to its recorded
/// position. Candidates below `min_start` are skipped.
fn seek(
    keys: &[&str],
    pattern: &[&str],
    expected: usize,
    min_start: usize,
    window: usize,
) -> Option<usize> {
    let last_valid = keys.len().checked_sub(pattern.len())?;

    let mut deltas = Vec::with_capacity(2 * window + 1);
    deltas.push(0isize);
    for delta in 1..=window as isize {
        deltas.push(delta);
        deltas.push(-delta);
    }

    for delta in deltas {
        let candidate = expected as isize + delta;
        if candidate < min_start as isize || candidate < 0 {
            continue;
        }
        let candidate = candidate as usize;
        if candidate > last_valid {
            continue;
        }
        if keys[candidate..candidate + pattern.len()] == *pattern {
            return Some(candidate);
        }
    }

    None
}
