//! Transactional patch application
//!
//! The applier never writes through the target: it re-validates, locates
//! every hunk, and only then builds the result as a fresh `Document`. Any
//! failure rejects the whole patch; no partial application is ever visible.

use crate::document::Document;
use crate::options::PatchOptions;
use crate::patch::Patch;
use crate::validator::{DiffValidator, FindingReason};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What an accepted application did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApplyReport {
    pub hunks_applied: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub original_lines: usize,
    pub result_lines: usize,
}

impl ApplyReport {
    /// Net line-count change the patch introduced.
    pub fn net_delta(&self) -> isize {
        self.lines_added as isize - self.lines_removed as isize
    }
}

/// Outcome of `DiffApplier::apply`.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyResult {
    /// The patch applied cleanly. The input target was not touched; the
    /// result is a new document.
    Applied {
        document: Document,
        report: ApplyReport,
    },
    /// The first failing hunk and why. The target is guaranteed unchanged.
    Rejected {
        hunk_index: usize,
        reason: FindingReason,
    },
}

impl ApplyResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyResult::Applied { .. })
    }

    pub fn document(&self) -> Option<&Document> {
        match self {
            ApplyResult::Applied { document, .. } => Some(document),
            ApplyResult::Rejected { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct DiffApplier {
    validator: DiffValidator,
}

impl DiffApplier {
    pub fn new(options: PatchOptions) -> Self {
        Self {
            validator: DiffValidator::new(options),
        }
    }

    /// Apply `patch` to `target`, producing a new document.
    ///
    /// Both validation tiers re-run here rather than trusting the caller:
    /// the target may have changed between a standalone `validate` call and
    /// this one. Hunks are applied in ascending order, each located with
    /// the drift-corrected search, so a patch whose later hunks were
    /// recorded against already-shifted line numbers still lands correctly.
    pub fn apply(&self, patch: &Patch, target: &Document) -> ApplyResult {
        let structural = self.validator.validate(patch, None);
        if let Some(first) = structural.findings().first() {
            return ApplyResult::Rejected {
                hunk_index: first.hunk_index,
                reason: first.reason.clone(),
            };
        }

        let location = self.validator.locate_hunks(patch, target);
        if let Some(first) = location.findings.first() {
            return ApplyResult::Rejected {
                hunk_index: first.hunk_index,
                reason: first.reason.clone(),
            };
        }

        let target_lines = target.lines();
        let mut out: Vec<String> = Vec::with_capacity(target_lines.len());
        let mut cursor = 0usize;
        let mut lines_added = 0usize;
        let mut lines_removed = 0usize;

        for (hunk_index, (hunk, located)) in
            patch.hunks.iter().zip(&location.located).enumerate()
        {
            if located.start < cursor {
                // Offset bookkeeping violated its own invariant; abort with
                // the original target untouched.
                return ApplyResult::Rejected {
                    hunk_index,
                    reason: FindingReason::RegionConflict,
                };
            }

            out.extend_from_slice(&target_lines[cursor..located.start]);

            // Context comes from the target, not the patch, so the target's
            // exact whitespace survives in the result.
            let context_before = hunk.context_before.len();
            let removed = hunk.removed_lines.len();
            out.extend_from_slice(
                &target_lines[located.start..located.start + context_before],
            );
            out.extend(hunk.added_lines.iter().cloned());
            out.extend_from_slice(
                &target_lines[located.start + context_before + removed
                    ..located.start + located.len],
            );

            cursor = located.start + located.len;
            lines_added += hunk.added_lines.len();
            lines_removed += removed;
        }
        out.extend_from_slice(&target_lines[cursor..]);

        let document =
            Document::from_lines(out).with_trailing_newline(target.has_trailing_newline());
        let report = ApplyReport {
            hunks_applied: patch.hunks.len(),
            lines_added,
            lines_removed,
            original_lines: target.len(),
            result_lines: document.len(),
        };
        debug!(
            hunks = report.hunks_applied,
            added = report.lines_added,
            removed = report.lines_removed,
            "patch applied"
        );
        ApplyResult::Applied { document, report }
    }
}
