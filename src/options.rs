//! Engine tuning knobs

use serde::{Deserialize, Serialize};

/// Options shared by the generator, validator, and applier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchOptions {
    /// Matching lines kept on each side of a change as anchors
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,

    /// How far (in lines, each direction) an anchor may drift from its
    /// recorded offset before the hunk is rejected
    #[serde(default = "default_search_window")]
    pub search_window: usize,

    /// Line count above which generation switches from the quadratic LCS
    /// alignment to the greedy O(N*D) variant
    #[serde(default = "default_large_document_threshold")]
    pub large_document_threshold: usize,
}

fn default_context_lines() -> usize {
    3
}

fn default_search_window() -> usize {
    5
}

fn default_large_document_threshold() -> usize {
    5000
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            context_lines: default_context_lines(),
            search_window: default_search_window(),
            large_document_threshold: default_large_document_threshold(),
        }
    }
}
