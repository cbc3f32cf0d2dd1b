//! linepatch - a context-anchored patch engine for line-oriented text.
//!
//! The crate generates, validates, and transactionally applies unified
//! diffs. Hunks are anchored by their context lines rather than trusted
//! line numbers, so a patch recorded against a slightly drifted document
//! still lands, and a patch whose anchors no longer exist is rejected
//! without touching the target.
//!
//! ```ignore
//! use linepatch::{BackupManager, DiffApplier, DiffGenerator, Document, PatchOptions};
//!
//! let original = Document::from_text("<div>\n<p>A</p>\n</div>\n");
//! let modified = Document::from_text("<div>\n<p>B</p>\n</div>\n");
//!
//! let options = PatchOptions::default();
//! let patch = DiffGenerator::new(options.clone()).generate(&original, &modified, "index.html");
//!
//! let mut backups = BackupManager::new();
//! let handle = backups.snapshot("index.html", &original, "apply");
//!
//! match DiffApplier::new(options).apply(&patch, &original) {
//!     result if result.is_applied() => {
//!         backups.discard(handle);
//!     }
//!     _ => {
//!         let rolled_back = backups.restore(handle)?;
//!         assert_eq!(rolled_back, original);
//!     }
//! }
//! ```

pub mod applier;
pub mod document;
pub mod generator;
pub mod normalize;
pub mod options;
pub mod patch;
pub mod rollback;
pub mod validator;

pub use applier::{ApplyReport, ApplyResult, DiffApplier};
pub use document::Document;
pub use generator::DiffGenerator;
pub use options::PatchOptions;
pub use patch::{Hunk, ParseError, Patch, PatchStats};
pub use rollback::{Backup, BackupHandle, BackupManager, RollbackError};
pub use validator::{DiffValidator, FindingReason, ValidationFinding, ValidationResult};
