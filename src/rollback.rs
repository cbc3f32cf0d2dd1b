//! Snapshot and restore for patched documents
//!
//! The manager keeps at most one snapshot per target. Taking a new snapshot
//! for a target replaces the previous one, which invalidates any handle
//! still pointing at it.

use crate::document::Document;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RollbackError {
    #[error("no snapshot held for target '{target}'")]
    UnknownTarget { target: String },

    #[error("snapshot {id} for target '{target}' was replaced or discarded")]
    StaleHandle { target: String, id: u64 },
}

/// A retained pre-patch copy of a document.
#[derive(Debug, Clone, Serialize)]
pub struct Backup {
    document: Document,
    created_at: DateTime<Utc>,
    operation: String,
    id: u64,
}

impl Backup {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

/// Proof of a specific snapshot. Restoring or discarding consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    target: String,
    id: u64,
}

impl BackupHandle {
    pub fn target(&self) -> &str {
        &self.target
    }
}

#[derive(Debug, Default)]
pub struct BackupManager {
    snapshots: HashMap<String, Backup>,
    next_id: u64,
}

impl BackupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `document` as the rollback point for `target`.
    ///
    /// Replaces any snapshot already held for the target; the old handle
    /// becomes stale.
    pub fn snapshot(&mut self, target: &str, document: &Document, operation: &str) -> BackupHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.snapshots.insert(
            target.to_string(),
            Backup {
                document: document.clone(),
                created_at: Utc::now(),
                operation: operation.to_string(),
                id,
            },
        );
        debug!(target_name = target, operation, id, "snapshot taken");
        BackupHandle {
            target: target.to_string(),
            id,
        }
    }

    /// Return the snapshotted document and release it.
    pub fn restore(&mut self, handle: BackupHandle) -> Result<Document, RollbackError> {
        match self.snapshots.entry(handle.target) {
            Entry::Vacant(entry) => Err(RollbackError::UnknownTarget {
                target: entry.into_key(),
            }),
            Entry::Occupied(entry) if entry.get().id != handle.id => {
                Err(RollbackError::StaleHandle {
                    target: entry.key().clone(),
                    id: handle.id,
                })
            }
            Entry::Occupied(entry) => {
                debug!(target_name = entry.key().as_str(), id = handle.id, "snapshot restored");
                Ok(entry.remove().document)
            }
        }
    }

    /// Drop the snapshot the handle points at, keeping the patched state.
    ///
    /// Returns whether anything was released; a stale or unknown handle is
    /// not an error here since the outcome the caller wanted already holds.
    pub fn discard(&mut self, handle: BackupHandle) -> bool {
        match self.snapshots.get(&handle.target) {
            Some(backup) if backup.id == handle.id => {
                self.snapshots.remove(&handle.target);
                debug!(target_name = handle.target.as_str(), id = handle.id, "snapshot discarded");
                true
            }
            _ => false,
        }
    }

    /// Whether any snapshot is currently held for `target`.
    pub fn holds(&self, target: &str) -> bool {
        self.snapshots.contains_key(target)
    }

    /// Inspect the snapshot held for `target`, if any.
    pub fn backup(&self, target: &str) -> Option<&Backup> {
        self.snapshots.get(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(lines: &[&str]) -> Document {
        Document::from_lines(lines.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_restore_returns_exact_snapshot() {
        let mut manager = BackupManager::new();
        let original = doc(&["a", "b"]).with_trailing_newline(false);
        let handle = manager.snapshot("index.html", &original, "apply");

        let restored = manager.restore(handle).unwrap();
        assert_eq!(restored, original);
        assert!(!manager.holds("index.html"));
    }

    #[test]
    fn test_restore_twice_fails() {
        let mut manager = BackupManager::new();
        let handle = manager.snapshot("t", &doc(&["x"]), "apply");
        let second = handle.clone();

        manager.restore(handle).unwrap();
        assert_eq!(
            manager.restore(second),
            Err(RollbackError::UnknownTarget {
                target: "t".to_string()
            })
        );
    }

    #[test]
    fn test_discard_releases_snapshot() {
        let mut manager = BackupManager::new();
        let handle = manager.snapshot("t", &doc(&["x"]), "apply");
        let copy = handle.clone();

        assert!(manager.discard(handle));
        assert!(!manager.holds("t"));
        assert!(!manager.discard(copy));
    }

    #[test]
    fn test_new_snapshot_invalidates_old_handle() {
        let mut manager = BackupManager::new();
        let first = doc(&["v1"]);
        let second = doc(&["v2"]);

        let old_handle = manager.snapshot("t", &first, "apply");
        let new_handle = manager.snapshot("t", &second, "apply");

        assert_eq!(
            manager.restore(old_handle),
            Err(RollbackError::StaleHandle {
                target: "t".to_string(),
                id: 0
            })
        );
        // The replacement is still intact.
        let restored = manager.restore(new_handle).unwrap();
        assert!(restored.same_lines(&second));
    }

    #[test]
    fn test_targets_are_independent() {
        let mut manager = BackupManager::new();
        let a = manager.snapshot("a.html", &doc(&["a"]), "apply");
        let b = manager.snapshot("b.html", &doc(&["b"]), "apply");

        manager.restore(a).unwrap();
        assert!(manager.holds("b.html"));
        assert!(manager.restore(b).is_ok());
    }

    #[test]
    fn test_backup_metadata() {
        let mut manager = BackupManager::new();
        manager.snapshot("t", &doc(&["x"]), "apply-patch-3");

        let backup = manager.backup("t").unwrap();
        assert_eq!(backup.operation(), "apply-patch-3");
        assert_eq!(backup.document().lines(), ["x"]);
    }
}
