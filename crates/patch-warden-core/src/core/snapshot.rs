// crates/patch-warden-core/src/core/snapshot.rs
// ============================================================================
// Module: State Snapshots
// Description: The workspace context visible to the Gate.
// Purpose: Capture per-episode inputs immutably for hashing and replay.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`StateSnapshot`] is created by the caller once per episode and never
//! mutated. `notes` carry opaque caller context: they are hashed into ledger
//! entries for auditability but never influence gate verdicts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Workspace context visible to the Gate.
///
/// # Invariants
/// - `workspace_root` is an absolute, already-resolved real path.
/// - `notes` are sorted (`BTreeMap`) so canonical hashing is order-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Absolute real path of the confinement root.
    pub workspace_root: PathBuf,
    /// Opaque caller notes; hashed, never interpreted.
    pub notes: BTreeMap<String, String>,
}

impl StateSnapshot {
    /// Creates a snapshot with no notes.
    #[must_use]
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            workspace_root,
            notes: BTreeMap::new(),
        }
    }

    /// Creates a snapshot with caller notes.
    #[must_use]
    pub const fn with_notes(workspace_root: PathBuf, notes: BTreeMap<String, String>) -> Self {
        Self {
            workspace_root,
            notes,
        }
    }
}
