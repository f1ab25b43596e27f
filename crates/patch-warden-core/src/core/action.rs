// crates/patch-warden-core/src/core/action.rs
// ============================================================================
// Module: Proposed Actions
// Description: Closed tagged variant set of actions a proposer may request.
// Purpose: Keep every approvable action enumerable by a safety reviewer.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! `Action` is a closed tagged enum. The Gate dispatches over it by explicit
//! case analysis; an action kind that does not appear here cannot be
//! deserialized, proposed, or approved. Paths are workspace-relative strings;
//! confinement is enforced by the Gate and re-checked by the Controller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum number of actions in one proposal.
pub const MAX_PROPOSAL_ACTIONS: usize = 64;
/// Maximum total proposed write bytes per proposal (writes plus patch adds).
pub const MAX_TOTAL_WRITE_BYTES: usize = 2 * 1024 * 1024;
/// Maximum bytes any single file may gain, whether written whole by
/// `write_file` or added by one file record of a unified diff.
pub const MAX_FILE_WRITE_BYTES: usize = 512 * 1024;
/// Maximum byte length of any referenced path.
pub const MAX_PATH_BYTES: usize = 4096;
/// Maximum byte length of a pytest node-id token.
pub const MAX_TEST_NODE_ID_BYTES: usize = 256;

// ============================================================================
// SECTION: Action Kinds
// ============================================================================

/// Stable labels for action variants, used in execution results and ledger
/// payloads.
///
/// # Invariants
/// - Variants are stable for serialization and replay schema checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Read a text file within the workspace.
    ReadFile,
    /// Create or overwrite a text file within the workspace.
    WriteFile,
    /// Apply a unified diff through the controlled applier.
    ApplyPatch,
    /// Invoke the allowlisted test command.
    RunTests,
    /// Produce a read-only diff of the working tree against HEAD.
    GitDiff,
    /// Bounded read-only literal search.
    Grep,
}

impl ActionKind {
    /// Returns the stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadFile => "read_file",
            Self::WriteFile => "write_file",
            Self::ApplyPatch => "apply_patch",
            Self::RunTests => "run_tests",
            Self::GitDiff => "git_diff",
            Self::Grep => "grep",
        }
    }
}

// ============================================================================
// SECTION: Actions
// ============================================================================

/// One proposed action against the workspace.
///
/// # Invariants
/// - The variant set is closed; the Gate enumerates every case explicitly.
/// - Paths are workspace-relative and validated before approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Read a text file within the workspace.
    ReadFile {
        /// Workspace-relative path to read.
        path: String,
    },
    /// Create or overwrite a text file within the workspace.
    WriteFile {
        /// Workspace-relative path to write.
        path: String,
        /// Full replacement content.
        content: String,
    },
    /// Apply a unified diff through the controlled applier.
    ApplyPatch {
        /// Unified diff text (git-style `a/`/`b/` prefixes required).
        unified_diff: String,
    },
    /// Invoke the allowlisted test command.
    RunTests {
        /// Exact argv; only allowlisted forms pass the Gate.
        argv: Vec<String>,
    },
    /// Produce a diff of the working tree against HEAD (read-only).
    GitDiff {
        /// Optional path filters.
        paths: Option<Vec<String>>,
        /// Optional context line count.
        context: Option<u32>,
    },
    /// Bounded read-only literal search.
    Grep {
        /// Literal pattern to search for.
        pattern: String,
        /// Optional path filters.
        paths: Option<Vec<String>>,
    },
}

impl Action {
    /// Returns the kind label for this action.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::ReadFile { .. } => ActionKind::ReadFile,
            Self::WriteFile { .. } => ActionKind::WriteFile,
            Self::ApplyPatch { .. } => ActionKind::ApplyPatch,
            Self::RunTests { .. } => ActionKind::RunTests,
            Self::GitDiff { .. } => ActionKind::GitDiff,
            Self::Grep { .. } => ActionKind::Grep,
        }
    }

    /// Returns true when the action can mutate the workspace.
    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        matches!(self, Self::WriteFile { .. } | Self::ApplyPatch { .. })
    }

    /// Returns the directly referenced paths of this action.
    ///
    /// Paths touched by a unified diff are enumerated by the patch safety
    /// parser, not here.
    #[must_use]
    pub fn referenced_paths(&self) -> Vec<&str> {
        match self {
            Self::ReadFile { path } | Self::WriteFile { path, .. } => vec![path.as_str()],
            Self::GitDiff { paths, .. } | Self::Grep { paths, .. } => paths
                .as_ref()
                .map(|list| list.iter().map(String::as_str).collect())
                .unwrap_or_default(),
            Self::ApplyPatch { .. } | Self::RunTests { .. } => Vec::new(),
        }
    }
}
