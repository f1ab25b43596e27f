// crates/patch-warden-core/src/core/exec.rs
// ============================================================================
// Module: Execution Results
// Description: Per-action outcomes emitted by the Controller.
// Purpose: Record execution facts for the ledger and replay schema checks.
// Dependencies: serde, crate::core::action
// ============================================================================

//! ## Overview
//! One [`ExecResult`] is produced for every approved action, including
//! actions that were never attempted because an earlier action failed hard.
//! Captured streams are truncated at [`MAX_STREAM_CAPTURE_BYTES`] with a
//! trailing [`TRUNCATION_MARKER`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::action::ActionKind;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum captured bytes for each of stdout and stderr.
pub const MAX_STREAM_CAPTURE_BYTES: usize = 1024 * 1024;
/// Marker appended to a stream that was cut at the capture cap.
pub const TRUNCATION_MARKER: &str = "…[TRUNCATED]";

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Execution error kinds recorded per action.
///
/// # Invariants
/// - Variants are stable for ledger payloads and replay schema checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecErrorKind {
    /// Wall-clock cap elapsed; the subprocess was terminated.
    Timeout,
    /// Filesystem or pipe I/O failed.
    IoError,
    /// Patch context mismatch or staged commit failure.
    PatchFailed,
    /// Execution-time confinement re-check refused the write.
    WriteRefused,
    /// The configured test runner is unavailable.
    RunnerUnavailable,
    /// Decision signature did not verify against the live kernel key.
    SignatureInvalid,
    /// Decision input hash was already consumed this episode.
    DecisionReused,
    /// A preceding action failed hard; this action was never attempted.
    NotAttempted,
}

impl ExecErrorKind {
    /// Returns the stable wire label for the error kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::IoError => "io_error",
            Self::PatchFailed => "patch_failed",
            Self::WriteRefused => "write_refused",
            Self::RunnerUnavailable => "runner_unavailable",
            Self::SignatureInvalid => "signature_invalid",
            Self::DecisionReused => "decision_reused",
            Self::NotAttempted => "not_attempted",
        }
    }
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Per-action execution outcome.
///
/// # Invariants
/// - `stdout`/`stderr` are at most [`MAX_STREAM_CAPTURE_BYTES`] plus the
///   truncation marker.
/// - `ok == false` with `error_kind == None` means the action ran but
///   reported failure (a non-zero test exit); any execution fault sets an
///   [`ExecErrorKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    /// Index of the action within the approved sequence.
    pub action_index: u64,
    /// Kind of the executed action.
    pub kind: ActionKind,
    /// Whether the action succeeded.
    pub ok: bool,
    /// Captured stdout (possibly truncated).
    pub stdout: String,
    /// Captured stderr (possibly truncated).
    pub stderr: String,
    /// Bytes read from the workspace by this action.
    pub bytes_read: u64,
    /// Bytes written to the workspace by this action.
    pub bytes_written: u64,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Error kind when the action failed.
    pub error_kind: Option<ExecErrorKind>,
}

impl ExecResult {
    /// Builds the placeholder result for an action skipped after a hard
    /// failure.
    #[must_use]
    pub const fn not_attempted(action_index: u64, kind: ActionKind) -> Self {
        Self {
            action_index,
            kind,
            ok: false,
            stdout: String::new(),
            stderr: String::new(),
            bytes_read: 0,
            bytes_written: 0,
            duration_ms: 0,
            error_kind: Some(ExecErrorKind::NotAttempted),
        }
    }
}
