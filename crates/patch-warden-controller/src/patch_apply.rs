// crates/patch-warden-controller/src/patch_apply.rs
// ============================================================================
// Module: Patch Application
// Description: In-process unified-diff application with atomic commit.
// Purpose: Apply hunks all-or-nothing; never commit a partial patch.
// Dependencies: patch-warden-core, thiserror, crate::fsops
// ============================================================================

//! ## Overview
//! Application runs in two phases. Phase one is pure: every target file is
//! loaded, every hunk's context and removals are verified against the
//! current bytes, and the replacement contents are staged in memory. Phase
//! two commits the staged contents with atomic per-file renames, rolling
//! back already-committed files on any failure. A context mismatch is a
//! rejection; rejects are never written anywhere.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use patch_warden_core::runtime::patch::FilePatch;
use patch_warden_core::runtime::patch::Hunk;
use patch_warden_core::runtime::patch::ParsedPatch;
use patch_warden_core::runtime::patch::PatchLine;
use patch_warden_core::runtime::patch::PatchOp;
use patch_warden_core::runtime::pathcheck;
use thiserror::Error;

use crate::fsops;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Patch application failures.
///
/// # Invariants
/// - Any error means the workspace is byte-identical to its pre-apply state
///   (phase-two rollback restores committed files best-effort).
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Hunk context or removal did not match the file's current content.
    #[error("context mismatch in {path} near line {line}")]
    ContextMismatch {
        /// Workspace-relative target path.
        path: String,
        /// 1-based line where matching failed.
        line: u64,
    },
    /// A create target already exists, or a modify target is missing.
    #[error("unexpected target state for {path}: {state}")]
    TargetState {
        /// Workspace-relative target path.
        path: String,
        /// Short description of the mismatch.
        state: String,
    },
    /// A path failed execution-time confinement.
    #[error("path refused at apply time: {0}")]
    PathRefused(String),
    /// Filesystem I/O failed during staging or commit.
    #[error("apply I/O error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Stats
// ============================================================================

/// Aggregate outcome of a committed patch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyStats {
    /// Files created, modified, renamed, or deleted.
    pub files_changed: u64,
    /// Bytes written across all committed files.
    pub bytes_written: u64,
    /// Bytes read while verifying contexts.
    pub bytes_read: u64,
}

// ============================================================================
// SECTION: Staged Changes
// ============================================================================

/// One staged filesystem change, ready to commit.
enum StagedChange {
    /// Write `content` to `target`, remembering `previous` for rollback.
    Write {
        /// Resolved destination path.
        target: PathBuf,
        /// New file bytes.
        content: Vec<u8>,
        /// Pre-image bytes, when the file existed.
        previous: Option<Vec<u8>>,
    },
    /// Remove `target`, remembering `previous` for rollback.
    Remove {
        /// Resolved path to delete.
        target: PathBuf,
        /// Pre-image bytes for rollback.
        previous: Vec<u8>,
    },
}

// ============================================================================
// SECTION: Application
// ============================================================================

/// Applies a parsed patch to the workspace atomically.
///
/// # Errors
///
/// Returns [`ApplyError`] when any path is refused, any context mismatches,
/// or the staged commit cannot complete; no partial state survives.
pub fn apply_patch(root: &Path, parsed: &ParsedPatch) -> Result<ApplyStats, ApplyError> {
    let mut staged: Vec<StagedChange> = Vec::new();
    let mut stats = ApplyStats::default();

    for file in &parsed.files {
        stage_file(root, file, &mut staged, &mut stats)?;
    }

    commit(&staged)?;
    stats.files_changed = u64::try_from(staged.len()).unwrap_or(u64::MAX);
    Ok(stats)
}

/// Stages one file record, verifying every hunk against current bytes.
fn stage_file(
    root: &Path,
    file: &FilePatch,
    staged: &mut Vec<StagedChange>,
    stats: &mut ApplyStats,
) -> Result<(), ApplyError> {
    let target = resolve(root, &file.path)?;
    match &file.op {
        PatchOp::Create => {
            if target.exists() {
                return Err(ApplyError::TargetState {
                    path: file.path.clone(),
                    state: "create target already exists".to_string(),
                });
            }
            let content = build_lines(&file.path, &[], &file.hunks)?;
            stats.bytes_written += u64::try_from(content.len()).unwrap_or(u64::MAX);
            staged.push(StagedChange::Write {
                target,
                content,
                previous: None,
            });
        }
        PatchOp::Modify => {
            let previous = load(&file.path, &target)?;
            stats.bytes_read += u64::try_from(previous.len()).unwrap_or(u64::MAX);
            let old_lines = split_lines(&previous);
            let content = build_lines(&file.path, &old_lines, &file.hunks)?;
            stats.bytes_written += u64::try_from(content.len()).unwrap_or(u64::MAX);
            staged.push(StagedChange::Write {
                target,
                content,
                previous: Some(previous),
            });
        }
        PatchOp::Delete => {
            let previous = load(&file.path, &target)?;
            stats.bytes_read += u64::try_from(previous.len()).unwrap_or(u64::MAX);
            staged.push(StagedChange::Remove {
                target,
                previous,
            });
        }
        PatchOp::Rename {
            from,
        } => {
            let source = resolve(root, from)?;
            let previous = load(from, &source)?;
            stats.bytes_read += u64::try_from(previous.len()).unwrap_or(u64::MAX);
            let old_lines = split_lines(&previous);
            let content = build_lines(&file.path, &old_lines, &file.hunks)?;
            stats.bytes_written += u64::try_from(content.len()).unwrap_or(u64::MAX);
            staged.push(StagedChange::Remove {
                target: source,
                previous: previous.clone(),
            });
            staged.push(StagedChange::Write {
                target,
                content,
                previous: None,
            });
        }
    }
    Ok(())
}

/// Resolves a diff path through execution-time confinement.
fn resolve(root: &Path, path: &str) -> Result<PathBuf, ApplyError> {
    pathcheck::confine(root, path).map_err(|err| ApplyError::PathRefused(err.to_string()))
}

/// Loads a file that must exist for the declared operation.
fn load(display: &str, target: &Path) -> Result<Vec<u8>, ApplyError> {
    if !target.is_file() {
        return Err(ApplyError::TargetState {
            path: display.to_string(),
            state: "expected an existing regular file".to_string(),
        });
    }
    fs::read(target).map_err(|err| ApplyError::Io(err.to_string()))
}

// ============================================================================
// SECTION: Hunk Evaluation
// ============================================================================

/// Splits file bytes into lines for hunk matching (lossy UTF-8).
fn split_lines(raw: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(raw);
    text.lines().map(ToString::to_string).collect()
}

/// Rebuilds file content by walking hunks over the old lines.
fn build_lines(display: &str, old_lines: &[String], hunks: &[Hunk]) -> Result<Vec<u8>, ApplyError> {
    let mut output: Vec<String> = Vec::with_capacity(old_lines.len());
    let mut cursor: usize = 0;

    for hunk in hunks {
        // old_start is 1-based; an empty old side anchors after old_start.
        let anchor = if hunk.old_len == 0 {
            usize::try_from(hunk.old_start).unwrap_or(usize::MAX)
        } else {
            usize::try_from(hunk.old_start.saturating_sub(1)).unwrap_or(usize::MAX)
        };
        if anchor < cursor || anchor > old_lines.len() {
            return Err(ApplyError::ContextMismatch {
                path: display.to_string(),
                line: hunk.old_start,
            });
        }
        output.extend_from_slice(&old_lines[cursor..anchor]);
        cursor = anchor;

        for line in &hunk.lines {
            match line {
                PatchLine::Context(expected) => {
                    verify_line(display, old_lines, cursor, expected, hunk)?;
                    output.push(expected.clone());
                    cursor += 1;
                }
                PatchLine::Remove(expected) => {
                    verify_line(display, old_lines, cursor, expected, hunk)?;
                    cursor += 1;
                }
                PatchLine::Add(text) => {
                    output.push(text.clone());
                }
            }
        }
    }
    output.extend_from_slice(&old_lines[cursor..]);

    let mut bytes = output.join("\n").into_bytes();
    if !bytes.is_empty() {
        bytes.push(b'\n');
    }
    Ok(bytes)
}

/// Verifies one expected old-side line at the cursor.
fn verify_line(
    display: &str,
    old_lines: &[String],
    cursor: usize,
    expected: &str,
    hunk: &Hunk,
) -> Result<(), ApplyError> {
    if old_lines.get(cursor).map(String::as_str) != Some(expected) {
        return Err(ApplyError::ContextMismatch {
            path: display.to_string(),
            line: hunk.old_start + u64::try_from(cursor).unwrap_or(0),
        });
    }
    Ok(())
}

// ============================================================================
// SECTION: Commit and Rollback
// ============================================================================

/// Commits staged changes; on failure, restores what was already committed.
fn commit(staged: &[StagedChange]) -> Result<(), ApplyError> {
    let mut committed: usize = 0;
    let mut failure: Option<String> = None;

    for change in staged {
        let result = match change {
            StagedChange::Write {
                target,
                content,
                ..
            } => fsops::write_atomic(target, content).map(|_| ()),
            StagedChange::Remove {
                target, ..
            } => fs::remove_file(target),
        };
        match result {
            Ok(()) => committed += 1,
            Err(err) => {
                failure = Some(err.to_string());
                break;
            }
        }
    }

    let Some(message) = failure else {
        return Ok(());
    };
    for change in staged.iter().take(committed).rev() {
        match change {
            StagedChange::Write {
                target,
                previous,
                ..
            } => match previous {
                Some(bytes) => {
                    let _ = fsops::write_atomic(target, bytes);
                }
                None => {
                    let _ = fs::remove_file(target);
                }
            },
            StagedChange::Remove {
                target,
                previous,
            } => {
                let _ = fsops::write_atomic(target, previous);
            }
        }
    }
    Err(ApplyError::Io(message))
}
