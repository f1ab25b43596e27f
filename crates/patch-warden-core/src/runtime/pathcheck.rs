// crates/patch-warden-core/src/runtime/pathcheck.rs
// ============================================================================
// Module: Path Confinement
// Description: Lexical path rules plus real-path workspace confinement.
// Purpose: Guarantee every accepted path is a strict descendant of the root.
// Dependencies: std, thiserror
// ============================================================================

//! ## Overview
//! Confinement runs in two layers. The lexical layer is pure: NUL bytes,
//! length, absolute paths, parent traversal, and blocked segments. The
//! resolution layer canonicalizes the deepest existing ancestor of the
//! composed path so a symlink inside the workspace cannot smuggle a target
//! outside it. Both layers fail closed.
//!
//! Blocked patterns such as `/proc/` and device files are covered by the
//! resolution layer: a relative path can only reach them through a symlink,
//! and the canonicalized target then falls outside the workspace root.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::action::MAX_PATH_BYTES;

// ============================================================================
// SECTION: Blocked Segments
// ============================================================================

/// Path segments that are never readable or writable through the kernel.
pub const BLOCKED_SEGMENTS: &[&str] = &[".git", ".ssh"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Path confinement failures.
///
/// # Invariants
/// - Variants are stable; the Gate maps them onto decision reasons.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathCheckError {
    /// Path contains a NUL byte.
    #[error("path contains a NUL byte")]
    NulByte,
    /// Path exceeds the maximum byte length.
    #[error("path exceeds {MAX_PATH_BYTES} bytes")]
    TooLong,
    /// Path resolves outside the workspace root.
    #[error("path resolves outside the workspace")]
    Escape,
    /// Path contains a blocked segment.
    #[error("path contains blocked segment {0}")]
    BlockedSegment(String),
}

// ============================================================================
// SECTION: Lexical Layer
// ============================================================================

/// Applies the pure lexical path rules.
///
/// # Errors
///
/// Returns [`PathCheckError`] for NUL bytes, overlong paths, absolute paths,
/// parent traversal, and blocked segments.
pub fn lexical_check(path: &str) -> Result<(), PathCheckError> {
    if path.as_bytes().contains(&0) {
        return Err(PathCheckError::NulByte);
    }
    if path.len() > MAX_PATH_BYTES {
        return Err(PathCheckError::TooLong);
    }
    if path.is_empty() {
        return Err(PathCheckError::Escape);
    }
    let candidate = Path::new(path);
    for component in candidate.components() {
        match component {
            Component::Normal(segment) => {
                let segment = segment.to_string_lossy();
                if BLOCKED_SEGMENTS.contains(&segment.as_ref()) {
                    return Err(PathCheckError::BlockedSegment(segment.into_owned()));
                }
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PathCheckError::Escape);
            }
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Resolution Layer
// ============================================================================

/// Resolves a lexically valid relative path against the workspace root and
/// requires the real path to be a strict descendant of the root.
///
/// The deepest existing ancestor of the composed path is canonicalized so
/// symlinks are followed; non-existent trailing components (files about to be
/// created) are appended lexically after the check.
///
/// # Errors
///
/// Returns [`PathCheckError::Escape`] when resolution leaves the workspace or
/// the root itself cannot be canonicalized.
pub fn resolve_in_workspace(root: &Path, relative: &str) -> Result<PathBuf, PathCheckError> {
    lexical_check(relative)?;
    let canonical_root = root.canonicalize().map_err(|_| PathCheckError::Escape)?;
    let joined = canonical_root.join(relative);

    let mut existing = joined.clone();
    let mut pending: Vec<std::ffi::OsString> = Vec::new();
    while !existing.exists() {
        let Some(name) = existing.file_name() else {
            return Err(PathCheckError::Escape);
        };
        pending.push(name.to_os_string());
        let Some(parent) = existing.parent() else {
            return Err(PathCheckError::Escape);
        };
        existing = parent.to_path_buf();
    }

    let resolved_base = existing.canonicalize().map_err(|_| PathCheckError::Escape)?;
    if !resolved_base.starts_with(&canonical_root) {
        return Err(PathCheckError::Escape);
    }

    let mut resolved = resolved_base;
    for name in pending.iter().rev() {
        resolved.push(name);
    }
    if resolved == canonical_root {
        return Err(PathCheckError::Escape);
    }
    Ok(resolved)
}

/// Runs both confinement layers for a path referenced by an action.
///
/// # Errors
///
/// Returns the first [`PathCheckError`] either layer reports.
pub fn confine(root: &Path, relative: &str) -> Result<PathBuf, PathCheckError> {
    resolve_in_workspace(root, relative)
}
