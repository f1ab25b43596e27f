// crates/patch-warden-controller/src/fsops.rs
// ============================================================================
// Module: Confined Filesystem Operations
// Description: Bounded reads, atomic writes, bounded search, read-only diff.
// Purpose: Keep every workspace touch confined, capped, and atomic.
// Dependencies: std, tempfile, patch-warden-core, crate::subprocess
// ============================================================================

//! ## Overview
//! Writes go to a temp file in the destination directory and are atomically
//! renamed into place, so a crash mid-write never leaves a torn file. Reads
//! and searches are byte-capped with the standard truncation marker. The
//! `git diff` helper is the single read-only subprocess this module spawns;
//! it sees the working tree, not the index.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use patch_warden_core::MAX_STREAM_CAPTURE_BYTES;
use patch_warden_core::TRUNCATION_MARKER;
use patch_warden_core::runtime::pathcheck;
use tempfile::NamedTempFile;

use crate::subprocess;
use crate::subprocess::CommandOutcome;
use crate::subprocess::SpawnError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum matched lines a grep action may return.
const MAX_GREP_MATCHES: usize = 4_096;
/// Bytes probed when deciding whether a file is binary.
const BINARY_PROBE_BYTES: usize = 4_096;

// ============================================================================
// SECTION: Reads
// ============================================================================

/// Reads a file, capping the returned text at the capture limit.
///
/// Returns the rendered text and the total bytes actually read.
///
/// # Errors
///
/// Returns the underlying I/O error when the file cannot be opened or read.
pub fn read_capped(path: &Path) -> std::io::Result<(String, u64)> {
    let mut file = fs::File::open(path)?;
    let mut bytes: Vec<u8> = Vec::new();
    let mut buffer = [0u8; 8192];
    let mut total: u64 = 0;
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        total += u64::try_from(read).unwrap_or(u64::MAX);
        if bytes.len() < MAX_STREAM_CAPTURE_BYTES {
            let take = (MAX_STREAM_CAPTURE_BYTES - bytes.len()).min(read);
            bytes.extend_from_slice(&buffer[..take]);
        }
    }
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if total > u64::try_from(MAX_STREAM_CAPTURE_BYTES).unwrap_or(u64::MAX) {
        text.push_str(TRUNCATION_MARKER);
    }
    Ok((text, total))
}

// ============================================================================
// SECTION: Atomic Writes
// ============================================================================

/// Writes content atomically: temp file in the same directory, then rename.
///
/// Missing parent directories inside the workspace are created first.
///
/// # Errors
///
/// Returns the underlying I/O error when the temp file cannot be created,
/// written, or persisted.
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<u64> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.flush()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(u64::try_from(content.len()).unwrap_or(u64::MAX))
}

// ============================================================================
// SECTION: Bounded Search
// ============================================================================

/// Result of a bounded literal search.
#[derive(Debug, Clone)]
pub struct GrepOutcome {
    /// Rendered `path:line:text` matches, possibly truncated.
    pub rendered: String,
    /// Total bytes read while searching.
    pub bytes_read: u64,
}

/// Runs a bounded literal substring search under the workspace root.
///
/// Files are visited in sorted order for deterministic output; binary files
/// and blocked segments are skipped, and directory symlinks are not
/// followed.
///
/// # Errors
///
/// Returns the underlying I/O error when the tree cannot be walked.
pub fn grep_literal(
    root: &Path,
    pattern: &str,
    paths: Option<&[String]>,
) -> std::io::Result<GrepOutcome> {
    let mut files: Vec<PathBuf> = Vec::new();
    match paths {
        Some(filters) => {
            for filter in filters {
                let Ok(resolved) = pathcheck::confine(root, filter) else {
                    continue;
                };
                if resolved.is_dir() {
                    collect_files(&resolved, &mut files)?;
                } else if resolved.is_file() {
                    files.push(resolved);
                }
            }
        }
        None => collect_files(root, &mut files)?,
    }
    files.sort();

    let mut rendered = String::new();
    let mut bytes_read: u64 = 0;
    let mut matches = 0usize;
    let mut truncated = false;

    'files: for file in &files {
        let Ok(raw) = fs::read(file) else {
            continue;
        };
        bytes_read += u64::try_from(raw.len()).unwrap_or(u64::MAX);
        if raw[..raw.len().min(BINARY_PROBE_BYTES)].contains(&0) {
            continue;
        }
        let text = String::from_utf8_lossy(&raw);
        let display = file.strip_prefix(root).unwrap_or(file).to_string_lossy().into_owned();
        for (line_no, line) in text.lines().enumerate() {
            if !line.contains(pattern) {
                continue;
            }
            let row = format!("{display}:{}:{line}\n", line_no + 1);
            if matches >= MAX_GREP_MATCHES || rendered.len() + row.len() > MAX_STREAM_CAPTURE_BYTES
            {
                truncated = true;
                break 'files;
            }
            rendered.push_str(&row);
            matches += 1;
        }
    }
    if truncated {
        rendered.push_str(TRUNCATION_MARKER);
    }
    Ok(GrepOutcome {
        rendered,
        bytes_read,
    })
}

/// Collects regular files under a directory, skipping blocked segments and
/// symlinked directories.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let name = dir_entry.file_name();
        let name_text = name.to_string_lossy();
        if pathcheck::BLOCKED_SEGMENTS.contains(&name_text.as_ref()) {
            continue;
        }
        let path = dir_entry.path();
        let file_type = dir_entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Read-Only Diff
// ============================================================================

/// Runs `git diff` against the working tree (never the index).
///
/// # Errors
///
/// Returns [`SpawnError`] when git cannot be spawned or its pipes fail.
pub fn git_diff(
    root: &Path,
    paths: Option<&[String]>,
    context: Option<u32>,
    wall: Duration,
    grace: Duration,
) -> Result<CommandOutcome, SpawnError> {
    let mut argv: Vec<String> =
        vec!["git".to_string(), "diff".to_string(), "--no-color".to_string()];
    if let Some(context) = context {
        argv.push(format!("-U{context}"));
    }
    if let Some(paths) = paths {
        argv.push("--".to_string());
        argv.extend(paths.iter().cloned());
    }
    subprocess::run_confined(root, &argv, wall, grace, MAX_STREAM_CAPTURE_BYTES)
}
