// crates/patch-warden-core/src/runtime/patch.rs
// ============================================================================
// Module: Patch Safety
// Description: Unified-diff parsing and per-file safety checks.
// Purpose: Enumerate every path a diff touches before the Gate signs off.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The parser recognizes git-style unified diffs: `diff --git` records,
//! extended headers (modes, renames), `---`/`+++` file lines, and full hunk
//! bodies. Binary patches are rejected outright, and every file record is
//! held to a caller-supplied per-file added-byte budget as it completes.
//! Hunk content is retained so the controller's applier shares this single
//! grammar instead of parsing twice.
//!
//! Security posture: diff text is proposer-controlled and untrusted; every
//! structural irregularity is a typed error, never a best-effort guess.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Typed patch safety failures.
///
/// # Invariants
/// - Variants are stable; the Gate maps them onto decision reasons.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    /// A file record ended before its headers completed.
    #[error("unterminated file header at line {0}")]
    UnterminatedHeader(usize),
    /// A file path lacked the required `a/` or `b/` prefix.
    #[error("missing a/ or b/ prefix at line {0}")]
    MissingPrefix(usize),
    /// The diff contains a binary patch.
    #[error("binary patch at line {0}")]
    BinaryPatch(usize),
    /// A file mode outside the permitted set, or an executable bit
    /// introduced on a created file.
    #[error("bad file mode {mode} at line {line}")]
    BadMode {
        /// Offending mode string.
        mode: String,
        /// 1-based source line.
        line: usize,
    },
    /// A hunk header or body did not match its declared counts.
    #[error("malformed hunk at line {0}")]
    MalformedHunk(usize),
    /// One file record adds more bytes than the per-file budget permits.
    #[error("{path} adds {bytes} bytes (limit {limit})")]
    BudgetExceeded {
        /// Workspace-relative target path.
        path: String,
        /// Bytes the record would add.
        bytes: usize,
        /// Per-file budget in bytes.
        limit: usize,
    },
    /// `/dev/null` appeared for a new file without a `new file mode` header.
    #[error("/dev/null without new file mode at line {0}")]
    DevNullWithoutNewFile(usize),
    /// The diff contains no file records.
    #[error("patch contains no file records")]
    Empty,
}

// ============================================================================
// SECTION: Parsed Model
// ============================================================================

/// File-level operation described by a diff record.
///
/// # Invariants
/// - Variants are stable for gate checks and the applier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOp {
    /// Modify an existing file in place.
    Modify,
    /// Create a new file.
    Create,
    /// Delete an existing file.
    Delete,
    /// Rename a file, optionally with content hunks.
    Rename {
        /// Source path of the rename.
        from: String,
    },
}

/// One line within a hunk body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchLine {
    /// Unchanged context line.
    Context(String),
    /// Line added by the patch.
    Add(String),
    /// Line removed by the patch.
    Remove(String),
}

/// One hunk with its declared ranges and body.
///
/// # Invariants
/// - Line counts match the declared `old_len`/`new_len` exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 1-based first line of the old range.
    pub old_start: u64,
    /// Old-side line count.
    pub old_len: u64,
    /// 1-based first line of the new range.
    pub new_start: u64,
    /// New-side line count.
    pub new_len: u64,
    /// Hunk body in order.
    pub lines: Vec<PatchLine>,
}

/// One file record of a parsed diff.
///
/// # Invariants
/// - `path` is the post-image path (pre-image path for deletes).
/// - Modes, when present, are members of the permitted set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    /// Target path with the `a/`/`b/` prefix stripped.
    pub path: String,
    /// File-level operation.
    pub op: PatchOp,
    /// Declared mode for created files.
    pub new_file_mode: Option<String>,
    /// Hunks in order; may be empty for pure renames and deletes.
    pub hunks: Vec<Hunk>,
}

impl FilePatch {
    /// Returns the bytes this record adds, counting line terminators.
    #[must_use]
    pub fn added_bytes(&self) -> usize {
        let mut total = 0;
        for hunk in &self.hunks {
            for line in &hunk.lines {
                if let PatchLine::Add(text) = line {
                    total += text.len() + 1;
                }
            }
        }
        total
    }
}

/// A fully parsed unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPatch {
    /// File records in order of appearance.
    pub files: Vec<FilePatch>,
}

impl ParsedPatch {
    /// Returns every path the diff would touch (old, new, rename sources).
    #[must_use]
    pub fn touched_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        for file in &self.files {
            paths.push(file.path.as_str());
            if let PatchOp::Rename { from } = &file.op {
                paths.push(from.as_str());
            }
        }
        paths
    }

    /// Returns the total bytes added by the diff, counting line terminators.
    #[must_use]
    pub fn added_bytes(&self) -> usize {
        self.files.iter().map(FilePatch::added_bytes).sum()
    }
}

// ============================================================================
// SECTION: Mode Rules
// ============================================================================

/// Modes a diff may declare at all.
const PERMITTED_MODES: &[&str] = &["100644", "100755"];

/// Validates a declared mode, rejecting executable creation when `creating`.
fn check_mode(mode: &str, creating: bool, line: usize) -> Result<(), PatchError> {
    if !PERMITTED_MODES.contains(&mode) {
        return Err(PatchError::BadMode {
            mode: mode.to_string(),
            line,
        });
    }
    if creating && mode == "100755" {
        return Err(PatchError::BadMode {
            mode: mode.to_string(),
            line,
        });
    }
    Ok(())
}

// ============================================================================
// SECTION: Header Helpers
// ============================================================================

/// Strips a required `a/` or `b/` prefix from a diff path.
fn strip_prefix<'a>(path: &'a str, prefix: &str, line: usize) -> Result<&'a str, PatchError> {
    path.strip_prefix(prefix).ok_or(PatchError::MissingPrefix(line))
}

/// Parses the `diff --git a/<old> b/<new>` header into both paths.
fn parse_git_header(rest: &str, line: usize) -> Result<(String, String), PatchError> {
    // Paths with spaces are not produced by the proposer toolchain; a split
    // at the " b/" boundary keeps the grammar unambiguous.
    let old_start = rest.strip_prefix("a/").ok_or(PatchError::MissingPrefix(line))?;
    let Some(split_at) = old_start.find(" b/") else {
        return Err(PatchError::MissingPrefix(line));
    };
    let old_path = &old_start[..split_at];
    let new_path = &old_start[split_at + " b/".len()..];
    if old_path.is_empty() || new_path.is_empty() {
        return Err(PatchError::MissingPrefix(line));
    }
    Ok((old_path.to_string(), new_path.to_string()))
}

/// Parses one side of a hunk range (`start[,len]`).
fn parse_range(range: &str, line: usize) -> Result<(u64, u64), PatchError> {
    let (start, len) = match range.split_once(',') {
        Some((start, len)) => (start, len),
        None => (range, "1"),
    };
    let start = start.parse::<u64>().map_err(|_| PatchError::MalformedHunk(line))?;
    let len = len.parse::<u64>().map_err(|_| PatchError::MalformedHunk(line))?;
    Ok((start, len))
}

/// Parses a `@@ -a[,b] +c[,d] @@` hunk header.
fn parse_hunk_header(text: &str, line: usize) -> Result<(u64, u64, u64, u64), PatchError> {
    let body = text
        .strip_prefix("@@ -")
        .and_then(|rest| rest.split_once(" @@").map(|(ranges, _)| ranges))
        .ok_or(PatchError::MalformedHunk(line))?;
    let Some((old_range, new_range)) = body.split_once(" +") else {
        return Err(PatchError::MalformedHunk(line));
    };
    let (old_start, old_len) = parse_range(old_range, line)?;
    let (new_start, new_len) = parse_range(new_range, line)?;
    Ok((old_start, old_len, new_start, new_len))
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Internal per-record parse state.
struct RecordState {
    /// Old path from the `diff --git` header.
    old_path: String,
    /// New path from the `diff --git` header.
    new_path: String,
    /// Operation inferred from extended headers.
    op: PatchOp,
    /// Declared mode for created files.
    new_file_mode: Option<String>,
    /// Whether a `---`/`+++` pair or a pure rename/delete completed.
    terminated: bool,
    /// 1-based line where the record started.
    start_line: usize,
}

/// Parses unified-diff text into a [`ParsedPatch`], enforcing a per-file
/// added-byte budget.
///
/// # Errors
///
/// Returns a [`PatchError`] on any structural irregularity (binary content,
/// missing prefixes, bad modes, malformed hunks, truncated headers) or when
/// one file record adds more than `per_file_limit` bytes.
pub fn parse_patch(diff: &str, per_file_limit: usize) -> Result<ParsedPatch, PatchError> {
    let lines: Vec<&str> = diff.lines().collect();
    let mut files: Vec<FilePatch> = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        let line_no = index + 1;
        let line = lines[index];
        if line.starts_with("Binary files ") && line.ends_with(" differ") {
            return Err(PatchError::BinaryPatch(line_no));
        }
        let Some(rest) = line.strip_prefix("diff --git ") else {
            index += 1;
            continue;
        };
        let (old_path, new_path) = parse_git_header(rest, line_no)?;
        let mut state = RecordState {
            old_path,
            new_path,
            op: PatchOp::Modify,
            new_file_mode: None,
            terminated: false,
            start_line: line_no,
        };
        index += 1;
        index = parse_record(&lines, index, &mut state, &mut files, per_file_limit)?;
        if !state.terminated {
            return Err(PatchError::UnterminatedHeader(state.start_line));
        }
    }

    if files.is_empty() {
        return Err(PatchError::Empty);
    }
    Ok(ParsedPatch {
        files,
    })
}

/// Parses one file record's extended headers, file lines, and hunks.
///
/// Returns the index of the first line after the record.
fn parse_record(
    lines: &[&str],
    mut index: usize,
    state: &mut RecordState,
    files: &mut Vec<FilePatch>,
    per_file_limit: usize,
) -> Result<usize, PatchError> {
    let mut rename_from: Option<String> = None;
    let mut rename_to: Option<String> = None;

    // Extended headers.
    while index < lines.len() {
        let line_no = index + 1;
        let line = lines[index];
        if line.starts_with("diff --git ") {
            break;
        }
        if line == "GIT binary patch"
            || (line.starts_with("Binary files ") && line.ends_with(" differ"))
        {
            return Err(PatchError::BinaryPatch(line_no));
        }
        if let Some(mode) = line.strip_prefix("new file mode ") {
            check_mode(mode, true, line_no)?;
            state.op = PatchOp::Create;
            state.new_file_mode = Some(mode.to_string());
        } else if let Some(mode) = line.strip_prefix("deleted file mode ") {
            check_mode(mode, false, line_no)?;
            state.op = PatchOp::Delete;
        } else if let Some(mode) = line.strip_prefix("old mode ") {
            check_mode(mode, false, line_no)?;
        } else if let Some(mode) = line.strip_prefix("new mode ") {
            // A mode change TO 100755 introduces an executable bit.
            check_mode(mode, true, line_no)?;
        } else if let Some(path) = line.strip_prefix("rename from ") {
            rename_from = Some(path.to_string());
        } else if let Some(path) = line.strip_prefix("rename to ") {
            rename_to = Some(path.to_string());
        } else if line.starts_with("similarity index ")
            || line.starts_with("dissimilarity index ")
            || line.starts_with("index ")
        {
            // Informational headers carry no safety signal.
        } else if line.starts_with("--- ") {
            break;
        } else {
            return Err(PatchError::UnterminatedHeader(state.start_line));
        }
        index += 1;
    }

    if let (Some(from), Some(_to)) = (rename_from.as_ref(), rename_to.as_ref()) {
        state.op = PatchOp::Rename {
            from: from.clone(),
        };
        // A pure rename record is complete without file lines.
        state.terminated = true;
    }

    // File lines plus hunks, when present.
    let mut hunks: Vec<Hunk> = Vec::new();
    if index < lines.len() && lines[index].starts_with("--- ") {
        index = parse_file_lines(lines, index, state)?;
        while index < lines.len() && lines[index].starts_with("@@ ") {
            let (next, hunk) = parse_hunk(lines, index)?;
            hunks.push(hunk);
            index = next;
        }
        state.terminated = true;
    }

    let path = match &state.op {
        PatchOp::Delete => state.old_path.clone(),
        PatchOp::Modify | PatchOp::Create | PatchOp::Rename { .. } => state.new_path.clone(),
    };
    if state.terminated {
        let file = FilePatch {
            path,
            op: state.op.clone(),
            new_file_mode: state.new_file_mode.clone(),
            hunks,
        };
        let added = file.added_bytes();
        if added > per_file_limit {
            return Err(PatchError::BudgetExceeded {
                path: file.path,
                bytes: added,
                limit: per_file_limit,
            });
        }
        files.push(file);
    }
    Ok(index)
}

/// Parses the `---`/`+++` pair, enforcing prefix and `/dev/null` rules.
fn parse_file_lines(
    lines: &[&str],
    mut index: usize,
    state: &mut RecordState,
) -> Result<usize, PatchError> {
    let line_no = index + 1;
    let old_line = lines[index]
        .strip_prefix("--- ")
        .ok_or(PatchError::UnterminatedHeader(state.start_line))?;
    if old_line == "/dev/null" {
        if !matches!(state.op, PatchOp::Create) {
            return Err(PatchError::DevNullWithoutNewFile(line_no));
        }
    } else {
        let old_path = strip_prefix(old_line, "a/", line_no)?;
        state.old_path = old_path.to_string();
    }
    index += 1;

    let line_no = index + 1;
    let new_line = lines
        .get(index)
        .and_then(|line| line.strip_prefix("+++ "))
        .ok_or(PatchError::UnterminatedHeader(state.start_line))?;
    if new_line == "/dev/null" {
        state.op = PatchOp::Delete;
    } else {
        let new_path = strip_prefix(new_line, "b/", line_no)?;
        state.new_path = new_path.to_string();
    }
    index += 1;
    Ok(index)
}

/// Parses one hunk header and its body, verifying declared counts.
fn parse_hunk(lines: &[&str], mut index: usize) -> Result<(usize, Hunk), PatchError> {
    let header_line = index + 1;
    let (old_start, old_len, new_start, new_len) = parse_hunk_header(lines[index], header_line)?;
    index += 1;

    let mut body: Vec<PatchLine> = Vec::new();
    let mut old_seen: u64 = 0;
    let mut new_seen: u64 = 0;
    while old_seen < old_len || new_seen < new_len {
        let line_no = index + 1;
        let Some(line) = lines.get(index) else {
            return Err(PatchError::MalformedHunk(header_line));
        };
        if let Some(text) = line.strip_prefix('+') {
            new_seen += 1;
            body.push(PatchLine::Add(text.to_string()));
        } else if let Some(text) = line.strip_prefix('-') {
            old_seen += 1;
            body.push(PatchLine::Remove(text.to_string()));
        } else if let Some(text) = line.strip_prefix(' ') {
            old_seen += 1;
            new_seen += 1;
            body.push(PatchLine::Context(text.to_string()));
        } else if line.is_empty() {
            // Some tools emit empty context lines with the marker stripped.
            old_seen += 1;
            new_seen += 1;
            body.push(PatchLine::Context(String::new()));
        } else if line.starts_with('\\') {
            // "\ No newline at end of file" does not count toward ranges.
        } else {
            return Err(PatchError::MalformedHunk(line_no));
        }
        if old_seen > old_len || new_seen > new_len {
            return Err(PatchError::MalformedHunk(header_line));
        }
        index += 1;
    }
    // A trailing no-newline marker belongs to this hunk.
    if index < lines.len() && lines[index].starts_with('\\') {
        index += 1;
    }

    Ok((index, Hunk {
        old_start,
        old_len,
        new_start,
        new_len,
        lines: body,
    }))
}
