// crates/patch-warden-core/src/runtime/gate.rs
// ============================================================================
// Module: The Gate
// Description: Pure validator turning (snapshot, proposal) into a signed decision.
// Purpose: Enumerate and enforce every rule that can approve an action.
// Dependencies: serde, crate::core, crate::runtime::{patch, pathcheck}
// ============================================================================

//! ## Overview
//! The Gate is a deterministic validator: no clocks, no randomness, no
//! writes. For a fixed `(snapshot, proposal, kernel_version,
//! ruleset_version)` and workspace state it returns byte-identical decisions.
//! Every anomalous input becomes a denial with a closed-enumeration reason;
//! the Gate never errors. Map iteration cannot leak into the output: hashed
//! composites are canonicalized (sorted keys) and rule evaluation walks
//! actions in declared order only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;

use crate::core::action::Action;
use crate::core::action::MAX_FILE_WRITE_BYTES;
use crate::core::action::MAX_PROPOSAL_ACTIONS;
use crate::core::action::MAX_TEST_NODE_ID_BYTES;
use crate::core::action::MAX_TOTAL_WRITE_BYTES;
use crate::core::decision::Decision;
use crate::core::decision::DecisionReason;
use crate::core::hashing;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashDigest;
use crate::core::proposal::Proposal;
use crate::core::signature;
use crate::core::signature::KernelKey;
use crate::core::snapshot::StateSnapshot;
use crate::core::version::KERNEL_VERSION;
use crate::core::version::RULESET_VERSION;
use crate::runtime::patch;
use crate::runtime::patch::PatchError;
use crate::runtime::pathcheck;
use crate::runtime::pathcheck::PathCheckError;

// ============================================================================
// SECTION: Test Command Allowlist
// ============================================================================

/// Exact argv prefixes permitted for `run_tests`.
const ALLOWED_TEST_PREFIXES: &[&[&str]] = &[&["pytest", "-q"], &["python", "-m", "pytest", "-q"]];

/// Returns true when a trailing token is a safe pytest node-id.
fn is_test_node_id(token: &str) -> bool {
    if token.is_empty() || token.len() > MAX_TEST_NODE_ID_BYTES {
        return false;
    }
    if token.starts_with('-') || token.contains("..") {
        return false;
    }
    token
        .bytes()
        .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'.' | b'/' | b':' | b'-'))
}

/// Returns true when argv exactly matches an allowlisted form.
fn is_allowed_test_argv(argv: &[String]) -> bool {
    for prefix in ALLOWED_TEST_PREFIXES {
        if argv.len() < prefix.len() {
            continue;
        }
        let head_matches =
            argv.iter().zip(prefix.iter()).all(|(given, expected)| given == expected);
        if !head_matches {
            continue;
        }
        return argv[prefix.len()..].iter().all(|token| is_test_node_id(token));
    }
    false
}

// ============================================================================
// SECTION: Input Hashing
// ============================================================================

/// Canonical composite hashed into `Decision.input_hash`.
///
/// # Invariants
/// - Field set matches the replay verifier's reconstruction exactly.
#[derive(Serialize)]
struct GateInput<'a> {
    /// Compile-time kernel version.
    kernel_version: &'static str,
    /// Compile-time ruleset version.
    ruleset_version: &'static str,
    /// Workspace root as a UTF-8 string (lossy for exotic platforms).
    workspace_root: String,
    /// Caller notes from the snapshot.
    notes: &'a BTreeMap<String, String>,
    /// The full proposal.
    proposal: &'a Proposal,
}

/// Hashes the gate input composite.
///
/// The composite contains only strings, maps, and integers, so
/// canonicalization cannot fail; an empty digest would indicate a serde bug
/// and still yields a deterministic value.
fn input_hash(snapshot: &StateSnapshot, proposal: &Proposal) -> HashDigest {
    let composite = GateInput {
        kernel_version: KERNEL_VERSION,
        ruleset_version: RULESET_VERSION,
        workspace_root: snapshot.workspace_root.to_string_lossy().into_owned(),
        notes: &snapshot.notes,
        proposal,
    };
    let bytes = hashing::canonical_json_bytes(&composite).unwrap_or_default();
    hashing::hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes)
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// The pure proposal validator.
///
/// # Invariants
/// - `evaluate` has no side effects beyond read-only path resolution.
/// - The same inputs against the same workspace state produce byte-identical
///   decisions.
#[derive(Debug, Clone)]
pub struct Gate {
    /// Process-scoped signing key, read once at startup.
    key: KernelKey,
}

impl Gate {
    /// Creates a gate bound to the kernel signing key.
    #[must_use]
    pub const fn new(key: KernelKey) -> Self {
        Self {
            key,
        }
    }

    /// Validates a proposal and returns a signed decision.
    ///
    /// The Gate never errors: every anomalous input becomes a denial with an
    /// enumerated reason.
    #[must_use]
    pub fn evaluate(&self, snapshot: &StateSnapshot, proposal: &Proposal) -> Decision {
        let input_hash = input_hash(snapshot, proposal);
        let verdict = check_rules(snapshot, proposal);
        let (allowed, reason) = match verdict {
            Ok(()) => (true, DecisionReason::Ok),
            Err(reason) => (false, reason),
        };
        let approved_actions = if allowed { proposal.actions.clone() } else { Vec::new() };
        let tag = signature::sign_decision(&self.key, &input_hash, allowed, reason, &approved_actions);
        Decision {
            allowed,
            reason,
            approved_actions,
            input_hash,
            signature: tag,
        }
    }
}

// ============================================================================
// SECTION: Rule Evaluation
// ============================================================================

/// Evaluates the full ruleset in a fixed order; the first failure wins.
fn check_rules(snapshot: &StateSnapshot, proposal: &Proposal) -> Result<(), DecisionReason> {
    if proposal.actions.is_empty() {
        return Err(DecisionReason::EmptyProposal);
    }
    if proposal.actions.len() > MAX_PROPOSAL_ACTIONS {
        return Err(DecisionReason::TooManyActions);
    }

    let root = snapshot.workspace_root.as_path();
    let mut write_targets: BTreeSet<&str> = BTreeSet::new();
    let mut total_write_bytes: usize = 0;

    for action in &proposal.actions {
        match action {
            Action::ReadFile { path } => {
                confine_path(root, path)?;
            }
            Action::WriteFile { path, content } => {
                check_nul(content)?;
                confine_path(root, path)?;
                if !write_targets.insert(path.as_str()) {
                    return Err(DecisionReason::DuplicateWrite);
                }
                if content.len() > MAX_FILE_WRITE_BYTES {
                    return Err(DecisionReason::BudgetExceeded);
                }
                total_write_bytes = total_write_bytes.saturating_add(content.len());
            }
            Action::ApplyPatch { unified_diff } => {
                check_nul(unified_diff)?;
                let parsed = patch::parse_patch(unified_diff, MAX_FILE_WRITE_BYTES)
                    .map_err(map_patch_error)?;
                for path in parsed.touched_paths() {
                    confine_path(root, path)?;
                }
                total_write_bytes = total_write_bytes.saturating_add(parsed.added_bytes());
            }
            Action::RunTests { argv } => {
                for token in argv {
                    check_nul(token)?;
                }
                if !is_allowed_test_argv(argv) {
                    return Err(DecisionReason::BadTestArgv);
                }
            }
            Action::GitDiff { paths, .. } => {
                confine_optional_paths(root, paths.as_deref())?;
            }
            Action::Grep { pattern, paths } => {
                check_nul(pattern)?;
                confine_optional_paths(root, paths.as_deref())?;
            }
        }
    }

    if total_write_bytes > MAX_TOTAL_WRITE_BYTES {
        return Err(DecisionReason::BudgetExceeded);
    }
    Ok(())
}

/// Rejects NUL bytes in any proposer-controlled payload string.
fn check_nul(payload: &str) -> Result<(), DecisionReason> {
    if payload.as_bytes().contains(&0) {
        return Err(DecisionReason::NulInPayload);
    }
    Ok(())
}

/// Applies path confinement to one referenced path.
fn confine_path(root: &Path, path: &str) -> Result<(), DecisionReason> {
    pathcheck::confine(root, path).map(|_| ()).map_err(map_path_error)
}

/// Applies path confinement to an optional path list.
fn confine_optional_paths(root: &Path, paths: Option<&[String]>) -> Result<(), DecisionReason> {
    if let Some(paths) = paths {
        for path in paths {
            confine_path(root, path)?;
        }
    }
    Ok(())
}

/// Maps path confinement failures onto decision reasons.
fn map_path_error(error: PathCheckError) -> DecisionReason {
    match error {
        PathCheckError::NulByte => DecisionReason::NulInPayload,
        PathCheckError::BlockedSegment(_) => DecisionReason::BlockedSegment,
        PathCheckError::TooLong | PathCheckError::Escape => DecisionReason::PathEscape,
    }
}

/// Maps patch safety failures onto decision reasons.
fn map_patch_error(error: PatchError) -> DecisionReason {
    match error {
        PatchError::UnterminatedHeader(_)
        | PatchError::MissingPrefix(_)
        | PatchError::BinaryPatch(_)
        | PatchError::BadMode { .. }
        | PatchError::MalformedHunk(_)
        | PatchError::DevNullWithoutNewFile(_)
        | PatchError::Empty => DecisionReason::PatchParseError,
        PatchError::BudgetExceeded { .. } => DecisionReason::BudgetExceeded,
    }
}
