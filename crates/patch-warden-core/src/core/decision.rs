// crates/patch-warden-core/src/core/decision.rs
// ============================================================================
// Module: Gate Decisions
// Description: Signed allow/deny verdicts over proposals.
// Purpose: Carry the Gate's verdict to the Controller and the ledger.
// Dependencies: serde, crate::core::{action, hashing, signature}
// ============================================================================

//! ## Overview
//! A [`Decision`] is produced by the Gate and consumed at most once by the
//! Controller. When denied, `approved_actions` is empty — partial approvals
//! are not supported, which keeps replay atomic. The `reason` is drawn from a
//! closed enumeration with stable snake_case wire forms.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::action::Action;
use crate::core::hashing::HashDigest;
use crate::core::signature::SignatureTag;

// ============================================================================
// SECTION: Reasons
// ============================================================================

/// Closed enumeration of decision reasons.
///
/// # Invariants
/// - Variants are stable; replay byte-compares decisions including `reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// All rules passed.
    Ok,
    /// Proposal contained no actions.
    EmptyProposal,
    /// Proposal exceeded the action-count cap.
    TooManyActions,
    /// Action kind is not in the closed variant set.
    UnknownAction,
    /// Two `write_file` actions target the same path.
    DuplicateWrite,
    /// `run_tests` argv did not match an allowlisted form.
    BadTestArgv,
    /// A referenced path resolves outside the workspace.
    PathEscape,
    /// A referenced path contains a blocked segment.
    BlockedSegment,
    /// A payload contains a NUL byte.
    NulInPayload,
    /// Proposed write bytes exceeded a budget.
    BudgetExceeded,
    /// Unified diff failed patch safety parsing.
    PatchParseError,
}

impl DecisionReason {
    /// Returns the stable wire label for the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::EmptyProposal => "empty_proposal",
            Self::TooManyActions => "too_many_actions",
            Self::UnknownAction => "unknown_action",
            Self::DuplicateWrite => "duplicate_write",
            Self::BadTestArgv => "bad_test_argv",
            Self::PathEscape => "path_escape",
            Self::BlockedSegment => "blocked_segment",
            Self::NulInPayload => "nul_in_payload",
            Self::BudgetExceeded => "budget_exceeded",
            Self::PatchParseError => "patch_parse_error",
        }
    }
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// The Gate's signed verdict on a proposal.
///
/// # Invariants
/// - `allowed == false` implies `approved_actions` is empty.
/// - `input_hash` is the canonical hash of the gate input composite.
/// - `signature` verifies under the live kernel key or the Controller
///   refuses execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Verdict: true when every rule passed.
    pub allowed: bool,
    /// Closed-enumeration reason.
    pub reason: DecisionReason,
    /// Input actions when allowed; empty otherwise.
    pub approved_actions: Vec<Action>,
    /// Canonical hash of the gate input composite.
    pub input_hash: HashDigest,
    /// HMAC tag over `(input_hash, allowed, reason, approved_actions)`.
    pub signature: SignatureTag,
}
