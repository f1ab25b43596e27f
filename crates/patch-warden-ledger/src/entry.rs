// crates/patch-warden-ledger/src/entry.rs
// ============================================================================
// Module: Ledger Entries
// Description: Entry layout, event types, payload schemas, and chain hashing.
// Purpose: Define the exact bytes third parties replay.
// Dependencies: patch-warden-core, serde, serde_json
// ============================================================================

//! ## Overview
//! An entry line serializes with keys in fixed declaration order
//! (`seq, ts, prev_hash, entry_hash, event_type, payload`); the chain hash
//! covers `prev_hash ‖ u64_be(seq) ‖ u64_be(ts) ‖ utf8(event_type) ‖
//! jcs(payload)`. The payload alone is canonicalized, so proposer-supplied
//! maps cannot reorder bytes under the hash.

// ============================================================================
// SECTION: Imports
// ============================================================================

use patch_warden_core::Decision;
use patch_warden_core::EpisodeId;
use patch_warden_core::ExecResult;
use patch_warden_core::Proposal;
use patch_warden_core::StateSnapshot;
use patch_warden_core::hashing;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Hex rendering of the 32 zero bytes preceding the first entry.
pub const GENESIS_PREV_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

// ============================================================================
// SECTION: Event Types
// ============================================================================

/// Events the ledger records.
///
/// # Invariants
/// - Variants are stable; replay rejects any other value at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Episode opened; payload carries the snapshot context.
    EpisodeBegin,
    /// Proposal received from the proposer, before gating.
    ProposalSeen,
    /// Gate verdict for the preceding proposal.
    GateDecision,
    /// One per-action execution outcome.
    ExecResult,
    /// Episode closed with a terminal status.
    EpisodeEnd,
}

impl EventType {
    /// Returns the stable wire label for the event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EpisodeBegin => "episode_begin",
            Self::ProposalSeen => "proposal_seen",
            Self::GateDecision => "gate_decision",
            Self::ExecResult => "exec_result",
            Self::EpisodeEnd => "episode_end",
        }
    }
}

// ============================================================================
// SECTION: Entry Layout
// ============================================================================

/// One hash-chained ledger entry.
///
/// # Invariants
/// - Field declaration order is the on-disk key order; do not reorder.
/// - `entry_hash` reproduces from the remaining fields under
///   [`compute_entry_hash`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Zero-based, strictly incrementing sequence number.
    pub seq: u64,
    /// Unix microseconds at append time.
    pub ts: u64,
    /// Hex entry hash of the predecessor (zeros for the first entry).
    pub prev_hash: String,
    /// Hex chain hash of this entry.
    pub entry_hash: String,
    /// Event type label.
    pub event_type: EventType,
    /// Event payload (canonicalized under the hash).
    pub payload: Value,
}

// ============================================================================
// SECTION: Chain Hashing
// ============================================================================

/// Computes the chain hash for an entry's fields.
///
/// Returns `None` when `prev_hash` is not valid hex or the payload cannot be
/// canonicalized; callers treat both as corruption.
#[must_use]
pub fn compute_entry_hash(
    prev_hash: &str,
    seq: u64,
    ts: u64,
    event_type: EventType,
    payload: &Value,
) -> Option<String> {
    let prev_raw = hashing::hex_decode(prev_hash)?;
    if prev_raw.len() != hashing::DIGEST_BYTES {
        return None;
    }
    let payload_bytes = hashing::canonical_json_bytes(payload).ok()?;
    let mut buffer =
        Vec::with_capacity(prev_raw.len() + 16 + event_type.as_str().len() + payload_bytes.len());
    buffer.extend_from_slice(&prev_raw);
    buffer.extend_from_slice(&seq.to_be_bytes());
    buffer.extend_from_slice(&ts.to_be_bytes());
    buffer.extend_from_slice(event_type.as_str().as_bytes());
    buffer.extend_from_slice(&payload_bytes);
    Some(hashing::hex_lower(&hashing::sha256_raw(&buffer)))
}

// ============================================================================
// SECTION: Payload Schemas
// ============================================================================

/// Terminal episode status recorded in `episode_end`.
///
/// # Invariants
/// - Variants are stable for serialization and replay schema checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    /// Episode ran to completion (denied proposals still complete).
    Completed,
    /// Episode was cancelled by the supervisor.
    Cancelled,
    /// Episode aborted because a ledger append failed.
    Unfinished,
}

/// Payload of `episode_begin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeBeginPayload {
    /// Episode identifier.
    pub episode_id: EpisodeId,
    /// Snapshot context for the episode.
    pub snapshot: StateSnapshot,
}

/// Payload of `proposal_seen`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSeenPayload {
    /// Episode identifier.
    pub episode_id: EpisodeId,
    /// Snapshot the gate will evaluate against.
    pub snapshot: StateSnapshot,
    /// The frozen proposal.
    pub proposal: Proposal,
}

/// Payload of `gate_decision`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecisionPayload {
    /// Episode identifier.
    pub episode_id: EpisodeId,
    /// The signed decision.
    pub decision: Decision,
}

/// Payload of `exec_result`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResultPayload {
    /// Episode identifier.
    pub episode_id: EpisodeId,
    /// Per-action execution outcome.
    pub result: ExecResult,
}

/// Payload of `episode_end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeEndPayload {
    /// Episode identifier.
    pub episode_id: EpisodeId,
    /// Terminal status.
    pub status: EpisodeStatus,
    /// Binary reward fed to the bandit, when one was computed.
    pub reward: Option<u8>,
}
