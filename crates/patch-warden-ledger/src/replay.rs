// crates/patch-warden-ledger/src/replay.rs
// ============================================================================
// Module: Replay Verifier
// Description: Chain integrity, signature, and gate-determinism checking.
// Purpose: Let third parties certify a ledger without trusting the producer.
// Dependencies: patch-warden-core, serde, serde_json, crate::{entry, reader}
// ============================================================================

//! ## Overview
//! Replay walks the raw ledger lines in order and verifies three layers:
//! the hash chain (every `entry_hash` reproduces, sequence gap-free), every
//! decision signature under the kernel key, and gate determinism (the Gate
//! re-evaluates each recorded `(snapshot, proposal)` and the canonical
//! decision bytes must match exactly). Execution results are historical
//! facts; only their schema is checked.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use patch_warden_core::Gate;
use patch_warden_core::KernelKey;
use patch_warden_core::Proposal;
use patch_warden_core::StateSnapshot;
use patch_warden_core::core::signature::verify_decision;
use patch_warden_core::hashing::canonical_json_bytes;
use serde::Serialize;

use crate::entry::EventType;
use crate::entry::ExecResultPayload;
use crate::entry::GENESIS_PREV_HASH;
use crate::entry::GateDecisionPayload;
use crate::entry::LedgerEntry;
use crate::entry::ProposalSeenPayload;
use crate::entry::compute_entry_hash;
use crate::reader;
use crate::writer::LedgerError;

// ============================================================================
// SECTION: Verdicts
// ============================================================================

/// Stable replay verdict reasons.
///
/// # Invariants
/// - Variants are stable; the CLI maps them onto exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayVerdict {
    /// Every check passed.
    Valid,
    /// An entry hash did not reproduce or a line failed to parse.
    HashMismatch,
    /// Sequence numbers were non-monotonic or gapped.
    SeqGap,
    /// A decision signature failed under the kernel key.
    SignatureInvalid,
    /// The re-run gate produced different decision bytes.
    GateDivergence,
    /// A payload did not match its event schema.
    SchemaInvalid,
}

impl ReplayVerdict {
    /// Returns the stable wire label for the verdict.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::HashMismatch => "hash_mismatch",
            Self::SeqGap => "seq_gap",
            Self::SignatureInvalid => "signature_invalid",
            Self::GateDivergence => "gate_divergence",
            Self::SchemaInvalid => "schema_invalid",
        }
    }
}

/// Reference to the first divergent entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntryRef {
    /// Sequence number of the divergent entry.
    pub seq: u64,
}

/// Structured replay outcome.
///
/// # Invariants
/// - `valid == true` iff `reason == ReplayVerdict::Valid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Whether every check passed.
    pub valid: bool,
    /// First failing check, or `Valid`.
    pub reason: ReplayVerdict,
    /// Number of entries examined before stopping.
    pub entry_count: u64,
    /// First divergent entry, when any check failed.
    pub first_divergence: Option<EntryRef>,
}

impl ReplayReport {
    /// Builds the all-clear report.
    #[must_use]
    pub const fn valid(entry_count: u64) -> Self {
        Self {
            valid: true,
            reason: ReplayVerdict::Valid,
            entry_count,
            first_divergence: None,
        }
    }

    /// Builds a failure report pointing at the divergent entry.
    #[must_use]
    pub const fn invalid(reason: ReplayVerdict, entry_count: u64, seq: u64) -> Self {
        Self {
            valid: false,
            reason,
            entry_count,
            first_divergence: Some(EntryRef {
                seq,
            }),
        }
    }
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Read-only ledger verifier bound to the kernel key.
#[derive(Debug)]
pub struct ReplayVerifier {
    /// Key used for signature checks and gate re-evaluation.
    key: KernelKey,
}

impl ReplayVerifier {
    /// Creates a verifier bound to the kernel key.
    #[must_use]
    pub const fn new(key: KernelKey) -> Self {
        Self {
            key,
        }
    }

    /// Verifies a ledger file end to end.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] only when the file cannot be read; every
    /// verification failure is reported through the returned
    /// [`ReplayReport`].
    pub fn verify(&self, path: &Path) -> Result<ReplayReport, LedgerError> {
        let lines = reader::read_raw_lines(path)?;
        let mut expected_seq: u64 = 0;
        let mut expected_prev = GENESIS_PREV_HASH.to_string();
        let mut pending_context: Option<(StateSnapshot, Proposal)> = None;
        let mut count: u64 = 0;

        for line in &lines {
            if line.trim().is_empty() {
                continue;
            }
            let Ok(entry) = serde_json::from_str::<LedgerEntry>(line) else {
                return Ok(ReplayReport::invalid(ReplayVerdict::HashMismatch, count, expected_seq));
            };
            count += 1;

            if entry.seq != expected_seq {
                return Ok(ReplayReport::invalid(ReplayVerdict::SeqGap, count, entry.seq));
            }
            if entry.prev_hash != expected_prev {
                return Ok(ReplayReport::invalid(ReplayVerdict::HashMismatch, count, entry.seq));
            }
            let recomputed = compute_entry_hash(
                &entry.prev_hash,
                entry.seq,
                entry.ts,
                entry.event_type,
                &entry.payload,
            );
            if recomputed.as_deref() != Some(entry.entry_hash.as_str()) {
                return Ok(ReplayReport::invalid(ReplayVerdict::HashMismatch, count, entry.seq));
            }

            if let Some(report) = self.check_payload(&entry, &mut pending_context, count) {
                return Ok(report);
            }

            expected_seq = entry.seq + 1;
            expected_prev = entry.entry_hash.clone();
        }

        Ok(ReplayReport::valid(count))
    }

    /// Runs the per-event schema, signature, and determinism checks.
    ///
    /// Returns `Some(report)` on the first failure.
    fn check_payload(
        &self,
        entry: &LedgerEntry,
        pending_context: &mut Option<(StateSnapshot, Proposal)>,
        count: u64,
    ) -> Option<ReplayReport> {
        match entry.event_type {
            EventType::ProposalSeen => {
                let Ok(payload) =
                    serde_json::from_value::<ProposalSeenPayload>(entry.payload.clone())
                else {
                    return Some(ReplayReport::invalid(
                        ReplayVerdict::SchemaInvalid,
                        count,
                        entry.seq,
                    ));
                };
                *pending_context = Some((payload.snapshot, payload.proposal));
                None
            }
            EventType::GateDecision => {
                let Ok(payload) =
                    serde_json::from_value::<GateDecisionPayload>(entry.payload.clone())
                else {
                    return Some(ReplayReport::invalid(
                        ReplayVerdict::SchemaInvalid,
                        count,
                        entry.seq,
                    ));
                };
                let decision = payload.decision;
                let signature_ok = verify_decision(
                    &self.key,
                    &decision.input_hash,
                    decision.allowed,
                    decision.reason,
                    &decision.approved_actions,
                    &decision.signature,
                );
                if !signature_ok {
                    return Some(ReplayReport::invalid(
                        ReplayVerdict::SignatureInvalid,
                        count,
                        entry.seq,
                    ));
                }
                let Some((snapshot, proposal)) = pending_context.take() else {
                    return Some(ReplayReport::invalid(
                        ReplayVerdict::SchemaInvalid,
                        count,
                        entry.seq,
                    ));
                };
                let rerun = Gate::new(self.key.clone()).evaluate(&snapshot, &proposal);
                let recorded = canonical_json_bytes(&decision).unwrap_or_default();
                let reproduced = canonical_json_bytes(&rerun).unwrap_or_default();
                if recorded != reproduced {
                    return Some(ReplayReport::invalid(
                        ReplayVerdict::GateDivergence,
                        count,
                        entry.seq,
                    ));
                }
                None
            }
            EventType::ExecResult => {
                if serde_json::from_value::<ExecResultPayload>(entry.payload.clone()).is_err() {
                    return Some(ReplayReport::invalid(
                        ReplayVerdict::SchemaInvalid,
                        count,
                        entry.seq,
                    ));
                }
                None
            }
            EventType::EpisodeBegin | EventType::EpisodeEnd => None,
        }
    }
}
