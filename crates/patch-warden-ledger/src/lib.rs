// crates/patch-warden-ledger/src/lib.rs
// ============================================================================
// Module: Patch Warden Ledger
// Description: Append-only, hash-chained, crash-safe event log plus replay.
// Purpose: Record every decision and outcome so third parties can verify them.
// Dependencies: fs2, patch-warden-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The ledger is a JSON-lines file: one canonical entry per LF-delimited
//! line, each carrying a SHA-256 chain hash over its predecessor. Appends are
//! write → flush → fsync; an exclusive OS file lock keeps writers single.
//! Recovery truncates a partial final line and resumes the chain. The replay
//! verifier reconstructs the chain, re-runs the Gate, and byte-compares
//! decisions.
//!
//! Security posture: ledger bytes on disk are untrusted on load; every
//! integrity check fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod entry;
pub mod reader;
pub mod replay;
pub mod writer;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use entry::EpisodeBeginPayload;
pub use entry::EpisodeEndPayload;
pub use entry::EpisodeStatus;
pub use entry::EventType;
pub use entry::ExecResultPayload;
pub use entry::GENESIS_PREV_HASH;
pub use entry::GateDecisionPayload;
pub use entry::LedgerEntry;
pub use entry::ProposalSeenPayload;
pub use replay::EntryRef;
pub use replay::ReplayReport;
pub use replay::ReplayVerdict;
pub use replay::ReplayVerifier;
pub use writer::CHECKPOINT_INTERVAL;
pub use writer::LedgerError;
pub use writer::LedgerWriter;
