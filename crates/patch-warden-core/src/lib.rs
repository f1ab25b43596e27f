// crates/patch-warden-core/src/lib.rs
// ============================================================================
// Module: Patch Warden Core
// Description: Value types, canonical hashing, signatures, and the Gate.
// Purpose: Define the deterministic trusted computing base shared by all crates.
// Dependencies: hmac, serde, serde_jcs, serde_json, sha2, subtle, thiserror
// ============================================================================

//! ## Overview
//! Patch Warden mediates between an untrusted proposer and a workspace
//! filesystem. This crate holds the safety-critical value types (snapshots,
//! actions, proposals, decisions), canonical RFC 8785 hashing, HMAC decision
//! signatures, patch safety parsing, path confinement, and the pure Gate
//! validator. Nothing in this crate reads clocks, environment, or randomness;
//! the single filesystem-dependent rule (symlink resolution) is confined to
//! [`runtime::pathcheck`].
//!
//! Security posture: every input reaching this crate is untrusted. The Gate
//! fails closed: anomalous input becomes a denial, never an error.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use crate::core::action::Action;
pub use crate::core::action::ActionKind;
pub use crate::core::action::MAX_FILE_WRITE_BYTES;
pub use crate::core::action::MAX_PATH_BYTES;
pub use crate::core::action::MAX_PROPOSAL_ACTIONS;
pub use crate::core::action::MAX_TEST_NODE_ID_BYTES;
pub use crate::core::action::MAX_TOTAL_WRITE_BYTES;
pub use crate::core::decision::Decision;
pub use crate::core::decision::DecisionReason;
pub use crate::core::exec::ExecErrorKind;
pub use crate::core::exec::ExecResult;
pub use crate::core::exec::MAX_STREAM_CAPTURE_BYTES;
pub use crate::core::exec::TRUNCATION_MARKER;
pub use crate::core::hashing;
pub use crate::core::hashing::HashAlgorithm;
pub use crate::core::hashing::HashDigest;
pub use crate::core::identifiers::ArmId;
pub use crate::core::identifiers::EpisodeId;
pub use crate::core::proposal::Proposal;
pub use crate::core::signature::KernelKey;
pub use crate::core::signature::SignatureTag;
pub use crate::core::snapshot::StateSnapshot;
pub use crate::core::version::KERNEL_VERSION;
pub use crate::core::version::RULESET_VERSION;
pub use crate::interfaces::ProposeError;
pub use crate::interfaces::Proposer;
pub use crate::interfaces::RunnerError;
pub use crate::interfaces::RunnerLimits;
pub use crate::interfaces::RunnerOutcome;
pub use crate::interfaces::TestRunner;
pub use crate::runtime::gate::Gate;
