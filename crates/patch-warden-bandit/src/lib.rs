// crates/patch-warden-bandit/src/lib.rs
// ============================================================================
// Module: Patch Warden Bandit
// Description: Beta-Bernoulli Thompson sampling over named strategy arms.
// Purpose: Learn from binary episode rewards; feed the proposer, never the Gate.
// Dependencies: patch-warden-core, rand, rand_distr, rusqlite, thiserror
// ============================================================================

//! ## Overview
//! The bandit exposes exactly two operations: `select` (sample a posterior
//! draw per enabled arm, return the arg-max) and `update` (increment the
//! Beta parameters for a binary reward). Arm semantics live outside the
//! kernel, and the kernel never consults the bandit: its outputs flow only
//! to the proposer.
//!
//! Persistence is a single-writer `SQLite` database with transactional
//! updates; posteriors survive process restarts.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod sampler;
pub mod store;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use sampler::ArmPosterior;
pub use sampler::BanditState;
pub use store::SqliteBanditConfig;
pub use store::SqliteBanditError;
pub use store::SqliteBanditStore;
