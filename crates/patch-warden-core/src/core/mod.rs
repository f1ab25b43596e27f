// crates/patch-warden-core/src/core/mod.rs
// ============================================================================
// Module: Core Value Types
// Description: Immutable value types and canonical encodings for the kernel.
// Purpose: Group snapshot, action, proposal, decision, and hashing modules.
// Dependencies: crate submodules
// ============================================================================

//! ## Overview
//! All core values are immutable once constructed and carry a canonical
//! serialization (sorted keys, UTF-8, no insignificant whitespace) used for
//! hashing. Mutation happens only by constructing new values.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod action;
pub mod decision;
pub mod exec;
pub mod hashing;
pub mod identifiers;
pub mod proposal;
pub mod signature;
pub mod snapshot;
pub mod version;
