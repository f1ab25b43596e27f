// crates/patch-warden-core/src/runtime/mod.rs
// ============================================================================
// Module: Kernel Runtime Rules
// Description: Pure rule evaluation for path confinement, patches, and gating.
// Purpose: Group the validator logic that turns proposals into decisions.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Runtime modules hold rule evaluation only. No module here writes to the
//! filesystem; [`pathcheck`] performs read-only symlink resolution, which is
//! the single filesystem-dependent rule in the kernel.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod gate;
pub mod patch;
pub mod pathcheck;
