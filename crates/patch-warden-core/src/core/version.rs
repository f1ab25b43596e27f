// crates/patch-warden-core/src/core/version.rs
// ============================================================================
// Module: Kernel Versions
// Description: Compile-time version constants hashed into gate inputs.
// Purpose: Scope gate determinism to a kernel and ruleset revision.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Gate determinism is defined per `(kernel_version, ruleset_version)` pair.
//! Both are compile-time constants: they are the only version-shaped inputs
//! the Gate is allowed to observe.

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Kernel implementation version folded into every gate input hash.
pub const KERNEL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Ruleset revision folded into every gate input hash. Bump when any gate
/// rule, budget, or reason string changes.
pub const RULESET_VERSION: &str = "1";
