// crates/patch-warden-controller/src/lib.rs
// ============================================================================
// Module: Patch Warden Controller
// Description: Executor of approved actions under path and budget confinement.
// Purpose: Turn signed decisions into bounded, atomic workspace effects.
// Dependencies: libc, patch-warden-core, serde, tempfile, thiserror
// ============================================================================

//! ## Overview
//! The Controller executes `approved_actions` strictly in order, refusing any
//! decision whose signature fails or whose input hash was already consumed in
//! the episode. Its only side effects are file changes inside the workspace,
//! read-only process invocation, and the execution results it returns. Every
//! blocking call is bounded by a timeout; on the first hard failure the
//! remaining actions are marked `not_attempted`.
//!
//! Security posture: decisions and workspace contents are untrusted at this
//! boundary; every path is re-validated at execution time.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cancel;
pub mod controller;
pub mod fsops;
pub mod guard;
pub mod limits;
pub mod patch_apply;
pub mod runner;
pub mod subprocess;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use cancel::CancelToken;
pub use controller::Controller;
pub use guard::DecisionGuard;
pub use limits::ExecLimits;
pub use limits::LimitsError;
pub use runner::SubprocessRunner;
