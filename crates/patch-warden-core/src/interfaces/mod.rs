// crates/patch-warden-core/src/interfaces/mod.rs
// ============================================================================
// Module: Kernel Interfaces
// Description: Backend-agnostic contracts for proposers and test runners.
// Purpose: Define the surfaces external collaborators implement.
// Dependencies: serde, thiserror, crate::core
// ============================================================================

//! ## Overview
//! The kernel consumes two external surfaces: a [`Proposer`] that builds
//! proposals from a bandit arm plus workspace context, and a [`TestRunner`]
//! that executes the allowlisted test command under confinement. The kernel
//! never invokes a model itself, and it treats runner output as an opaque
//! exit code plus captured streams.
//!
//! Implementations must fail closed: a runner that cannot guarantee network
//! isolation or workspace confinement must refuse to run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::ArmId;
use crate::core::proposal::Proposal;
use crate::core::snapshot::StateSnapshot;

// ============================================================================
// SECTION: Proposer
// ============================================================================

/// Proposer errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ProposeError {
    /// The proposer has no further proposals for this episode.
    #[error("proposer exhausted")]
    Exhausted,
    /// The proposer failed to build a proposal.
    #[error("proposer error: {0}")]
    Failed(String),
}

/// Builds proposals from a strategy arm and workspace context.
///
/// The kernel calls this surface but never trusts it: every returned
/// proposal still passes the Gate.
pub trait Proposer {
    /// Produces the next proposal for the episode.
    ///
    /// # Errors
    ///
    /// Returns [`ProposeError::Exhausted`] when no proposal remains and
    /// [`ProposeError::Failed`] on any other failure.
    fn propose(&mut self, snapshot: &StateSnapshot, arm: &ArmId) -> Result<Proposal, ProposeError>;
}

// ============================================================================
// SECTION: Test Runner
// ============================================================================

/// Resource limits a runner must honor.
///
/// # Invariants
/// - `network` is always false; a runner that cannot disable network access
///   must refuse to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerLimits {
    /// Wall-clock cap for the whole run.
    pub wall: Duration,
    /// Memory cap in bytes.
    pub mem_bytes: u64,
    /// CPU quota in hundredths of a core.
    pub cpu_centi: u32,
    /// Network access; must remain disabled.
    pub network: bool,
}

impl RunnerLimits {
    /// Default limits: 900 s wall, 512 MiB memory, half a core, no network.
    #[must_use]
    pub const fn default_test_limits() -> Self {
        Self {
            wall: Duration::from_secs(900),
            mem_bytes: 512 * 1024 * 1024,
            cpu_centi: 50,
            network: false,
        }
    }
}

/// Outcome of one runner invocation.
///
/// # Invariants
/// - `exit_code` 0 means the test command passed; any other value is a
///   failure. The kernel interprets nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerOutcome {
    /// Process exit code (-1 when terminated by signal).
    pub exit_code: i32,
    /// Captured stdout (possibly truncated by the caller's cap).
    pub stdout: String,
    /// Captured stderr (possibly truncated by the caller's cap).
    pub stderr: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Runner errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The runner backend is not available on this host.
    #[error("runner unavailable: {0}")]
    Unavailable(String),
    /// The run exceeded its wall-clock cap and was terminated.
    #[error("runner timed out after {0:?}")]
    Timeout(Duration),
    /// Spawning or stream capture failed.
    #[error("runner I/O error: {0}")]
    Io(String),
}

/// Executes the allowlisted test command under confinement.
pub trait TestRunner {
    /// Runs `argv` rooted at `workspace` under `limits`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] when the backend is unavailable, the run
    /// times out, or process I/O fails. A non-zero exit code is NOT an
    /// error; it is reported through [`RunnerOutcome::exit_code`].
    fn run(
        &self,
        workspace: &Path,
        argv: &[String],
        limits: &RunnerLimits,
    ) -> Result<RunnerOutcome, RunnerError>;
}
