// crates/patch-warden-controller/src/runner.rs
// ============================================================================
// Module: Subprocess Test Runner
// Description: Direct-subprocess implementation of the TestRunner interface.
// Purpose: Run the allowlisted test command with a scrubbed environment.
// Dependencies: patch-warden-core, crate::subprocess
// ============================================================================

//! ## Overview
//! The bundled runner executes the test command directly as a subprocess
//! rooted at the workspace, with credentials stripped and PATH pinned to
//! system defaults. A container-backed runner plugs in through the same
//! [`TestRunner`] interface; the kernel only ever sees exit code plus
//! captured streams.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::time::Duration;

use patch_warden_core::MAX_STREAM_CAPTURE_BYTES;
use patch_warden_core::RunnerError;
use patch_warden_core::RunnerLimits;
use patch_warden_core::RunnerOutcome;
use patch_warden_core::TestRunner;

use crate::subprocess;
use crate::subprocess::SpawnError;

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Test runner backed by a direct, confined subprocess.
///
/// # Invariants
/// - Never interprets test output; only the exit code matters upstream.
#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    /// SIGTERM-to-SIGKILL grace period.
    grace: Duration,
}

impl SubprocessRunner {
    /// Creates a runner with the standard 5 s termination grace.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            grace: Duration::from_secs(5),
        }
    }

    /// Creates a runner with an explicit grace period.
    #[must_use]
    pub const fn with_grace(grace: Duration) -> Self {
        Self {
            grace,
        }
    }
}

impl Default for SubprocessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRunner for SubprocessRunner {
    fn run(
        &self,
        workspace: &Path,
        argv: &[String],
        limits: &RunnerLimits,
    ) -> Result<RunnerOutcome, RunnerError> {
        let outcome =
            subprocess::run_confined(workspace, argv, limits.wall, self.grace, MAX_STREAM_CAPTURE_BYTES)
                .map_err(|err| match err {
                    SpawnError::Spawn {
                        program,
                        message,
                    } => RunnerError::Unavailable(format!("{program}: {message}")),
                    SpawnError::Io(message) => RunnerError::Io(message),
                })?;
        if outcome.timed_out {
            return Err(RunnerError::Timeout(limits.wall));
        }
        Ok(RunnerOutcome {
            exit_code: outcome.exit_code,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            duration_ms: outcome.duration_ms,
        })
    }
}
