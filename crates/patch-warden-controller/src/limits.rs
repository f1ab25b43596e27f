// crates/patch-warden-controller/src/limits.rs
// ============================================================================
// Module: Execution Limits
// Description: Wall-clock and capture caps for action execution.
// Purpose: Keep every blocking call bounded and configurable within hard caps.
// Dependencies: serde, thiserror, patch-warden-core
// ============================================================================

//! ## Overview
//! Limits deserialize from the TOML config with per-field defaults and are
//! validated against hard ceilings before use. The stream capture cap is not
//! configurable; it is a kernel constant.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use patch_warden_core::MAX_STREAM_CAPTURE_BYTES;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Hard ceiling for the per-action wall clock (seconds).
pub const MAX_ACTION_WALL_S: u64 = 600;
/// Default per-action wall clock (seconds).
const DEFAULT_ACTION_WALL_S: u64 = 60;
/// Default total wall clock for `run_tests` (seconds).
const DEFAULT_TEST_WALL_S: u64 = 900;
/// Default SIGTERM-to-SIGKILL grace period (seconds).
const DEFAULT_TERM_GRACE_S: u64 = 5;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Limit validation failures.
#[derive(Debug, Error)]
pub enum LimitsError {
    /// Configured action wall clock exceeds the hard ceiling.
    #[error("action_wall_s {0} exceeds ceiling {MAX_ACTION_WALL_S}")]
    ActionWallTooLarge(u64),
    /// A zero wall clock would make every action time out.
    #[error("wall clock limits must be greater than zero")]
    ZeroWall,
}

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Execution caps applied by the Controller.
///
/// # Invariants
/// - `action_wall_s` is in `1..=MAX_ACTION_WALL_S` once validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ExecLimits {
    /// Per-action wall clock in seconds.
    #[serde(default = "default_action_wall_s")]
    pub action_wall_s: u64,
    /// Total wall clock for `run_tests` in seconds.
    #[serde(default = "default_test_wall_s")]
    pub test_wall_s: u64,
    /// SIGTERM-to-SIGKILL grace period in seconds.
    #[serde(default = "default_term_grace_s")]
    pub term_grace_s: u64,
}

/// Returns the default per-action wall clock.
const fn default_action_wall_s() -> u64 {
    DEFAULT_ACTION_WALL_S
}

/// Returns the default test wall clock.
const fn default_test_wall_s() -> u64 {
    DEFAULT_TEST_WALL_S
}

/// Returns the default termination grace period.
const fn default_term_grace_s() -> u64 {
    DEFAULT_TERM_GRACE_S
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            action_wall_s: DEFAULT_ACTION_WALL_S,
            test_wall_s: DEFAULT_TEST_WALL_S,
            term_grace_s: DEFAULT_TERM_GRACE_S,
        }
    }
}

impl ExecLimits {
    /// Validates configured values against the hard ceilings.
    ///
    /// # Errors
    ///
    /// Returns [`LimitsError`] for zero or over-ceiling wall clocks.
    pub const fn validate(&self) -> Result<(), LimitsError> {
        if self.action_wall_s == 0 || self.test_wall_s == 0 {
            return Err(LimitsError::ZeroWall);
        }
        if self.action_wall_s > MAX_ACTION_WALL_S {
            return Err(LimitsError::ActionWallTooLarge(self.action_wall_s));
        }
        Ok(())
    }

    /// Per-action wall clock as a [`Duration`].
    #[must_use]
    pub const fn action_wall(&self) -> Duration {
        Duration::from_secs(self.action_wall_s)
    }

    /// Test wall clock as a [`Duration`].
    #[must_use]
    pub const fn test_wall(&self) -> Duration {
        Duration::from_secs(self.test_wall_s)
    }

    /// Termination grace as a [`Duration`].
    #[must_use]
    pub const fn term_grace(&self) -> Duration {
        Duration::from_secs(self.term_grace_s)
    }

    /// Stream capture cap in bytes (kernel constant).
    #[must_use]
    pub const fn stream_cap(&self) -> usize {
        MAX_STREAM_CAPTURE_BYTES
    }
}
