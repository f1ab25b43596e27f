// crates/patch-warden-controller/src/cancel.rs
// ============================================================================
// Module: Episode Cancellation
// Description: Cooperative cancellation token for episode supervision.
// Purpose: Let a supervisor refuse new actions without tearing down state.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Cancellation is cooperative: the supervisor sets the flag, the Controller
//! checks it before starting each action and marks the remainder
//! `not_attempted`. An in-flight subprocess still terminates through the
//! normal timeout protocol.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

// ============================================================================
// SECTION: Token
// ============================================================================

/// Shared cancellation flag.
///
/// # Invariants
/// - Once cancelled, the flag never resets.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    /// Shared flag; relaxed ordering suffices for a latch.
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
