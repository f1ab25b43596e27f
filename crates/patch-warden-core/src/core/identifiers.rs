// crates/patch-warden-core/src/core/identifiers.rs
// ============================================================================
// Module: Kernel Identifiers
// Description: Opaque identifiers for bandit arms and episodes.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque UTF-8 strings with transparent serde forms. The
//! kernel never parses structure out of them; equality and ordering are
//! byte-wise.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Named strategy arm learned by the bandit.
///
/// # Invariants
/// - Opaque UTF-8 string; arm semantics live outside the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArmId(String);

impl ArmId {
    /// Creates a new arm identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ArmId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ArmId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Episode identifier delimiting one `episode_begin`/`episode_end` span.
///
/// # Invariants
/// - Opaque UTF-8 string; uniqueness is a caller responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeId(String);

impl EpisodeId {
    /// Creates a new episode identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for EpisodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EpisodeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
