// crates/patch-warden-core/src/core/proposal.rs
// ============================================================================
// Module: Proposals
// Description: Ordered bundles of proposed actions with metadata.
// Purpose: Freeze proposer output into an immutable, hashable value.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Proposal`] is an ordered, non-empty sequence of actions plus opaque
//! metadata. Ordering matters: approved actions execute in declared order.
//! `meta` keys are echoed verbatim into the decision input hash but never
//! alter the verdict.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::action::Action;

// ============================================================================
// SECTION: Proposal
// ============================================================================

/// Ordered bundle of proposed actions.
///
/// # Invariants
/// - Non-emptiness and the action-count cap are enforced by the Gate, not by
///   construction; an out-of-bounds proposal is denied, never rejected.
/// - `meta` is sorted (`BTreeMap`) so canonical hashing is order-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Actions in declared execution order.
    pub actions: Vec<Action>,
    /// Opaque proposer metadata; hashed, never interpreted.
    pub meta: BTreeMap<String, String>,
}

impl Proposal {
    /// Creates a proposal with no metadata.
    #[must_use]
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions,
            meta: BTreeMap::new(),
        }
    }

    /// Creates a proposal with proposer metadata.
    #[must_use]
    pub const fn with_meta(actions: Vec<Action>, meta: BTreeMap<String, String>) -> Self {
        Self {
            actions,
            meta,
        }
    }
}
