// crates/patch-warden-bandit/src/sampler.rs
// ============================================================================
// Module: Thompson Sampler
// Description: Pure Beta-Bernoulli posterior sampling with seeded tie-break.
// Purpose: Keep the learning rule deterministic under a caller-supplied seed.
// Dependencies: patch-warden-core, rand, rand_distr
// ============================================================================

//! ## Overview
//! The sampler is pure over `(state, seed)`: arms iterate in sorted order
//! (`BTreeMap`), each posterior draws once from `Beta(alpha, beta)`, and
//! ties break through the same seeded generator. Tests pin reproducibility
//! by fixing the seed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use patch_warden_core::ArmId;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Beta;
use rand_distr::Distribution;

// ============================================================================
// SECTION: Posteriors
// ============================================================================

/// Beta posterior parameters for one arm.
///
/// # Invariants
/// - `alpha >= 1` and `beta >= 1` (the uniform prior is (1, 1)).
/// - Both parameters are non-decreasing over an arm's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmPosterior {
    /// Success count plus one.
    pub alpha: u64,
    /// Failure count plus one.
    pub beta: u64,
}

impl ArmPosterior {
    /// The uniform prior.
    pub const PRIOR: Self = Self {
        alpha: 1,
        beta: 1,
    };

    /// Posterior mean reward estimate.
    #[must_use]
    pub fn mean(self) -> f64 {
        let alpha = u32::try_from(self.alpha.min(u64::from(u32::MAX))).unwrap_or(u32::MAX);
        let beta = u32::try_from(self.beta.min(u64::from(u32::MAX))).unwrap_or(u32::MAX);
        f64::from(alpha) / (f64::from(alpha) + f64::from(beta))
    }

    /// Applies one binary reward.
    #[must_use]
    pub const fn rewarded(self, reward: bool) -> Self {
        if reward {
            Self {
                alpha: self.alpha + 1,
                beta: self.beta,
            }
        } else {
            Self {
                alpha: self.alpha,
                beta: self.beta + 1,
            }
        }
    }
}

// ============================================================================
// SECTION: Bandit State
// ============================================================================

/// In-memory posterior set over enabled arms.
///
/// # Invariants
/// - Arms iterate in sorted order so selection is seed-deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BanditState {
    /// Posterior per enabled arm.
    pub arms: BTreeMap<ArmId, ArmPosterior>,
}

impl BanditState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an arm at the uniform prior when absent.
    pub fn register(&mut self, arm: ArmId) {
        self.arms.entry(arm).or_insert(ArmPosterior::PRIOR);
    }

    /// Applies one binary reward to an arm; returns false for unknown arms.
    pub fn update(&mut self, arm: &ArmId, reward: bool) -> bool {
        match self.arms.get_mut(arm) {
            Some(posterior) => {
                *posterior = posterior.rewarded(reward);
                true
            }
            None => false,
        }
    }

    /// Thompson-samples one arm under a caller-supplied seed.
    ///
    /// Returns `None` when no arm is enabled. Ties on the sampled draw break
    /// uniformly through the same seeded generator.
    #[must_use]
    pub fn select(&self, seed: u64) -> Option<ArmId> {
        if self.arms.is_empty() {
            return None;
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut best: Vec<&ArmId> = Vec::new();
        let mut best_draw = f64::NEG_INFINITY;
        for (arm, posterior) in &self.arms {
            let draw = sample_beta(&mut rng, *posterior);
            if draw > best_draw {
                best_draw = draw;
                best.clear();
                best.push(arm);
            } else if (draw - best_draw).abs() < f64::EPSILON {
                best.push(arm);
            }
        }
        let winner = if best.len() == 1 { best[0] } else { best[rng.gen_range(0..best.len())] };
        Some(winner.clone())
    }
}

/// Draws once from the arm's Beta posterior.
fn sample_beta(rng: &mut StdRng, posterior: ArmPosterior) -> f64 {
    let alpha = u32::try_from(posterior.alpha.min(u64::from(u32::MAX))).unwrap_or(u32::MAX);
    let beta = u32::try_from(posterior.beta.min(u64::from(u32::MAX))).unwrap_or(u32::MAX);
    match Beta::new(f64::from(alpha), f64::from(beta)) {
        Ok(distribution) => distribution.sample(rng),
        // Parameters are >= 1 by construction; this arm simply never wins.
        Err(_) => f64::NEG_INFINITY,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        reason = "Test-only assertions are permitted."
    )]

    use patch_warden_core::ArmId;

    use super::ArmPosterior;
    use super::BanditState;

    #[test]
    fn update_is_monotonic() {
        let mut state = BanditState::new();
        state.register(ArmId::new("a"));
        let before = state.arms[&ArmId::new("a")];
        assert!(state.update(&ArmId::new("a"), true));
        assert!(state.update(&ArmId::new("a"), false));
        let after = state.arms[&ArmId::new("a")];
        assert!(after.alpha >= before.alpha);
        assert!(after.beta >= before.beta);
        assert_eq!(after, ArmPosterior {
            alpha: 2,
            beta: 2,
        });
    }

    #[test]
    fn selection_is_reproducible_per_seed() {
        let mut state = BanditState::new();
        state.register(ArmId::new("a"));
        state.register(ArmId::new("b"));
        state.register(ArmId::new("c"));
        let first = state.select(99).expect("arm");
        for _ in 0..10 {
            assert_eq!(state.select(99).expect("arm"), first);
        }
    }

    #[test]
    fn empty_state_selects_nothing() {
        assert!(BanditState::new().select(1).is_none());
    }

    #[test]
    fn unknown_arm_update_is_refused() {
        let mut state = BanditState::new();
        assert!(!state.update(&ArmId::new("ghost"), true));
    }
}
