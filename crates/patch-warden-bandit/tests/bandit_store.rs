// crates/patch-warden-bandit/tests/bandit_store.rs
// ============================================================================
// Module: Bandit Store Tests
// Description: Learning scenario, monotonicity, persistence, reproducibility.
// Purpose: Validate the Thompson sampler against its durable store.
// ============================================================================

//! ## Overview
//! Covers the canonical learning scenario (arms A/B with a fixed reward
//! sequence), posterior monotonicity, persistence across reopen, seeded
//! selection reproducibility, and reward validation.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use patch_warden_bandit::SqliteBanditConfig;
use patch_warden_bandit::SqliteBanditError;
use patch_warden_bandit::SqliteBanditStore;
use patch_warden_core::ArmId;
use patch_warden_core::EpisodeId;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open_store(dir: &TempDir) -> SqliteBanditStore {
    let config = SqliteBanditConfig::new(&dir.path().join("outcomes.sqlite"));
    SqliteBanditStore::open(&config).expect("open store")
}

fn episode(label: &str) -> EpisodeId {
    EpisodeId::new(label)
}

// ============================================================================
// SECTION: Learning Scenario
// ============================================================================

#[test]
fn reward_sequence_updates_posteriors_exactly() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let arm_a = ArmId::new("A");
    let arm_b = ArmId::new("B");
    store.register_arm(&arm_a).expect("register A");
    store.register_arm(&arm_b).expect("register B");

    for (arm, reward) in [(&arm_a, 1), (&arm_a, 1), (&arm_b, 0), (&arm_a, 1), (&arm_b, 0)] {
        store.update(arm, reward, &episode("ep")).expect("update");
    }

    let state = store.load_state().expect("load");
    let posterior_a = state.arms[&arm_a];
    let posterior_b = state.arms[&arm_b];
    assert_eq!((posterior_a.alpha, posterior_a.beta), (4, 1));
    assert_eq!((posterior_b.alpha, posterior_b.beta), (1, 3));
    assert!(posterior_a.mean() > 0.79 && posterior_a.mean() < 0.81);
    assert!(posterior_b.mean() > 0.24 && posterior_b.mean() < 0.26);
    assert_eq!(store.outcome_count().expect("count"), 5);
}

#[test]
fn sampling_strongly_favors_the_better_arm() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let arm_a = ArmId::new("A");
    let arm_b = ArmId::new("B");
    store.register_arm(&arm_a).expect("register A");
    store.register_arm(&arm_b).expect("register B");
    for (arm, reward) in [(&arm_a, 1), (&arm_a, 1), (&arm_b, 0), (&arm_a, 1), (&arm_b, 0)] {
        store.update(arm, reward, &episode("ep")).expect("update");
    }

    let state = store.load_state().expect("load");
    let wins_a = (0..200u64).filter(|seed| state.select(*seed).as_ref() == Some(&arm_a)).count();
    assert!(wins_a >= 140, "A should dominate selection, won {wins_a}/200");
}

// ============================================================================
// SECTION: Monotonicity and Persistence
// ============================================================================

#[test]
fn posteriors_never_decrease() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let arm = ArmId::new("steady");
    store.register_arm(&arm).expect("register");

    let mut last = (1u64, 1u64);
    for step in 0..10u8 {
        store.update(&arm, step % 2, &episode("ep")).expect("update");
        let state = store.load_state().expect("load");
        let posterior = state.arms[&arm];
        assert!(posterior.alpha >= last.0, "alpha must be non-decreasing");
        assert!(posterior.beta >= last.1, "beta must be non-decreasing");
        last = (posterior.alpha, posterior.beta);
    }
}

#[test]
fn posteriors_survive_reopen() {
    let dir = TempDir::new().expect("tempdir");
    let arm = ArmId::new("durable");
    {
        let store = open_store(&dir);
        store.register_arm(&arm).expect("register");
        store.update(&arm, 1, &episode("ep-1")).expect("update");
        store.update(&arm, 1, &episode("ep-2")).expect("update");
    }
    let store = open_store(&dir);
    let state = store.load_state().expect("load");
    assert_eq!((state.arms[&arm].alpha, state.arms[&arm].beta), (3, 1));
    assert_eq!(store.outcome_count().expect("count"), 2);
}

#[test]
fn registration_is_idempotent() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let arm = ArmId::new("once");
    store.register_arm(&arm).expect("register");
    store.update(&arm, 1, &episode("ep")).expect("update");
    store.register_arm(&arm).expect("re-register");
    let state = store.load_state().expect("load");
    assert_eq!(state.arms[&arm].alpha, 2, "Re-registration must not reset the posterior");
}

// ============================================================================
// SECTION: Validation
// ============================================================================

#[test]
fn non_binary_reward_is_refused() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let arm = ArmId::new("a");
    store.register_arm(&arm).expect("register");
    let result = store.update(&arm, 2, &episode("ep"));
    assert!(matches!(result, Err(SqliteBanditError::Invalid(_))));
}

#[test]
fn unknown_arm_update_is_refused() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    let result = store.update(&ArmId::new("ghost"), 1, &episode("ep"));
    assert!(matches!(result, Err(SqliteBanditError::UnknownArm(_))));
    assert_eq!(store.outcome_count().expect("count"), 0, "Refused update must not log an outcome");
}

#[test]
fn seeded_selection_is_stable_across_loads() {
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(&dir);
    for name in ["a", "b", "c"] {
        store.register_arm(&ArmId::new(name)).expect("register");
    }
    let first = store.select(7).expect("select").expect("arm");
    for _ in 0..5 {
        assert_eq!(store.select(7).expect("select").expect("arm"), first);
    }
}
