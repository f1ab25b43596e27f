// crates/patch-warden-core/tests/signatures.rs
// ============================================================================
// Module: Decision Signature Tests
// Description: HMAC tag binding and constant-time verification behavior.
// ============================================================================
//! ## Overview
//! A decision tag must verify under the signing key and fail under a
//! different key or any mutated field.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

use patch_warden_core::Action;
use patch_warden_core::DecisionReason;
use patch_warden_core::HashAlgorithm;
use patch_warden_core::KernelKey;
use patch_warden_core::core::signature::sign_decision;
use patch_warden_core::core::signature::verify_decision;
use patch_warden_core::hashing::hash_bytes;

fn sample_actions() -> Vec<Action> {
    vec![Action::WriteFile {
        path: "src/a.py".to_string(),
        content: "x=2\n".to_string(),
    }]
}

#[test]
fn tag_round_trips_under_the_signing_key() {
    let key = KernelKey::from_bytes([1u8; 32]);
    let input_hash = hash_bytes(HashAlgorithm::Sha256, b"input");
    let actions = sample_actions();
    let tag = sign_decision(&key, &input_hash, true, DecisionReason::Ok, &actions);
    assert!(verify_decision(&key, &input_hash, true, DecisionReason::Ok, &actions, &tag));
}

#[test]
fn tag_fails_under_a_different_key() {
    let key = KernelKey::from_bytes([1u8; 32]);
    let other = KernelKey::from_bytes([2u8; 32]);
    let input_hash = hash_bytes(HashAlgorithm::Sha256, b"input");
    let actions = sample_actions();
    let tag = sign_decision(&key, &input_hash, true, DecisionReason::Ok, &actions);
    assert!(!verify_decision(&other, &input_hash, true, DecisionReason::Ok, &actions, &tag));
}

#[test]
fn tag_binds_the_verdict_and_reason() {
    let key = KernelKey::from_bytes([1u8; 32]);
    let input_hash = hash_bytes(HashAlgorithm::Sha256, b"input");
    let actions = sample_actions();
    let tag = sign_decision(&key, &input_hash, true, DecisionReason::Ok, &actions);
    assert!(!verify_decision(&key, &input_hash, false, DecisionReason::Ok, &actions, &tag));
    assert!(!verify_decision(
        &key,
        &input_hash,
        true,
        DecisionReason::PathEscape,
        &actions,
        &tag
    ));
}

#[test]
fn tag_binds_the_approved_actions() {
    let key = KernelKey::from_bytes([1u8; 32]);
    let input_hash = hash_bytes(HashAlgorithm::Sha256, b"input");
    let actions = sample_actions();
    let tag = sign_decision(&key, &input_hash, true, DecisionReason::Ok, &actions);
    let swapped = vec![Action::ReadFile {
        path: "src/a.py".to_string(),
    }];
    assert!(!verify_decision(&key, &input_hash, true, DecisionReason::Ok, &swapped, &tag));
}

#[test]
fn key_parses_from_hex_and_rejects_bad_lengths() {
    let hex = "00".repeat(32);
    assert!(KernelKey::from_hex(&hex).is_some());
    assert!(KernelKey::from_hex("deadbeef").is_none());
    assert!(KernelKey::from_hex("zz").is_none());
}
