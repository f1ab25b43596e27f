// crates/patch-warden-core/tests/hashing.rs
// ============================================================================
// Module: Canonical Hashing Tests
// Description: Verifies RFC 8785 canonical JSON hashing behavior.
// ============================================================================
//! ## Overview
//! Ensures canonical JSON hashing is deterministic across key ordering and
//! numeric normalization, enforces size limits, and that the hex codecs
//! round-trip digests exactly.

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

use std::collections::BTreeMap;

use patch_warden_core::HashAlgorithm;
use patch_warden_core::hashing::HashDigest;
use patch_warden_core::hashing::HashError;
use patch_warden_core::hashing::canonical_json_bytes;
use patch_warden_core::hashing::hash_bytes;
use patch_warden_core::hashing::hash_canonical_json;
use patch_warden_core::hashing::hash_canonical_json_with_limit;
use patch_warden_core::hashing::hex_decode;
use patch_warden_core::hashing::hex_lower;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

#[test]
fn canonical_hash_is_order_independent_for_maps() {
    let mut map_a = Map::new();
    map_a.insert("beta".to_string(), json!(2));
    map_a.insert("alpha".to_string(), json!(1));

    let mut map_b = Map::new();
    map_b.insert("alpha".to_string(), json!(1));
    map_b.insert("beta".to_string(), json!(2));

    let hash_a = hash_canonical_json(HashAlgorithm::Sha256, &Value::Object(map_a)).expect("hash a");
    let hash_b = hash_canonical_json(HashAlgorithm::Sha256, &Value::Object(map_b)).expect("hash b");

    assert_eq!(hash_a, hash_b);
}

#[test]
fn canonical_hash_normalizes_numeric_representation() {
    let hash_a = hash_canonical_json(HashAlgorithm::Sha256, &json!(1.0)).expect("hash a");
    let hash_b = hash_canonical_json(HashAlgorithm::Sha256, &json!(1)).expect("hash b");
    assert_eq!(hash_a, hash_b);
}

#[test]
fn canonical_hash_respects_size_limit() {
    let payload = BTreeMap::from([("data", "x".repeat(64))]);
    let err = hash_canonical_json_with_limit(HashAlgorithm::Sha256, &payload, 16).unwrap_err();
    assert!(matches!(err, HashError::SizeLimitExceeded { .. }));
}

#[test]
fn size_limit_exact_boundary_passes() {
    let payload = BTreeMap::from([("d", "x".to_string())]);
    let bytes = canonical_json_bytes(&payload).expect("canonical bytes");
    let result = hash_canonical_json_with_limit(HashAlgorithm::Sha256, &payload, bytes.len());
    assert!(result.is_ok(), "Exact boundary should succeed");
}

#[test]
fn size_limit_one_byte_under_fails() {
    let payload = BTreeMap::from([("d", "x".to_string())]);
    let bytes = canonical_json_bytes(&payload).expect("canonical bytes");
    let result = hash_canonical_json_with_limit(HashAlgorithm::Sha256, &payload, bytes.len() - 1);
    assert!(
        matches!(result, Err(HashError::SizeLimitExceeded { .. })),
        "One byte under limit should fail"
    );
}

#[test]
fn size_limit_reports_actual_size() {
    let payload = BTreeMap::from([("data", "x".repeat(100))]);
    let result = hash_canonical_json_with_limit(HashAlgorithm::Sha256, &payload, 10);
    if let Err(HashError::SizeLimitExceeded {
        limit,
        actual,
    }) = result
    {
        assert_eq!(limit, 10);
        assert!(actual > 10, "Actual should exceed limit");
    } else {
        panic!("Expected SizeLimitExceeded error");
    }
}

// ============================================================================
// SECTION: Golden SHA-256 Tests (Known-Value Verification)
// ============================================================================

#[test]
fn golden_hash_empty_object() {
    // SHA-256 of "{}" = 44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a
    let digest = hash_canonical_json(HashAlgorithm::Sha256, &json!({})).expect("hash");
    assert_eq!(
        digest.value, "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a",
        "Empty object hash mismatch"
    );
    assert_eq!(digest.algorithm, HashAlgorithm::Sha256);
}

#[test]
fn golden_hash_bytes_direct() {
    // SHA-256 of "test" = 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08
    let digest = hash_bytes(HashAlgorithm::Sha256, b"test");
    assert_eq!(
        digest.value, "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08",
        "Direct bytes hash mismatch"
    );
}

#[test]
fn golden_hash_empty_bytes() {
    // SHA-256 of empty input = e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
    let digest = hash_bytes(HashAlgorithm::Sha256, b"");
    assert_eq!(
        digest.value, "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        "Empty bytes hash mismatch"
    );
}

// ============================================================================
// SECTION: Hex Codec Round-Trips
// ============================================================================

#[test]
fn hash_digest_produces_lowercase_hex() {
    let bytes = [0xAB, 0xCD, 0xEF, 0x12];
    let digest = HashDigest::new(HashAlgorithm::Sha256, &bytes);
    assert_eq!(digest.value, "abcdef12", "Hex must be lowercase");
}

#[test]
fn hex_codec_round_trips_digest_bytes() {
    let digest = hash_bytes(HashAlgorithm::Sha256, b"round trip");
    let raw = digest.raw_bytes().expect("raw bytes");
    assert_eq!(raw.len(), 32);
    assert_eq!(hex_lower(&raw), digest.value);
}

#[test]
fn hex_decode_rejects_odd_length_and_bad_digits() {
    assert!(hex_decode("abc").is_none(), "Odd length must fail");
    assert!(hex_decode("zz").is_none(), "Non-hex digits must fail");
    assert_eq!(hex_decode("00ff"), Some(vec![0x00, 0xff]));
}

#[test]
fn hash_consistency_across_calls() {
    let value = json!({"a": 1, "b": [1, 2, 3], "c": {"nested": true}});
    let hash1 = hash_canonical_json(HashAlgorithm::Sha256, &value).expect("hash1");
    let hash2 = hash_canonical_json(HashAlgorithm::Sha256, &value).expect("hash2");
    assert_eq!(hash1, hash2, "Hash must be deterministic");
}

#[test]
fn hash_unicode_strings() {
    let value = json!({"note": "Hola, món! ✓"});
    let result = hash_canonical_json(HashAlgorithm::Sha256, &value);
    assert!(result.is_ok(), "Unicode strings should hash successfully");
}
