// crates/patch-warden-core/src/core/signature.rs
// ============================================================================
// Module: Decision Signatures
// Description: HMAC-SHA256 tags binding decisions to the kernel key.
// Purpose: Let the Controller refuse decisions it did not witness the Gate sign.
// Dependencies: hmac, serde, sha2, subtle, crate::core::{action, decision, hashing}
// ============================================================================

//! ## Overview
//! Producer and consumer share one process, so a symmetric HMAC over the
//! decision body is sufficient; a public-key scheme would only matter if
//! decisions crossed trust domains. The key is read once at startup and held
//! immutably. Verification is constant-time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use hmac::Hmac;
use hmac::Mac;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::core::action::Action;
use crate::core::decision::DecisionReason;
use crate::core::hashing;
use crate::core::hashing::HashDigest;

// ============================================================================
// SECTION: Key Material
// ============================================================================

/// Byte length of the kernel signing key.
pub const KERNEL_KEY_BYTES: usize = 32;

/// Process-scoped symmetric signing key.
///
/// # Invariants
/// - Read once at startup; never mutated or serialized.
#[derive(Clone)]
pub struct KernelKey([u8; KERNEL_KEY_BYTES]);

impl KernelKey {
    /// Creates a key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KERNEL_KEY_BYTES]) -> Self {
        Self(bytes)
    }

    /// Parses a key from 64 hex characters.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let raw = hashing::hex_decode(hex)?;
        let bytes: [u8; KERNEL_KEY_BYTES] = raw.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub(crate) const fn as_bytes(&self) -> &[u8; KERNEL_KEY_BYTES] {
        &self.0
    }
}

impl std::fmt::Debug for KernelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material must never reach logs or ledger payloads.
        f.write_str("KernelKey(..)")
    }
}

// ============================================================================
// SECTION: Signature Tags
// ============================================================================

/// HMAC-SHA256 tag rendered as lowercase hex.
///
/// # Invariants
/// - `value` is 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureTag {
    /// Lowercase hex rendering of the tag bytes.
    pub value: String,
}

impl SignatureTag {
    /// Creates a tag from raw MAC bytes.
    #[must_use]
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            value: hashing::hex_lower(bytes),
        }
    }
}

// ============================================================================
// SECTION: Signing Body
// ============================================================================

/// Canonical composite covered by the decision tag.
///
/// # Invariants
/// - Field set and order match the verifier exactly.
#[derive(Serialize)]
struct SignedBody<'a> {
    /// Canonical hash of the gate input composite.
    input_hash: &'a HashDigest,
    /// Verdict under signature.
    allowed: bool,
    /// Reason under signature.
    reason: DecisionReason,
    /// Approved actions under signature.
    approved_actions: &'a [Action],
}

/// Encodes the signed body as canonical JSON bytes.
///
/// Canonicalization of this composite cannot fail: it contains no floats and
/// all strings are valid UTF-8 by construction.
fn signed_body_bytes(
    input_hash: &HashDigest,
    allowed: bool,
    reason: DecisionReason,
    approved_actions: &[Action],
) -> Vec<u8> {
    let body = SignedBody {
        input_hash,
        allowed,
        reason,
        approved_actions,
    };
    hashing::canonical_json_bytes(&body).unwrap_or_default()
}

// ============================================================================
// SECTION: Sign / Verify
// ============================================================================

/// Alias for the MAC construction used by the kernel.
type HmacSha256 = Hmac<Sha256>;

/// Signs a decision body under the kernel key.
#[must_use]
pub fn sign_decision(
    key: &KernelKey,
    input_hash: &HashDigest,
    allowed: bool,
    reason: DecisionReason,
    approved_actions: &[Action],
) -> SignatureTag {
    let bytes = signed_body_bytes(input_hash, allowed, reason, approved_actions);
    let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
        // HMAC accepts keys of any length; a 32-byte key cannot be refused.
        return SignatureTag::new(&[]);
    };
    mac.update(&bytes);
    SignatureTag::new(&mac.finalize().into_bytes())
}

/// Verifies a decision tag in constant time.
#[must_use]
pub fn verify_decision(
    key: &KernelKey,
    input_hash: &HashDigest,
    allowed: bool,
    reason: DecisionReason,
    approved_actions: &[Action],
    signature: &SignatureTag,
) -> bool {
    let expected = sign_decision(key, input_hash, allowed, reason, approved_actions);
    let Some(expected_raw) = hashing::hex_decode(&expected.value) else {
        return false;
    };
    let Some(given_raw) = hashing::hex_decode(&signature.value) else {
        return false;
    };
    if expected_raw.len() != given_raw.len() {
        return false;
    }
    expected_raw.ct_eq(&given_raw).into()
}
