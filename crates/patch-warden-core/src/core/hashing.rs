// crates/patch-warden-core/src/core/hashing.rs
// ============================================================================
// Module: Canonical Hashing
// Description: RFC 8785 canonical JSON encoding and SHA-256 digests.
// Purpose: Provide the single hashing path used for decisions and ledger entries.
// Dependencies: serde, serde_jcs, serde_json, sha2, thiserror
// ============================================================================

//! ## Overview
//! Every hashed payload in Patch Warden flows through this module: values are
//! encoded as RFC 8785 canonical JSON (sorted keys, shortest-round-trip
//! numbers, no insignificant whitespace) and digested with SHA-256. Map
//! iteration order can never influence a digest because canonicalization
//! sorts keys before hashing.
//!
//! Security posture: inputs are untrusted; size limits fail closed before any
//! digest is produced.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Algorithms
// ============================================================================

/// Hash algorithms supported by the kernel.
///
/// # Invariants
/// - Variants are stable for serialization and ledger compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256 (the only algorithm the kernel emits).
    Sha256,
}

impl HashAlgorithm {
    /// Returns the stable label for the algorithm.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

/// Default hash algorithm for all kernel digests.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Number of raw bytes in a SHA-256 digest.
pub const DIGEST_BYTES: usize = 32;

// ============================================================================
// SECTION: Digests
// ============================================================================

/// A hash digest with its algorithm and lowercase hex rendering.
///
/// # Invariants
/// - `value` is lowercase hex of the raw digest bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashDigest {
    /// Algorithm that produced the digest.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex rendering of the digest bytes.
    pub value: String,
}

impl HashDigest {
    /// Creates a digest record from raw digest bytes.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            value: hex_lower(bytes),
        }
    }

    /// Returns the raw digest bytes, or `None` when the hex is malformed.
    #[must_use]
    pub fn raw_bytes(&self) -> Option<Vec<u8>> {
        hex_decode(&self.value)
    }
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.as_str(), self.value)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Hashing and canonicalization failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum HashError {
    /// Value could not be canonicalized (for example, non-finite floats).
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),
    /// Canonical encoding exceeded the caller-supplied size limit.
    #[error("canonical payload is {actual} bytes (limit {limit})")]
    SizeLimitExceeded {
        /// Maximum accepted canonical byte length.
        limit: usize,
        /// Actual canonical byte length of the rejected payload.
        actual: usize,
    },
}

// ============================================================================
// SECTION: Canonical Encoding
// ============================================================================

/// Encodes a value as RFC 8785 canonical JSON bytes.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when the value cannot be
/// represented as canonical JSON.
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Encodes a value as canonical JSON bytes, enforcing a size limit.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] for unrepresentable values and
/// [`HashError::SizeLimitExceeded`] when the encoding exceeds `limit`.
pub fn canonical_json_bytes_with_limit<T: Serialize>(
    value: &T,
    limit: usize,
) -> Result<Vec<u8>, HashError> {
    let bytes = canonical_json_bytes(value)?;
    if bytes.len() > limit {
        return Err(HashError::SizeLimitExceeded {
            limit,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Hashing
// ============================================================================

/// Hashes raw bytes with the given algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => HashDigest::new(algorithm, &sha256_raw(bytes)),
    }
}

/// Hashes the canonical JSON encoding of a value.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when the value cannot be encoded.
pub fn hash_canonical_json<T: Serialize>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Hashes the canonical JSON encoding of a value, enforcing a size limit.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] for unrepresentable values and
/// [`HashError::SizeLimitExceeded`] when the encoding exceeds `limit`.
pub fn hash_canonical_json_with_limit<T: Serialize>(
    algorithm: HashAlgorithm,
    value: &T,
    limit: usize,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes_with_limit(value, limit)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Computes a raw SHA-256 digest.
#[must_use]
pub fn sha256_raw(bytes: &[u8]) -> [u8; DIGEST_BYTES] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

// ============================================================================
// SECTION: Hex Codecs
// ============================================================================

/// Renders bytes as lowercase hex.
#[must_use]
pub fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let hi = byte >> 4;
        let lo = byte & 0x0f;
        out.push(hex_digit(hi));
        out.push(hex_digit(lo));
    }
    out
}

/// Decodes lowercase or uppercase hex into bytes.
#[must_use]
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    let digits = hex.as_bytes();
    let mut out = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks_exact(2) {
        let hi = hex_value(pair[0])?;
        let lo = hex_value(pair[1])?;
        out.push((hi << 4) | lo);
    }
    Some(out)
}

/// Maps a nibble to its lowercase hex digit.
const fn hex_digit(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        _ => (b'a' + (nibble - 10)) as char,
    }
}

/// Maps a hex digit byte to its nibble value.
const fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}
