// runloop-core/src/model/hashing.rs
// ============================================================================
// Module: Canonical Hashing
// Description: Canonical JSON hashing for evidence, run persistence and signing.
// Purpose: Give every subsystem one deterministic way to hash a JSON value.
// Dependencies: serde, serde_json, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Hashes are computed over the RFC 8785 canonical JSON encoding of a value so
//! that two logically equal values always hash identically regardless of key
//! order or serializer whitespace.

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Digest;
use sha2::Sha256;

/// Hash algorithm used for a [`HashDigest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
}

/// Default hash algorithm used when none is configured explicitly.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// A hash digest tagged with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigest {
    /// Algorithm used to produce `value`.
    pub algorithm: HashAlgorithm,
    /// Hex-encoded digest bytes.
    pub value: String,
}

/// Errors produced while canonicalizing or hashing a value.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// The value could not be serialized to canonical JSON.
    #[error("canonicalization failed: {0}")]
    Canonicalize(String),
}

/// Encodes a serializable value as RFC 8785 canonical JSON bytes.
///
/// # Errors
/// Returns [`HashError::Canonicalize`] if `value` cannot be serialized.
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalize(err.to_string()))
}

/// Hashes a serializable value's canonical JSON encoding.
///
/// # Errors
/// Returns [`HashError::Canonicalize`] if `value` cannot be serialized.
pub fn hash_canonical_json<T: Serialize>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Hashes raw bytes with the given algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            HashDigest {
                algorithm,
                value: hex_encode(&hasher.finalize()),
            }
        }
    }
}

/// Hex-encodes a byte slice using lowercase digits.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Round-trips a value through canonical JSON, returning a fresh clone.
///
/// Used by run-store tests to assert lossless persistence.
///
/// # Errors
/// Returns [`HashError::Canonicalize`] if the value cannot be serialized or
/// the canonical bytes cannot be deserialized back into `T`.
pub fn round_trip_canonical<T: Serialize + DeserializeOwned>(value: &T) -> Result<T, HashError> {
    let bytes = canonical_json_bytes(value)?;
    serde_json::from_slice(&bytes).map_err(|err| HashError::Canonicalize(err.to_string()))
}
