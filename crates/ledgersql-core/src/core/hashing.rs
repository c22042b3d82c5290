// crates/ledgersql-core/src/core/hashing.rs
// ============================================================================
// Module: LedgerSQL Canonical Hashing
// Description: RFC 8785 JSON canonicalization and SHA-256 chain hashing.
// Purpose: Provide deterministic digests for check-hash chains and storage ids.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Operation payloads are canonicalized with RFC 8785 (JCS) before hashing so
//! every validator derives the same check hash from the same logical payload,
//! independent of key order or whitespace in the submitted JSON.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::core::identifiers::Hash256;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing canonical hashes.
#[derive(Debug, Clone, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes raw bytes with SHA-256.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    digest_to_hash(&hasher.finalize())
}

/// Computes the next link of a check-hash chain.
///
/// The link is `SHA-256(previous || canonical_json(payload))`.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when the payload cannot be
/// canonicalized.
pub fn chain_hash<T: Serialize + ?Sized>(
    previous: &Hash256,
    payload: &T,
) -> Result<Hash256, HashError> {
    let canonical = canonical_json_bytes(payload)?;
    let mut hasher = Sha256::new();
    hasher.update(previous.as_bytes());
    hasher.update(&canonical);
    Ok(digest_to_hash(&hasher.finalize()))
}

/// Copies a finalized SHA-256 digest into a [`Hash256`].
fn digest_to_hash(digest: &[u8]) -> Hash256 {
    let mut out = [0_u8; 32];
    out.copy_from_slice(digest);
    Hash256::from_bytes(out)
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Decodes a hex string (either case); returns `None` on malformed input.
#[must_use]
pub fn hex_decode(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    let nibble = |byte: u8| match byte {
        b'0' ..= b'9' => Some(byte - b'0'),
        b'a' ..= b'f' => Some(byte - b'a' + 10),
        b'A' ..= b'F' => Some(byte - b'A' + 10),
        _ => None,
    };
    text.as_bytes()
        .chunks_exact(2)
        .map(|pair| Some((nibble(pair[0])? << 4) | nibble(pair[1])?))
        .collect()
}
