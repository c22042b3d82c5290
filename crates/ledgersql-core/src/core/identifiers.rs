// crates/ledgersql-core/src/core/identifiers.rs
// ============================================================================
// Module: LedgerSQL Identifiers
// Description: Canonical identifiers for accounts, tables, and ledger hashes.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the identifiers used throughout LedgerSQL. Table names
//! and storage ids are validated at construction because both end up inside
//! generated SQL text as identifiers, which cannot be bound as parameters.
//! Hashes are fixed 32-byte digests rendered as lowercase hex on the wire.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

use crate::core::hashing::hex_decode;
use crate::core::hashing::hex_encode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a logical table name.
pub const MAX_TABLE_NAME_LENGTH: usize = 64;
/// Maximum length of an account identifier.
pub const MAX_ACCOUNT_LENGTH: usize = 128;
/// Prefix applied to every backend table name.
pub const STORAGE_ID_PREFIX: &str = "t_";
/// Number of digest bytes kept in a storage id.
pub const STORAGE_ID_BYTES: usize = 20;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Identifier was empty.
    #[error("{0} must be non-empty")]
    Empty(&'static str),
    /// Identifier exceeded its length limit.
    #[error("{kind} exceeds max length {max}")]
    TooLong {
        /// Identifier kind label.
        kind: &'static str,
        /// Maximum length.
        max: usize,
    },
    /// Identifier contained characters outside the allowed set.
    #[error("{kind} contains invalid characters: {value}")]
    InvalidCharacters {
        /// Identifier kind label.
        kind: &'static str,
        /// Offending identifier value.
        value: String,
    },
    /// Hash text was not a 32-byte hex string.
    #[error("invalid hash encoding: {0}")]
    InvalidHash(String),
}

// ============================================================================
// SECTION: Account Identifier
// ============================================================================

/// Ledger account identifier.
///
/// # Invariants
/// - Non-empty, at most [`MAX_ACCOUNT_LENGTH`] bytes, no whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Creates a validated account identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the value is empty, too long, or
    /// contains whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        if value.is_empty() {
            return Err(IdentifierError::Empty("account id"));
        }
        if value.len() > MAX_ACCOUNT_LENGTH {
            return Err(IdentifierError::TooLong {
                kind: "account id",
                max: MAX_ACCOUNT_LENGTH,
            });
        }
        if value.chars().any(char::is_whitespace) {
            return Err(IdentifierError::InvalidCharacters {
                kind: "account id",
                value,
            });
        }
        Ok(Self(value))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Table Name
// ============================================================================

/// Logical table name chosen by the table owner.
///
/// # Invariants
/// - Matches `[A-Za-z_][A-Za-z0-9_]*` and is at most [`MAX_TABLE_NAME_LENGTH`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    /// Creates a validated table name.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the name is not a plain SQL identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        validate_sql_identifier("table name", &value, MAX_TABLE_NAME_LENGTH)?;
        Ok(Self(value))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TableName {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Storage Identifier
// ============================================================================

/// Backend table name assigned to a logical table at creation.
///
/// # Invariants
/// - Always `t_` followed by 40 lowercase hex characters.
/// - Stable across renames; only the logical name changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageId(String);

impl StorageId {
    /// Derives the storage id from the owner, logical name, and creation sequence.
    #[must_use]
    pub fn derive(owner: &AccountId, name: &TableName, created_ledger_seq: u64) -> Self {
        let mut material = Vec::with_capacity(owner.as_str().len() + name.as_str().len() + 10);
        material.extend_from_slice(owner.as_str().as_bytes());
        material.push(0);
        material.extend_from_slice(name.as_str().as_bytes());
        material.push(0);
        material.extend_from_slice(&created_ledger_seq.to_be_bytes());
        let digest = crate::core::hashing::hash_bytes(&material);
        let truncated = &digest.as_bytes()[.. STORAGE_ID_BYTES];
        Self(format!("{STORAGE_ID_PREFIX}{}", hex_encode(truncated)))
    }

    /// Parses a storage id from its backend table name.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the text is not a well-formed storage id.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let Some(hex) = value.strip_prefix(STORAGE_ID_PREFIX) else {
            return Err(IdentifierError::InvalidCharacters {
                kind: "storage id",
                value: value.to_string(),
            });
        };
        let valid = hex.len() == STORAGE_ID_BYTES * 2
            && hex.bytes().all(|byte| byte.is_ascii_digit() || (b'a' ..= b'f').contains(&byte));
        if !valid {
            return Err(IdentifierError::InvalidCharacters {
                kind: "storage id",
                value: value.to_string(),
            });
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the backend table name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StorageId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StorageId> for String {
    fn from(value: StorageId) -> Self {
        value.0
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Hashes
// ============================================================================

/// Fixed-width 256-bit digest used for ledger, transaction, and check hashes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256([u8; 32]);

/// Ledger hash alias.
pub type LedgerHash = Hash256;
/// Transaction hash alias.
pub type TxHash = Hash256;
/// Check-hash chain link alias.
pub type CheckHash = Hash256;

impl Hash256 {
    /// All-zero digest used as the chain genesis.
    pub const ZERO: Self = Self([0; 32]);

    /// Wraps raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns true for the all-zero digest.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex_encode(&self.0))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", hex_encode(&self.0))
    }
}

impl FromStr for Hash256 {
    type Err = IdentifierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let bytes =
            hex_decode(value).ok_or_else(|| IdentifierError::InvalidHash(value.to_string()))?;
        let array: [u8; 32] =
            bytes.try_into().map_err(|_| IdentifierError::InvalidHash(value.to_string()))?;
        Ok(Self(array))
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex_encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// # Errors
///
/// Returns [`IdentifierError`] when the identifier is empty, too long, or
/// contains characters outside the allowed set.
pub fn validate_sql_identifier(
    kind: &'static str,
    value: &str,
    max: usize,
) -> Result<(), IdentifierError> {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return Err(IdentifierError::Empty(kind));
    };
    if value.len() > max {
        return Err(IdentifierError::TooLong {
            kind,
            max,
        });
    }
    let valid_first = first.is_ascii_alphabetic() || first == '_';
    if !valid_first || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err(IdentifierError::InvalidCharacters {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::*;

    #[test]
    fn storage_id_is_stable_and_parseable() {
        let owner = AccountId::new("zHb9CJAWyB4zj91VRWn96DkukG4bwdtyTh").unwrap();
        let name = TableName::new("orders").unwrap();
        let first = StorageId::derive(&owner, &name, 7);
        let second = StorageId::derive(&owner, &name, 7);
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), STORAGE_ID_PREFIX.len() + STORAGE_ID_BYTES * 2);
        assert_eq!(StorageId::parse(first.as_str()).unwrap(), first);
        assert_ne!(first, StorageId::derive(&owner, &name, 8));
    }

    #[test]
    fn table_name_rejects_sql_metacharacters() {
        assert!(TableName::new("users; DROP TABLE x").is_err());
        assert!(TableName::new("1users").is_err());
        assert!(TableName::new("").is_err());
        assert!(TableName::new("_users_2").is_ok());
    }

    #[test]
    fn hash_round_trips_through_hex() {
        let hash = Hash256::from_bytes([0xab; 32]);
        let text = hash.to_string();
        assert_eq!(text.parse::<Hash256>().unwrap(), hash);
        assert!("abc".parse::<Hash256>().is_err());
    }
}
