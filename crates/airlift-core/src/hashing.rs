// crates/airlift-core/src/hashing.rs
// ============================================================================
// Module: Airlift Content Hashing
// Description: Content hash algorithms and digests for asset identity.
// Purpose: Provide the canonical digest form used for dedup and file naming.
// Dependencies: serde, sha2, hex, thiserror
// ============================================================================

//! ## Overview
//! Assets are identified by a `(hash, algorithm)` pair. This module defines
//! the supported algorithms, the digest value type, and the hashing helper
//! used by the loader after every download. Digests are lowercase hex; the
//! algorithm label doubles as the catalog `hash_type` column value and as
//! the prefix of content-addressed file names (`sha256-<hex>`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use sha2::Sha512;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default algorithm for manifests that omit `hashAlgorithm`.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors for digest parsing and validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Unknown algorithm label.
    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),
    /// Digest value is not lowercase hex of the expected length.
    #[error("malformed {algorithm} digest: {value}")]
    MalformedDigest {
        /// Algorithm the digest was declared under.
        algorithm: HashAlgorithm,
        /// Offending digest text.
        value: String,
    },
}

// ============================================================================
// SECTION: Algorithms
// ============================================================================

/// Supported content hash algorithms.
///
/// # Invariants
/// - Labels are stable wire/catalog values; never rename a variant's label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256 (default).
    #[serde(rename = "sha256")]
    Sha256,
    /// SHA-512.
    #[serde(rename = "sha512")]
    Sha512,
}

impl HashAlgorithm {
    /// Returns the stable label used in the catalog and in file names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Returns the hex digest length for this algorithm.
    #[must_use]
    pub const fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Parses an algorithm from its stable label.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::UnknownAlgorithm`] for unrecognized labels.
    pub fn parse(label: &str) -> Result<Self, HashError> {
        match label {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(HashError::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// SECTION: Digests
// ============================================================================

/// A content digest paired with the algorithm that produced it.
///
/// # Invariants
/// - `value` is lowercase hex of exactly `algorithm.hex_len()` characters
///   when constructed through [`HashDigest::parse`] or [`hash_bytes`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashDigest {
    /// Algorithm that produced the digest.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest text.
    pub value: String,
}

impl HashDigest {
    /// Validates and normalizes a declared digest value.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::MalformedDigest`] when the value is not hex of
    /// the expected length for `algorithm`.
    pub fn parse(algorithm: HashAlgorithm, value: &str) -> Result<Self, HashError> {
        let normalized = value.to_ascii_lowercase();
        let well_formed = normalized.len() == algorithm.hex_len()
            && normalized.bytes().all(|byte| byte.is_ascii_hexdigit());
        if !well_formed {
            return Err(HashError::MalformedDigest {
                algorithm,
                value: value.to_string(),
            });
        }
        Ok(Self {
            algorithm,
            value: normalized,
        })
    }

    /// Returns the content-addressed file stem, `<label>-<hex>`.
    #[must_use]
    pub fn storage_stem(&self) -> String {
        format!("{}-{}", self.algorithm.label(), self.value)
    }
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.algorithm.label(), self.value)
    }
}

// ============================================================================
// SECTION: Hashing
// ============================================================================

/// Hashes `bytes` with `algorithm` and returns the digest.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    let value = match algorithm {
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
        HashAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
    };
    HashDigest {
        algorithm,
        value,
    }
}
