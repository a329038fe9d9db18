// crates/airlift-core/src/core/identifiers.rs
// ============================================================================
// Module: Airlift Identifiers
// Description: Canonical opaque identifiers for updates, assets, and scopes.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde, thiserror, uuid
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Airlift.
//! Update identifiers are 128-bit UUIDs supplied by the update server and
//! serialize as hyphenated strings on the wire and in the catalog. Asset
//! identifiers are catalog-assigned integers; the content hash remains the
//! true identity for deduplication. Scope keys, runtime versions, and asset
//! keys are opaque strings with no normalization applied.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error returned when an update identifier cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid update id: {0}")]
pub struct UpdateIdParseError(
    /// Offending input.
    pub String,
);

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Globally unique identifier for one update.
///
/// # Invariants
/// - 128-bit, immutable, assigned by the update server.
/// - Serializes as a hyphenated lowercase UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateId(Uuid);

impl UpdateId {
    /// Creates an update identifier from a UUID value.
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Parses an update identifier from its hyphenated string form.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateIdParseError`] when the input is not a valid UUID.
    pub fn parse(raw: &str) -> Result<Self, UpdateIdParseError> {
        Uuid::parse_str(raw).map(Self).map_err(|_| UpdateIdParseError(raw.to_string()))
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// Catalog-assigned integer identifier for one stored asset row.
///
/// # Invariants
/// - Assigned by the catalog on insert (autoincrement, always >= 1).
/// - Identity for deduplication is the content hash, not this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(i64);

impl AssetId {
    /// Creates an asset identifier from a raw row id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw row id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Tenant/application scope for updates and scoped key/value state.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeKey(String);

impl ScopeKey {
    /// Creates a new scope key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the scope key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ScopeKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ScopeKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Runtime-compatibility version string carried by updates and the host.
///
/// # Invariants
/// - Opaque; compatibility is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeVersion(String);

impl RuntimeVersion {
    /// Creates a new runtime version.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Returns the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RuntimeVersion {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RuntimeVersion {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Manifest-local name for one asset within an update.
///
/// # Invariants
/// - Unique within a single manifest; never persisted in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetKey(String);

impl AssetKey {
    /// Creates a new asset key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for AssetKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
