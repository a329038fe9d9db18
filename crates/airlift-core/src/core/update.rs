// crates/airlift-core/src/core/update.rs
// ============================================================================
// Module: Airlift Update Model
// Description: Update lifecycle states and catalog record types.
// Purpose: Represent one downloadable bundle version and its status.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! An update is one versioned bundle. It is created `Pending` by the loader,
//! promoted to `Ready` only once every linked asset is durably stored, and
//! removed only by the reaper. `Embedded` rows describe the build-shipped
//! fallback and are never deletable; `Development` rows come from a local
//! dev loader and are exempt from default retention. Status participates in
//! selection purely through pattern matching; no behavior is attached
//! to the record itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::AssetId;
use crate::core::identifiers::RuntimeVersion;
use crate::core::identifiers::ScopeKey;
use crate::core::identifiers::UpdateId;
use crate::core::time::UnixMillis;

// ============================================================================
// SECTION: Status
// ============================================================================

/// Lifecycle status of an update.
///
/// # Invariants
/// - Stored as a stable integer tag; never renumber variants.
/// - `Ready` implies every linked asset has a non-null relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    /// Download in progress; not launchable.
    Pending,
    /// Fully downloaded and launchable.
    Ready,
    /// Shipped with the host build; always retained, never deleted.
    Embedded,
    /// Produced by a local development loader; exempt from default retention.
    Development,
}

impl UpdateStatus {
    /// Returns the stable integer tag stored in the catalog.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Pending => 0,
            Self::Ready => 1,
            Self::Embedded => 2,
            Self::Development => 3,
        }
    }

    /// Parses a status from its stored integer tag.
    #[must_use]
    pub const fn from_i64(tag: i64) -> Option<Self> {
        match tag {
            0 => Some(Self::Pending),
            1 => Some(Self::Ready),
            2 => Some(Self::Embedded),
            3 => Some(Self::Development),
            _ => None,
        }
    }

    /// Returns true when updates with this status may be launched.
    #[must_use]
    pub const fn is_launchable(self) -> bool {
        matches!(self, Self::Ready | Self::Embedded | Self::Development)
    }

    /// Returns the stable lowercase label for logs and messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Embedded => "embedded",
            Self::Development => "development",
        }
    }
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// One update row as read from the catalog.
///
/// # Invariants
/// - `launch_asset_id` is non-null for every `Ready` update.
/// - Immutable after `Ready` except for `keep` and deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// Globally unique update identifier.
    pub id: UpdateId,
    /// Tenant/application scope.
    pub scope_key: ScopeKey,
    /// Server-assigned commit timestamp.
    pub commit_time: UnixMillis,
    /// Runtime-compatibility version string.
    pub runtime_version: RuntimeVersion,
    /// Catalog id of the launch asset, once linked.
    pub launch_asset_id: Option<AssetId>,
    /// Opaque server-provided metadata.
    pub metadata: Option<Value>,
    /// Lifecycle status.
    pub status: UpdateStatus,
    /// Pin against removal regardless of reaper policy.
    pub keep: bool,
}

/// Fields required to insert a new update row.
///
/// # Invariants
/// - `status` must be `Pending`, `Embedded`, or `Development`; rows are
///   never inserted `Ready`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUpdate {
    /// Globally unique update identifier.
    pub id: UpdateId,
    /// Tenant/application scope.
    pub scope_key: ScopeKey,
    /// Server-assigned commit timestamp.
    pub commit_time: UnixMillis,
    /// Runtime-compatibility version string.
    pub runtime_version: RuntimeVersion,
    /// Opaque server-provided metadata.
    pub metadata: Option<Value>,
    /// Initial lifecycle status.
    pub status: UpdateStatus,
}
