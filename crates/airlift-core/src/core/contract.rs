// crates/airlift-core/src/core/contract.rs
// ============================================================================
// Module: Airlift Launch Contract
// Description: The engine's outward launch surface.
// Purpose: Hand the external runtime a manifest plus resolved asset paths.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The launch contract is the only output the engine hands to the external
//! runtime collaborator: a summary of the selected update plus the absolute
//! path of every verified asset, keyed by digest label, with the entry-point
//! bundle called out separately. The launcher constructs a contract only
//! after verifying every file exists and is non-empty.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::RuntimeVersion;
use crate::core::identifiers::ScopeKey;
use crate::core::identifiers::UpdateId;
use crate::core::time::UnixMillis;
use crate::core::update::UpdateRecord;

// ============================================================================
// SECTION: Contract Types
// ============================================================================

/// Update metadata carried inside the launch contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSummary {
    /// Update identifier.
    pub id: UpdateId,
    /// Tenant/application scope.
    pub scope_key: ScopeKey,
    /// Server-assigned commit timestamp.
    pub commit_time: UnixMillis,
    /// Runtime-compatibility version.
    pub runtime_version: RuntimeVersion,
    /// Opaque server-provided metadata.
    pub metadata: Option<Value>,
}

impl From<&UpdateRecord> for UpdateSummary {
    fn from(record: &UpdateRecord) -> Self {
        Self {
            id: record.id,
            scope_key: record.scope_key.clone(),
            commit_time: record.commit_time,
            runtime_version: record.runtime_version.clone(),
            metadata: record.metadata.clone(),
        }
    }
}

/// The launch contract consumed by the external runtime.
///
/// # Invariants
/// - Every path in `assets` (and `launch_asset_path`) existed and was
///   non-empty at verification time.
/// - `launch_asset_path` is also present as a value in `assets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchContract {
    /// Metadata for the launched update.
    pub update: UpdateSummary,
    /// Absolute path per verified asset, keyed by digest label
    /// (`<algorithm>-<hex>`).
    pub assets: BTreeMap<String, PathBuf>,
    /// Absolute path of the entry-point bundle.
    pub launch_asset_path: PathBuf,
}
