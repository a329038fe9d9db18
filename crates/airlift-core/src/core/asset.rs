// crates/airlift-core/src/core/asset.rs
// ============================================================================
// Module: Airlift Asset Model
// Description: Content-addressed asset record types.
// Purpose: Represent one stored file referenced by one or more updates.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! An asset is one file on disk, identified for deduplication by its
//! `(hash, algorithm)` pair: two downloads with equal digests resolve to a
//! single catalog row and a single content-addressed file. The
//! `marked_for_deletion` flag is the persistent half of the reaper's
//! two-phase delete protocol; it is only ever set and cleared inside catalog
//! transactions. Whether an asset is an update's launch asset is not stored
//! here; it is derived from the update row's `launch_asset_id`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::AssetId;
use crate::core::time::UnixMillis;
use crate::hashing::HashDigest;

// ============================================================================
// SECTION: Records
// ============================================================================

/// One asset row as read from the catalog.
///
/// # Invariants
/// - `(hash.value, hash.algorithm)` is unique across all rows.
/// - `relative_path` is relative to the updates root directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Catalog-assigned row id.
    pub id: AssetId,
    /// Source URL the asset was downloaded from, when known.
    pub url: Option<String>,
    /// Extra request headers used for the download, as a JSON object.
    pub headers: Option<Value>,
    /// Declared MIME/content type.
    pub content_type: Option<String>,
    /// Opaque server-provided metadata.
    pub metadata: Option<Value>,
    /// Timestamp of the successful download.
    pub download_time: UnixMillis,
    /// Content-addressed path relative to the updates root.
    pub relative_path: String,
    /// Content digest and algorithm (dedup identity).
    pub hash: HashDigest,
    /// Two-phase delete marker set by the reaper's mark pass.
    pub marked_for_deletion: bool,
}

/// Fields required to insert a new asset row.
///
/// # Invariants
/// - The file at `relative_path` must already exist and match `hash` before
///   the row is inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAsset {
    /// Source URL the asset was downloaded from, when known.
    pub url: Option<String>,
    /// Extra request headers used for the download, as a JSON object.
    pub headers: Option<Value>,
    /// Declared MIME/content type.
    pub content_type: Option<String>,
    /// Opaque server-provided metadata.
    pub metadata: Option<Value>,
    /// Timestamp of the successful download.
    pub download_time: UnixMillis,
    /// Content-addressed path relative to the updates root.
    pub relative_path: String,
    /// Content digest and algorithm (dedup identity).
    pub hash: HashDigest,
}
