// crates/airlift-core/src/interfaces/mod.rs
// ============================================================================
// Module: Airlift Catalog Interface
// Description: Store contract and shared callback surfaces.
// Purpose: Define the operations every catalog backend must provide.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`UpdateCatalog`] is the contract between the engine's components and
//! durable storage. Every mutating operation is transactional: a failure
//! partway through a multi-row change must leave no partial state visible
//! to other handles. A duplicate-hash constraint violation during asset
//! registration is not an error: backends resolve it by reusing the
//! existing row, which is how deduplication races are settled.
//!
//! [`ProgressSink`] is the loader's incremental progress callback; it is
//! implemented for plain closures so callers can pass a lambda.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::asset::AssetRecord;
use crate::core::asset::NewAsset;
use crate::core::identifiers::AssetId;
use crate::core::identifiers::ScopeKey;
use crate::core::identifiers::UpdateId;
use crate::core::update::NewUpdate;
use crate::core::update::UpdateRecord;
use crate::hashing::HashDigest;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by catalog backends.
///
/// # Invariants
/// - Messages never embed asset bytes or full metadata payloads.
/// - Any variant aborts the enclosing load/launch/reap operation.
#[derive(Debug, Error, Clone)]
pub enum CatalogError {
    /// Underlying storage engine error.
    #[error("catalog db error: {0}")]
    Db(String),
    /// Filesystem or connection I/O error.
    #[error("catalog io error: {0}")]
    Io(String),
    /// Stored data failed an integrity check.
    #[error("catalog corruption: {0}")]
    Corrupt(String),
    /// Caller-supplied data was rejected.
    #[error("catalog invalid data: {0}")]
    Invalid(String),
    /// Referenced row does not exist.
    #[error("catalog missing row: {0}")]
    Missing(String),
    /// Ready promotion failed its invariant re-check.
    #[error("update not ready: {0}")]
    NotReady(String),
}

// ============================================================================
// SECTION: Progress
// ============================================================================

/// Incremental load progress, reported after each asset resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadProgress {
    /// Assets stored or deduplicated so far.
    pub successful: usize,
    /// Assets that failed download or verification so far.
    pub failed: usize,
    /// Total assets declared by the manifest.
    pub total: usize,
}

/// Receives incremental load progress.
pub trait ProgressSink: Send + Sync {
    /// Called after each asset resolves (success or accepted failure).
    fn progress(&self, progress: LoadProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(LoadProgress) + Send + Sync,
{
    fn progress(&self, progress: LoadProgress) {
        self(progress);
    }
}

/// Progress sink that discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn progress(&self, _progress: LoadProgress) {}
}

// ============================================================================
// SECTION: Catalog Contract
// ============================================================================

/// Durable catalog operations shared by the loader, launcher, and reaper.
///
/// # Invariants
/// - Multi-row mutations execute inside a single backend transaction.
/// - `register_asset` resolves duplicate-hash conflicts by reusing the
///   existing row and linking it (never an error).
/// - Mark/delete operations implement the reaper's two-phase protocol; the
///   mark pass and the row-delete pass are separate transactions so no
///   transaction is held across filesystem deletes.
pub trait UpdateCatalog {
    /// Inserts a new update row.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage faults or when a row with the
    /// same id already exists.
    fn add_update(&self, update: &NewUpdate) -> Result<(), CatalogError>;

    /// Returns the update with `id`, when present.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage faults.
    fn update_by_id(&self, id: UpdateId) -> Result<Option<UpdateRecord>, CatalogError>;

    /// Returns every update row.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage faults.
    fn all_updates(&self) -> Result<Vec<UpdateRecord>, CatalogError>;

    /// Returns every update row for `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage faults.
    fn updates_for_scope(&self, scope: &ScopeKey) -> Result<Vec<UpdateRecord>, CatalogError>;

    /// Returns launchable updates (ready, embedded, development) for `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage faults.
    fn launchable_updates(&self, scope: &ScopeKey) -> Result<Vec<UpdateRecord>, CatalogError>;

    /// Finds an asset row by its dedup identity.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage faults.
    fn find_asset_by_hash(&self, digest: &HashDigest)
    -> Result<Option<AssetRecord>, CatalogError>;

    /// Inserts (or reuses) an asset row and links it to `update_id`, all in
    /// one transaction; sets the update's launch asset when flagged.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage faults; a duplicate-hash
    /// constraint violation is resolved internally, not surfaced.
    fn register_asset(
        &self,
        asset: &NewAsset,
        update_id: UpdateId,
        is_launch_asset: bool,
    ) -> Result<AssetId, CatalogError>;

    /// Links an already-stored asset to `update_id`; clears any deletion
    /// mark on the row. Returns false when the asset row does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage faults.
    fn link_existing_asset(
        &self,
        asset_id: AssetId,
        update_id: UpdateId,
        is_launch_asset: bool,
    ) -> Result<bool, CatalogError>;

    /// Returns every asset linked to `update_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage faults.
    fn assets_for_update(&self, update_id: UpdateId) -> Result<Vec<AssetRecord>, CatalogError>;

    /// Promotes a pending update to ready after re-checking, inside the
    /// same transaction, that a launch asset is linked and every linked
    /// asset has a non-empty relative path.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotReady`] when the invariant re-check
    /// fails, [`CatalogError::Missing`] for unknown ids, or other variants
    /// on storage faults.
    fn mark_update_ready(&self, update_id: UpdateId) -> Result<(), CatalogError>;

    /// Sets or clears the `keep` pin on an update.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage faults or unknown ids.
    fn set_update_keep(&self, update_id: UpdateId, keep: bool) -> Result<(), CatalogError>;

    /// Deletes a pending update and any assets referenced only by it
    /// (the explicit-abort path for cancelled loads). Returns the removed
    /// assets so the caller can unlink their files.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Invalid`] when the update is not pending,
    /// or other variants on storage faults.
    fn abort_pending_update(&self, update_id: UpdateId) -> Result<Vec<AssetRecord>, CatalogError>;

    /// Marks, in one transaction, every asset owned exclusively by
    /// `deletable` updates (mark all, unmark assets linked to retained
    /// updates, unmark shared-path survivors) and returns the marked rows.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage faults.
    fn mark_assets_for_deletion(
        &self,
        deletable: &[UpdateId],
    ) -> Result<Vec<AssetRecord>, CatalogError>;

    /// Deletes asset rows still carrying the deletion mark; runs after the
    /// marked files were unlinked. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage faults.
    fn delete_marked_assets(&self) -> Result<u64, CatalogError>;

    /// Deletes update rows; join rows cascade.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage faults.
    fn delete_updates(&self, ids: &[UpdateId]) -> Result<(), CatalogError>;

    /// Returns the scoped key/value entry for `(key, scope)`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage faults or non-JSON payloads.
    fn json_data(&self, key: &str, scope: &ScopeKey) -> Result<Option<Value>, CatalogError>;

    /// Writes the scoped key/value entry for `(key, scope)` with
    /// last-write-wins semantics, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on storage faults.
    fn set_json_data(
        &self,
        key: &str,
        scope: &ScopeKey,
        value: &Value,
    ) -> Result<(), CatalogError>;
}
