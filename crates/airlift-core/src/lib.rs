// crates/airlift-core/src/lib.rs
// ============================================================================
// Module: Airlift Core
// Description: Domain model and pure decision logic for the update engine.
// Purpose: Define catalog records, manifests, selection policy, and the
//          catalog interface shared by the loader, launcher, and reaper.
// Dependencies: serde, serde_json, sha2, hex, thiserror, time, url, uuid
// ============================================================================

//! ## Overview
//! `airlift-core` holds everything about the update engine that is pure:
//! identifiers, timestamps, content hashing, the update/asset record model,
//! manifest parsing, the launch contract, the [`UpdateCatalog`] interface
//! implemented by the `SQLite` store, and the three selection-policy
//! functions (launch, loader base, reaper eligibility).
//!
//! Nothing in this crate performs I/O or reads the wall clock; callers
//! supply catalog snapshots and timestamps, which keeps every decision
//! deterministic and replayable.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod core;
pub mod hashing;
pub mod interfaces;
pub mod policy;

pub use crate::core::asset::AssetRecord;
pub use crate::core::asset::NewAsset;
pub use crate::core::contract::LaunchContract;
pub use crate::core::contract::UpdateSummary;
pub use crate::core::identifiers::AssetId;
pub use crate::core::identifiers::AssetKey;
pub use crate::core::identifiers::RuntimeVersion;
pub use crate::core::identifiers::ScopeKey;
pub use crate::core::identifiers::UpdateId;
pub use crate::core::manifest::AssetDescriptor;
pub use crate::core::manifest::Manifest;
pub use crate::core::manifest::ManifestError;
pub use crate::core::time::UnixMillis;
pub use crate::core::update::NewUpdate;
pub use crate::core::update::UpdateRecord;
pub use crate::core::update::UpdateStatus;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use interfaces::CatalogError;
pub use interfaces::LoadProgress;
pub use interfaces::NullProgressSink;
pub use interfaces::ProgressSink;
pub use interfaces::UpdateCatalog;
pub use policy::ReaperPolicy;
pub use policy::SelectionContext;
pub use policy::select_loader_base;
pub use policy::select_update_to_launch;
pub use policy::select_updates_to_reap;
pub use policy::should_replace_base;
