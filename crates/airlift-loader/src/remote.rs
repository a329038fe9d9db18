// crates/airlift-loader/src/remote.rs
// ============================================================================
// Module: Airlift Remote Loader
// Description: Fetches a manifest and its assets into the catalog.
// Purpose: Drive one remote load: dedup, download, verify, link, promote.
// Dependencies: airlift-config, airlift-core, reqwest, serde_json, tracing
// ============================================================================

//! ## Overview
//! A remote load fetches the manifest, short-circuits when the catalog is
//! already up to date, inserts a pending update row, and resolves every
//! asset on a bounded worker pool: assets whose digest is already stored
//! are linked without network I/O; the rest are downloaded, hash-verified,
//! written under a content-addressed name, and registered. Writes for one
//! digest are serialized through a per-hash lock table, and a writer that
//! loses the registration race adopts the row inserted by the winner.
//!
//! Failure policy: a failed or mismatched asset is counted and siblings
//! continue; a failed launch asset fails the whole load and rolls the
//! pending row back; catalog and filesystem faults abort immediately.
//! Cancellation stops at the next asset boundary and leaves the pending
//! row resumable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread;

use airlift_config::EngineConfig;
use airlift_core::AssetDescriptor;
use airlift_core::AssetKey;
use airlift_core::AssetRecord;
use airlift_core::CatalogError;
use airlift_core::LoadProgress;
use airlift_core::Manifest;
use airlift_core::ManifestError;
use airlift_core::NewAsset;
use airlift_core::NewUpdate;
use airlift_core::ProgressSink;
use airlift_core::RuntimeVersion;
use airlift_core::UnixMillis;
use airlift_core::UpdateCatalog;
use airlift_core::UpdateId;
use airlift_core::UpdateStatus;
use airlift_core::hashing::hash_bytes;
use airlift_core::select_loader_base;
use airlift_core::should_replace_base;
use reqwest::blocking::Client;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::fetch::FetchError;
use crate::fetch::build_http_client;
use crate::fetch::fetch_bytes;
use crate::files::remove_content_file;
use crate::files::unix_millis;
use crate::files::write_content_file;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Per-asset failure reasons aggregated into the load outcome.
#[derive(Debug, Error, Clone)]
pub enum AssetFailureReason {
    /// Download failed (transport, status, or size cap).
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// Downloaded bytes did not match the declared digest.
    #[error("hash mismatch (expected {expected}, got {actual})")]
    HashMismatch {
        /// Declared digest hex.
        expected: String,
        /// Computed digest hex.
        actual: String,
    },
}

/// One asset that failed during a load.
#[derive(Debug, Clone)]
pub struct AssetFailure {
    /// Manifest key of the failed asset.
    pub key: AssetKey,
    /// Why it failed.
    pub reason: AssetFailureReason,
}

/// Errors that abort a whole load.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Manifest fetch or client construction failed.
    #[error("manifest fetch failed: {0}")]
    Fetch(#[from] FetchError),
    /// Manifest failed parsing or validation.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    /// Catalog fault; the enclosing operation aborted.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Filesystem fault while storing asset bytes.
    #[error("asset storage io error: {0}")]
    Io(String),
    /// The launch asset failed, so the update is unusable.
    #[error("launch asset {key} failed: {reason}")]
    LaunchAssetFailed {
        /// Manifest key of the launch asset.
        key: String,
        /// Failure description.
        reason: String,
    },
    /// An embedded asset's bytes did not match its manifest digest.
    #[error("embedded asset {key} integrity failure (expected {expected}, got {actual})")]
    AssetIntegrity {
        /// Manifest key of the asset.
        key: String,
        /// Declared digest hex.
        expected: String,
        /// Computed digest hex.
        actual: String,
    },
    /// The caller cancelled the load; the pending row is resumable.
    #[error("load cancelled")]
    Cancelled,
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Summary of one completed load.
#[derive(Debug, Clone)]
pub struct LoadedUpdate {
    /// Identifier of the update that became ready.
    pub update_id: UpdateId,
    /// Assets stored or deduplicated.
    pub successful: usize,
    /// Assets that failed and were accepted as failures.
    pub failed: usize,
    /// Per-asset failure details.
    pub failures: Vec<AssetFailure>,
}

/// Result of one remote load attempt.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// The catalog already holds this (or a newer) update; nothing fetched.
    AlreadyUpToDate,
    /// The manifest targets a different runtime version; nothing fetched.
    Incompatible {
        /// Runtime version declared by the manifest.
        runtime_version: RuntimeVersion,
    },
    /// A new update was stored and promoted to ready.
    Loaded(LoadedUpdate),
}

// ============================================================================
// SECTION: Worker Plumbing
// ============================================================================

/// Result of resolving one asset on a worker.
enum AssetResolution {
    /// Downloaded, verified, written, and registered.
    Stored,
    /// Matched an existing row by digest; linked without download.
    Deduped,
    /// Accepted per-asset failure.
    Failed(AssetFailure),
    /// Fault that aborts the whole load.
    Fatal(LoadError),
}

/// Non-success outcome of the per-asset resolution path.
enum ResolveFault {
    /// Accepted per-asset failure.
    Asset(AssetFailureReason),
    /// Fault that aborts the whole load.
    Fatal(LoadError),
}

impl From<CatalogError> for ResolveFault {
    fn from(err: CatalogError) -> Self {
        Self::Fatal(LoadError::Catalog(err))
    }
}

/// Per-digest lock table serializing writers of the same content.
#[derive(Default)]
struct HashLocks {
    /// One mutex per digest stem, created on first use.
    locks: Mutex<BTreeMap<String, Arc<Mutex<()>>>>,
}

impl HashLocks {
    /// Returns the lock guarding writes for `stem`.
    fn acquire(&self, stem: &str) -> Result<Arc<Mutex<()>>, LoadError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| LoadError::Io("hash lock table poisoned".to_string()))?;
        Ok(Arc::clone(locks.entry(stem.to_string()).or_default()))
    }
}

// ============================================================================
// SECTION: Remote Loader
// ============================================================================

/// Drives remote loads against one catalog and one engine configuration.
///
/// # Invariants
/// - Concurrent loads through the same instance serialize writes per
///   digest; the dedup race loser adopts the winner's row.
/// - A load failure never removes previously ready updates.
pub struct RemoteLoader<C> {
    /// Catalog handle shared with other components.
    catalog: C,
    /// Validated engine configuration.
    config: EngineConfig,
    /// Per-digest write locks.
    locks: HashLocks,
}

impl<C> RemoteLoader<C>
where
    C: UpdateCatalog + Sync,
{
    /// Creates a loader over `catalog` with `config`.
    #[must_use]
    pub fn new(catalog: C, config: EngineConfig) -> Self {
        Self {
            catalog,
            config,
            locks: HashLocks::default(),
        }
    }

    /// Runs one remote load to completion.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] on manifest/transport faults, catalog or
    /// filesystem faults, launch-asset failure, or cancellation. Per-asset
    /// failures do not error; they are aggregated into the outcome.
    pub fn load(
        &self,
        cancel: &CancelToken,
        progress: &dyn ProgressSink,
    ) -> Result<LoadOutcome, LoadError> {
        let client = build_http_client(&self.config.user_agent, self.config.fetch_timeout_ms)?;
        let body = fetch_bytes(
            &client,
            self.config.update_url.as_str(),
            &self.config.request_headers,
            self.config.max_manifest_bytes,
        )?;
        let manifest = Manifest::parse(&body)?;
        tracing::info!(update_id = %manifest.id, commit_time = %manifest.commit_time, "fetched manifest");

        if manifest.runtime_version != self.config.runtime_version {
            tracing::info!(
                manifest_runtime = %manifest.runtime_version,
                host_runtime = %self.config.runtime_version,
                "manifest targets a different runtime"
            );
            return Ok(LoadOutcome::Incompatible {
                runtime_version: manifest.runtime_version,
            });
        }

        let existing = self.catalog.update_by_id(manifest.id)?;
        if let Some(existing) = &existing
            && existing.status.is_launchable()
        {
            tracing::info!(update_id = %manifest.id, "update already stored");
            return Ok(LoadOutcome::AlreadyUpToDate);
        }

        let ctx = self.config.selection_context();
        let launchable = self.catalog.launchable_updates(&self.config.scope_key)?;
        let base = select_loader_base(&launchable, &ctx);
        if !should_replace_base(base, manifest.id, manifest.commit_time) {
            tracing::info!(update_id = %manifest.id, "manifest does not improve on current base");
            return Ok(LoadOutcome::AlreadyUpToDate);
        }

        if let Some(state) = &manifest.server_defined_state {
            for (key, value) in state {
                self.catalog.set_json_data(key, &self.config.scope_key, value)?;
            }
        }

        if existing.is_none() {
            self.catalog.add_update(&NewUpdate {
                id: manifest.id,
                scope_key: self.config.scope_key.clone(),
                commit_time: manifest.commit_time,
                runtime_version: manifest.runtime_version.clone(),
                metadata: manifest.metadata.clone(),
                status: UpdateStatus::Pending,
            })?;
        }

        self.resolve_assets(&client, &manifest, cancel, progress)
    }

    /// Aborts a cancelled or failed pending load, removing its row and any
    /// files owned only by it.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when the update is not pending or the catalog
    /// fails.
    pub fn abort(&self, update_id: UpdateId) -> Result<(), LoadError> {
        let orphans = self.catalog.abort_pending_update(update_id)?;
        self.unlink_assets(&orphans);
        tracing::info!(update_id = %update_id, removed_assets = orphans.len(), "aborted pending load");
        Ok(())
    }

    /// Fans asset resolution out over the worker pool and assembles the
    /// final outcome.
    fn resolve_assets(
        &self,
        client: &Client,
        manifest: &Manifest,
        cancel: &CancelToken,
        progress: &dyn ProgressSink,
    ) -> Result<LoadOutcome, LoadError> {
        let total = manifest.assets.len();
        let worker_count = self.config.max_concurrency.min(total).max(1);
        let queue: Mutex<VecDeque<usize>> = Mutex::new((0 .. total).collect());
        let halted = AtomicBool::new(false);
        let (result_tx, result_rx) = mpsc::channel::<(usize, AssetResolution)>();

        let mut successful = 0_usize;
        let mut failed = 0_usize;
        let mut failures: Vec<AssetFailure> = Vec::new();
        let mut fatal: Option<LoadError> = None;
        let mut launch_succeeded = false;

        thread::scope(|scope| {
            for _ in 0 .. worker_count {
                let tx = result_tx.clone();
                let queue = &queue;
                let halted = &halted;
                let manifest = &*manifest;
                scope.spawn(move || {
                    loop {
                        if cancel.is_cancelled() || halted.load(Ordering::Relaxed) {
                            break;
                        }
                        let index = match queue.lock() {
                            Ok(mut guard) => guard.pop_front(),
                            Err(_) => None,
                        };
                        let Some(index) = index else {
                            break;
                        };
                        let descriptor = &manifest.assets[index];
                        let is_launch = descriptor.key == manifest.launch_asset_key;
                        let resolution =
                            self.resolve_asset(client, descriptor, is_launch, manifest.id);
                        if matches!(resolution, AssetResolution::Fatal(_)) {
                            halted.store(true, Ordering::Relaxed);
                        }
                        if tx.send((index, resolution)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            for (index, resolution) in result_rx.iter() {
                let descriptor = &manifest.assets[index];
                let is_launch = descriptor.key == manifest.launch_asset_key;
                match resolution {
                    AssetResolution::Stored | AssetResolution::Deduped => {
                        successful += 1;
                        if is_launch {
                            launch_succeeded = true;
                        }
                    }
                    AssetResolution::Failed(failure) => {
                        failed += 1;
                        tracing::warn!(
                            asset_key = %failure.key,
                            reason = %failure.reason,
                            "asset failed"
                        );
                        failures.push(failure);
                    }
                    AssetResolution::Fatal(err) => {
                        fatal.get_or_insert(err);
                        continue;
                    }
                }
                progress.progress(LoadProgress {
                    successful,
                    failed,
                    total,
                });
            }
        });

        if let Some(err) = fatal {
            return Err(err);
        }
        if cancel.is_cancelled() {
            tracing::info!(update_id = %manifest.id, "load cancelled; pending row kept for resume");
            return Err(LoadError::Cancelled);
        }
        if !launch_succeeded {
            let reason = failures
                .iter()
                .find(|failure| failure.key == manifest.launch_asset_key)
                .map_or_else(|| "not resolved".to_string(), |failure| failure.reason.to_string());
            let orphans = self.catalog.abort_pending_update(manifest.id)?;
            self.unlink_assets(&orphans);
            return Err(LoadError::LaunchAssetFailed {
                key: manifest.launch_asset_key.to_string(),
                reason,
            });
        }

        self.catalog.mark_update_ready(manifest.id)?;
        tracing::info!(
            update_id = %manifest.id,
            successful,
            failed,
            total,
            "update ready"
        );
        Ok(LoadOutcome::Loaded(LoadedUpdate {
            update_id: manifest.id,
            successful,
            failed,
            failures,
        }))
    }

    /// Resolves one asset, classifying the outcome for the collector.
    fn resolve_asset(
        &self,
        client: &Client,
        descriptor: &AssetDescriptor,
        is_launch: bool,
        update_id: UpdateId,
    ) -> AssetResolution {
        match self.try_resolve(client, descriptor, is_launch, update_id) {
            Ok(resolution) => resolution,
            Err(ResolveFault::Asset(reason)) => AssetResolution::Failed(AssetFailure {
                key: descriptor.key.clone(),
                reason,
            }),
            Err(ResolveFault::Fatal(err)) => AssetResolution::Fatal(err),
        }
    }

    /// Dedup-or-download path for one asset, run under its digest lock.
    fn try_resolve(
        &self,
        client: &Client,
        descriptor: &AssetDescriptor,
        is_launch: bool,
        update_id: UpdateId,
    ) -> Result<AssetResolution, ResolveFault> {
        let lock = self
            .locks
            .acquire(&descriptor.hash.storage_stem())
            .map_err(ResolveFault::Fatal)?;
        let _guard = lock
            .lock()
            .map_err(|_| ResolveFault::Fatal(LoadError::Io("hash lock poisoned".to_string())))?;

        if let Some(record) = self.catalog.find_asset_by_hash(&descriptor.hash)? {
            self.ensure_asset_file(client, descriptor, &record)?;
            self.catalog.link_existing_asset(record.id, update_id, is_launch)?;
            return Ok(AssetResolution::Deduped);
        }

        let body = self.download_verified(client, descriptor)?;
        let relative_path = descriptor.storage_relative_path();
        write_content_file(&self.config.updates_directory, &relative_path, &body)
            .map_err(|err| ResolveFault::Fatal(LoadError::Io(err)))?;
        let asset = NewAsset {
            url: Some(descriptor.url.clone()),
            headers: descriptor
                .headers
                .as_ref()
                .and_then(|headers| serde_json::to_value(headers).ok()),
            content_type: Some(descriptor.content_type.clone()),
            metadata: None,
            download_time: UnixMillis::new(unix_millis()),
            relative_path,
            hash: descriptor.hash.clone(),
        };
        self.catalog.register_asset(&asset, update_id, is_launch)?;
        Ok(AssetResolution::Stored)
    }

    /// Downloads an asset body and verifies it against the declared digest.
    fn download_verified(
        &self,
        client: &Client,
        descriptor: &AssetDescriptor,
    ) -> Result<Vec<u8>, ResolveFault> {
        let mut headers = self.config.request_headers.clone();
        if let Some(extra) = &descriptor.headers {
            headers.extend(extra.iter().map(|(key, value)| (key.clone(), value.clone())));
        }
        let body = fetch_bytes(client, &descriptor.url, &headers, self.config.max_asset_bytes)
            .map_err(|err| ResolveFault::Asset(AssetFailureReason::Fetch(err.to_string())))?;
        let digest = hash_bytes(descriptor.hash.algorithm, &body);
        if digest.value != descriptor.hash.value {
            return Err(ResolveFault::Asset(AssetFailureReason::HashMismatch {
                expected: descriptor.hash.value.clone(),
                actual: digest.value,
            }));
        }
        Ok(body)
    }

    /// Restores a deduplicated asset's file when it is missing on disk.
    fn ensure_asset_file(
        &self,
        client: &Client,
        descriptor: &AssetDescriptor,
        record: &AssetRecord,
    ) -> Result<(), ResolveFault> {
        let path = self.config.updates_directory.join(&record.relative_path);
        let present = std::fs::metadata(&path).map(|meta| meta.len() > 0).unwrap_or(false);
        if present {
            return Ok(());
        }
        tracing::warn!(path = %path.display(), "stored asset file missing; re-downloading");
        let body = self.download_verified(client, descriptor)?;
        write_content_file(&self.config.updates_directory, &record.relative_path, &body)
            .map_err(|err| ResolveFault::Fatal(LoadError::Io(err)))
    }

    /// Unlinks the files behind removed asset rows.
    fn unlink_assets(&self, assets: &[AssetRecord]) {
        for asset in assets {
            remove_content_file(&self.config.updates_directory, &asset.relative_path);
        }
    }
}
