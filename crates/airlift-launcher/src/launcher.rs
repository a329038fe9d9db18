// crates/airlift-launcher/src/launcher.rs
// ============================================================================
// Module: Airlift Launch Path
// Description: Verifies a selected update and produces the launch contract.
// Purpose: Guarantee the runtime only ever receives fully-present bundles.
// Dependencies: airlift-config, airlift-core, serde_json, tracing
// ============================================================================

//! ## Overview
//! Launching selects an update, resolves every linked asset's file, and
//! verifies each one exists and is non-empty. A verification failure does
//! not fail the process: the broken update is excluded and selection runs
//! again, terminating at the embedded update, which the host build
//! guarantees present. After handing back the contract the launcher
//! appends the update to the scoped launch-history entry (pruned to the
//! grace window) and spawns the reaper on a background thread; reap
//! failures reach the log, never the launch path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::thread;

use airlift_config::EngineConfig;
use airlift_core::CatalogError;
use airlift_core::LaunchContract;
use airlift_core::UpdateCatalog;
use airlift_core::UpdateId;
use airlift_core::UpdateRecord;
use airlift_core::UpdateSummary;
use airlift_core::select_update_to_launch;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::reaper::Reaper;
use crate::reaper::unix_millis;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Scoped key/value entry recording recent launches per update id.
pub(crate) const LAUNCH_HISTORY_KEY: &str = "launchHistory";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors that fail the launch path entirely.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Catalog fault; the launch aborted.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Updates-directory path could not be resolved.
    #[error("launch io error: {0}")]
    Io(String),
    /// Every candidate, including the embedded update, failed verification.
    #[error("no launchable update passed verification")]
    NoLaunchableUpdate,
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Outcome of verifying one candidate's files.
enum Verification {
    /// All files present; contract assembled.
    Ok(Box<LaunchContract>),
    /// The candidate cannot launch; selection should exclude it and retry.
    Failed(String),
}

// ============================================================================
// SECTION: Launcher
// ============================================================================

/// Produces launch contracts from the catalog.
///
/// # Invariants
/// - A returned contract references only files verified present and
///   non-empty at launch time.
/// - The reaper is spawned only after a successful launch and is never
///   awaited by the launch path.
pub struct Launcher<C> {
    /// Catalog handle shared with other components.
    catalog: C,
    /// Validated engine configuration.
    config: EngineConfig,
}

impl<C> Launcher<C>
where
    C: UpdateCatalog + Clone + Send + 'static,
{
    /// Creates a launcher over `catalog` with `config`.
    #[must_use]
    pub fn new(catalog: C, config: EngineConfig) -> Self {
        Self {
            catalog,
            config,
        }
    }

    /// Selects, verifies, and launches an update, spawning the reaper on
    /// success.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] on catalog faults or when no candidate
    /// (including the embedded fallback) passes file verification.
    pub fn launch(&self) -> Result<LaunchContract, LaunchError> {
        let contract = self.launch_without_reaping()?;
        self.spawn_reaper(contract.update.id);
        Ok(contract)
    }

    /// Selects and verifies an update without triggering the reaper.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] on catalog faults or when no candidate
    /// passes file verification.
    pub fn launch_without_reaping(&self) -> Result<LaunchContract, LaunchError> {
        let ctx = self.config.selection_context();
        let mut candidates = self.catalog.launchable_updates(&self.config.scope_key)?;
        loop {
            let Some(selected) = select_update_to_launch(&candidates, &ctx).cloned() else {
                return Err(LaunchError::NoLaunchableUpdate);
            };
            match self.verify_update(&selected)? {
                Verification::Ok(contract) => {
                    self.record_launch(selected.id)?;
                    tracing::info!(
                        update_id = %selected.id,
                        status = %selected.status,
                        "update launched"
                    );
                    return Ok(*contract);
                }
                Verification::Failed(reason) => {
                    tracing::warn!(
                        update_id = %selected.id,
                        reason = %reason,
                        "update failed verification; retrying selection without it"
                    );
                    candidates.retain(|update| update.id != selected.id);
                }
            }
        }
    }

    /// Verifies every linked asset of `update` and assembles the contract.
    fn verify_update(&self, update: &UpdateRecord) -> Result<Verification, LaunchError> {
        let Some(launch_asset_id) = update.launch_asset_id else {
            return Ok(Verification::Failed("no launch asset linked".to_string()));
        };
        let assets = self.catalog.assets_for_update(update.id)?;
        if assets.is_empty() {
            return Ok(Verification::Failed("no assets linked".to_string()));
        }
        let root = std::fs::canonicalize(&self.config.updates_directory)
            .map_err(|err| LaunchError::Io(err.to_string()))?;

        let mut resolved: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut launch_asset_path: Option<PathBuf> = None;
        for asset in &assets {
            let path = root.join(&asset.relative_path);
            let present = std::fs::metadata(&path).map(|meta| meta.len() > 0).unwrap_or(false);
            if !present {
                return Ok(Verification::Failed(format!(
                    "asset file missing or empty: {}",
                    asset.relative_path
                )));
            }
            if asset.id == launch_asset_id {
                launch_asset_path = Some(path.clone());
            }
            resolved.insert(asset.hash.to_string(), path);
        }
        let Some(launch_asset_path) = launch_asset_path else {
            return Ok(Verification::Failed(
                "launch asset is not among linked assets".to_string(),
            ));
        };

        Ok(Verification::Ok(Box::new(LaunchContract {
            update: UpdateSummary::from(update),
            assets: resolved,
            launch_asset_path,
        })))
    }

    /// Appends the launched update to the scoped launch-history entry,
    /// pruning entries older than the grace window.
    fn record_launch(&self, update_id: UpdateId) -> Result<(), CatalogError> {
        let now = unix_millis();
        let cutoff = now.saturating_sub(self.config.reap_grace_period_ms);
        let mut history = match self
            .catalog
            .json_data(LAUNCH_HISTORY_KEY, &self.config.scope_key)?
        {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        history.insert(update_id.to_string(), Value::from(now));
        history.retain(|_, value| value.as_i64().is_some_and(|at| at >= cutoff));
        self.catalog.set_json_data(
            LAUNCH_HISTORY_KEY,
            &self.config.scope_key,
            &Value::Object(history),
        )
    }

    /// Spawns the reaper for `launched_id` on a background thread.
    fn spawn_reaper(&self, launched_id: UpdateId) {
        let catalog = self.catalog.clone();
        let config = self.config.clone();
        let spawned = thread::Builder::new().name("airlift-reaper".to_string()).spawn(move || {
            let reaper = Reaper::new(catalog, config);
            match reaper.run(launched_id) {
                Ok(stats) => {
                    tracing::info!(
                        deleted_updates = stats.deleted_updates,
                        deleted_assets = stats.deleted_assets,
                        "reap pass finished"
                    );
                }
                Err(err) => {
                    tracing::error!(error = %err, "reap pass failed");
                }
            }
        });
        if let Err(err) = spawned {
            tracing::error!(error = %err, "failed to spawn reaper thread");
        }
    }
}
