// crates/airlift-launcher/src/reaper.rs
// ============================================================================
// Module: Airlift Reaper
// Description: Two-phase garbage collection of stale updates and assets.
// Purpose: Reclaim storage after a successful launch without racing readers.
// Dependencies: airlift-config, airlift-core, serde_json, tracing
// ============================================================================

//! ## Overview
//! One reap pass computes the deletable update set with the pure
//! eligibility policy, marks their exclusively-owned assets inside one
//! catalog transaction, unlinks the marked files while holding no
//! transaction, and only then deletes the asset rows and the update rows.
//! A concurrent launcher therefore observes either "still present" or
//! "no longer selectable", never a half-deleted file. The
//! development-client variant reads the launch-history entry and spares
//! anything launched within the grace window.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use airlift_config::EngineConfig;
use airlift_core::CatalogError;
use airlift_core::ReaperPolicy;
use airlift_core::UpdateCatalog;
use airlift_core::UpdateId;
use airlift_core::select_updates_to_reap;
use serde_json::Value;
use thiserror::Error;

use crate::launcher::LAUNCH_HISTORY_KEY;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors that abort a reap pass.
#[derive(Debug, Error)]
pub enum ReapError {
    /// Catalog fault; the pass aborted with no partial row deletes.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

// ============================================================================
// SECTION: Stats
// ============================================================================

/// Counters describing one completed reap pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapStats {
    /// Update rows deleted.
    pub deleted_updates: usize,
    /// Asset rows deleted (files unlinked first).
    pub deleted_assets: u64,
}

// ============================================================================
// SECTION: Reaper
// ============================================================================

/// Applies the removal policy after a successful launch.
///
/// # Invariants
/// - Never deletes embedded updates, pinned updates, the launched update,
///   or assets still referenced by a retained update.
/// - No catalog transaction is held while files are unlinked.
pub struct Reaper<C> {
    /// Catalog handle shared with other components.
    catalog: C,
    /// Validated engine configuration.
    config: EngineConfig,
}

impl<C> Reaper<C>
where
    C: UpdateCatalog,
{
    /// Creates a reaper over `catalog` with `config`.
    #[must_use]
    pub fn new(catalog: C, config: EngineConfig) -> Self {
        Self {
            catalog,
            config,
        }
    }

    /// Runs one reap pass anchored at the launched update.
    ///
    /// # Errors
    ///
    /// Returns [`ReapError`] on catalog faults; missing files during the
    /// unlink step are tolerated and logged.
    pub fn run(&self, launched_id: UpdateId) -> Result<ReapStats, ReapError> {
        let all = self.catalog.all_updates()?;
        let policy = if self.config.development_client {
            ReaperPolicy::DevelopmentClient {
                recently_launched: self.recent_launches()?,
            }
        } else {
            ReaperPolicy::Default
        };
        let deletable = select_updates_to_reap(&all, launched_id, &policy);
        if deletable.is_empty() {
            tracing::debug!(launched_id = %launched_id, "nothing eligible to reap");
            return Ok(ReapStats::default());
        }

        let marked = self.catalog.mark_assets_for_deletion(&deletable)?;
        for asset in &marked {
            remove_asset_file(&self.config, &asset.relative_path);
        }
        let deleted_assets = self.catalog.delete_marked_assets()?;
        self.catalog.delete_updates(&deletable)?;

        tracing::info!(
            launched_id = %launched_id,
            deleted_updates = deletable.len(),
            deleted_assets,
            "reap pass complete"
        );
        Ok(ReapStats {
            deleted_updates: deletable.len(),
            deleted_assets,
        })
    }

    /// Reads the launch-history entry and returns ids launched within the
    /// grace window.
    fn recent_launches(&self) -> Result<BTreeSet<UpdateId>, ReapError> {
        let cutoff = unix_millis().saturating_sub(self.config.reap_grace_period_ms);
        let Some(Value::Object(history)) =
            self.catalog.json_data(LAUNCH_HISTORY_KEY, &self.config.scope_key)?
        else {
            return Ok(BTreeSet::new());
        };
        let mut recent = BTreeSet::new();
        for (raw_id, value) in history {
            let launched_recently = value.as_i64().is_some_and(|at| at >= cutoff);
            if !launched_recently {
                continue;
            }
            if let Ok(id) = UpdateId::parse(&raw_id) {
                recent.insert(id);
            }
        }
        Ok(recent)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Unlinks one asset file, tolerating files already gone.
fn remove_asset_file(config: &EngineConfig, relative_path: &str) {
    let target = config.updates_directory.join(relative_path);
    if let Err(err) = std::fs::remove_file(&target)
        && err.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %target.display(), error = %err, "failed to remove asset file");
    }
}

/// Returns the current wall-clock time as unix milliseconds.
pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
