// crates/airlift-loader/src/embedded.rs
// ============================================================================
// Module: Airlift Embedded Loader
// Description: Registers the build-shipped update from a local directory.
// Purpose: Guarantee a launchable fallback before any remote load runs.
// Dependencies: airlift-config, airlift-core, tracing
// ============================================================================

//! ## Overview
//! The embedded update ships inside the host build as a directory holding
//! `manifest.json` plus one file per asset, named by its manifest key (the
//! transient embedded-filename hint, never persisted). Loading copies each
//! file under its content-addressed name and registers an `Embedded` update
//! row. The operation is idempotent: once the row exists it is returned
//! as-is. Integrity failures are fatal: a corrupt embedded bundle means
//! the host build itself is broken, and there is nothing to fall back to.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use airlift_config::EngineConfig;
use airlift_core::Manifest;
use airlift_core::NewAsset;
use airlift_core::NewUpdate;
use airlift_core::UnixMillis;
use airlift_core::UpdateCatalog;
use airlift_core::UpdateId;
use airlift_core::UpdateStatus;
use airlift_core::hashing::hash_bytes;

use crate::files::unix_millis;
use crate::files::write_content_file;
use crate::remote::LoadError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Manifest file name inside the embedded directory.
const EMBEDDED_MANIFEST_FILE: &str = "manifest.json";

// ============================================================================
// SECTION: Embedded Loader
// ============================================================================

/// Registers the build-shipped embedded update in the catalog.
///
/// # Invariants
/// - Idempotent: re-running with the same embedded bundle is a no-op.
/// - The embedded update row is created with status `Embedded` and is
///   never promoted, repinned, or reaped.
pub struct EmbeddedLoader<C> {
    /// Catalog handle shared with other components.
    catalog: C,
    /// Validated engine configuration.
    config: EngineConfig,
}

impl<C> EmbeddedLoader<C>
where
    C: UpdateCatalog,
{
    /// Creates an embedded loader over `catalog` with `config`.
    #[must_use]
    pub fn new(catalog: C, config: EngineConfig) -> Self {
        Self {
            catalog,
            config,
        }
    }

    /// Loads the embedded update, returning its id.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when no embedded directory is configured, the
    /// manifest or an asset file is unreadable, an asset fails its digest
    /// check, or the catalog faults.
    pub fn load(&self) -> Result<UpdateId, LoadError> {
        let Some(directory) = &self.config.embedded_directory else {
            return Err(LoadError::Io("no embedded directory configured".to_string()));
        };
        let manifest = read_embedded_manifest(directory)?;

        if let Some(existing) = self.catalog.update_by_id(manifest.id)? {
            if existing.status == UpdateStatus::Embedded {
                return Ok(existing.id);
            }
            return Err(LoadError::Io(format!(
                "embedded update id {} already stored with status {}",
                existing.id, existing.status
            )));
        }

        self.catalog.add_update(&NewUpdate {
            id: manifest.id,
            scope_key: self.config.scope_key.clone(),
            commit_time: manifest.commit_time,
            runtime_version: manifest.runtime_version.clone(),
            metadata: manifest.metadata.clone(),
            status: UpdateStatus::Embedded,
        })?;

        for descriptor in &manifest.assets {
            let source = directory.join(descriptor.key.as_str());
            let bytes =
                std::fs::read(&source).map_err(|err| LoadError::Io(err.to_string()))?;
            let digest = hash_bytes(descriptor.hash.algorithm, &bytes);
            if digest.value != descriptor.hash.value {
                return Err(LoadError::AssetIntegrity {
                    key: descriptor.key.to_string(),
                    expected: descriptor.hash.value.clone(),
                    actual: digest.value,
                });
            }
            let relative_path = descriptor.storage_relative_path();
            write_content_file(&self.config.updates_directory, &relative_path, &bytes)
                .map_err(LoadError::Io)?;
            let is_launch = descriptor.key == manifest.launch_asset_key;
            self.catalog.register_asset(
                &NewAsset {
                    url: None,
                    headers: None,
                    content_type: Some(descriptor.content_type.clone()),
                    metadata: None,
                    download_time: UnixMillis::new(unix_millis()),
                    relative_path,
                    hash: descriptor.hash.clone(),
                },
                manifest.id,
                is_launch,
            )?;
        }

        tracing::info!(
            update_id = %manifest.id,
            assets = manifest.assets.len(),
            "embedded update registered"
        );
        Ok(manifest.id)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads and parses the embedded manifest from `directory`.
fn read_embedded_manifest(directory: &Path) -> Result<Manifest, LoadError> {
    let path = directory.join(EMBEDDED_MANIFEST_FILE);
    let body = std::fs::read(&path).map_err(|err| LoadError::Io(err.to_string()))?;
    Ok(Manifest::parse(&body)?)
}
