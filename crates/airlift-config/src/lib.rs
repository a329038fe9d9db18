// crates/airlift-config/src/lib.rs
// ============================================================================
// Module: Airlift Configuration
// Description: Engine configuration model, loading, and validation.
// Purpose: Give the loader, launcher, and reaper one validated config source.
// Dependencies: airlift-core, airlift-store-sqlite, serde, thiserror, toml, url
// ============================================================================

//! ## Overview
//! The host supplies one TOML file naming the update server, the scope and
//! runtime-compatibility version, the updates directory, and optional
//! tuning knobs. Loading is strict and fail-closed: oversized files,
//! non-UTF-8 bytes, unknown fields, and invalid field values are all
//! rejected with precise messages before any component starts. A validated
//! [`EngineConfig`] is immutable for the life of the process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use airlift_core::RuntimeVersion;
use airlift_core::ScopeKey;
use airlift_store_sqlite::CatalogConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default config path when the caller does not provide one.
const DEFAULT_CONFIG_PATH: &str = "airlift.toml";
/// Maximum accepted config file size in bytes.
const MAX_CONFIG_BYTES: usize = 1024 * 1024;
/// Maximum total config path length.
const MAX_CONFIG_PATH_LENGTH: usize = 4096;
/// Maximum length of a single config path component.
const MAX_CONFIG_PATH_COMPONENT: usize = 255;
/// Database file name used when no catalog section is configured.
const DEFAULT_CATALOG_FILE: &str = "airlift.db";
/// Default manifest/asset fetch timeout in milliseconds.
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;
/// Default maximum manifest size in bytes.
const DEFAULT_MAX_MANIFEST_BYTES: usize = 1024 * 1024;
/// Default maximum single-asset size in bytes.
const DEFAULT_MAX_ASSET_BYTES: usize = 256 * 1024 * 1024;
/// Default number of concurrent asset downloads per load.
const DEFAULT_MAX_CONCURRENCY: usize = 4;
/// Default reaper grace window for the development-client variant (24h).
const DEFAULT_REAP_GRACE_MS: i64 = 86_400_000;
/// Default user agent for outbound requests.
const DEFAULT_USER_AGENT: &str = "airlift/0.1";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced while loading or validating engine configuration.
///
/// # Invariants
/// - Any error means no partially-validated config is ever returned.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Config file failed a load guard or TOML parsing.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A field value failed validation.
    #[error("config invalid value: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: File Shape
// ============================================================================

/// Raw TOML shape of the engine configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EngineConfigFile {
    /// Update server manifest URL.
    update_url: String,
    /// Tenant/application scope key.
    scope_key: String,
    /// Runtime-compatibility version of the host build.
    runtime_version: String,
    /// Directory holding content-addressed update files.
    updates_directory: PathBuf,
    /// Extra request headers applied to manifest and asset fetches.
    #[serde(default)]
    request_headers: BTreeMap<String, String>,
    /// Directory holding the build-shipped embedded update, when present.
    #[serde(default)]
    embedded_directory: Option<PathBuf>,
    /// Allow cleartext `http://` update URLs (development servers).
    #[serde(default)]
    allow_http: bool,
    /// Whether development updates may be selected for launch.
    #[serde(default)]
    development_enabled: bool,
    /// Use the development-client reaper variant with a launch grace window.
    #[serde(default)]
    development_client: bool,
    /// Grace window in milliseconds for the development-client reaper.
    #[serde(default = "default_reap_grace_ms")]
    reap_grace_period_ms: i64,
    /// Manifest/asset fetch timeout in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    fetch_timeout_ms: u64,
    /// Maximum manifest size in bytes.
    #[serde(default = "default_max_manifest_bytes")]
    max_manifest_bytes: usize,
    /// Maximum single-asset size in bytes.
    #[serde(default = "default_max_asset_bytes")]
    max_asset_bytes: usize,
    /// Concurrent asset downloads per load.
    #[serde(default = "default_max_concurrency")]
    max_concurrency: usize,
    /// User agent for outbound requests.
    #[serde(default = "default_user_agent")]
    user_agent: String,
    /// Optional catalog store overrides.
    #[serde(default)]
    catalog: Option<CatalogConfig>,
}

/// Returns the default development-client grace window.
const fn default_reap_grace_ms() -> i64 {
    DEFAULT_REAP_GRACE_MS
}

/// Returns the default fetch timeout.
const fn default_fetch_timeout_ms() -> u64 {
    DEFAULT_FETCH_TIMEOUT_MS
}

/// Returns the default manifest size cap.
const fn default_max_manifest_bytes() -> usize {
    DEFAULT_MAX_MANIFEST_BYTES
}

/// Returns the default asset size cap.
const fn default_max_asset_bytes() -> usize {
    DEFAULT_MAX_ASSET_BYTES
}

/// Returns the default download concurrency.
const fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

/// Returns the default user agent.
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

// ============================================================================
// SECTION: Validated Config
// ============================================================================

/// Validated engine configuration shared by every component.
///
/// # Invariants
/// - `update_url` parses and uses an admitted scheme.
/// - `scope_key` and `runtime_version` are non-empty.
/// - Timeouts, size caps, and concurrency are greater than zero.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Update server manifest URL.
    pub update_url: Url,
    /// Tenant/application scope key.
    pub scope_key: ScopeKey,
    /// Runtime-compatibility version of the host build.
    pub runtime_version: RuntimeVersion,
    /// Directory holding content-addressed update files.
    pub updates_directory: PathBuf,
    /// Extra request headers applied to manifest and asset fetches.
    pub request_headers: BTreeMap<String, String>,
    /// Directory holding the build-shipped embedded update, when present.
    pub embedded_directory: Option<PathBuf>,
    /// Whether development updates may be selected for launch.
    pub development_enabled: bool,
    /// Use the development-client reaper variant with a launch grace window.
    pub development_client: bool,
    /// Grace window in milliseconds for the development-client reaper.
    pub reap_grace_period_ms: i64,
    /// Manifest/asset fetch timeout in milliseconds.
    pub fetch_timeout_ms: u64,
    /// Maximum manifest size in bytes.
    pub max_manifest_bytes: usize,
    /// Maximum single-asset size in bytes.
    pub max_asset_bytes: usize,
    /// Concurrent asset downloads per load.
    pub max_concurrency: usize,
    /// User agent for outbound requests.
    pub user_agent: String,
    /// Catalog store configuration.
    pub catalog: CatalogConfig,
}

impl EngineConfig {
    /// Loads and validates configuration from `path` (or the default path).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file fails a load guard, is not
    /// valid TOML for the expected shape, or any field fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        validate_config_path(path)?;
        let bytes = std::fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_BYTES {
            return Err(ConfigError::Parse("config file exceeds size limit".to_string()));
        }
        let text = String::from_utf8(bytes)
            .map_err(|_| ConfigError::Parse("config file must be utf-8".to_string()))?;
        let file: EngineConfigFile =
            toml::from_str(&text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        Self::from_file(file)
    }

    /// Validates a parsed config file into the canonical form.
    fn from_file(file: EngineConfigFile) -> Result<Self, ConfigError> {
        let update_url = Url::parse(&file.update_url)
            .map_err(|_| ConfigError::Invalid(format!("update_url: {}", file.update_url)))?;
        match update_url.scheme() {
            "https" => {}
            "http" if file.allow_http => {}
            "http" => {
                return Err(ConfigError::Invalid(
                    "update_url uses http without allow_http".to_string(),
                ));
            }
            other => {
                return Err(ConfigError::Invalid(format!(
                    "update_url scheme not supported: {other}"
                )));
            }
        }
        if file.scope_key.is_empty() {
            return Err(ConfigError::Invalid("scope_key must not be empty".to_string()));
        }
        if file.runtime_version.is_empty() {
            return Err(ConfigError::Invalid("runtime_version must not be empty".to_string()));
        }
        if file.updates_directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "updates_directory must not be empty".to_string(),
            ));
        }
        if file.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if file.max_manifest_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_manifest_bytes must be greater than zero".to_string(),
            ));
        }
        if file.max_asset_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_asset_bytes must be greater than zero".to_string(),
            ));
        }
        if file.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be greater than zero".to_string(),
            ));
        }
        if file.reap_grace_period_ms < 0 {
            return Err(ConfigError::Invalid(
                "reap_grace_period_ms must not be negative".to_string(),
            ));
        }
        let catalog = match file.catalog {
            Some(catalog) => catalog,
            None => CatalogConfig {
                path: file.updates_directory.join(DEFAULT_CATALOG_FILE),
                busy_timeout_ms: 5_000,
                journal_mode: airlift_store_sqlite::CatalogJournalMode::default(),
                sync_mode: airlift_store_sqlite::CatalogSyncMode::default(),
            },
        };
        Ok(Self {
            update_url,
            scope_key: ScopeKey::new(file.scope_key),
            runtime_version: RuntimeVersion::new(file.runtime_version),
            updates_directory: file.updates_directory,
            request_headers: file.request_headers,
            embedded_directory: file.embedded_directory,
            development_enabled: file.development_enabled,
            development_client: file.development_client,
            reap_grace_period_ms: file.reap_grace_period_ms,
            fetch_timeout_ms: file.fetch_timeout_ms,
            max_manifest_bytes: file.max_manifest_bytes,
            max_asset_bytes: file.max_asset_bytes,
            max_concurrency: file.max_concurrency,
            user_agent: file.user_agent,
            catalog,
        })
    }

    /// Returns the selection context for this host.
    #[must_use]
    pub fn selection_context(&self) -> airlift_core::SelectionContext {
        airlift_core::SelectionContext {
            scope_key: self.scope_key.clone(),
            runtime_version: self.runtime_version.clone(),
            development_enabled: self.development_enabled,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates config paths for safety limits.
fn validate_config_path(path: &Path) -> Result<(), ConfigError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_CONFIG_PATH_LENGTH {
        return Err(ConfigError::Parse("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_CONFIG_PATH_COMPONENT {
            return Err(ConfigError::Parse("config path component too long".to_string()));
        }
    }
    Ok(())
}
