// crates/airlift-core/src/core/manifest.rs
// ============================================================================
// Module: Airlift Manifest Model
// Description: Wire format for server-provided update manifests.
// Purpose: Parse and validate manifests fail-closed before any download.
// Dependencies: serde, serde_json, url
// ============================================================================

//! ## Overview
//! A manifest is the server's description of one update: identity, commit
//! time, runtime version, the asset list, and which asset is the entry
//! point. Parsing is strict and fail-closed: the launch asset key must
//! resolve to exactly one descriptor, asset keys must be unique, digests
//! must be well-formed for their algorithm, and URLs must parse. A manifest
//! that fails any check is rejected before a single byte is downloaded.
//!
//! Commit times arrive either as unix milliseconds or as an RFC 3339
//! string; both normalize to [`UnixMillis`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::core::identifiers::AssetKey;
use crate::core::identifiers::RuntimeVersion;
use crate::core::identifiers::UpdateId;
use crate::core::time::UnixMillis;
use crate::hashing::DEFAULT_HASH_ALGORITHM;
use crate::hashing::HashAlgorithm;
use crate::hashing::HashDigest;
use crate::hashing::HashError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum file-name extension length accepted from asset URLs.
const MAX_EXTENSION_LENGTH: usize = 16;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced while parsing or validating a manifest.
///
/// # Invariants
/// - Any error means no catalog or filesystem state was touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// Manifest body is not valid JSON for the expected shape.
    #[error("manifest json parse failure: {0}")]
    Json(String),
    /// Update id is not a valid UUID.
    #[error("manifest update id is not a valid uuid: {0}")]
    InvalidUpdateId(String),
    /// Commit time is neither integer milliseconds nor RFC 3339.
    #[error("manifest commit time is not milliseconds or rfc3339: {0}")]
    InvalidCommitTime(String),
    /// Manifest declares no assets.
    #[error("manifest declares no assets")]
    EmptyAssets,
    /// Two asset descriptors share a key.
    #[error("duplicate asset key: {0}")]
    DuplicateAssetKey(String),
    /// Launch asset key does not match any descriptor.
    #[error("launch asset key not found in asset list: {0}")]
    UnknownLaunchAsset(String),
    /// Asset URL failed to parse.
    #[error("invalid url for asset {key}: {url}")]
    InvalidUrl {
        /// Key of the offending asset.
        key: String,
        /// Offending URL text.
        url: String,
    },
    /// Asset digest is malformed.
    #[error(transparent)]
    Digest(#[from] HashError),
}

// ============================================================================
// SECTION: Wire Shapes
// ============================================================================

/// Raw commit-time value as it appears on the wire.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCommitTime {
    /// Unix milliseconds.
    Millis(i64),
    /// RFC 3339 date string.
    Text(String),
}

/// Raw asset descriptor as it appears on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawAssetDescriptor {
    /// Manifest-local asset key.
    key: String,
    /// Download URL.
    url: String,
    /// Optional extra request headers.
    #[serde(default)]
    headers: Option<BTreeMap<String, String>>,
    /// Declared MIME/content type.
    #[serde(rename = "type")]
    content_type: String,
    /// Declared content digest (hex).
    hash: String,
    /// Digest algorithm; defaults to sha256 when omitted.
    #[serde(default)]
    hash_algorithm: Option<HashAlgorithm>,
}

/// Raw manifest as it appears on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawManifest {
    /// Update identifier (UUID string).
    id: String,
    /// Commit time (milliseconds or RFC 3339).
    commit_time: RawCommitTime,
    /// Runtime-compatibility version.
    runtime_version: String,
    /// Key of the entry-point asset.
    launch_asset_key: String,
    /// Asset descriptors.
    assets: Vec<RawAssetDescriptor>,
    /// Optional opaque metadata.
    #[serde(default)]
    metadata: Option<Value>,
    /// Optional server-defined scoped state entries.
    #[serde(default)]
    server_defined_state: Option<BTreeMap<String, Value>>,
}

// ============================================================================
// SECTION: Validated Shapes
// ============================================================================

/// One validated asset descriptor.
///
/// # Invariants
/// - `url` parses as an absolute URL.
/// - `hash` is well-formed for its algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetDescriptor {
    /// Manifest-local asset key.
    pub key: AssetKey,
    /// Download URL.
    pub url: String,
    /// Optional extra request headers.
    pub headers: Option<BTreeMap<String, String>>,
    /// Declared MIME/content type.
    pub content_type: String,
    /// Declared content digest.
    pub hash: HashDigest,
}

impl AssetDescriptor {
    /// Returns the content-addressed path (relative to the updates root)
    /// this asset is stored under: `<algorithm>-<hex>[.<ext>]`.
    #[must_use]
    pub fn storage_relative_path(&self) -> String {
        let stem = self.hash.storage_stem();
        match self.storage_extension() {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem,
        }
    }

    /// Derives a file extension from the URL path, falling back to a bare
    /// content-type token (`"js"`, `"png"`); returns `None` when neither
    /// yields a plain alphanumeric extension.
    fn storage_extension(&self) -> Option<String> {
        let from_url = Url::parse(&self.url).ok().and_then(|url| {
            let segment = url.path_segments()?.next_back()?.to_string();
            let (_, ext) = segment.rsplit_once('.')?;
            sanitize_extension(ext)
        });
        if from_url.is_some() {
            return from_url;
        }
        if self.content_type.contains('/') {
            return None;
        }
        sanitize_extension(&self.content_type)
    }
}

/// Returns a lowercase copy of `ext` when it is a plain extension token.
fn sanitize_extension(ext: &str) -> Option<String> {
    let candidate = ext.to_ascii_lowercase();
    let acceptable = !candidate.is_empty()
        && candidate.len() <= MAX_EXTENSION_LENGTH
        && candidate.bytes().all(|byte| byte.is_ascii_alphanumeric());
    acceptable.then_some(candidate)
}

/// One validated manifest.
///
/// # Invariants
/// - `assets` is non-empty with unique keys.
/// - `launch_asset_key` matches exactly one descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    /// Update identifier.
    pub id: UpdateId,
    /// Commit timestamp, normalized to unix milliseconds.
    pub commit_time: UnixMillis,
    /// Runtime-compatibility version.
    pub runtime_version: RuntimeVersion,
    /// Key of the entry-point asset.
    pub launch_asset_key: AssetKey,
    /// Validated asset descriptors.
    pub assets: Vec<AssetDescriptor>,
    /// Optional opaque metadata.
    pub metadata: Option<Value>,
    /// Optional server-defined scoped state entries.
    pub server_defined_state: Option<BTreeMap<String, Value>>,
}

impl Manifest {
    /// Parses and validates a manifest body.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] when the body is not valid JSON or any
    /// validation rule fails; no partial manifest is ever returned.
    pub fn parse(body: &[u8]) -> Result<Self, ManifestError> {
        let raw: RawManifest =
            serde_json::from_slice(body).map_err(|err| ManifestError::Json(err.to_string()))?;
        let id = UpdateId::parse(&raw.id)
            .map_err(|_| ManifestError::InvalidUpdateId(raw.id.clone()))?;
        let commit_time = match raw.commit_time {
            RawCommitTime::Millis(millis) => UnixMillis::new(millis),
            RawCommitTime::Text(text) => UnixMillis::parse_rfc3339(&text)
                .map_err(|_| ManifestError::InvalidCommitTime(text))?,
        };
        if raw.assets.is_empty() {
            return Err(ManifestError::EmptyAssets);
        }
        let mut seen_keys = BTreeSet::new();
        let mut assets = Vec::with_capacity(raw.assets.len());
        for descriptor in raw.assets {
            if !seen_keys.insert(descriptor.key.clone()) {
                return Err(ManifestError::DuplicateAssetKey(descriptor.key));
            }
            if Url::parse(&descriptor.url).is_err() {
                return Err(ManifestError::InvalidUrl {
                    key: descriptor.key,
                    url: descriptor.url,
                });
            }
            let algorithm = descriptor.hash_algorithm.unwrap_or(DEFAULT_HASH_ALGORITHM);
            let hash = HashDigest::parse(algorithm, &descriptor.hash)?;
            assets.push(AssetDescriptor {
                key: AssetKey::new(descriptor.key),
                url: descriptor.url,
                headers: descriptor.headers,
                content_type: descriptor.content_type,
                hash,
            });
        }
        if !seen_keys.contains(&raw.launch_asset_key) {
            return Err(ManifestError::UnknownLaunchAsset(raw.launch_asset_key));
        }
        Ok(Self {
            id,
            commit_time,
            runtime_version: RuntimeVersion::new(raw.runtime_version),
            launch_asset_key: AssetKey::new(raw.launch_asset_key),
            assets,
            metadata: raw.metadata,
            server_defined_state: raw.server_defined_state,
        })
    }

    /// Returns the descriptor named by `launch_asset_key`.
    #[must_use]
    pub fn launch_asset(&self) -> Option<&AssetDescriptor> {
        self.assets.iter().find(|asset| asset.key == self.launch_asset_key)
    }
}
