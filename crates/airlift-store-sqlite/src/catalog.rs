// crates/airlift-store-sqlite/src/catalog.rs
// ============================================================================
// Module: SQLite Update Catalog
// Description: Durable UpdateCatalog backed by SQLite.
// Purpose: Persist updates, assets, their linkage, and scoped key/value
//          state with transactional integrity and cascading deletion.
// Dependencies: airlift-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements [`UpdateCatalog`] over a single `SQLite`
//! connection shared by every [`CatalogHandle`]. The pool reference-counts
//! handles; the connection closes when the last holder drops. Foreign keys
//! are enforced (`updates_assets` cascades on deletion of either side) and
//! a `(hash, hash_type)` unique index makes the content digest the true
//! asset identity: a constraint violation on insert signals "reuse the
//! existing row", never an error.
//!
//! Every multi-row mutation runs inside one transaction. The reaper's mark
//! pass and its row-delete pass are deliberately separate transactions so
//! no transaction is held while asset files are unlinked from disk.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use airlift_core::AssetId;
use airlift_core::AssetRecord;
use airlift_core::CatalogError;
use airlift_core::NewAsset;
use airlift_core::NewUpdate;
use airlift_core::RuntimeVersion;
use airlift_core::ScopeKey;
use airlift_core::UnixMillis;
use airlift_core::UpdateCatalog;
use airlift_core::UpdateId;
use airlift_core::UpdateRecord;
use airlift_core::UpdateStatus;
use airlift_core::hashing::HashAlgorithm;
use airlift_core::hashing::HashDigest;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::Transaction;
use rusqlite::params;
use rusqlite::params_from_iter;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the catalog.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Column list for update row queries.
const UPDATE_COLUMNS: &str =
    "id, scope_key, commit_time, runtime_version, launch_asset_id, metadata, status, keep";
/// Column list for asset row queries.
const ASSET_COLUMNS: &str = "id, url, headers, type, metadata, download_time, relative_path, \
                             hash, hash_type, marked_for_deletion";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` catalog errors.
///
/// # Invariants
/// - Error messages avoid embedding asset bytes or metadata payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteCatalogError {
    /// Store I/O error.
    #[error("sqlite catalog io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite catalog db error: {0}")]
    Db(String),
    /// Stored data failed an integrity check.
    #[error("sqlite catalog corruption: {0}")]
    Corrupt(String),
    /// Catalog schema version mismatch.
    #[error("sqlite catalog version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid caller-supplied data.
    #[error("sqlite catalog invalid data: {0}")]
    Invalid(String),
    /// Referenced row does not exist.
    #[error("sqlite catalog missing row: {0}")]
    Missing(String),
    /// Ready promotion failed its invariant re-check.
    #[error("sqlite catalog update not ready: {0}")]
    NotReady(String),
}

impl From<SqliteCatalogError> for CatalogError {
    fn from(error: SqliteCatalogError) -> Self {
        match error {
            SqliteCatalogError::Io(message) => Self::Io(message),
            SqliteCatalogError::Db(message) => Self::Db(message),
            SqliteCatalogError::Corrupt(message) | SqliteCatalogError::VersionMismatch(message) => {
                Self::Corrupt(message)
            }
            SqliteCatalogError::Invalid(message) => Self::Invalid(message),
            SqliteCatalogError::Missing(message) => Self::Missing(message),
            SqliteCatalogError::NotReady(message) => Self::NotReady(message),
        }
    }
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CatalogJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl CatalogJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl CatalogSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` update catalog.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: CatalogJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: CatalogSyncMode,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Pool
// ============================================================================

/// Shared state behind the pool and every handle.
struct PoolInner {
    /// The single shared connection, serialized through a mutex.
    connection: Mutex<Connection>,
    /// Number of live handles, for diagnostics.
    handles: AtomicUsize,
}

/// Reference-counted owner of the shared catalog connection.
///
/// # Invariants
/// - Exactly one live connection per pool; it closes when the pool and all
///   of its handles have been dropped.
pub struct CatalogPool {
    /// Shared connection state.
    inner: Arc<PoolInner>,
}

impl CatalogPool {
    /// Opens (creating if needed) the catalog database and initializes or
    /// validates its schema.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCatalogError`] when the path is unusable, the
    /// database cannot be opened, or the stored schema version is
    /// unsupported.
    pub fn open(config: &CatalogConfig) -> Result<Self, SqliteCatalogError> {
        validate_catalog_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                connection: Mutex::new(connection),
                handles: AtomicUsize::new(0),
            }),
        })
    }

    /// Acquires a new reference-counted handle on the shared connection.
    #[must_use]
    pub fn acquire(&self) -> CatalogHandle {
        self.inner.handles.fetch_add(1, Ordering::Relaxed);
        CatalogHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Returns the number of handles currently alive.
    #[must_use]
    pub fn active_handles(&self) -> usize {
        self.inner.handles.load(Ordering::Relaxed)
    }
}

/// One reference-counted view of the shared catalog connection.
///
/// Handles are cheap to clone and safe to pass to loader, launcher, and
/// reaper tasks; dropping the last one releases the connection.
pub struct CatalogHandle {
    /// Shared connection state.
    inner: Arc<PoolInner>,
}

impl Clone for CatalogHandle {
    fn clone(&self) -> Self {
        self.inner.handles.fetch_add(1, Ordering::Relaxed);
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for CatalogHandle {
    fn drop(&mut self) {
        self.inner.handles.fetch_sub(1, Ordering::Relaxed);
    }
}

impl CatalogHandle {
    /// Locks the shared connection, mapping a poisoned mutex to an error.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteCatalogError> {
        self.inner
            .connection
            .lock()
            .map_err(|_| SqliteCatalogError::Io("catalog mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw update row as read from `SQLite`.
struct UpdateRow {
    /// `id` column (UUID text).
    id: String,
    /// `scope_key` column.
    scope_key: String,
    /// `commit_time` column (unix millis).
    commit_time: i64,
    /// `runtime_version` column.
    runtime_version: String,
    /// `launch_asset_id` column.
    launch_asset_id: Option<i64>,
    /// `metadata` column (JSON text).
    metadata: Option<String>,
    /// `status` column (integer tag).
    status: i64,
    /// `keep` column (0/1).
    keep: i64,
}

impl UpdateRow {
    /// Reads one update row in [`UPDATE_COLUMNS`] order.
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            scope_key: row.get(1)?,
            commit_time: row.get(2)?,
            runtime_version: row.get(3)?,
            launch_asset_id: row.get(4)?,
            metadata: row.get(5)?,
            status: row.get(6)?,
            keep: row.get(7)?,
        })
    }

    /// Converts the raw row into a typed record.
    fn into_record(self) -> Result<UpdateRecord, SqliteCatalogError> {
        let id = UpdateId::parse(&self.id)
            .map_err(|_| SqliteCatalogError::Corrupt(format!("invalid update id: {}", self.id)))?;
        let status = UpdateStatus::from_i64(self.status).ok_or_else(|| {
            SqliteCatalogError::Corrupt(format!("invalid update status tag: {}", self.status))
        })?;
        let metadata = self.metadata.map(|raw| parse_json_column("updates.metadata", &raw))
            .transpose()?;
        Ok(UpdateRecord {
            id,
            scope_key: ScopeKey::new(self.scope_key),
            commit_time: UnixMillis::new(self.commit_time),
            runtime_version: RuntimeVersion::new(self.runtime_version),
            launch_asset_id: self.launch_asset_id.map(AssetId::new),
            metadata,
            status,
            keep: self.keep != 0,
        })
    }
}

/// Raw asset row as read from `SQLite`.
struct AssetRow {
    /// `id` column.
    id: i64,
    /// `url` column.
    url: Option<String>,
    /// `headers` column (JSON text).
    headers: Option<String>,
    /// `type` column.
    content_type: Option<String>,
    /// `metadata` column (JSON text).
    metadata: Option<String>,
    /// `download_time` column (unix millis).
    download_time: i64,
    /// `relative_path` column.
    relative_path: String,
    /// `hash` column (hex text).
    hash: String,
    /// `hash_type` column (algorithm label).
    hash_type: String,
    /// `marked_for_deletion` column (0/1).
    marked_for_deletion: i64,
}

impl AssetRow {
    /// Reads one asset row in [`ASSET_COLUMNS`] order.
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            url: row.get(1)?,
            headers: row.get(2)?,
            content_type: row.get(3)?,
            metadata: row.get(4)?,
            download_time: row.get(5)?,
            relative_path: row.get(6)?,
            hash: row.get(7)?,
            hash_type: row.get(8)?,
            marked_for_deletion: row.get(9)?,
        })
    }

    /// Converts the raw row into a typed record.
    fn into_record(self) -> Result<AssetRecord, SqliteCatalogError> {
        let algorithm = HashAlgorithm::parse(&self.hash_type).map_err(|_| {
            SqliteCatalogError::Corrupt(format!("invalid asset hash_type: {}", self.hash_type))
        })?;
        let hash = HashDigest::parse(algorithm, &self.hash).map_err(|_| {
            SqliteCatalogError::Corrupt(format!("malformed asset digest for row {}", self.id))
        })?;
        let headers =
            self.headers.map(|raw| parse_json_column("assets.headers", &raw)).transpose()?;
        let metadata =
            self.metadata.map(|raw| parse_json_column("assets.metadata", &raw)).transpose()?;
        Ok(AssetRecord {
            id: AssetId::new(self.id),
            url: self.url,
            headers,
            content_type: self.content_type,
            metadata,
            download_time: UnixMillis::new(self.download_time),
            relative_path: self.relative_path,
            hash,
            marked_for_deletion: self.marked_for_deletion != 0,
        })
    }
}

/// Parses a JSON text column, labeling failures with the column name.
fn parse_json_column(column: &str, raw: &str) -> Result<Value, SqliteCatalogError> {
    serde_json::from_str(raw)
        .map_err(|err| SqliteCatalogError::Corrupt(format!("invalid json in {column}: {err}")))
}

/// Serializes an optional JSON value for storage as a text column.
fn json_column(value: Option<&Value>) -> Result<Option<String>, SqliteCatalogError> {
    value
        .map(|value| {
            serde_json::to_string(value)
                .map_err(|err| SqliteCatalogError::Invalid(err.to_string()))
        })
        .transpose()
}

// ============================================================================
// SECTION: Catalog Operations
// ============================================================================

impl UpdateCatalog for CatalogHandle {
    fn add_update(&self, update: &NewUpdate) -> Result<(), CatalogError> {
        let metadata = json_column(update.metadata.as_ref())?;
        let guard = self.lock()?;
        let result = guard
            .prepare_cached(
                "INSERT INTO updates (id, scope_key, commit_time, runtime_version, \
                 launch_asset_id, metadata, status, keep) VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, \
                 0)",
            )
            .map_err(db_error)?
            .execute(params![
                update.id.to_string(),
                update.scope_key.as_str(),
                update.commit_time.get(),
                update.runtime_version.as_str(),
                metadata,
                update.status.as_i64(),
            ]);
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(SqliteCatalogError::Invalid(format!("update already exists: {}", update.id))
                    .into())
            }
            Err(err) => Err(db_error(err).into()),
        }
    }

    fn update_by_id(&self, id: UpdateId) -> Result<Option<UpdateRecord>, CatalogError> {
        let guard = self.lock()?;
        let row = guard
            .prepare_cached(&format!("SELECT {UPDATE_COLUMNS} FROM updates WHERE id = ?1"))
            .map_err(db_error)?
            .query_row(params![id.to_string()], UpdateRow::read)
            .optional()
            .map_err(db_error)?;
        drop(guard);
        row.map(UpdateRow::into_record).transpose().map_err(CatalogError::from)
    }

    fn all_updates(&self) -> Result<Vec<UpdateRecord>, CatalogError> {
        let guard = self.lock()?;
        let rows = query_update_rows(
            &guard,
            &format!("SELECT {UPDATE_COLUMNS} FROM updates ORDER BY rowid"),
            params![],
        )?;
        drop(guard);
        Ok(rows)
    }

    fn updates_for_scope(&self, scope: &ScopeKey) -> Result<Vec<UpdateRecord>, CatalogError> {
        let guard = self.lock()?;
        let rows = query_update_rows(
            &guard,
            &format!("SELECT {UPDATE_COLUMNS} FROM updates WHERE scope_key = ?1 ORDER BY rowid"),
            params![scope.as_str()],
        )?;
        drop(guard);
        Ok(rows)
    }

    fn launchable_updates(&self, scope: &ScopeKey) -> Result<Vec<UpdateRecord>, CatalogError> {
        let guard = self.lock()?;
        let sql = format!(
            "SELECT {UPDATE_COLUMNS} FROM updates WHERE scope_key = ?1 AND status IN ({}, {}, \
             {}) ORDER BY rowid",
            UpdateStatus::Ready.as_i64(),
            UpdateStatus::Embedded.as_i64(),
            UpdateStatus::Development.as_i64(),
        );
        let rows = query_update_rows(&guard, &sql, params![scope.as_str()])?;
        drop(guard);
        Ok(rows)
    }

    fn find_asset_by_hash(
        &self,
        digest: &HashDigest,
    ) -> Result<Option<AssetRecord>, CatalogError> {
        let guard = self.lock()?;
        let row = guard
            .prepare_cached(&format!(
                "SELECT {ASSET_COLUMNS} FROM assets WHERE hash = ?1 AND hash_type = ?2 LIMIT 1"
            ))
            .map_err(db_error)?
            .query_row(params![digest.value, digest.algorithm.label()], AssetRow::read)
            .optional()
            .map_err(db_error)?;
        drop(guard);
        row.map(AssetRow::into_record).transpose().map_err(CatalogError::from)
    }

    fn register_asset(
        &self,
        asset: &NewAsset,
        update_id: UpdateId,
        is_launch_asset: bool,
    ) -> Result<AssetId, CatalogError> {
        let headers = json_column(asset.headers.as_ref())?;
        let metadata = json_column(asset.metadata.as_ref())?;
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        let asset_id = match find_asset_id_in_tx(&tx, &asset.hash)? {
            Some(existing) => existing,
            None => {
                let insert = tx
                    .prepare_cached(
                        "INSERT INTO assets (url, headers, type, metadata, download_time, \
                         relative_path, hash, hash_type, marked_for_deletion) VALUES (?1, ?2, \
                         ?3, ?4, ?5, ?6, ?7, ?8, 0)",
                    )
                    .map_err(db_error)?
                    .execute(params![
                        asset.url,
                        headers,
                        asset.content_type,
                        metadata,
                        asset.download_time.get(),
                        asset.relative_path,
                        asset.hash.value,
                        asset.hash.algorithm.label(),
                    ]);
                match insert {
                    Ok(_) => AssetId::new(tx.last_insert_rowid()),
                    Err(rusqlite::Error::SqliteFailure(err, _))
                        if err.code == ErrorCode::ConstraintViolation =>
                    {
                        // Lost a dedup race: the row inserted by the other
                        // writer is the canonical one.
                        find_asset_id_in_tx(&tx, &asset.hash)?.ok_or_else(|| {
                            SqliteCatalogError::Db(
                                "asset hash constraint violated without existing row".to_string(),
                            )
                        })?
                    }
                    Err(err) => return Err(db_error(err).into()),
                }
            }
        };
        link_asset_in_tx(&tx, asset_id, update_id, is_launch_asset)?;
        tx.commit().map_err(db_error)?;
        Ok(asset_id)
    }

    fn link_existing_asset(
        &self,
        asset_id: AssetId,
        update_id: UpdateId,
        is_launch_asset: bool,
    ) -> Result<bool, CatalogError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        let exists: Option<i64> = tx
            .prepare_cached("SELECT id FROM assets WHERE id = ?1")
            .map_err(db_error)?
            .query_row(params![asset_id.get()], |row| row.get(0))
            .optional()
            .map_err(db_error)?;
        if exists.is_none() {
            return Ok(false);
        }
        link_asset_in_tx(&tx, asset_id, update_id, is_launch_asset)?;
        tx.commit().map_err(db_error)?;
        Ok(true)
    }

    fn assets_for_update(&self, update_id: UpdateId) -> Result<Vec<AssetRecord>, CatalogError> {
        let guard = self.lock()?;
        let sql = format!(
            "SELECT {} FROM assets INNER JOIN updates_assets ON updates_assets.asset_id = \
             assets.id WHERE updates_assets.update_id = ?1 ORDER BY assets.id",
            qualified_asset_columns()
        );
        let mut stmt = guard.prepare_cached(&sql).map_err(db_error)?;
        let rows = stmt
            .query_map(params![update_id.to_string()], AssetRow::read)
            .map_err(db_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error)?;
        drop(stmt);
        drop(guard);
        rows.into_iter()
            .map(|row| row.into_record().map_err(CatalogError::from))
            .collect()
    }

    fn mark_update_ready(&self, update_id: UpdateId) -> Result<(), CatalogError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        let id_text = update_id.to_string();
        let row: Option<(i64, Option<i64>)> = tx
            .prepare_cached("SELECT status, launch_asset_id FROM updates WHERE id = ?1")
            .map_err(db_error)?
            .query_row(params![id_text], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()
            .map_err(db_error)?;
        let Some((status_tag, launch_asset_id)) = row else {
            return Err(SqliteCatalogError::Missing(format!("update {update_id}")).into());
        };
        let status = UpdateStatus::from_i64(status_tag).ok_or_else(|| {
            SqliteCatalogError::Corrupt(format!("invalid update status tag: {status_tag}"))
        })?;
        match status {
            UpdateStatus::Ready | UpdateStatus::Development => {
                // Already launchable; promotion is idempotent.
                return Ok(());
            }
            UpdateStatus::Embedded => {
                return Err(SqliteCatalogError::Invalid(format!(
                    "embedded update {update_id} is not promoted"
                ))
                .into());
            }
            UpdateStatus::Pending => {}
        }
        let Some(launch_asset_id) = launch_asset_id else {
            return Err(SqliteCatalogError::NotReady(format!(
                "update {update_id} has no launch asset linked"
            ))
            .into());
        };
        let linked: i64 = tx
            .prepare_cached("SELECT COUNT(*) FROM updates_assets WHERE update_id = ?1")
            .map_err(db_error)?
            .query_row(params![id_text], |row| row.get(0))
            .map_err(db_error)?;
        if linked == 0 {
            return Err(SqliteCatalogError::NotReady(format!(
                "update {update_id} has no linked assets"
            ))
            .into());
        }
        let launch_linked: i64 = tx
            .prepare_cached(
                "SELECT COUNT(*) FROM updates_assets WHERE update_id = ?1 AND asset_id = ?2",
            )
            .map_err(db_error)?
            .query_row(params![id_text, launch_asset_id], |row| row.get(0))
            .map_err(db_error)?;
        if launch_linked == 0 {
            return Err(SqliteCatalogError::NotReady(format!(
                "launch asset of update {update_id} is not linked to it"
            ))
            .into());
        }
        let pathless: i64 = tx
            .prepare_cached(
                "SELECT COUNT(*) FROM assets INNER JOIN updates_assets ON \
                 updates_assets.asset_id = assets.id WHERE updates_assets.update_id = ?1 AND \
                 (assets.relative_path IS NULL OR assets.relative_path = '')",
            )
            .map_err(db_error)?
            .query_row(params![id_text], |row| row.get(0))
            .map_err(db_error)?;
        if pathless > 0 {
            return Err(SqliteCatalogError::NotReady(format!(
                "update {update_id} links {pathless} asset(s) without a stored path"
            ))
            .into());
        }
        tx.prepare_cached("UPDATE updates SET status = ?1 WHERE id = ?2")
            .map_err(db_error)?
            .execute(params![UpdateStatus::Ready.as_i64(), id_text])
            .map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        Ok(())
    }

    fn set_update_keep(&self, update_id: UpdateId, keep: bool) -> Result<(), CatalogError> {
        let guard = self.lock()?;
        let changed = guard
            .prepare_cached("UPDATE updates SET keep = ?1 WHERE id = ?2")
            .map_err(db_error)?
            .execute(params![i64::from(keep), update_id.to_string()])
            .map_err(db_error)?;
        drop(guard);
        if changed == 0 {
            return Err(SqliteCatalogError::Missing(format!("update {update_id}")).into());
        }
        Ok(())
    }

    fn abort_pending_update(
        &self,
        update_id: UpdateId,
    ) -> Result<Vec<AssetRecord>, CatalogError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        let id_text = update_id.to_string();
        let status_tag: Option<i64> = tx
            .prepare_cached("SELECT status FROM updates WHERE id = ?1")
            .map_err(db_error)?
            .query_row(params![id_text], |row| row.get(0))
            .optional()
            .map_err(db_error)?;
        let Some(status_tag) = status_tag else {
            return Err(SqliteCatalogError::Missing(format!("update {update_id}")).into());
        };
        if status_tag != UpdateStatus::Pending.as_i64() {
            return Err(SqliteCatalogError::Invalid(format!(
                "update {update_id} is not pending; refusing abort"
            ))
            .into());
        }
        let orphan_sql = format!(
            "SELECT {} FROM assets INNER JOIN updates_assets ON updates_assets.asset_id = \
             assets.id WHERE updates_assets.update_id = ?1 AND NOT EXISTS (SELECT 1 FROM \
             updates_assets other WHERE other.asset_id = assets.id AND other.update_id != ?1)",
            qualified_asset_columns()
        );
        let orphans = {
            let mut stmt = tx.prepare_cached(&orphan_sql).map_err(db_error)?;
            let rows = stmt
                .query_map(params![id_text], AssetRow::read)
                .map_err(db_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_error)?;
            rows
        };
        // Unlink the launch asset reference first so the asset deletes do
        // not cascade back into the update row mid-transaction.
        tx.prepare_cached("UPDATE updates SET launch_asset_id = NULL WHERE id = ?1")
            .map_err(db_error)?
            .execute(params![id_text])
            .map_err(db_error)?;
        for orphan in &orphans {
            tx.prepare_cached("DELETE FROM assets WHERE id = ?1")
                .map_err(db_error)?
                .execute(params![orphan.id])
                .map_err(db_error)?;
        }
        tx.prepare_cached("DELETE FROM updates WHERE id = ?1")
            .map_err(db_error)?
            .execute(params![id_text])
            .map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        orphans
            .into_iter()
            .map(|row| row.into_record().map_err(CatalogError::from))
            .collect()
    }

    fn mark_assets_for_deletion(
        &self,
        deletable: &[UpdateId],
    ) -> Result<Vec<AssetRecord>, CatalogError> {
        if deletable.is_empty() {
            return Ok(Vec::new());
        }
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        // Mark everything, then unmark assets reachable from retained
        // updates, then unmark rows sharing a file with a survivor. Running
        // all three inside one transaction is what makes "exclusively
        // owned" exact rather than a race.
        tx.execute("UPDATE assets SET marked_for_deletion = 1", params![])
            .map_err(db_error)?;
        let placeholders = sql_placeholders(deletable.len());
        let retained_sql = format!(
            "UPDATE assets SET marked_for_deletion = 0 WHERE id IN (SELECT asset_id FROM \
             updates_assets INNER JOIN updates ON updates_assets.update_id = updates.id WHERE \
             updates.id NOT IN ({placeholders}))"
        );
        tx.execute(
            &retained_sql,
            params_from_iter(deletable.iter().map(ToString::to_string)),
        )
        .map_err(db_error)?;
        tx.execute(
            "UPDATE assets SET marked_for_deletion = 0 WHERE relative_path IN (SELECT \
             relative_path FROM assets WHERE marked_for_deletion = 0)",
            params![],
        )
        .map_err(db_error)?;
        let marked = {
            let sql =
                format!("SELECT {ASSET_COLUMNS} FROM assets WHERE marked_for_deletion = 1");
            let mut stmt = tx.prepare_cached(&sql).map_err(db_error)?;
            let rows = stmt
                .query_map(params![], AssetRow::read)
                .map_err(db_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_error)?;
            rows
        };
        tx.commit().map_err(db_error)?;
        marked
            .into_iter()
            .map(|row| row.into_record().map_err(CatalogError::from))
            .collect()
    }

    fn delete_marked_assets(&self) -> Result<u64, CatalogError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        let deleted = tx
            .execute("DELETE FROM assets WHERE marked_for_deletion = 1", params![])
            .map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
    }

    fn delete_updates(&self, ids: &[UpdateId]) -> Result<(), CatalogError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        let placeholders = sql_placeholders(ids.len());
        let sql = format!("DELETE FROM updates WHERE id IN ({placeholders})");
        tx.execute(&sql, params_from_iter(ids.iter().map(ToString::to_string)))
            .map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        Ok(())
    }

    fn json_data(&self, key: &str, scope: &ScopeKey) -> Result<Option<Value>, CatalogError> {
        let guard = self.lock()?;
        let raw: Option<String> = guard
            .prepare_cached(
                "SELECT value FROM json_data WHERE key = ?1 AND scope_key = ?2 ORDER BY \
                 last_updated DESC, id DESC LIMIT 1",
            )
            .map_err(db_error)?
            .query_row(params![key, scope.as_str()], |row| row.get(0))
            .optional()
            .map_err(db_error)?;
        drop(guard);
        raw.map(|raw| parse_json_column("json_data.value", &raw).map_err(CatalogError::from))
            .transpose()
    }

    fn set_json_data(
        &self,
        key: &str,
        scope: &ScopeKey,
        value: &Value,
    ) -> Result<(), CatalogError> {
        let serialized = serde_json::to_string(value)
            .map_err(|err| SqliteCatalogError::Invalid(err.to_string()))?;
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        tx.prepare_cached("DELETE FROM json_data WHERE key = ?1 AND scope_key = ?2")
            .map_err(db_error)?
            .execute(params![key, scope.as_str()])
            .map_err(db_error)?;
        tx.prepare_cached(
            "INSERT INTO json_data (key, value, last_updated, scope_key) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(db_error)?
        .execute(params![key, serialized, unix_millis(), scope.as_str()])
        .map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: SQL Helpers
// ============================================================================

/// Maps a `rusqlite` error into the crate error type.
fn db_error(err: rusqlite::Error) -> SqliteCatalogError {
    SqliteCatalogError::Db(err.to_string())
}

/// Returns the asset column list qualified with the `assets.` table prefix
/// for joined queries.
fn qualified_asset_columns() -> String {
    ASSET_COLUMNS
        .split(", ")
        .map(|column| format!("assets.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Returns `?1, ?2, ...` placeholder text for an IN list of `count` items.
fn sql_placeholders(count: usize) -> String {
    (1 ..= count).map(|index| format!("?{index}")).collect::<Vec<_>>().join(", ")
}

/// Runs an update-row query and converts every row.
fn query_update_rows(
    connection: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<UpdateRecord>, CatalogError> {
    let mut stmt = connection.prepare_cached(sql).map_err(db_error)?;
    let rows = stmt
        .query_map(params, UpdateRow::read)
        .map_err(db_error)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_error)?;
    drop(stmt);
    rows.into_iter()
        .map(|row| row.into_record().map_err(CatalogError::from))
        .collect()
}

/// Finds an asset row id by dedup identity inside an open transaction.
fn find_asset_id_in_tx(
    tx: &Transaction<'_>,
    digest: &HashDigest,
) -> Result<Option<AssetId>, SqliteCatalogError> {
    tx.prepare_cached("SELECT id FROM assets WHERE hash = ?1 AND hash_type = ?2 LIMIT 1")
        .map_err(db_error)?
        .query_row(params![digest.value, digest.algorithm.label()], |row| {
            row.get::<_, i64>(0)
        })
        .optional()
        .map_err(db_error)
        .map(|id| id.map(AssetId::new))
}

/// Links an asset to an update inside an open transaction, clearing any
/// deletion mark and recording the launch asset when flagged.
fn link_asset_in_tx(
    tx: &Transaction<'_>,
    asset_id: AssetId,
    update_id: UpdateId,
    is_launch_asset: bool,
) -> Result<(), SqliteCatalogError> {
    tx.prepare_cached(
        "INSERT OR IGNORE INTO updates_assets (update_id, asset_id) VALUES (?1, ?2)",
    )
    .map_err(db_error)?
    .execute(params![update_id.to_string(), asset_id.get()])
    .map_err(db_error)?;
    tx.prepare_cached("UPDATE assets SET marked_for_deletion = 0 WHERE id = ?1")
        .map_err(db_error)?
        .execute(params![asset_id.get()])
        .map_err(db_error)?;
    if is_launch_asset {
        tx.prepare_cached("UPDATE updates SET launch_asset_id = ?1 WHERE id = ?2")
            .map_err(db_error)?
            .execute(params![asset_id.get(), update_id.to_string()])
            .map_err(db_error)?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Connection & Schema
// ============================================================================

/// Ensures the parent directory for the catalog exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteCatalogError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteCatalogError::Io("catalog path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteCatalogError::Io(err.to_string()))
}

/// Validates catalog paths for safety limits.
fn validate_catalog_path(path: &Path) -> Result<(), SqliteCatalogError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteCatalogError::Invalid("catalog path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteCatalogError::Invalid(
            "catalog path exceeds length limit".to_string(),
        ));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteCatalogError::Invalid(
                "catalog path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteCatalogError::Invalid(
            "catalog path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with durability defaults.
fn open_connection(config: &CatalogConfig) -> Result<Connection, SqliteCatalogError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for integrity and durability.
fn apply_pragmas(
    connection: &Connection,
    config: &CatalogConfig,
) -> Result<(), SqliteCatalogError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_error)?;
    Ok(())
}

/// Initializes the catalog schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteCatalogError> {
    let tx = connection.transaction().map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_error)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS assets (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    url TEXT,
                    headers TEXT,
                    type TEXT,
                    metadata TEXT,
                    download_time INTEGER NOT NULL,
                    relative_path TEXT NOT NULL,
                    hash TEXT NOT NULL,
                    hash_type TEXT NOT NULL,
                    marked_for_deletion INTEGER NOT NULL DEFAULT 0
                );
                CREATE UNIQUE INDEX IF NOT EXISTS idx_assets_hash
                    ON assets (hash, hash_type);
                CREATE TABLE IF NOT EXISTS updates (
                    id TEXT PRIMARY KEY,
                    scope_key TEXT NOT NULL,
                    commit_time INTEGER NOT NULL,
                    runtime_version TEXT NOT NULL,
                    launch_asset_id INTEGER,
                    metadata TEXT,
                    status INTEGER NOT NULL,
                    keep INTEGER NOT NULL DEFAULT 0,
                    FOREIGN KEY (launch_asset_id) REFERENCES assets(id) ON DELETE CASCADE
                );
                CREATE INDEX IF NOT EXISTS idx_updates_scope_commit
                    ON updates (scope_key, commit_time);
                CREATE INDEX IF NOT EXISTS idx_updates_launch_asset
                    ON updates (launch_asset_id);
                CREATE TABLE IF NOT EXISTS updates_assets (
                    update_id TEXT NOT NULL,
                    asset_id INTEGER NOT NULL,
                    PRIMARY KEY (update_id, asset_id),
                    FOREIGN KEY (update_id) REFERENCES updates(id) ON DELETE CASCADE,
                    FOREIGN KEY (asset_id) REFERENCES assets(id) ON DELETE CASCADE
                );
                CREATE TABLE IF NOT EXISTS json_data (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    key TEXT NOT NULL,
                    value TEXT NOT NULL,
                    last_updated INTEGER NOT NULL,
                    scope_key TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_json_data_scope_key
                    ON json_data (scope_key);",
            )
            .map_err(db_error)?;
        }
        Some(SCHEMA_VERSION) => {}
        Some(other) => {
            return Err(SqliteCatalogError::VersionMismatch(format!(
                "unsupported catalog schema version: {other}"
            )));
        }
    }
    tx.commit().map_err(db_error)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current wall-clock time as unix milliseconds.
fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
