//! Catalog integrity unit tests for airlift-store-sqlite.
// crates/airlift-store-sqlite/tests/catalog_unit.rs
// =============================================================================
// Module: SQLite Catalog Integrity Tests
// Description: Targeted integrity tests for the SQLite update catalog.
// Purpose: Validate dedup, cascading deletion, ready promotion, two-phase
//          marking, scoped key/value state, and handle refcounting.
// =============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use airlift_core::CatalogError;
use airlift_core::NewAsset;
use airlift_core::NewUpdate;
use airlift_core::RuntimeVersion;
use airlift_core::ScopeKey;
use airlift_core::UnixMillis;
use airlift_core::UpdateCatalog;
use airlift_core::UpdateId;
use airlift_core::UpdateStatus;
use airlift_core::hashing::HashAlgorithm;
use airlift_core::hashing::hash_bytes;
use airlift_store_sqlite::CatalogConfig;
use airlift_store_sqlite::CatalogJournalMode;
use airlift_store_sqlite::CatalogPool;
use airlift_store_sqlite::CatalogSyncMode;
use rusqlite::Connection;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open_pool(dir: &TempDir) -> CatalogPool {
    let config = CatalogConfig {
        path: dir.path().join("catalog.db"),
        busy_timeout_ms: 5_000,
        journal_mode: CatalogJournalMode::default(),
        sync_mode: CatalogSyncMode::default(),
    };
    CatalogPool::open(&config).expect("catalog opens")
}

fn update_id(index: u32) -> UpdateId {
    UpdateId::parse(&format!("00000000-0000-4000-8000-{index:012x}")).expect("valid uuid")
}

fn new_update(index: u32, commit_time: i64, status: UpdateStatus) -> NewUpdate {
    NewUpdate {
        id: update_id(index),
        scope_key: ScopeKey::new("main"),
        commit_time: UnixMillis::new(commit_time),
        runtime_version: RuntimeVersion::new("1.0"),
        metadata: None,
        status,
    }
}

fn new_asset(tag: &str) -> NewAsset {
    let hash = hash_bytes(HashAlgorithm::Sha256, tag.as_bytes());
    let relative_path = format!("{}.bin", hash.storage_stem());
    NewAsset {
        url: Some(format!("https://cdn.example.com/{tag}")),
        headers: None,
        content_type: Some("application/octet-stream".to_string()),
        metadata: None,
        download_time: UnixMillis::new(1),
        relative_path,
        hash,
    }
}

// ============================================================================
// SECTION: Dedup & Linking
// ============================================================================

#[test]
fn identical_digests_resolve_to_one_row() {
    let dir = TempDir::new().expect("tempdir");
    let pool = open_pool(&dir);
    let catalog = pool.acquire();
    catalog.add_update(&new_update(1, 100, UpdateStatus::Pending)).expect("add update a");
    catalog.add_update(&new_update(2, 200, UpdateStatus::Pending)).expect("add update b");

    let asset = new_asset("shared");
    let first = catalog.register_asset(&asset, update_id(1), true).expect("register for a");
    let second = catalog.register_asset(&asset, update_id(2), true).expect("register for b");
    assert_eq!(first, second);

    let stored = catalog
        .find_asset_by_hash(&asset.hash)
        .expect("lookup")
        .expect("asset row present");
    assert_eq!(stored.id, first);
    assert_eq!(catalog.assets_for_update(update_id(1)).expect("assets a").len(), 1);
    assert_eq!(catalog.assets_for_update(update_id(2)).expect("assets b").len(), 1);
}

#[test]
fn duplicate_update_ids_are_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let pool = open_pool(&dir);
    let catalog = pool.acquire();
    catalog.add_update(&new_update(1, 100, UpdateStatus::Pending)).expect("first insert");
    let err = catalog
        .add_update(&new_update(1, 100, UpdateStatus::Pending))
        .expect_err("second insert rejected");
    assert!(matches!(err, CatalogError::Invalid(_)));
}

#[test]
fn linking_an_existing_asset_clears_its_deletion_mark() {
    let dir = TempDir::new().expect("tempdir");
    let pool = open_pool(&dir);
    let catalog = pool.acquire();
    catalog.add_update(&new_update(1, 100, UpdateStatus::Pending)).expect("add update a");
    let asset = new_asset("reused");
    let asset_id = catalog.register_asset(&asset, update_id(1), true).expect("register");

    let marked = catalog.mark_assets_for_deletion(&[update_id(1)]).expect("mark pass");
    assert_eq!(marked.len(), 1);

    catalog.add_update(&new_update(2, 200, UpdateStatus::Pending)).expect("add update b");
    assert!(catalog.link_existing_asset(asset_id, update_id(2), true).expect("relink"));
    assert_eq!(catalog.delete_marked_assets().expect("delete pass"), 0);
    assert!(catalog.find_asset_by_hash(&asset.hash).expect("lookup").is_some());
}

// ============================================================================
// SECTION: Ready Promotion
// ============================================================================

#[test]
fn promotion_requires_a_linked_launch_asset() {
    let dir = TempDir::new().expect("tempdir");
    let pool = open_pool(&dir);
    let catalog = pool.acquire();
    catalog.add_update(&new_update(1, 100, UpdateStatus::Pending)).expect("add update");

    let err = catalog.mark_update_ready(update_id(1)).expect_err("no assets yet");
    assert!(matches!(err, CatalogError::NotReady(_)));

    catalog
        .register_asset(&new_asset("bundle"), update_id(1), true)
        .expect("register launch asset");
    catalog.mark_update_ready(update_id(1)).expect("promotes");
    let record = catalog.update_by_id(update_id(1)).expect("query").expect("row");
    assert_eq!(record.status, UpdateStatus::Ready);
    assert!(record.launch_asset_id.is_some());

    // A second promotion is a no-op.
    catalog.mark_update_ready(update_id(1)).expect("idempotent");
}

#[test]
fn promotion_of_unknown_update_is_missing() {
    let dir = TempDir::new().expect("tempdir");
    let pool = open_pool(&dir);
    let catalog = pool.acquire();
    let err = catalog.mark_update_ready(update_id(7)).expect_err("unknown id");
    assert!(matches!(err, CatalogError::Missing(_)));
}

// ============================================================================
// SECTION: Cascade & Two-Phase Delete
// ============================================================================

#[test]
fn deleting_an_update_cascades_its_join_rows() {
    let dir = TempDir::new().expect("tempdir");
    let pool = open_pool(&dir);
    let catalog = pool.acquire();
    catalog.add_update(&new_update(1, 100, UpdateStatus::Pending)).expect("add update");
    catalog.register_asset(&new_asset("bundle"), update_id(1), true).expect("register");
    catalog.delete_updates(&[update_id(1)]).expect("delete update");

    let connection =
        Connection::open(dir.path().join("catalog.db")).expect("raw connection");
    let join_rows: i64 = connection
        .query_row("SELECT COUNT(*) FROM updates_assets", [], |row| row.get(0))
        .expect("join count");
    assert_eq!(join_rows, 0);
}

#[test]
fn mark_pass_spares_assets_shared_with_retained_updates() {
    let dir = TempDir::new().expect("tempdir");
    let pool = open_pool(&dir);
    let catalog = pool.acquire();
    catalog.add_update(&new_update(1, 100, UpdateStatus::Pending)).expect("add old");
    catalog.add_update(&new_update(2, 200, UpdateStatus::Pending)).expect("add new");

    let shared = new_asset("shared");
    let exclusive = new_asset("exclusive");
    catalog.register_asset(&shared, update_id(1), true).expect("shared on old");
    catalog.register_asset(&exclusive, update_id(1), false).expect("exclusive on old");
    catalog.register_asset(&shared, update_id(2), true).expect("shared on new");

    let marked = catalog.mark_assets_for_deletion(&[update_id(1)]).expect("mark pass");
    assert_eq!(marked.len(), 1);
    assert_eq!(marked[0].hash, exclusive.hash);

    assert_eq!(catalog.delete_marked_assets().expect("delete pass"), 1);
    catalog.delete_updates(&[update_id(1)]).expect("delete old");

    assert!(catalog.find_asset_by_hash(&shared.hash).expect("lookup").is_some());
    assert!(catalog.find_asset_by_hash(&exclusive.hash).expect("lookup").is_none());
    assert_eq!(catalog.assets_for_update(update_id(2)).expect("assets").len(), 1);
}

#[test]
fn abort_removes_only_exclusively_owned_assets() {
    let dir = TempDir::new().expect("tempdir");
    let pool = open_pool(&dir);
    let catalog = pool.acquire();
    catalog.add_update(&new_update(1, 100, UpdateStatus::Pending)).expect("add keeper");
    catalog.add_update(&new_update(2, 200, UpdateStatus::Pending)).expect("add doomed");

    let shared = new_asset("shared");
    let exclusive = new_asset("exclusive");
    catalog.register_asset(&shared, update_id(1), true).expect("shared on keeper");
    catalog.register_asset(&shared, update_id(2), false).expect("shared on doomed");
    catalog.register_asset(&exclusive, update_id(2), true).expect("exclusive on doomed");

    let removed = catalog.abort_pending_update(update_id(2)).expect("abort");
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].hash, exclusive.hash);
    assert!(catalog.update_by_id(update_id(2)).expect("query").is_none());
    assert!(catalog.find_asset_by_hash(&shared.hash).expect("lookup").is_some());
}

#[test]
fn abort_refuses_non_pending_updates() {
    let dir = TempDir::new().expect("tempdir");
    let pool = open_pool(&dir);
    let catalog = pool.acquire();
    catalog.add_update(&new_update(1, 100, UpdateStatus::Embedded)).expect("add embedded");
    let err = catalog.abort_pending_update(update_id(1)).expect_err("embedded abort rejected");
    assert!(matches!(err, CatalogError::Invalid(_)));
}

// ============================================================================
// SECTION: Queries & Scoped State
// ============================================================================

#[test]
fn launchable_updates_filter_status_and_scope() {
    let dir = TempDir::new().expect("tempdir");
    let pool = open_pool(&dir);
    let catalog = pool.acquire();
    catalog.add_update(&new_update(1, 100, UpdateStatus::Pending)).expect("pending");
    catalog.add_update(&new_update(2, 200, UpdateStatus::Embedded)).expect("embedded");
    let mut foreign = new_update(3, 300, UpdateStatus::Embedded);
    foreign.scope_key = ScopeKey::new("other");
    catalog.add_update(&foreign).expect("foreign");

    let launchable = catalog.launchable_updates(&ScopeKey::new("main")).expect("query");
    assert_eq!(launchable.len(), 1);
    assert_eq!(launchable[0].id, update_id(2));
}

#[test]
fn json_data_is_last_write_wins_per_scope() {
    let dir = TempDir::new().expect("tempdir");
    let pool = open_pool(&dir);
    let catalog = pool.acquire();
    let scope = ScopeKey::new("main");
    catalog
        .set_json_data("flags", &scope, &serde_json::json!({"beta": false}))
        .expect("first write");
    catalog
        .set_json_data("flags", &scope, &serde_json::json!({"beta": true}))
        .expect("second write");
    let value = catalog.json_data("flags", &scope).expect("read").expect("present");
    assert_eq!(value, serde_json::json!({"beta": true}));

    let other = ScopeKey::new("other");
    assert!(catalog.json_data("flags", &other).expect("read").is_none());
}

// ============================================================================
// SECTION: Handle Pool
// ============================================================================

#[test]
fn handles_are_reference_counted() {
    let dir = TempDir::new().expect("tempdir");
    let pool = open_pool(&dir);
    assert_eq!(pool.active_handles(), 0);
    let first = pool.acquire();
    let second = first.clone();
    assert_eq!(pool.active_handles(), 2);
    drop(first);
    assert_eq!(pool.active_handles(), 1);
    drop(second);
    assert_eq!(pool.active_handles(), 0);
}
