//! Launch and reap scenario tests for airlift-launcher.
// crates/airlift-launcher/tests/launch_and_reap.rs
// =============================================================================
// Module: Launch & Reap Tests
// Description: End-to-end launch verification and reaper scenarios.
// Purpose: Validate fallback on missing files, reaper safety, the upgrade
//          scenario, and the fire-and-forget reap after launch.
// =============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeMap;
use std::time::Duration;
use std::time::Instant;

use airlift_config::EngineConfig;
use airlift_core::LaunchContract;
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
use airlift_launcher::LaunchError;
use airlift_launcher::Launcher;
use airlift_launcher::Reaper;
use airlift_store_sqlite::CatalogConfig;
use airlift_store_sqlite::CatalogHandle;
use airlift_store_sqlite::CatalogJournalMode;
use airlift_store_sqlite::CatalogPool;
use airlift_store_sqlite::CatalogSyncMode;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const SCOPE: &str = "main";

fn update_id(index: u32) -> UpdateId {
    UpdateId::parse(&format!("00000000-0000-4000-8000-{index:012x}")).expect("valid uuid")
}

fn engine_config(workspace: &TempDir, development_client: bool) -> EngineConfig {
    let updates_directory = workspace.path().join("updates");
    std::fs::create_dir_all(&updates_directory).expect("updates dir");
    EngineConfig {
        update_url: url::Url::parse("https://updates.invalid/manifest").expect("url"),
        scope_key: ScopeKey::new(SCOPE),
        runtime_version: RuntimeVersion::new("1.0"),
        updates_directory: updates_directory.clone(),
        request_headers: BTreeMap::new(),
        embedded_directory: None,
        development_enabled: false,
        development_client,
        reap_grace_period_ms: 86_400_000,
        fetch_timeout_ms: 5_000,
        max_manifest_bytes: 1024 * 1024,
        max_asset_bytes: 1024 * 1024,
        max_concurrency: 4,
        user_agent: "airlift-tests/0.1".to_string(),
        catalog: CatalogConfig {
            path: updates_directory.join("airlift.db"),
            busy_timeout_ms: 5_000,
            journal_mode: CatalogJournalMode::default(),
            sync_mode: CatalogSyncMode::default(),
        },
    }
}

fn open_catalog(config: &EngineConfig) -> CatalogHandle {
    CatalogPool::open(&config.catalog).expect("catalog opens").acquire()
}

/// Writes asset bytes under their content-addressed name and returns the
/// row description for registration.
fn stored_asset(config: &EngineConfig, bytes: &[u8]) -> NewAsset {
    let hash = hash_bytes(HashAlgorithm::Sha256, bytes);
    let relative_path = format!("{}.bin", hash.storage_stem());
    std::fs::write(config.updates_directory.join(&relative_path), bytes).expect("asset file");
    NewAsset {
        url: None,
        headers: None,
        content_type: Some("application/octet-stream".to_string()),
        metadata: None,
        download_time: UnixMillis::new(1),
        relative_path,
        hash,
    }
}

/// Inserts an update with the given assets; the first asset is the launch
/// asset. Pending rows are promoted to ready unless `status` says otherwise.
fn seed_update(
    catalog: &CatalogHandle,
    config: &EngineConfig,
    index: u32,
    commit_time: i64,
    status: UpdateStatus,
    asset_bytes: &[&[u8]],
) {
    let insert_status = if status == UpdateStatus::Ready {
        UpdateStatus::Pending
    } else {
        status
    };
    catalog
        .add_update(&NewUpdate {
            id: update_id(index),
            scope_key: ScopeKey::new(SCOPE),
            commit_time: UnixMillis::new(commit_time),
            runtime_version: RuntimeVersion::new("1.0"),
            metadata: None,
            status: insert_status,
        })
        .expect("insert update");
    for (position, bytes) in asset_bytes.iter().enumerate() {
        let asset = stored_asset(config, bytes);
        catalog
            .register_asset(&asset, update_id(index), position == 0)
            .expect("register asset");
    }
    if status == UpdateStatus::Ready {
        catalog.mark_update_ready(update_id(index)).expect("promote");
    }
}

fn asset_file_exists(config: &EngineConfig, bytes: &[u8]) -> bool {
    let hash = hash_bytes(HashAlgorithm::Sha256, bytes);
    config.updates_directory.join(format!("{}.bin", hash.storage_stem())).is_file()
}

// ============================================================================
// SECTION: Launch Tests
// ============================================================================

#[test]
fn launches_the_newest_ready_update() {
    let workspace = TempDir::new().expect("tempdir");
    let config = engine_config(&workspace, false);
    let catalog = open_catalog(&config);
    seed_update(&catalog, &config, 1, 0, UpdateStatus::Embedded, &[b"embedded-bundle"]);
    seed_update(&catalog, &config, 2, 100, UpdateStatus::Ready, &[b"bundle-a"]);
    seed_update(&catalog, &config, 3, 200, UpdateStatus::Ready, &[b"bundle-b", b"art-b"]);

    let launcher = Launcher::new(catalog, config);
    let contract: LaunchContract =
        launcher.launch_without_reaping().expect("launch succeeds");
    assert_eq!(contract.update.id, update_id(3));
    assert_eq!(contract.assets.len(), 2);
    assert!(contract.launch_asset_path.is_file());
    assert!(contract.assets.values().any(|path| *path == contract.launch_asset_path));
}

#[test]
fn missing_files_fall_back_to_an_older_update() {
    let workspace = TempDir::new().expect("tempdir");
    let config = engine_config(&workspace, false);
    let catalog = open_catalog(&config);
    seed_update(&catalog, &config, 1, 0, UpdateStatus::Embedded, &[b"embedded-bundle"]);
    seed_update(&catalog, &config, 2, 100, UpdateStatus::Ready, &[b"bundle-a"]);
    seed_update(&catalog, &config, 3, 200, UpdateStatus::Ready, &[b"bundle-b"]);

    // Break the newest update's launch asset on disk.
    let broken = hash_bytes(HashAlgorithm::Sha256, b"bundle-b");
    std::fs::remove_file(
        config.updates_directory.join(format!("{}.bin", broken.storage_stem())),
    )
    .expect("remove file");

    let launcher = Launcher::new(catalog, config);
    let contract = launcher.launch_without_reaping().expect("fallback launch");
    assert_eq!(contract.update.id, update_id(2));
}

#[test]
fn embedded_update_is_the_terminal_fallback() {
    let workspace = TempDir::new().expect("tempdir");
    let config = engine_config(&workspace, false);
    let catalog = open_catalog(&config);
    seed_update(&catalog, &config, 1, 0, UpdateStatus::Embedded, &[b"embedded-bundle"]);

    let launcher = Launcher::new(catalog, config);
    let contract = launcher.launch_without_reaping().expect("embedded launch");
    assert_eq!(contract.update.id, update_id(1));
}

#[test]
fn empty_catalog_cannot_launch() {
    let workspace = TempDir::new().expect("tempdir");
    let config = engine_config(&workspace, false);
    let catalog = open_catalog(&config);
    let launcher = Launcher::new(catalog, config);
    let err = launcher.launch_without_reaping().expect_err("nothing to launch");
    assert!(matches!(err, LaunchError::NoLaunchableUpdate));
}

// ============================================================================
// SECTION: Reap Tests
// ============================================================================

#[test]
fn upgrade_then_reap_removes_the_stale_update() {
    let workspace = TempDir::new().expect("tempdir");
    let config = engine_config(&workspace, false);
    let catalog = open_catalog(&config);
    let shared: &[u8] = b"shared-artwork";
    let exclusive: &[u8] = b"old-bundle";
    seed_update(&catalog, &config, 1, 0, UpdateStatus::Embedded, &[b"embedded-bundle"]);
    seed_update(&catalog, &config, 2, 100, UpdateStatus::Ready, &[exclusive, shared]);
    seed_update(&catalog, &config, 3, 200, UpdateStatus::Ready, &[b"new-bundle", shared]);

    let launcher = Launcher::new(catalog.clone(), config.clone());
    let contract = launcher.launch_without_reaping().expect("launch b");
    assert_eq!(contract.update.id, update_id(3));

    let stats = Reaper::new(catalog.clone(), config.clone())
        .run(contract.update.id)
        .expect("reap pass");
    assert_eq!(stats.deleted_updates, 1);
    assert_eq!(stats.deleted_assets, 1);

    assert!(catalog.update_by_id(update_id(2)).expect("query").is_none());
    assert!(!asset_file_exists(&config, exclusive));
    assert!(asset_file_exists(&config, shared));
    assert!(catalog.update_by_id(update_id(1)).expect("query").is_some());
    assert!(catalog.update_by_id(update_id(3)).expect("query").is_some());
}

#[test]
fn reaper_spares_pinned_updates() {
    let workspace = TempDir::new().expect("tempdir");
    let config = engine_config(&workspace, false);
    let catalog = open_catalog(&config);
    seed_update(&catalog, &config, 1, 0, UpdateStatus::Embedded, &[b"embedded-bundle"]);
    seed_update(&catalog, &config, 2, 100, UpdateStatus::Ready, &[b"bundle-a"]);
    seed_update(&catalog, &config, 3, 200, UpdateStatus::Ready, &[b"bundle-b"]);
    catalog.set_update_keep(update_id(2), true).expect("pin");

    let stats = Reaper::new(catalog.clone(), config)
        .run(update_id(3))
        .expect("reap pass");
    assert_eq!(stats.deleted_updates, 0);
    assert!(catalog.update_by_id(update_id(2)).expect("query").is_some());
}

#[test]
fn development_client_variant_spares_recent_launches() {
    let workspace = TempDir::new().expect("tempdir");
    let config = engine_config(&workspace, true);
    let catalog = open_catalog(&config);
    seed_update(&catalog, &config, 1, 0, UpdateStatus::Embedded, &[b"embedded-bundle"]);
    seed_update(&catalog, &config, 2, 100, UpdateStatus::Ready, &[b"bundle-a"]);

    // Launch the older update so it lands in the grace window.
    let launcher = Launcher::new(catalog.clone(), config.clone());
    let contract = launcher.launch_without_reaping().expect("launch a");
    assert_eq!(contract.update.id, update_id(2));

    seed_update(&catalog, &config, 3, 200, UpdateStatus::Ready, &[b"bundle-b"]);
    let launcher = Launcher::new(catalog.clone(), config.clone());
    let contract = launcher.launch_without_reaping().expect("launch b");
    assert_eq!(contract.update.id, update_id(3));

    let stats = Reaper::new(catalog.clone(), config)
        .run(update_id(3))
        .expect("reap pass");
    assert_eq!(stats.deleted_updates, 0);
    assert!(catalog.update_by_id(update_id(2)).expect("query").is_some());
}

#[test]
fn launch_triggers_the_reaper_in_the_background() {
    let workspace = TempDir::new().expect("tempdir");
    let config = engine_config(&workspace, false);
    let catalog = open_catalog(&config);
    seed_update(&catalog, &config, 1, 0, UpdateStatus::Embedded, &[b"embedded-bundle"]);
    seed_update(&catalog, &config, 2, 100, UpdateStatus::Ready, &[b"bundle-a"]);
    seed_update(&catalog, &config, 3, 200, UpdateStatus::Ready, &[b"bundle-b"]);

    let launcher = Launcher::new(catalog.clone(), config);
    let contract = launcher.launch().expect("launch with reaper");
    assert_eq!(contract.update.id, update_id(3));

    // The reaper runs on its own thread; wait for it to catch up.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if catalog.update_by_id(update_id(2)).expect("query").is_none() {
            break;
        }
        assert!(Instant::now() < deadline, "reaper did not run in time");
        std::thread::sleep(Duration::from_millis(20));
    }
}
