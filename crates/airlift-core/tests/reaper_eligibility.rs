//! Reaper eligibility policy tests for airlift-core.
// crates/airlift-core/tests/reaper_eligibility.rs
// =============================================================================
// Module: Reaper Eligibility Tests
// Description: Validate removal-policy safety guarantees.
// Purpose: Ensure the reaper can never select protected updates.
// =============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeSet;

use airlift_core::ReaperPolicy;
use airlift_core::RuntimeVersion;
use airlift_core::ScopeKey;
use airlift_core::UnixMillis;
use airlift_core::UpdateId;
use airlift_core::UpdateRecord;
use airlift_core::UpdateStatus;
use airlift_core::select_updates_to_reap;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn update_id(index: u32) -> UpdateId {
    UpdateId::parse(&format!("00000000-0000-4000-8000-{index:012x}")).expect("valid uuid")
}

fn update(index: u32, status: UpdateStatus, commit_time: i64) -> UpdateRecord {
    UpdateRecord {
        id: update_id(index),
        scope_key: ScopeKey::new("main"),
        commit_time: UnixMillis::new(commit_time),
        runtime_version: RuntimeVersion::new("1.0"),
        launch_asset_id: None,
        metadata: None,
        status,
        keep: false,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn reaps_older_ready_updates_only() {
    let all = vec![
        update(1, UpdateStatus::Embedded, 0),
        update(2, UpdateStatus::Ready, 100),
        update(3, UpdateStatus::Ready, 200),
        update(4, UpdateStatus::Ready, 300),
    ];
    let deletable = select_updates_to_reap(&all, update_id(3), &ReaperPolicy::Default);
    assert_eq!(deletable, vec![update_id(2)]);
}

#[test]
fn never_reaps_embedded_kept_launched_or_pending() {
    let mut pinned = update(2, UpdateStatus::Ready, 50);
    pinned.keep = true;
    let all = vec![
        update(1, UpdateStatus::Embedded, 0),
        pinned,
        update(3, UpdateStatus::Pending, 60),
        update(4, UpdateStatus::Ready, 100),
    ];
    let deletable = select_updates_to_reap(&all, update_id(4), &ReaperPolicy::Default);
    assert!(deletable.is_empty());
}

#[test]
fn never_reaps_updates_newer_than_launched() {
    let all = vec![
        update(1, UpdateStatus::Ready, 100),
        update(2, UpdateStatus::Ready, 300),
    ];
    let deletable = select_updates_to_reap(&all, update_id(1), &ReaperPolicy::Default);
    assert!(deletable.is_empty());
}

#[test]
fn development_client_spares_grace_window_launches() {
    let all = vec![
        update(1, UpdateStatus::Development, 50),
        update(2, UpdateStatus::Ready, 60),
        update(3, UpdateStatus::Ready, 100),
    ];
    let recently_launched: BTreeSet<UpdateId> = [update_id(1)].into_iter().collect();
    let deletable = select_updates_to_reap(
        &all,
        update_id(3),
        &ReaperPolicy::DevelopmentClient {
            recently_launched,
        },
    );
    assert_eq!(deletable, vec![update_id(2)]);
}

#[test]
fn missing_launched_anchor_reaps_nothing() {
    let all = vec![update(1, UpdateStatus::Ready, 100)];
    assert!(select_updates_to_reap(&all, update_id(9), &ReaperPolicy::Default).is_empty());
}

#[test]
fn foreign_scope_is_untouched() {
    let mut foreign = update(2, UpdateStatus::Ready, 10);
    foreign.scope_key = ScopeKey::new("other");
    let all = vec![foreign, update(3, UpdateStatus::Ready, 100)];
    assert!(select_updates_to_reap(&all, update_id(3), &ReaperPolicy::Default).is_empty());
}
