// crates/airlift-core/src/policy/reaper.rs
// ============================================================================
// Module: Airlift Reaper Eligibility
// Description: Chooses which updates are safe to delete.
// Purpose: Deterministic removal policy applied after a successful launch.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Reaper eligibility never touches embedded updates, pinned (`keep`)
//! updates, the currently launched update, pending rows (an in-flight load
//! owns those), or anything newer than the launched update. The
//! development-client variant additionally spares updates launched within
//! a recent grace window, so slower iterative testing does not lose
//! bundles between runs. Only updates in the launched update's scope are
//! ever eligible.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::core::identifiers::UpdateId;
use crate::core::update::UpdateRecord;
use crate::core::update::UpdateStatus;

// ============================================================================
// SECTION: Policy Variants
// ============================================================================

/// Removal policy variant applied by the reaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaperPolicy {
    /// Delete everything eligible that is not newer than the launched update.
    Default,
    /// Development-client variant: additionally spare updates launched
    /// within the recent grace window.
    DevelopmentClient {
        /// Ids launched recently enough to be spared.
        recently_launched: BTreeSet<UpdateId>,
    },
}

// ============================================================================
// SECTION: Eligibility
// ============================================================================

/// Computes the updates safe to delete after `launched_id` launched.
///
/// Returns an empty set when the launched update is absent from the
/// snapshot; with no anchor, nothing can be proven stale. Output order
/// follows the snapshot, so identical snapshots reap identically.
#[must_use]
pub fn select_updates_to_reap(
    all: &[UpdateRecord],
    launched_id: UpdateId,
    policy: &ReaperPolicy,
) -> Vec<UpdateId> {
    let Some(launched) = all.iter().find(|update| update.id == launched_id) else {
        return Vec::new();
    };

    all.iter()
        .filter(|update| update.scope_key == launched.scope_key)
        .filter(|update| update.id != launched.id)
        .filter(|update| {
            !matches!(update.status, UpdateStatus::Embedded | UpdateStatus::Pending)
        })
        .filter(|update| !update.keep)
        .filter(|update| update.commit_time <= launched.commit_time)
        .filter(|update| match policy {
            ReaperPolicy::Default => true,
            ReaperPolicy::DevelopmentClient {
                recently_launched,
            } => !recently_launched.contains(&update.id),
        })
        .map(|update| update.id)
        .collect()
}
