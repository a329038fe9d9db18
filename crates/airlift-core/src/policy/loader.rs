// crates/airlift-core/src/policy/loader.rs
// ============================================================================
// Module: Airlift Loader Base Selection
// Description: Chooses the baseline update for a remote load.
// Purpose: Short-circuit loads that would not improve on the current state.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Before downloading anything, the loader asks which existing update the
//! next remote load should treat as "currently launched". A fetched
//! manifest only proceeds when it names a different update with a strictly
//! newer commit time than that base; everything else is reported as
//! already up to date. Development updates never serve as a base; they do
//! not originate from the update server.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::identifiers::UpdateId;
use crate::core::time::UnixMillis;
use crate::core::update::UpdateRecord;
use crate::core::update::UpdateStatus;
use crate::policy::SelectionContext;
use crate::policy::newest;

// ============================================================================
// SECTION: Selection
// ============================================================================

/// Chooses the update a remote load should treat as its baseline.
///
/// Considers ready and embedded updates admitted by `ctx`; ties on commit
/// time resolve to the earlier snapshot entry.
#[must_use]
pub fn select_loader_base<'a>(
    candidates: &'a [UpdateRecord],
    ctx: &SelectionContext,
) -> Option<&'a UpdateRecord> {
    newest(candidates.iter().filter(|update| {
        ctx.admits(update)
            && matches!(update.status, UpdateStatus::Ready | UpdateStatus::Embedded)
    }))
}

/// Returns true when a manifest naming `manifest_id` at `manifest_commit_time`
/// should replace `base`.
///
/// A missing base always loads; the same id never re-loads; otherwise the
/// manifest must be strictly newer than the base.
#[must_use]
pub fn should_replace_base(
    base: Option<&UpdateRecord>,
    manifest_id: UpdateId,
    manifest_commit_time: UnixMillis,
) -> bool {
    match base {
        None => true,
        Some(current) if current.id == manifest_id => false,
        Some(current) => manifest_commit_time > current.commit_time,
    }
}
