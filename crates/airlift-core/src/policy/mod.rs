// crates/airlift-core/src/policy/mod.rs
// ============================================================================
// Module: Airlift Selection Policy
// Description: Pure decision functions over catalog snapshots.
// Purpose: Choose which update to launch, load against, or reap.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The three selection policies are plain functions over in-memory
//! snapshots: no I/O, no clock reads, no hidden state. Given the same
//! snapshot they return the same answer, which is what makes launch
//! behavior reproducible and the reaper auditable. Ties on commit time are
//! broken by snapshot order (earlier row wins), so equal timestamps are
//! still deterministic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::identifiers::RuntimeVersion;
use crate::core::identifiers::ScopeKey;
use crate::core::update::UpdateRecord;
use crate::core::update::UpdateStatus;

// ============================================================================
// SECTION: Context
// ============================================================================

/// Host-side inputs every selection decision depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionContext {
    /// Scope the host is running under.
    pub scope_key: ScopeKey,
    /// Runtime-compatibility version of the host build.
    pub runtime_version: RuntimeVersion,
    /// Whether development updates may be selected for launch.
    pub development_enabled: bool,
}

impl SelectionContext {
    /// Returns true when `update` belongs to this context's scope and is
    /// compatible with the host runtime. Embedded and development updates
    /// are runtime-exempt: the former ships with the host build, the
    /// latter is produced against it.
    #[must_use]
    pub fn admits(&self, update: &UpdateRecord) -> bool {
        if update.scope_key != self.scope_key {
            return false;
        }
        match update.status {
            UpdateStatus::Ready => update.runtime_version == self.runtime_version,
            UpdateStatus::Embedded | UpdateStatus::Development => true,
            UpdateStatus::Pending => false,
        }
    }
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Returns the record with the greatest commit time; the earlier snapshot
/// entry wins on ties.
pub(crate) fn newest<'a, I>(records: I) -> Option<&'a UpdateRecord>
where
    I: IntoIterator<Item = &'a UpdateRecord>,
{
    records.into_iter().fold(None, |best, candidate| match best {
        Some(current) if candidate.commit_time <= current.commit_time => Some(current),
        _ => Some(candidate),
    })
}

// ============================================================================
// SECTION: Policies
// ============================================================================

mod launch;
mod loader;
mod reaper;

pub use launch::select_update_to_launch;
pub use loader::select_loader_base;
pub use loader::should_replace_base;
pub use reaper::ReaperPolicy;
pub use reaper::select_updates_to_reap;
