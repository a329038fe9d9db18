// crates/airlift-core/src/policy/launch.rs
// ============================================================================
// Module: Airlift Launch Selection
// Description: Chooses the update to run next.
// Purpose: Deterministic launch preference over a catalog snapshot.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Launch preference order: a development update when development mode is
//! enabled, else the newest runtime-compatible ready update, else the
//! embedded fallback. The embedded update is guaranteed present by the
//! host build, so a non-empty launchable snapshot always yields a choice.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::update::UpdateRecord;
use crate::core::update::UpdateStatus;
use crate::policy::SelectionContext;
use crate::policy::newest;

// ============================================================================
// SECTION: Selection
// ============================================================================

/// Chooses the update to launch from `candidates`.
///
/// Records outside the context's scope, runtime-incompatible ready rows,
/// and pending rows are ignored regardless of how the snapshot was
/// queried. Ties on commit time resolve to the earlier snapshot entry.
#[must_use]
pub fn select_update_to_launch<'a>(
    candidates: &'a [UpdateRecord],
    ctx: &SelectionContext,
) -> Option<&'a UpdateRecord> {
    let admitted: Vec<&UpdateRecord> =
        candidates.iter().filter(|update| ctx.admits(update)).collect();

    if ctx.development_enabled {
        let development = newest(
            admitted
                .iter()
                .copied()
                .filter(|update| update.status == UpdateStatus::Development),
        );
        if development.is_some() {
            return development;
        }
    }

    let ready =
        newest(admitted.iter().copied().filter(|update| update.status == UpdateStatus::Ready));
    if ready.is_some() {
        return ready;
    }

    newest(admitted.iter().copied().filter(|update| update.status == UpdateStatus::Embedded))
}
