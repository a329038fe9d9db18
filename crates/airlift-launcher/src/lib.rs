// crates/airlift-launcher/src/lib.rs
// ============================================================================
// Module: Airlift Launcher
// Description: Crate wiring for launch verification and the reaper.
// Purpose: Export the launcher, reaper, and their error types.
// Dependencies: airlift-config, airlift-core, serde_json, tracing
// ============================================================================

//! ## Overview
//! `airlift-launcher` turns a selected update into the launch contract the
//! external runtime consumes: it verifies every linked asset on disk,
//! retries selection (excluding broken updates) down to the embedded
//! fallback, records launch history, and spawns the [`Reaper`] as a
//! fire-and-forget background pass that applies the removal policy with
//! the two-phase mark-then-delete protocol.

mod launcher;
mod reaper;

pub use launcher::LaunchError;
pub use launcher::Launcher;
pub use reaper::ReapError;
pub use reaper::ReapStats;
pub use reaper::Reaper;
