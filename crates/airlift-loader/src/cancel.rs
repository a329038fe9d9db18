// crates/airlift-loader/src/cancel.rs
// ============================================================================
// Module: Airlift Load Cancellation
// Description: Cooperative cancellation token for in-flight loads.
// Purpose: Let callers stop a load between assets without corrupting state.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Cancellation is cooperative: workers check the token between assets, so
//! a cancelled load stops at the next asset boundary with the pending
//! update row and any stored assets intact. Callers then either re-run the
//! load (stored assets are reused) or abort it explicitly, which removes
//! the pending row, so a cancelled load is never left stuck.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

// ============================================================================
// SECTION: Token
// ============================================================================

/// Cooperative cancellation flag shared between a caller and a load.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    /// Shared cancellation flag.
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the associated load.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
