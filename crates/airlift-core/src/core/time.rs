// crates/airlift-core/src/core/time.rs
// ============================================================================
// Module: Airlift Time Model
// Description: Canonical millisecond timestamps for catalog records.
// Purpose: Provide deterministic, caller-supplied time values across records.
// Dependencies: serde, thiserror, time
// ============================================================================

//! ## Overview
//! Commit times, download times, and launch times are unix-epoch
//! milliseconds. This crate never reads the wall clock; the loader and
//! launcher stamp records at their own boundaries and policy functions
//! compare whatever the snapshot carries, which keeps selection replayable.
//! Manifests may carry commit times either as integer milliseconds or as an
//! RFC 3339 string; [`UnixMillis::parse_rfc3339`] handles the latter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error returned when a timestamp string cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid rfc3339 timestamp: {0}")]
pub struct TimestampParseError(
    /// Offending input.
    pub String,
);

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Unix-epoch milliseconds timestamp.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnixMillis(i64);

impl UnixMillis {
    /// Creates a timestamp from raw unix milliseconds.
    #[must_use]
    pub const fn new(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the raw unix milliseconds.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Returns the timestamp shifted backwards by `millis`, saturating.
    #[must_use]
    pub const fn saturating_sub(self, millis: i64) -> Self {
        Self(self.0.saturating_sub(millis))
    }

    /// Parses an RFC 3339 date string into unix milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampParseError`] when the input is not valid RFC 3339.
    pub fn parse_rfc3339(raw: &str) -> Result<Self, TimestampParseError> {
        let parsed = OffsetDateTime::parse(raw, &Rfc3339)
            .map_err(|_| TimestampParseError(raw.to_string()))?;
        let nanos = parsed.unix_timestamp_nanos();
        let millis = nanos / 1_000_000;
        i64::try_from(millis).map(Self).map_err(|_| TimestampParseError(raw.to_string()))
    }
}

impl fmt::Display for UnixMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
