// crates/airlift-loader/src/lib.rs
// ============================================================================
// Module: Airlift Loader
// Description: Crate wiring for the content fetcher.
// Purpose: Export the remote loader, embedded loader, and load types.
// Dependencies: airlift-config, airlift-core, reqwest, tempfile, tracing
// ============================================================================

//! ## Overview
//! `airlift-loader` is the content fetcher: [`RemoteLoader`] drives one
//! remote load (manifest fetch, dedup, parallel downloads, verification,
//! promotion) and [`EmbeddedLoader`] registers the build-shipped fallback
//! update. Both write asset files exactly once under content-addressed
//! names and register rows through the shared catalog handle.

mod cancel;
mod embedded;
mod fetch;
mod files;
mod remote;

pub use cancel::CancelToken;
pub use embedded::EmbeddedLoader;
pub use fetch::FetchError;
pub use remote::AssetFailure;
pub use remote::AssetFailureReason;
pub use remote::LoadError;
pub use remote::LoadOutcome;
pub use remote::LoadedUpdate;
pub use remote::RemoteLoader;
