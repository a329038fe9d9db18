// crates/airlift-store-sqlite/src/lib.rs
// ============================================================================
// Module: Airlift SQLite Store
// Description: Crate wiring for the SQLite-backed update catalog.
// Purpose: Export the catalog pool, handle, config, and error types.
// Dependencies: airlift-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `airlift-store-sqlite` implements [`airlift_core::UpdateCatalog`] on a
//! single shared `SQLite` connection. Callers open a [`CatalogPool`] once
//! and acquire reference-counted [`CatalogHandle`] values; the connection
//! closes when the last holder releases its handle. All multi-row
//! mutations run inside transactions so concurrent handles never observe
//! partial state.

mod catalog;

pub use catalog::CatalogConfig;
pub use catalog::CatalogHandle;
pub use catalog::CatalogJournalMode;
pub use catalog::CatalogPool;
pub use catalog::CatalogSyncMode;
pub use catalog::SqliteCatalogError;
