// crates/ledgersql-store-sqlite/src/lib.rs
// ============================================================================
// Module: LedgerSQL SQLite Store Library
// Description: SQLite backend for table projection and sync records.
// Purpose: Expose the SQLite store and its configuration.
// Dependencies: ledgersql-core, rusqlite
// ============================================================================

//! ## Overview
//! [`SqliteTxStore`] executes translated table operations against `SQLite`
//! and persists per-table sync records next to the projected tables, so data
//! and progress commit in one database transaction.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod params;
mod status;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::SqliteTxStore;
