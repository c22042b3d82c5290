// crates/ledgersql-core/src/lib.rs
// ============================================================================
// Module: LedgerSQL Core Library
// Description: Public API surface for the LedgerSQL projection core.
// Purpose: Expose core types, backend interfaces, and runtime engines.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! LedgerSQL projects table operations carried by ledger transactions into a
//! relational database. The core is backend-agnostic: it validates operations
//! against table rules, compiles JSON conditions into parameterized SQL, keeps
//! per-table sync progress, and tracks check-hash chains, while storage
//! drivers plug in through [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::DisposeError;
pub use interfaces::DisposeMode;
pub use interfaces::DisposeReport;
pub use interfaces::DisposeRequest;
pub use interfaces::ErrorClass;
pub use interfaces::LedgerClock;
pub use interfaces::SyncItem;
pub use interfaces::SyncPosition;
pub use interfaces::SyncProgress;
pub use interfaces::SyncRecord;
pub use interfaces::SyncStatusError;
pub use interfaces::SyncStatusStore;
pub use interfaces::TableApplier;
pub use interfaces::TxExecutor;
pub use interfaces::TxOutcome;
pub use runtime::ApplyContext;
pub use runtime::ApplyError;
pub use runtime::ApplyReceipt;
pub use runtime::CheckHashConfig;
pub use runtime::CheckHashError;
pub use runtime::CheckHashTracker;
pub use runtime::InMemoryTableStore;
pub use runtime::ProcessorConfig;
pub use runtime::SyncStatus;
pub use runtime::TableStorage;
pub use runtime::TableStorageConfig;
pub use runtime::TxProcessor;
