// crates/ledgersql-core/src/runtime/mod.rs
// ============================================================================
// Module: LedgerSQL Runtime
// Description: Translation, sync engine, check-hash tracking, and apply flow.
// Purpose: Drive ledger transactions into relational tables.
// Dependencies: crate::{core, interfaces}, tracing
// ============================================================================

//! ## Overview
//! Runtime modules turn approved operations into statements, keep each
//! table's backend copy in ledger order, and track the per-table check-hash
//! chain. [`TxProcessor`] ties them together for the ledger apply layer; every
//! entry point shares the same rule and translation path.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod check_hash;
pub mod memory;
pub mod processor;
pub mod sync;
pub mod translator;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use check_hash::CheckHashConfig;
pub use check_hash::CheckHashError;
pub use check_hash::CheckHashTracker;
pub use check_hash::ExpiryWorker;
pub use check_hash::PreparedCheck;
pub use memory::InMemoryTableStore;
pub use processor::ApplyContext;
pub use processor::ApplyError;
pub use processor::ApplyReceipt;
pub use processor::ProcessorConfig;
pub use processor::TxProcessor;
pub use sync::SyncError;
pub use sync::SyncStatus;
pub use sync::SyncStep;
pub use sync::TableStorage;
pub use sync::TableStorageConfig;
pub use sync::TableSyncSnapshot;
pub use translator::AccessMode;
pub use translator::ResultCheck;
pub use translator::RowMismatch;
pub use translator::SqlStatement;
pub use translator::TranslateError;
pub use translator::Translation;
pub use translator::count_statement;
pub use translator::match_expected_rows;
pub use translator::translate;
