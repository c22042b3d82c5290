// crates/ledgersql-core/src/core/mod.rs
// ============================================================================
// Module: LedgerSQL Core Types
// Description: Values, identifiers, conditions, operations, and table rules.
// Purpose: Provide the stable, serializable vocabulary of the projection.
// Dependencies: bigdecimal, serde, serde_json, sha2, time
// ============================================================================

//! ## Overview
//! Core types describe what a ledger transaction asks of a table: the typed
//! [`Value`] model, the JSON condition language compiled by
//! [`ConditionTree`], the [`TableOperation`] payloads, and the per-table
//! [`TableRules`] that constrain non-owner callers. Nothing here touches a
//! database.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod condition;
pub mod hashing;
pub mod identifiers;
pub mod rule;
pub mod table;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use condition::ConditionError;
pub use condition::ConditionLeaf;
pub use condition::ConditionNode;
pub use condition::ConditionOp;
pub use condition::ConditionTree;
pub use condition::ConditionVisitor;
pub use condition::LogicKind;
pub use condition::PlaceholderAllocator;
pub use condition::SqlFragment;
pub use condition::StatementBinder;
pub use condition::VisitPhase;
pub use hashing::HashError;
pub use hashing::chain_hash;
pub use hashing::hash_bytes;
pub use identifiers::AccountId;
pub use identifiers::CheckHash;
pub use identifiers::Hash256;
pub use identifiers::IdentifierError;
pub use identifiers::LedgerHash;
pub use identifiers::StorageId;
pub use identifiers::TableName;
pub use identifiers::TxHash;
pub use rule::InsertQuota;
pub use rule::OperationRule;
pub use rule::QuotaCheck;
pub use rule::RowCounter;
pub use rule::RuleContext;
pub use rule::RuleError;
pub use rule::RuleOutcome;
pub use rule::TableRules;
pub use table::CheckDeclaration;
pub use table::ColumnSpec;
pub use table::ColumnType;
pub use table::IndexSpec;
pub use table::JsonRow;
pub use table::OperationKind;
pub use table::OrderSpec;
pub use table::TableOperation;
pub use table::TableTx;
pub use table::TxKind;
pub use value::CompareOp;
pub use value::DecimalValue;
pub use value::StringKind;
pub use value::Value;
pub use value::ValueError;
pub use value::ValueKind;
