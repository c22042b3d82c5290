// crates/ledgersql-core/src/interfaces/mod.rs
// ============================================================================
// Module: LedgerSQL Interfaces
// Description: Backend-agnostic interfaces for execution and sync persistence.
// Purpose: Define the contract surfaces used by the LedgerSQL runtime.
// Dependencies: crate::core, crate::runtime::translator
// ============================================================================

//! ## Overview
//! Interfaces define how LedgerSQL integrates with a relational backend
//! without embedding driver details. A backend implements [`TxExecutor`] for
//! the synchronous apply path, [`TableApplier`] for the sync worker, and
//! [`SyncStatusStore`] for persisted per-table progress. Implementations must
//! run every logical operation inside one database transaction and must never
//! leak a partially applied operation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::AccountId;
use crate::core::identifiers::LedgerHash;
use crate::core::identifiers::StorageId;
use crate::core::identifiers::TableName;
use crate::core::identifiers::TxHash;
use crate::core::rule::RowCounter;
use crate::core::rule::RuleError;
use crate::core::rule::RuleOutcome;
use crate::core::table::JsonRow;
use crate::core::table::TableTx;
use crate::core::value::ValueError;
use crate::runtime::translator::RowMismatch;
use crate::runtime::translator::TranslateError;

// ============================================================================
// SECTION: Error Classification
// ============================================================================

/// How the ledger apply layer should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The transaction is invalid and must be rejected.
    Reject,
    /// A transient condition; the transaction may be retried later.
    RetryLater,
    /// The local node cannot continue applying this table.
    Fatal,
}

// ============================================================================
// SECTION: Dispose
// ============================================================================

/// Whether a dispose commits or only validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeMode {
    /// Commit on success.
    Commit,
    /// Execute and verify, then always roll back.
    DryRun,
}

/// Input to [`TxExecutor::dispose`].
#[derive(Debug, Clone, Copy)]
pub struct DisposeRequest<'a> {
    /// Transaction to execute.
    pub tx: &'a TableTx,
    /// Approved rule outcome.
    pub rule: &'a RuleOutcome,
    /// Verify declared affected-row counts.
    pub verify_affected_rows: bool,
    /// Commit or dry-run.
    pub mode: DisposeMode,
}

/// Successful dispose result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisposeReport {
    /// Rows changed by the last write statement.
    pub affected_rows: u64,
    /// Rows returned by read operations.
    pub rows: Vec<JsonRow>,
    /// True when the changes were committed.
    pub committed: bool,
}

/// Dispose errors (the failure half of the `(success, message)` contract).
///
/// # Invariants
/// - Messages never embed bound parameter values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisposeError {
    /// Condition JSON failed to parse.
    #[error("parse error: {0}")]
    Parse(String),
    /// Values of differing kinds were compared or converted.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// Bound values did not match placeholder arity.
    #[error("bind error: {0}")]
    Bind(String),
    /// The table rule rejected the request.
    #[error("rule violation: {0}")]
    RuleViolation(String),
    /// The operation is structurally invalid.
    #[error("invalid operation: {0}")]
    Invalid(String),
    /// Actual row count differed from the declared count.
    #[error("affected row mismatch: declared {declared}, actual {actual}")]
    AffectedRowMismatch {
        /// Declared row count.
        declared: u64,
        /// Rows actually changed.
        actual: u64,
    },
    /// An assert operation found different rows.
    #[error("{0}")]
    AssertMismatch(String),
    /// The database rejected a statement.
    #[error("db execution error: {0}")]
    DbExecution(String),
    /// The backend is temporarily unavailable.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl DisposeError {
    /// Classifies the error for the ledger apply layer.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Parse(_)
            | Self::TypeMismatch(_)
            | Self::Bind(_)
            | Self::RuleViolation(_)
            | Self::Invalid(_)
            | Self::AffectedRowMismatch {
                ..
            }
            | Self::AssertMismatch(_) => ErrorClass::Reject,
            Self::Unavailable(_) => ErrorClass::RetryLater,
            Self::DbExecution(_) => ErrorClass::Fatal,
        }
    }
}

impl From<TranslateError> for DisposeError {
    fn from(error: TranslateError) -> Self {
        match error {
            TranslateError::Parse(message) => Self::Parse(message),
            TranslateError::Bind(message) => Self::Bind(message),
            TranslateError::Invalid(message) => Self::Invalid(message),
        }
    }
}

impl From<RuleError> for DisposeError {
    fn from(error: RuleError) -> Self {
        match error {
            RuleError::Violation(message) => Self::RuleViolation(message),
            RuleError::Condition(message) => Self::Parse(message),
            RuleError::Count(message) => Self::DbExecution(message),
        }
    }
}

impl From<ValueError> for DisposeError {
    fn from(error: ValueError) -> Self {
        Self::TypeMismatch(error.to_string())
    }
}

impl From<RowMismatch> for DisposeError {
    fn from(error: RowMismatch) -> Self {
        Self::AssertMismatch(error.to_string())
    }
}

/// Flattened `(success, message)` outcome returned across the ledger boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutcome {
    /// True when the operation succeeded.
    pub success: bool,
    /// Human-readable result message.
    pub message: String,
    /// Failure classification, absent on success.
    pub class: Option<ErrorClass>,
}

impl TxOutcome {
    /// Builds a success outcome.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            class: None,
        }
    }

    /// Builds a failure outcome.
    #[must_use]
    pub fn failed(message: impl Into<String>, class: ErrorClass) -> Self {
        Self {
            success: false,
            message: message.into(),
            class: Some(class),
        }
    }
}

/// Synchronous execution entry point used by the ledger apply layer.
pub trait TxExecutor: RowCounter + Send + Sync {
    /// Translates and executes one transaction inside a single database
    /// transaction; commits only in [`DisposeMode::Commit`] on success.
    ///
    /// # Errors
    ///
    /// Returns [`DisposeError`] on translation, verification, or database
    /// failure; nothing is persisted in that case.
    fn dispose(&self, request: &DisposeRequest<'_>) -> Result<DisposeReport, DisposeError>;

    /// Runs a read-only operation without touching the write transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DisposeError`] when the operation is not a read or fails.
    fn tx_history(&self, tx: &TableTx, rule: &RuleOutcome) -> Result<Vec<JsonRow>, DisposeError>;

    /// Drops a backend table outside the ledger flow.
    ///
    /// # Errors
    ///
    /// Returns [`DisposeError::DbExecution`] when the drop fails.
    fn drop_table(&self, storage_id: &StorageId) -> Result<(), DisposeError>;

    /// Executes `dispose` and flattens the result into a [`TxOutcome`].
    fn dispose_outcome(&self, request: &DisposeRequest<'_>) -> TxOutcome {
        match self.dispose(request) {
            Ok(report) => TxOutcome::ok(format!(
                "{} ok: {} row(s)",
                request.tx.operation.label(),
                if request.tx.operation.is_read_only() {
                    u64::try_from(report.rows.len()).unwrap_or(u64::MAX)
                } else {
                    report.affected_rows
                }
            )),
            Err(err) => TxOutcome::failed(err.to_string(), err.class()),
        }
    }
}

// ============================================================================
// SECTION: Sync Records
// ============================================================================

/// Ordering key of an applied item: ledger sequence then position in ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SyncPosition {
    /// Ledger sequence.
    pub ledger_seq: u64,
    /// Transaction index within the ledger.
    pub tx_seq: u64,
}

/// Persisted synchronization record for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Logical table name.
    pub table_name: TableName,
    /// Backend table name.
    pub storage_id: StorageId,
    /// Table owner.
    pub owner: AccountId,
    /// Last applied ledger sequence (0 before the first apply).
    pub ledger_seq: u64,
    /// Last applied ledger hash.
    pub ledger_hash: LedgerHash,
    /// Last applied transaction index within its ledger.
    pub tx_seq: u64,
    /// Last applied transaction hash.
    pub tx_hash: TxHash,
    /// Reload this table on startup.
    pub auto_sync: bool,
    /// Chain the record belongs to.
    pub chain_id: String,
    /// Table was dropped.
    pub deleted: bool,
}

impl SyncRecord {
    /// Returns the last applied position, if any item was applied.
    #[must_use]
    pub const fn position(&self) -> Option<SyncPosition> {
        if self.ledger_seq == 0 {
            return None;
        }
        Some(SyncPosition {
            ledger_seq: self.ledger_seq,
            tx_seq: self.tx_seq,
        })
    }
}

/// Progress written after each applied item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    /// Applied position.
    pub position: SyncPosition,
    /// Applied ledger hash.
    pub ledger_hash: LedgerHash,
    /// Applied transaction hash.
    pub tx_hash: TxHash,
}

/// Committed work item drained by the sync worker.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncItem {
    /// Ledger position of the transaction.
    pub position: SyncPosition,
    /// Hash of the ledger containing the transaction.
    pub ledger_hash: LedgerHash,
    /// Transaction to apply.
    pub tx: TableTx,
    /// Approved rule outcome.
    pub rule: RuleOutcome,
    /// Verify declared affected-row counts.
    pub verify_affected_rows: bool,
}

impl SyncItem {
    /// Returns the progress recorded when this item is applied.
    #[must_use]
    pub const fn progress(&self) -> SyncProgress {
        SyncProgress {
            position: self.position,
            ledger_hash: self.ledger_hash,
            tx_hash: self.tx.tx_hash,
        }
    }
}

/// Sync status persistence errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncStatusError {
    /// Backend failure.
    #[error("sync status db error: {0}")]
    Db(String),
    /// No record exists for the table.
    #[error("sync record not found: {0}")]
    NotFound(String),
    /// Stored record is invalid.
    #[error("sync record invalid: {0}")]
    Invalid(String),
}

/// Applies committed items and records progress atomically.
pub trait TableApplier: Send + Sync {
    /// Executes the item and writes its progress in the same database
    /// transaction. Drop and rename items also update the sync record.
    ///
    /// # Errors
    ///
    /// Returns [`DisposeError`] when execution fails; neither the data nor the
    /// progress record change in that case.
    fn apply_and_record(&self, item: &SyncItem) -> Result<DisposeReport, DisposeError>;
}

/// Persistence for per-table sync records.
pub trait SyncStatusStore: Send + Sync {
    /// Loads non-deleted auto-sync records for a chain.
    ///
    /// # Errors
    ///
    /// Returns [`SyncStatusError`] on backend failure.
    fn load_auto_sync(&self, chain_id: &str) -> Result<Vec<SyncRecord>, SyncStatusError>;

    /// Lists every record, including deleted ones.
    ///
    /// # Errors
    ///
    /// Returns [`SyncStatusError`] on backend failure.
    fn list_records(&self) -> Result<Vec<SyncRecord>, SyncStatusError>;

    /// Reads one record.
    ///
    /// # Errors
    ///
    /// Returns [`SyncStatusError`] on backend failure.
    fn read_record(&self, storage_id: &StorageId) -> Result<Option<SyncRecord>, SyncStatusError>;

    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// Returns [`SyncStatusError`] on backend failure or duplicate storage id.
    fn insert_record(&self, record: &SyncRecord) -> Result<(), SyncStatusError>;

    /// Updates the applied position of a record.
    ///
    /// # Errors
    ///
    /// Returns [`SyncStatusError::NotFound`] when no record exists.
    fn update_progress(
        &self,
        storage_id: &StorageId,
        progress: &SyncProgress,
    ) -> Result<(), SyncStatusError>;

    /// Renames the logical table of a record.
    ///
    /// # Errors
    ///
    /// Returns [`SyncStatusError::NotFound`] when no record exists.
    fn rename_record(
        &self,
        storage_id: &StorageId,
        new_name: &TableName,
    ) -> Result<(), SyncStatusError>;

    /// Sets the auto-sync flag.
    ///
    /// # Errors
    ///
    /// Returns [`SyncStatusError::NotFound`] when no record exists.
    fn set_auto_sync(&self, storage_id: &StorageId, auto_sync: bool) -> Result<(), SyncStatusError>;

    /// Marks a record deleted.
    ///
    /// # Errors
    ///
    /// Returns [`SyncStatusError::NotFound`] when no record exists.
    fn mark_deleted(&self, storage_id: &StorageId) -> Result<(), SyncStatusError>;

    /// Resolves the storage id of a live table by owner and logical name.
    ///
    /// # Errors
    ///
    /// Returns [`SyncStatusError`] on backend failure.
    fn find_storage_id(
        &self,
        owner: &AccountId,
        table_name: &TableName,
    ) -> Result<Option<StorageId>, SyncStatusError>;
}

// ============================================================================
// SECTION: Ledger Clock
// ============================================================================

/// Source of the current validated ledger sequence.
pub trait LedgerClock: Send + Sync {
    /// Returns the latest validated ledger sequence.
    fn current_ledger_seq(&self) -> u64;
}
