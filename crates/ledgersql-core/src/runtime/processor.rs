// crates/ledgersql-core/src/runtime/processor.rs
// ============================================================================
// Module: LedgerSQL Apply Processor
// Description: Ledger apply path from rule check to sync enqueue.
// Purpose: Run every table transaction through one shared validation path.
// Dependencies: crate::{core, interfaces, runtime}, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`TxProcessor::apply`] is what the ledger apply layer calls for each table
//! transaction. Table-list and SQL-statement transactions take the same path:
//!
//! 1. evaluate the table rule (the translator is never reached on violation);
//! 2. enforce the insert quota against committed rows;
//! 3. reads run immediately on the read path and never enqueue;
//! 4. writes are dry-run against the backend when the table is caught up;
//! 5. a declared check hash extends the table chain;
//! 6. the table is registered with the sync engine and the item queued.
//!
//! A chain entry added in step 5 is withdrawn when step 6 fails. A dropped
//! table's chain is released by the sync engine once the drop is applied.
//!
//! Failures are returned as [`ApplyError`] and can be flattened into a
//! [`TxOutcome`] with [`TxProcessor::apply_outcome`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use tracing::warn;

use crate::core::identifiers::CheckHash;
use crate::core::identifiers::LedgerHash;
use crate::core::rule::RuleContext;
use crate::core::rule::RuleError;
use crate::core::rule::RuleOutcome;
use crate::core::rule::TableRules;
use crate::core::rule::adjust_insert_count;
use crate::core::rule::deal_with_rule;
use crate::core::table::JsonRow;
use crate::core::table::TableTx;
use crate::interfaces::DisposeError;
use crate::interfaces::DisposeMode;
use crate::interfaces::DisposeReport;
use crate::interfaces::DisposeRequest;
use crate::interfaces::ErrorClass;
use crate::interfaces::SyncItem;
use crate::interfaces::SyncPosition;
use crate::interfaces::SyncStatusStore;
use crate::interfaces::TableApplier;
use crate::interfaces::TxExecutor;
use crate::interfaces::TxOutcome;
use crate::runtime::check_hash::CheckHashError;
use crate::runtime::check_hash::CheckHashTracker;
use crate::runtime::sync::SyncError;
use crate::runtime::sync::SyncStatus;
use crate::runtime::sync::TableStorage;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Ledger position of the transaction being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyContext {
    /// Ledger sequence being closed.
    pub ledger_seq: u64,
    /// Hash of that ledger.
    pub ledger_hash: LedgerHash,
    /// Index of the transaction within the ledger.
    pub tx_seq: u64,
}

impl ApplyContext {
    /// Returns the sync position of the transaction.
    #[must_use]
    pub const fn position(&self) -> SyncPosition {
        SyncPosition {
            ledger_seq: self.ledger_seq,
            tx_seq: self.tx_seq,
        }
    }
}

/// Apply-path settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Verify declared affected-row counts.
    pub verify_affected_rows: bool,
    /// Dry-run writes against caught-up tables before accepting them.
    pub dry_run_on_apply: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            verify_affected_rows: true,
            dry_run_on_apply: true,
        }
    }
}

/// Result of a successful apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReceipt {
    /// Rows returned by a read operation.
    pub rows: Vec<JsonRow>,
    /// Dry-run report, when a dry run was performed.
    pub dry_run: Option<DisposeReport>,
    /// New chain head, when the transaction declared a check hash.
    pub check_hash: Option<CheckHash>,
    /// True when the item was queued for the sync worker.
    pub queued: bool,
}

/// Apply-path errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// Rule evaluation rejected the transaction.
    #[error("rule check failed: {0}")]
    Rule(#[from] RuleError),
    /// Execution or verification failed.
    #[error(transparent)]
    Dispose(#[from] DisposeError),
    /// Check-hash chain rejected the transaction.
    #[error(transparent)]
    CheckHash(#[from] CheckHashError),
    /// The sync engine could not accept the item.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl ApplyError {
    /// Classifies the error for the ledger apply layer.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Rule(RuleError::Count(_)) => ErrorClass::RetryLater,
            Self::Rule(_)
            | Self::CheckHash(
                CheckHashError::HashMismatch(_)
                | CheckHashError::ExpiredSubmission(_)
                | CheckHashError::NotFound(_)
                | CheckHashError::Hash(_),
            )
            | Self::Sync(SyncError::Deleted(_)) => ErrorClass::Reject,
            Self::Dispose(error) => error.class(),
            Self::CheckHash(CheckHashError::PendingLimit(_)) | Self::Sync(SyncError::Status(_)) => {
                ErrorClass::RetryLater
            }
            Self::CheckHash(CheckHashError::Tracker(_)) | Self::Sync(_) => ErrorClass::Fatal,
        }
    }
}

// ============================================================================
// SECTION: Processor
// ============================================================================

/// Ledger apply processor.
pub struct TxProcessor<B> {
    /// Executor and sync backend.
    backend: Arc<B>,
    /// Sync engine.
    storage: Arc<TableStorage<B>>,
    /// Check-hash tracker.
    tracker: Arc<CheckHashTracker>,
    /// Apply-path settings.
    config: ProcessorConfig,
}

impl<B> std::fmt::Debug for TxProcessor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxProcessor").field("config", &self.config).finish_non_exhaustive()
    }
}

impl<B> TxProcessor<B>
where
    B: TxExecutor + TableApplier + SyncStatusStore + 'static,
{
    /// Creates a processor sharing the sync engine's backend.
    #[must_use]
    pub fn new(
        storage: Arc<TableStorage<B>>,
        tracker: Arc<CheckHashTracker>,
        config: ProcessorConfig,
    ) -> Self {
        storage.attach_check_hash(Arc::clone(&tracker));
        Self {
            backend: Arc::clone(storage.backend()),
            storage,
            tracker,
            config,
        }
    }

    /// Returns the sync engine.
    #[must_use]
    pub const fn storage(&self) -> &Arc<TableStorage<B>> {
        &self.storage
    }

    /// Returns the check-hash tracker.
    #[must_use]
    pub const fn tracker(&self) -> &Arc<CheckHashTracker> {
        &self.tracker
    }

    /// Applies one table transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] when the rule, quota, dry run, check hash, or
    /// sync registration rejects the transaction. Nothing is queued then.
    pub fn apply(
        &self,
        tx: &TableTx,
        rules: Option<&TableRules>,
        ctx: &ApplyContext,
    ) -> Result<ApplyReceipt, ApplyError> {
        let outcome = deal_with_rule(
            &RuleContext {
                rules,
            },
            tx,
        )?;
        if let Some(rows) = &outcome.rows {
            let new_rows = u64::try_from(rows.len()).unwrap_or(u64::MAX);
            adjust_insert_count(&outcome, &tx.storage_id, new_rows, &*self.backend)?;
        }
        if tx.operation.is_read_only() {
            return self.read(tx, &outcome);
        }
        let dry_run = self.dry_run(tx, &outcome)?;
        let check_hash = match &tx.check {
            Some(declaration) => Some(self.tracker.put(tx, declaration, ctx.ledger_seq)?),
            None => None,
        };
        if let Err(err) = self.queue(tx, outcome, ctx) {
            if check_hash.is_some() {
                self.withdraw_check(tx);
            }
            return Err(err);
        }
        debug!(
            storage_id = %tx.storage_id,
            tx_hash = %tx.tx_hash,
            op = tx.operation.label(),
            ledger_seq = ctx.ledger_seq,
            "table tx queued"
        );
        Ok(ApplyReceipt {
            rows: Vec::new(),
            dry_run,
            check_hash,
            queued: true,
        })
    }

    /// Applies a transaction and flattens the result into `(success, message)`.
    pub fn apply_outcome(
        &self,
        tx: &TableTx,
        rules: Option<&TableRules>,
        ctx: &ApplyContext,
    ) -> TxOutcome {
        match self.apply(tx, rules, ctx) {
            Ok(receipt) if tx.operation.is_read_only() => TxOutcome::ok(format!(
                "{} ok: {} row(s)",
                tx.operation.label(),
                receipt.rows.len()
            )),
            Ok(_) => TxOutcome::ok(format!("{} queued", tx.operation.label())),
            Err(err) => {
                warn!(
                    storage_id = %tx.storage_id,
                    tx_hash = %tx.tx_hash,
                    error = %err,
                    "table tx rejected"
                );
                TxOutcome::failed(err.to_string(), err.class())
            }
        }
    }

    /// Confirms the check hash of a validated transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::CheckHash`] when the entry is unknown or expired.
    pub fn confirm(&self, tx: &TableTx, current_seq: u64) -> Result<Option<CheckHash>, ApplyError> {
        if tx.check.is_none() {
            return Ok(None);
        }
        Ok(Some(self.tracker.confirm(&tx.storage_id, &tx.tx_hash, current_seq)?))
    }

    /// Registers the table and queues the item for the sync worker.
    fn queue(&self, tx: &TableTx, rule: RuleOutcome, ctx: &ApplyContext) -> Result<(), ApplyError> {
        self.storage.init_item(tx, ctx.ledger_seq)?;
        self.storage.enqueue(SyncItem {
            position: ctx.position(),
            ledger_hash: ctx.ledger_hash,
            tx: tx.clone(),
            rule,
            verify_affected_rows: self.config.verify_affected_rows,
        })?;
        Ok(())
    }

    /// Withdraws the chain entry of a transaction that was not queued.
    fn withdraw_check(&self, tx: &TableTx) {
        if let Err(err) = self.tracker.withdraw(&tx.storage_id, &tx.tx_hash) {
            warn!(
                storage_id = %tx.storage_id,
                tx_hash = %tx.tx_hash,
                error = %err,
                "check hash withdraw failed"
            );
        }
    }

    /// Runs a read operation on the read path.
    fn read(&self, tx: &TableTx, outcome: &RuleOutcome) -> Result<ApplyReceipt, ApplyError> {
        let rows = self.backend.tx_history(tx, outcome)?;
        Ok(ApplyReceipt {
            rows,
            ..ApplyReceipt::default()
        })
    }

    /// Dry-runs a write when the table is registered and caught up.
    fn dry_run(
        &self,
        tx: &TableTx,
        outcome: &RuleOutcome,
    ) -> Result<Option<DisposeReport>, ApplyError> {
        if !self.config.dry_run_on_apply
            || self.storage.status(&tx.storage_id)? != Some(SyncStatus::Synced)
        {
            return Ok(None);
        }
        let report = self.backend.dispose(&DisposeRequest {
            tx,
            rule: outcome,
            verify_affected_rows: self.config.verify_affected_rows,
            mode: DisposeMode::DryRun,
        })?;
        Ok(Some(report))
    }
}
