// crates/ledgersql-core/src/runtime/check_hash.rs
// ============================================================================
// Module: LedgerSQL Check-Hash Tracker
// Description: Per-table rolling digest chain with pending-entry expiry.
// Purpose: Detect stale or reordered submissions against a table.
// Dependencies: crate::{core, interfaces}, thiserror, tracing
// ============================================================================

//! ## Overview
//! Each table carries a chain `check[n] = H(check[n-1], payload(tx[n]))`
//! rooted at the all-zero hash. [`CheckHashTracker::put`] extends the chain
//! from its head and records the submission as pending until it is confirmed
//! or its ledger deadline passes. Expiring an entry also drops every later
//! pending entry, since those were chained on it, and rolls the head back.
//!
//! The tracker holds one mutex over the whole chain map and never calls out
//! while holding it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::hashing::chain_hash;
use crate::core::identifiers::AccountId;
use crate::core::identifiers::CheckHash;
use crate::core::identifiers::Hash256;
use crate::core::identifiers::StorageId;
use crate::core::identifiers::TxHash;
use crate::core::table::CheckDeclaration;
use crate::core::table::TableTx;
use crate::interfaces::LedgerClock;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum pending entries per table.
pub const DEFAULT_MAX_PENDING_PER_TABLE: usize = 1_024;
/// Default expiry worker interval in milliseconds.
pub const DEFAULT_EXPIRY_INTERVAL_MS: u64 = 1_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Check-hash tracker errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckHashError {
    /// Declared predecessor does not match the tracked head.
    #[error("check hash mismatch: {0}")]
    HashMismatch(String),
    /// Submission deadline already passed.
    #[error("expired submission: {0}")]
    ExpiredSubmission(String),
    /// No chain or pending entry matches.
    #[error("check hash not found: {0}")]
    NotFound(String),
    /// Too many unconfirmed submissions for one table.
    #[error("check hash pending limit: {0}")]
    PendingLimit(String),
    /// Payload could not be hashed.
    #[error("check hash payload error: {0}")]
    Hash(String),
    /// Tracker state is unusable.
    #[error("check hash tracker error: {0}")]
    Tracker(String),
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Check-hash tracker limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckHashConfig {
    /// Maximum pending entries per table.
    pub max_pending_per_table: usize,
    /// Interval between expiry sweeps.
    pub expiry_interval: Duration,
}

impl Default for CheckHashConfig {
    fn default() -> Self {
        Self {
            max_pending_per_table: DEFAULT_MAX_PENDING_PER_TABLE,
            expiry_interval: Duration::from_millis(DEFAULT_EXPIRY_INTERVAL_MS),
        }
    }
}

// ============================================================================
// SECTION: Chain State
// ============================================================================

/// Unconfirmed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingCheck {
    /// Last ledger sequence at which the submission may still confirm.
    deadline: u64,
    /// Submitting transaction.
    tx_hash: TxHash,
    /// Chain value after this submission.
    check_hash: CheckHash,
    /// Submission required an explicit predecessor.
    strict: bool,
}

/// Per-table chain state.
#[derive(Debug, Clone)]
struct CheckChainState {
    /// Head of the chain, including pending entries.
    current: CheckHash,
    /// Last confirmed chain value.
    backup: CheckHash,
    /// Table owner.
    owner: AccountId,
    /// Pending entries in chain order.
    pending: Vec<PendingCheck>,
}

impl CheckChainState {
    /// Creates a genesis chain for a table.
    const fn genesis(owner: AccountId) -> Self {
        Self {
            current: Hash256::ZERO,
            backup: Hash256::ZERO,
            owner,
            pending: Vec::new(),
        }
    }
}

/// Result of [`CheckHashTracker::prepare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedCheck {
    /// Predecessor to declare on the transaction.
    pub predecessor: CheckHash,
    /// Chain value the transaction will produce.
    pub check_hash: CheckHash,
}

/// Read-only view of a table chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckChainSnapshot {
    /// Head of the chain.
    pub current: CheckHash,
    /// Last confirmed chain value.
    pub backup: CheckHash,
    /// Table owner.
    pub owner: AccountId,
    /// Pending entry count.
    pub pending: usize,
    /// Pending entries submitted in strict mode.
    pub strict_pending: usize,
}

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// Per-table check-hash chains.
#[derive(Debug)]
pub struct CheckHashTracker {
    /// Chain map keyed by storage id.
    chains: Mutex<BTreeMap<StorageId, CheckChainState>>,
    /// Tracker limits.
    config: CheckHashConfig,
}

impl Default for CheckHashTracker {
    fn default() -> Self {
        Self::new(CheckHashConfig::default())
    }
}

impl CheckHashTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub const fn new(config: CheckHashConfig) -> Self {
        Self {
            chains: Mutex::new(BTreeMap::new()),
            config,
        }
    }

    /// Returns the tracker configuration.
    #[must_use]
    pub const fn config(&self) -> &CheckHashConfig {
        &self.config
    }

    /// Extends the table chain with a submission.
    ///
    /// # Errors
    ///
    /// Returns [`CheckHashError::HashMismatch`] when the declared predecessor
    /// differs from the head or a strict submission omits it,
    /// [`CheckHashError::ExpiredSubmission`] when the deadline is before
    /// `current_seq`, and [`CheckHashError::PendingLimit`] when the table has
    /// too many unconfirmed submissions.
    pub fn put(
        &self,
        tx: &TableTx,
        declaration: &CheckDeclaration,
        current_seq: u64,
    ) -> Result<CheckHash, CheckHashError> {
        if declaration.last_ledger_seq < current_seq {
            return Err(CheckHashError::ExpiredSubmission(format!(
                "tx {} deadline {} is before ledger {current_seq}",
                tx.tx_hash, declaration.last_ledger_seq
            )));
        }
        let mut chains = self.lock()?;
        let head = chains.get(&tx.storage_id).map_or(Hash256::ZERO, |state| state.current);
        match declaration.predecessor {
            Some(predecessor) if predecessor != head => {
                warn!(
                    storage_id = %tx.storage_id,
                    tx_hash = %tx.tx_hash,
                    declared = %predecessor,
                    head = %head,
                    "check hash predecessor rejected"
                );
                return Err(CheckHashError::HashMismatch(format!(
                    "table {} head is {head}, tx {} declared {predecessor}",
                    tx.storage_id, tx.tx_hash
                )));
            }
            None if declaration.strict => {
                return Err(CheckHashError::HashMismatch(format!(
                    "strict tx {} must declare its predecessor",
                    tx.tx_hash
                )));
            }
            _ => {}
        }
        let next = chain_hash(&head, &tx.check_payload())
            .map_err(|err| CheckHashError::Hash(err.to_string()))?;
        let state = chains
            .entry(tx.storage_id.clone())
            .or_insert_with(|| CheckChainState::genesis(tx.owner.clone()));
        if state.pending.len() >= self.config.max_pending_per_table {
            return Err(CheckHashError::PendingLimit(format!(
                "table {} has {} pending submissions (max {})",
                tx.storage_id,
                state.pending.len(),
                self.config.max_pending_per_table
            )));
        }
        state.pending.push(PendingCheck {
            deadline: declaration.last_ledger_seq,
            tx_hash: tx.tx_hash,
            check_hash: next,
            strict: declaration.strict,
        });
        state.current = next;
        debug!(storage_id = %tx.storage_id, check_hash = %next, "check hash extended");
        Ok(next)
    }

    /// Computes the predecessor and resulting hash for a transaction without
    /// changing state.
    ///
    /// # Errors
    ///
    /// Returns [`CheckHashError::Hash`] when the payload cannot be hashed.
    pub fn prepare(&self, tx: &TableTx) -> Result<PreparedCheck, CheckHashError> {
        let predecessor = self.get_check_hash(&tx.storage_id)?;
        let check_hash = chain_hash(&predecessor, &tx.check_payload())
            .map_err(|err| CheckHashError::Hash(err.to_string()))?;
        Ok(PreparedCheck {
            predecessor,
            check_hash,
        })
    }

    /// Confirms a pending submission and every earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`CheckHashError::NotFound`] when no pending entry matches and
    /// [`CheckHashError::ExpiredSubmission`] when its deadline passed.
    pub fn confirm(
        &self,
        storage_id: &StorageId,
        tx_hash: &TxHash,
        current_seq: u64,
    ) -> Result<CheckHash, CheckHashError> {
        let mut chains = self.lock()?;
        let state = chains
            .get_mut(storage_id)
            .ok_or_else(|| CheckHashError::NotFound(format!("no chain for table {storage_id}")))?;
        let index = state
            .pending
            .iter()
            .position(|entry| entry.tx_hash == *tx_hash)
            .ok_or_else(|| CheckHashError::NotFound(format!("tx {tx_hash} is not pending")))?;
        let entry = &state.pending[index];
        if entry.deadline < current_seq {
            return Err(CheckHashError::ExpiredSubmission(format!(
                "tx {tx_hash} deadline {} is before ledger {current_seq}",
                entry.deadline
            )));
        }
        state.backup = entry.check_hash;
        state.pending.drain(..=index);
        Ok(state.backup)
    }

    /// Drops pending entries whose deadline is before `current_seq`, along
    /// with every later entry of the same table. Returns the dropped count.
    ///
    /// # Errors
    ///
    /// Returns [`CheckHashError::Tracker`] when the chain map is poisoned.
    pub fn expire(&self, current_seq: u64) -> Result<usize, CheckHashError> {
        let mut chains = self.lock()?;
        let mut dropped = 0_usize;
        for (storage_id, state) in chains.iter_mut() {
            let Some(first) = state.pending.iter().position(|entry| entry.deadline < current_seq)
            else {
                continue;
            };
            let removed = state.pending.len() - first;
            state.pending.truncate(first);
            state.current = state.pending.last().map_or(state.backup, |entry| entry.check_hash);
            dropped = dropped.saturating_add(removed);
            warn!(
                storage_id = %storage_id,
                removed,
                head = %state.current,
                ledger_seq = current_seq,
                "expired pending check hashes"
            );
        }
        Ok(dropped)
    }

    /// Withdraws a pending submission that never reached the sync queue,
    /// together with every later entry of the same table. The head falls back
    /// to the last remaining entry or the confirmed value. Returns the number
    /// of entries removed.
    ///
    /// # Errors
    ///
    /// Returns [`CheckHashError::NotFound`] when the submission is not
    /// pending.
    pub fn withdraw(
        &self,
        storage_id: &StorageId,
        tx_hash: &TxHash,
    ) -> Result<usize, CheckHashError> {
        let mut chains = self.lock()?;
        let state = chains
            .get_mut(storage_id)
            .ok_or_else(|| CheckHashError::NotFound(format!("no chain for table {storage_id}")))?;
        let index = state
            .pending
            .iter()
            .position(|entry| entry.tx_hash == *tx_hash)
            .ok_or_else(|| CheckHashError::NotFound(format!("tx {tx_hash} is not pending")))?;
        let removed = state.pending.len() - index;
        state.pending.truncate(index);
        state.current = state.pending.last().map_or(state.backup, |entry| entry.check_hash);
        if state.pending.is_empty() && state.backup == Hash256::ZERO {
            chains.remove(storage_id);
        }
        debug!(storage_id = %storage_id, tx_hash = %tx_hash, removed, "check hash withdrawn");
        Ok(removed)
    }

    /// Returns the chain head for a table, or the zero hash if untracked.
    ///
    /// # Errors
    ///
    /// Returns [`CheckHashError::Tracker`] when the chain map is poisoned.
    pub fn get_check_hash(&self, storage_id: &StorageId) -> Result<CheckHash, CheckHashError> {
        Ok(self.lock()?.get(storage_id).map_or(Hash256::ZERO, |state| state.current))
    }

    /// Returns a snapshot of a table chain.
    ///
    /// # Errors
    ///
    /// Returns [`CheckHashError::Tracker`] when the chain map is poisoned.
    pub fn snapshot(
        &self,
        storage_id: &StorageId,
    ) -> Result<Option<CheckChainSnapshot>, CheckHashError> {
        Ok(self.lock()?.get(storage_id).map(|state| CheckChainSnapshot {
            current: state.current,
            backup: state.backup,
            owner: state.owner.clone(),
            pending: state.pending.len(),
            strict_pending: state.pending.iter().filter(|entry| entry.strict).count(),
        }))
    }

    /// Forgets a dropped table.
    ///
    /// # Errors
    ///
    /// Returns [`CheckHashError::Tracker`] when the chain map is poisoned.
    pub fn remove(&self, storage_id: &StorageId) -> Result<(), CheckHashError> {
        self.lock()?.remove(storage_id);
        Ok(())
    }

    /// Locks the chain map.
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<StorageId, CheckChainState>>, CheckHashError> {
        self.chains
            .lock()
            .map_err(|_| CheckHashError::Tracker("check hash mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Expiry Worker
// ============================================================================

/// Background thread that periodically expires pending entries.
///
/// Dropping the worker stops and joins the thread.
#[derive(Debug)]
pub struct ExpiryWorker {
    /// Stop flag checked between sweeps.
    stop: Arc<AtomicBool>,
    /// Worker thread handle.
    handle: Option<JoinHandle<()>>,
}

impl ExpiryWorker {
    /// Spawns the expiry worker.
    ///
    /// # Errors
    ///
    /// Returns [`CheckHashError::Tracker`] when the thread cannot be spawned.
    pub fn spawn(
        tracker: Arc<CheckHashTracker>,
        clock: Arc<dyn LedgerClock>,
    ) -> Result<Self, CheckHashError> {
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let interval = tracker.config().expiry_interval;
        let handle = thread::Builder::new()
            .name("ledgersql-check-expiry".to_string())
            .spawn(move || {
                info!("check hash expiry worker started");
                while !worker_stop.load(Ordering::Acquire) {
                    if let Err(err) = tracker.expire(clock.current_ledger_seq()) {
                        warn!(error = %err, "check hash expiry sweep failed");
                        break;
                    }
                    thread::park_timeout(interval);
                }
                info!("check hash expiry worker stopped");
            })
            .map_err(|err| {
                CheckHashError::Tracker(format!("failed to spawn expiry worker: {err}"))
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stops the worker and waits for it to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    /// Signals the worker and joins it once.
    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("check hash expiry worker panicked");
            }
        }
    }
}

impl Drop for ExpiryWorker {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
