// crates/ledgersql-core/src/runtime/sync.rs
// ============================================================================
// Module: LedgerSQL Table Storage Sync Engine
// Description: Per-table sync state, global work queue, and drain worker.
// Purpose: Apply committed table operations to the backend in ledger order.
// Dependencies: crate::{core, interfaces}, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`TableStorage`] keeps one [`TableSyncState`] per managed table behind a
//! single mutex together with the global FIFO of committed [`SyncItem`]s. A
//! worker thread (or [`TableStorage::run_once`] in tests) drains the queue and
//! calls [`TableApplier::apply_and_record`], which executes the item and
//! records progress in one database transaction.
//!
//! Per table the state machine is `Syncing -> Synced`, with `Error` entered on
//! a database failure. An `Error` table parks its failed item and everything
//! queued after it until [`TableStorage::resync`]; other tables keep draining.
//! An item the backend rejects (affected-row or assert mismatch, invalid
//! operation) is recorded as consumed and the table moves on.
//! The process-wide gate reports every table as `Off` while disabled; work
//! still queues and drains in arrival order once re-enabled.
//!
//! Items at or below a table's last applied position are duplicates and are
//! skipped without touching the backend.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::OnceLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::identifiers::AccountId;
use crate::core::identifiers::Hash256;
use crate::core::identifiers::LedgerHash;
use crate::core::identifiers::StorageId;
use crate::core::identifiers::TableName;
use crate::core::identifiers::TxHash;
use crate::core::table::TableOperation;
use crate::core::table::TableTx;
use crate::interfaces::DisposeError;
use crate::interfaces::DisposeReport;
use crate::interfaces::ErrorClass;
use crate::interfaces::SyncItem;
use crate::interfaces::SyncPosition;
use crate::interfaces::SyncRecord;
use crate::interfaces::SyncStatusError;
use crate::interfaces::SyncStatusStore;
use crate::interfaces::TableApplier;
use crate::runtime::check_hash::CheckHashTracker;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default chain identifier for sync records.
pub const DEFAULT_CHAIN_ID: &str = "main";
/// Default worker wake-up interval when idle, in milliseconds.
pub const DEFAULT_IDLE_WAIT_MS: u64 = 500;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Sync engine errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The table was never registered with the engine.
    #[error("table not registered: {0}")]
    Unregistered(String),
    /// The table was dropped.
    #[error("table deleted: {0}")]
    Deleted(String),
    /// No table matches the lookup.
    #[error("table not found: {0}")]
    NotFound(String),
    /// The requested transition is not valid for the table state.
    #[error("invalid sync state: {0}")]
    InvalidState(String),
    /// Sync status persistence failed.
    #[error("sync status error: {0}")]
    Status(String),
    /// Worker or lock failure.
    #[error("sync worker error: {0}")]
    Worker(String),
}

impl From<SyncStatusError> for SyncError {
    fn from(error: SyncStatusError) -> Self {
        Self::Status(error.to_string())
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Sync engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStorageConfig {
    /// Chain identifier written to new sync records.
    pub chain_id: String,
    /// Initial state of the process-wide sync gate.
    pub enabled: bool,
    /// Worker wake-up interval while idle.
    pub idle_wait: Duration,
}

impl Default for TableStorageConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            enabled: true,
            idle_wait: Duration::from_millis(DEFAULT_IDLE_WAIT_MS),
        }
    }
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Externally visible table sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// The process-wide gate is disabled.
    Off,
    /// Work is queued or the table has not caught up.
    Syncing,
    /// Every queued item was applied.
    Synced,
    /// An apply failed; automatic retry is stopped.
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Off => "off",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Per-table sync state.
#[derive(Debug)]
struct TableSyncState {
    /// Logical table name.
    table_name: TableName,
    /// Table owner.
    owner: AccountId,
    /// Ledger sequence at which the engine first saw the table.
    registered_seq: u64,
    /// Last applied position.
    last_applied: Option<SyncPosition>,
    /// Last applied ledger hash.
    ledger_hash: LedgerHash,
    /// Last applied transaction hash.
    tx_hash: TxHash,
    /// Table status, ignoring the process-wide gate.
    status: SyncStatus,
    /// Items held while the table is in `Error`, in arrival order.
    parked: VecDeque<SyncItem>,
    /// Items of this table in the global queue.
    queued: usize,
    /// Last apply failure.
    last_error: Option<String>,
}

impl TableSyncState {
    /// Creates state for a table with no applied items.
    const fn fresh(table_name: TableName, owner: AccountId, registered_seq: u64) -> Self {
        Self {
            table_name,
            owner,
            registered_seq,
            last_applied: None,
            ledger_hash: Hash256::ZERO,
            tx_hash: Hash256::ZERO,
            status: SyncStatus::Syncing,
            parked: VecDeque::new(),
            queued: 0,
            last_error: None,
        }
    }

    /// Seeds state from a persisted record.
    fn from_record(record: &SyncRecord, registered_seq: u64) -> Self {
        let last_applied = record.position();
        Self {
            table_name: record.table_name.clone(),
            owner: record.owner.clone(),
            registered_seq,
            last_applied,
            ledger_hash: record.ledger_hash,
            tx_hash: record.tx_hash,
            status: if last_applied.is_some() { SyncStatus::Synced } else { SyncStatus::Syncing },
            parked: VecDeque::new(),
            queued: 0,
            last_error: None,
        }
    }

    /// Records `item` as the last consumed position.
    const fn advance(&mut self, item: &SyncItem) {
        self.last_applied = Some(item.position);
        self.ledger_hash = item.ledger_hash;
        self.tx_hash = item.tx.tx_hash;
        if self.queued == 0 {
            self.status = SyncStatus::Synced;
        }
    }

    /// Returns true when the item was already applied.
    fn is_duplicate(&self, item: &SyncItem) -> bool {
        self.last_applied.is_some_and(|last| item.position <= last)
    }
}

/// Read-only view of a table's sync state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSyncSnapshot {
    /// Backend table name.
    pub storage_id: StorageId,
    /// Logical table name.
    pub table_name: TableName,
    /// Table owner.
    pub owner: AccountId,
    /// Ledger sequence at which the engine first saw the table.
    pub registered_seq: u64,
    /// Last applied position.
    pub last_applied: Option<SyncPosition>,
    /// Last applied ledger hash.
    pub ledger_hash: LedgerHash,
    /// Last applied transaction hash.
    pub tx_hash: TxHash,
    /// Effective status, `Off` while the gate is disabled.
    pub status: SyncStatus,
    /// Items waiting in the global queue.
    pub queued: usize,
    /// Items parked by an apply failure.
    pub parked: usize,
    /// Last apply failure.
    pub last_error: Option<String>,
}

/// Result of draining one item.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStep {
    /// The item was applied and its progress recorded.
    Applied {
        /// Table the item belongs to.
        storage_id: StorageId,
        /// Applied position.
        position: SyncPosition,
        /// Backend report.
        report: DisposeReport,
    },
    /// The backend rejected the item; its position was consumed.
    Rejected {
        /// Table the item belongs to.
        storage_id: StorageId,
        /// Rejected position.
        position: SyncPosition,
        /// Rejection reason.
        error: DisposeError,
    },
    /// The apply failed and the table entered `Error`.
    Failed {
        /// Table the item belongs to.
        storage_id: StorageId,
        /// Position that failed.
        position: SyncPosition,
        /// Apply failure.
        error: DisposeError,
    },
}

/// Mutex-guarded engine state.
#[derive(Debug, Default)]
struct SyncInner {
    /// Table states keyed by storage id.
    tables: BTreeMap<StorageId, TableSyncState>,
    /// Global queue in arrival order.
    queue: VecDeque<SyncItem>,
    /// An item is being applied outside the lock.
    in_flight: bool,
    /// Worker stop flag.
    stop: bool,
}

// ============================================================================
// SECTION: Table Storage
// ============================================================================

/// Table storage sync engine.
///
/// # Invariants
/// - Per table, applied positions are strictly increasing.
/// - At most one item is applied at a time.
pub struct TableStorage<B> {
    /// Applier and sync-status backend.
    backend: Arc<B>,
    /// Engine configuration.
    config: TableStorageConfig,
    /// Table map and queue.
    inner: Mutex<SyncInner>,
    /// Signaled when work arrives, the gate opens, or stop is requested.
    work: Condvar,
    /// Signaled when the worker runs out of drainable work.
    idle: Condvar,
    /// Process-wide sync gate.
    enabled: AtomicBool,
    /// Worker thread handle.
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Chains released once a drop is applied.
    check_hash: OnceLock<Arc<CheckHashTracker>>,
}

impl<B> fmt::Debug for TableStorage<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableStorage")
            .field("config", &self.config)
            .field("enabled", &self.enabled.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl<B> TableStorage<B>
where
    B: TableApplier + SyncStatusStore + 'static,
{
    /// Creates an engine over a backend.
    #[must_use]
    pub fn new(backend: Arc<B>, config: TableStorageConfig) -> Self {
        let enabled = AtomicBool::new(config.enabled);
        Self {
            backend,
            config,
            inner: Mutex::new(SyncInner::default()),
            work: Condvar::new(),
            idle: Condvar::new(),
            enabled,
            worker: Mutex::new(None),
            check_hash: OnceLock::new(),
        }
    }

    /// Attaches the check-hash tracker whose chains are removed when a drop
    /// is applied. Only the first tracker attached is kept.
    pub fn attach_check_hash(&self, tracker: Arc<CheckHashTracker>) {
        if self.check_hash.set(tracker).is_err() {
            debug!("check hash tracker already attached");
        }
    }

    /// Returns the backend.
    #[must_use]
    pub const fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &TableStorageConfig {
        &self.config
    }

    /// Rebuilds table states from persisted auto-sync records of the
    /// configured chain. Returns the number of tables loaded.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Status`] when records cannot be read.
    pub fn load_from_store(&self) -> Result<usize, SyncError> {
        let records = self.backend.load_auto_sync(&self.config.chain_id)?;
        let mut inner = self.lock()?;
        let mut loaded = 0_usize;
        for record in &records {
            if inner.tables.contains_key(&record.storage_id) {
                continue;
            }
            let state = TableSyncState::from_record(record, record.ledger_seq);
            inner.tables.insert(record.storage_id.clone(), state);
            loaded += 1;
        }
        info!(chain_id = %self.config.chain_id, loaded, "sync tables loaded");
        Ok(loaded)
    }

    /// Returns the table state, inserting a fresh entry if absent.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Worker`] when the state lock is poisoned.
    pub fn get_or_create_item(
        &self,
        storage_id: &StorageId,
        table_name: &TableName,
        owner: &AccountId,
    ) -> Result<TableSyncSnapshot, SyncError> {
        let mut inner = self.lock()?;
        let state = inner
            .tables
            .entry(storage_id.clone())
            .or_insert_with(|| TableSyncState::fresh(table_name.clone(), owner.clone(), 0));
        Ok(self.snapshot_of(storage_id, state))
    }

    /// Registers the table touched by `tx` the first time the ledger-close
    /// path sees it, seeding from the persisted record or creating one.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Deleted`] when the persisted record is deleted and
    /// [`SyncError::Status`] when persistence fails.
    pub fn init_item(&self, tx: &TableTx, ledger_seq: u64) -> Result<SyncStatus, SyncError> {
        let mut inner = self.lock()?;
        if let Some(state) = inner.tables.get(&tx.storage_id) {
            return Ok(self.effective(state.status));
        }
        let state = match self.backend.read_record(&tx.storage_id)? {
            Some(record) if record.deleted => {
                return Err(SyncError::Deleted(tx.storage_id.to_string()));
            }
            Some(record) => TableSyncState::from_record(&record, ledger_seq),
            None => {
                self.backend.insert_record(&SyncRecord {
                    table_name: tx.table_name.clone(),
                    storage_id: tx.storage_id.clone(),
                    owner: tx.owner.clone(),
                    ledger_seq: 0,
                    ledger_hash: Hash256::ZERO,
                    tx_seq: 0,
                    tx_hash: Hash256::ZERO,
                    auto_sync: true,
                    chain_id: self.config.chain_id.clone(),
                    deleted: false,
                })?;
                TableSyncState::fresh(tx.table_name.clone(), tx.owner.clone(), ledger_seq)
            }
        };
        let status = state.status;
        inner.tables.insert(tx.storage_id.clone(), state);
        info!(
            storage_id = %tx.storage_id,
            table = %tx.table_name,
            ledger_seq,
            "sync table registered"
        );
        Ok(self.effective(status))
    }

    /// Queues a committed item for the worker.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Unregistered`] when the table was never
    /// registered.
    pub fn enqueue(&self, item: SyncItem) -> Result<(), SyncError> {
        let mut inner = self.lock()?;
        let storage_id = item.tx.storage_id.clone();
        let state = inner
            .tables
            .get_mut(&storage_id)
            .ok_or_else(|| SyncError::Unregistered(storage_id.to_string()))?;
        if state.status == SyncStatus::Error {
            debug!(storage_id = %storage_id, "item parked behind failed table");
            state.parked.push_back(item);
            return Ok(());
        }
        state.queued += 1;
        state.status = SyncStatus::Syncing;
        inner.queue.push_back(item);
        drop(inner);
        self.work.notify_one();
        Ok(())
    }

    /// Opens or closes the process-wide sync gate.
    pub fn set_sync_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            info!(enabled, "sync gate changed");
        }
        self.work.notify_all();
        self.idle.notify_all();
    }

    /// Returns the gate state.
    #[must_use]
    pub fn is_sync_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Returns the effective status of a table.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Worker`] when the state lock is poisoned.
    pub fn status(&self, storage_id: &StorageId) -> Result<Option<SyncStatus>, SyncError> {
        Ok(self.lock()?.tables.get(storage_id).map(|state| self.effective(state.status)))
    }

    /// Returns a snapshot of one table.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Worker`] when the state lock is poisoned.
    pub fn snapshot(&self, storage_id: &StorageId) -> Result<Option<TableSyncSnapshot>, SyncError> {
        Ok(self
            .lock()?
            .tables
            .get(storage_id)
            .map(|state| self.snapshot_of(storage_id, state)))
    }

    /// Returns snapshots of every registered table.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Worker`] when the state lock is poisoned.
    pub fn snapshots(&self) -> Result<Vec<TableSyncSnapshot>, SyncError> {
        let inner = self.lock()?;
        Ok(inner
            .tables
            .iter()
            .map(|(storage_id, state)| self.snapshot_of(storage_id, state))
            .collect())
    }

    /// Moves an `Error` table back to `Syncing` and requeues its parked items
    /// in their original order. Returns the number requeued.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidState`] when the table is not in `Error`.
    pub fn resync(&self, storage_id: &StorageId) -> Result<usize, SyncError> {
        let mut inner = self.lock()?;
        let SyncInner {
            tables,
            queue,
            ..
        } = &mut *inner;
        let state = tables
            .get_mut(storage_id)
            .ok_or_else(|| SyncError::Unregistered(storage_id.to_string()))?;
        if state.status != SyncStatus::Error {
            return Err(SyncError::InvalidState(format!(
                "table {storage_id} is {}, not error",
                state.status
            )));
        }
        let requeued = state.parked.len();
        state.queued += requeued;
        state.status = SyncStatus::Syncing;
        state.last_error = None;
        queue.extend(state.parked.drain(..));
        drop(inner);
        info!(storage_id = %storage_id, requeued, "table resync requested");
        self.work.notify_all();
        Ok(requeued)
    }

    /// Sets the persisted auto-sync flag of a table by owner and name.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] when no live table matches.
    pub fn set_auto_sync(
        &self,
        owner: &AccountId,
        table_name: &TableName,
        auto_sync: bool,
    ) -> Result<StorageId, SyncError> {
        let storage_id = self
            .backend
            .find_storage_id(owner, table_name)?
            .ok_or_else(|| SyncError::NotFound(format!("{owner}/{table_name}")))?;
        self.backend.set_auto_sync(&storage_id, auto_sync)?;
        info!(storage_id = %storage_id, auto_sync, "auto sync updated");
        Ok(storage_id)
    }

    /// Drains one item on the calling thread, if the gate is open and no other
    /// item is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Worker`] when the state lock is poisoned.
    pub fn run_once(&self) -> Result<Option<SyncStep>, SyncError> {
        let item = {
            let mut inner = self.lock()?;
            if !self.is_sync_enabled() || inner.in_flight {
                return Ok(None);
            }
            let Some(item) = Self::take_next(&mut inner) else {
                drop(inner);
                self.idle.notify_all();
                return Ok(None);
            };
            inner.in_flight = true;
            item
        };
        self.apply(item).map(Some)
    }

    /// Drains items until none are ready. Returns the steps taken.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Worker`] when the state lock is poisoned.
    pub fn drain(&self) -> Result<Vec<SyncStep>, SyncError> {
        let mut steps = Vec::new();
        while let Some(step) = self.run_once()? {
            steps.push(step);
        }
        Ok(steps)
    }

    /// Spawns the drain worker; a second call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Worker`] when the thread cannot be spawned.
    pub fn start(self: &Arc<Self>) -> Result<(), SyncError> {
        let mut slot = self
            .worker
            .lock()
            .map_err(|_| SyncError::Worker("sync worker slot poisoned".to_string()))?;
        if slot.is_some() {
            return Ok(());
        }
        self.lock()?.stop = false;
        let engine = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("ledgersql-sync".to_string())
            .spawn(move || engine.worker_loop())
            .map_err(|err| SyncError::Worker(format!("failed to spawn sync worker: {err}")))?;
        *slot = Some(handle);
        Ok(())
    }

    /// Blocks until no drainable work remains or `timeout` elapses. Returns
    /// true when idle.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Worker`] when the state lock is poisoned.
    pub fn wait_idle(&self, timeout: Duration) -> Result<bool, SyncError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock()?;
        loop {
            if !inner.in_flight && (inner.queue.is_empty() || !self.is_sync_enabled()) {
                return Ok(true);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            let (guard, _) = self
                .idle
                .wait_timeout(inner, remaining)
                .map_err(|_| SyncError::Worker("sync state mutex poisoned".to_string()))?;
            inner = guard;
        }
    }

    /// Stops the worker after its in-flight item and joins it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Worker`] when a lock is poisoned or the worker
    /// panicked.
    pub fn shutdown(&self) -> Result<(), SyncError> {
        self.lock()?.stop = true;
        self.work.notify_all();
        let handle = self
            .worker
            .lock()
            .map_err(|_| SyncError::Worker("sync worker slot poisoned".to_string()))?
            .take();
        if let Some(handle) = handle {
            handle.join().map_err(|_| SyncError::Worker("sync worker panicked".to_string()))?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Worker body: waits for drainable work, applies it, repeats until stop.
    fn worker_loop(&self) {
        info!(chain_id = %self.config.chain_id, "sync worker started");
        loop {
            let item = {
                let Ok(mut inner) = self.inner.lock() else {
                    warn!("sync state mutex poisoned; worker exiting");
                    return;
                };
                loop {
                    if inner.stop {
                        info!("sync worker stopped");
                        return;
                    }
                    if self.is_sync_enabled()
                        && !inner.in_flight
                        && let Some(item) = Self::take_next(&mut inner)
                    {
                        inner.in_flight = true;
                        break item;
                    }
                    self.idle.notify_all();
                    match self.work.wait_timeout(inner, self.config.idle_wait) {
                        Ok((guard, _)) => inner = guard,
                        Err(_) => {
                            warn!("sync state mutex poisoned; worker exiting");
                            return;
                        }
                    }
                }
            };
            if let Err(err) = self.apply(item) {
                warn!(error = %err, "sync worker exiting");
                return;
            }
        }
    }

    /// Pops the next item that should be applied, skipping duplicates and
    /// parking items of failed tables.
    fn take_next(inner: &mut SyncInner) -> Option<SyncItem> {
        while let Some(item) = inner.queue.pop_front() {
            let Some(state) = inner.tables.get_mut(&item.tx.storage_id) else {
                warn!(storage_id = %item.tx.storage_id, "dropping item for unknown table");
                continue;
            };
            state.queued = state.queued.saturating_sub(1);
            if state.status == SyncStatus::Error {
                state.parked.push_back(item);
                continue;
            }
            if state.is_duplicate(&item) {
                debug!(
                    storage_id = %item.tx.storage_id,
                    ledger_seq = item.position.ledger_seq,
                    tx_seq = item.position.tx_seq,
                    "duplicate item skipped"
                );
                if state.queued == 0 {
                    state.status = SyncStatus::Synced;
                }
                continue;
            }
            return Some(item);
        }
        None
    }

    /// Applies an item outside the lock and folds the result into state.
    fn apply(&self, item: SyncItem) -> Result<SyncStep, SyncError> {
        let result = match self.backend.apply_and_record(&item) {
            Err(error) if error.class() == ErrorClass::Reject => self
                .backend
                .update_progress(&item.tx.storage_id, &item.progress())
                .map_err(|err| {
                    DisposeError::DbExecution(format!("recording rejected item: {err}"))
                })
                .and(Err(error)),
            other => other,
        };
        let storage_id = item.tx.storage_id.clone();
        let dropped = matches!(item.tx.operation, TableOperation::DropTable);
        let mut inner = self.lock()?;
        inner.in_flight = false;
        let step = Self::complete(&mut inner, item, result);
        let idle = inner.queue.is_empty();
        drop(inner);
        if idle {
            self.idle.notify_all();
        }
        if dropped && matches!(step, SyncStep::Applied { .. }) {
            self.release_check_hash(&storage_id);
        }
        Ok(step)
    }

    /// Removes the chain of a dropped table.
    fn release_check_hash(&self, storage_id: &StorageId) {
        let Some(tracker) = self.check_hash.get() else {
            return;
        };
        if let Err(err) = tracker.remove(storage_id) {
            warn!(storage_id = %storage_id, error = %err, "check hash release failed");
        }
    }

    /// Records the outcome of one apply.
    fn complete(
        inner: &mut SyncInner,
        item: SyncItem,
        result: Result<DisposeReport, DisposeError>,
    ) -> SyncStep {
        let storage_id = item.tx.storage_id.clone();
        let position = item.position;
        match result {
            Ok(report) => {
                if matches!(item.tx.operation, TableOperation::DropTable) {
                    inner.tables.remove(&storage_id);
                    info!(storage_id = %storage_id, "table dropped from sync");
                } else if let Some(state) = inner.tables.get_mut(&storage_id) {
                    if let TableOperation::RenameTable {
                        new_name,
                    } = &item.tx.operation
                    {
                        state.table_name = new_name.clone();
                    }
                    state.advance(&item);
                }
                debug!(
                    storage_id = %storage_id,
                    ledger_seq = position.ledger_seq,
                    tx_seq = position.tx_seq,
                    affected_rows = report.affected_rows,
                    "sync item applied"
                );
                SyncStep::Applied {
                    storage_id,
                    position,
                    report,
                }
            }
            Err(error) if error.class() == ErrorClass::Reject => {
                if let Some(state) = inner.tables.get_mut(&storage_id) {
                    state.advance(&item);
                }
                warn!(
                    storage_id = %storage_id,
                    ledger_seq = position.ledger_seq,
                    tx_seq = position.tx_seq,
                    error = %error,
                    "sync item rejected"
                );
                SyncStep::Rejected {
                    storage_id,
                    position,
                    error,
                }
            }
            Err(error) => {
                let SyncInner {
                    tables,
                    queue,
                    ..
                } = inner;
                if let Some(state) = tables.get_mut(&storage_id) {
                    state.status = SyncStatus::Error;
                    state.last_error = Some(error.to_string());
                    state.parked.push_back(item);
                    let (later, rest): (VecDeque<SyncItem>, VecDeque<SyncItem>) =
                        queue.drain(..).partition(|queued| queued.tx.storage_id == storage_id);
                    *queue = rest;
                    state.parked.extend(later);
                    state.queued = 0;
                }
                warn!(
                    storage_id = %storage_id,
                    ledger_seq = position.ledger_seq,
                    tx_seq = position.tx_seq,
                    error = %error,
                    "sync apply failed; table parked"
                );
                SyncStep::Failed {
                    storage_id,
                    position,
                    error,
                }
            }
        }
    }

    /// Applies the gate to a table status.
    fn effective(&self, status: SyncStatus) -> SyncStatus {
        if self.is_sync_enabled() { status } else { SyncStatus::Off }
    }

    /// Builds a snapshot for one table.
    fn snapshot_of(&self, storage_id: &StorageId, state: &TableSyncState) -> TableSyncSnapshot {
        TableSyncSnapshot {
            storage_id: storage_id.clone(),
            table_name: state.table_name.clone(),
            owner: state.owner.clone(),
            registered_seq: state.registered_seq,
            last_applied: state.last_applied,
            ledger_hash: state.ledger_hash,
            tx_hash: state.tx_hash,
            status: self.effective(state.status),
            queued: state.queued,
            parked: state.parked.len(),
            last_error: state.last_error.clone(),
        }
    }

    /// Locks the engine state.
    fn lock(&self) -> Result<MutexGuard<'_, SyncInner>, SyncError> {
        self.inner.lock().map_err(|_| SyncError::Worker("sync state mutex poisoned".to_string()))
    }
}
