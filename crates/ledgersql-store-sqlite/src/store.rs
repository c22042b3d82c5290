// crates/ledgersql-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Table Store
// Description: Durable TxExecutor, TableApplier, and SyncStatusStore on SQLite.
// Purpose: Project table operations into SQLite and record sync progress.
// Dependencies: ledgersql-core, rusqlite, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`SqliteTxStore`] executes translated operations on a single writer
//! connection, one database transaction per operation, and serves reads,
//! row counts, and sync-record lookups from a small pool of read-only
//! connections. Applied items update their table's `sync_status` row in the
//! same transaction as the data change, so a crash never leaves progress
//! ahead of data. Database contents are untrusted: stored records are
//! re-validated on load.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use ledgersql_core::AccountId;
use ledgersql_core::ConditionTree;
use ledgersql_core::DisposeError;
use ledgersql_core::DisposeMode;
use ledgersql_core::DisposeReport;
use ledgersql_core::DisposeRequest;
use ledgersql_core::JsonRow;
use ledgersql_core::RowCounter;
use ledgersql_core::RuleError;
use ledgersql_core::RuleOutcome;
use ledgersql_core::StorageId;
use ledgersql_core::SyncItem;
use ledgersql_core::SyncProgress;
use ledgersql_core::SyncRecord;
use ledgersql_core::SyncStatusError;
use ledgersql_core::SyncStatusStore;
use ledgersql_core::TableApplier;
use ledgersql_core::TableName;
use ledgersql_core::TableOperation;
use ledgersql_core::TableTx;
use ledgersql_core::TxExecutor;
use ledgersql_core::runtime::AccessMode;
use ledgersql_core::runtime::SqlStatement;
use ledgersql_core::runtime::Translation;
use ledgersql_core::runtime::count_statement;
use ledgersql_core::runtime::translate;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing::info;

use crate::params::execute_writes;
use crate::params::execution_error;
use crate::params::query_count;
use crate::params::query_rows;
use crate::status;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default number of read-only connections.
const DEFAULT_READ_POOL_SIZE: usize = 4;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode; readers do not block the writer.
    #[default]
    Wal,
    /// Rollback journal.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` synchronous mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Sync on every commit.
    #[default]
    Full,
    /// Sync at WAL checkpoints.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` table store.
///
/// # Invariants
/// - `path` names a file, not a directory.
/// - `read_pool_size` is greater than zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// Synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of read-only connections.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl SqliteStoreConfig {
    /// Returns a configuration with defaults for `path`.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: DEFAULT_READ_POOL_SIZE,
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read connection pool size.
const fn default_read_pool_size() -> usize {
    DEFAULT_READ_POOL_SIZE
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors raised while opening or inspecting the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid configuration or stored data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for DisposeError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Unavailable(message),
            SqliteStoreError::Db(message) | SqliteStoreError::VersionMismatch(message) => {
                Self::DbExecution(message)
            }
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

impl From<SqliteStoreError> for SyncStatusError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            other => Self::Db(other.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed table store.
///
/// # Invariants
/// - All writes go through the single writer connection.
/// - Data changes and their sync progress commit in one transaction.
#[derive(Clone)]
pub struct SqliteTxStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Writer connection.
    write_connection: Arc<Mutex<Connection>>,
    /// Read-only connections used for reads and counts.
    read_connections: Arc<Vec<Mutex<Connection>>>,
    /// Round-robin cursor for read connection selection.
    read_cursor: Arc<AtomicUsize>,
}

impl std::fmt::Debug for SqliteTxStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTxStore").field("config", &self.config).finish_non_exhaustive()
    }
}

impl SqliteTxStore {
    /// Opens the store, creating the database and schema when absent.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is unsafe, the database
    /// cannot be opened, or its schema version is unsupported.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        if config.read_pool_size == 0 {
            return Err(SqliteStoreError::Invalid(
                "read_pool_size must be greater than zero".to_string(),
            ));
        }
        let mut write_connection = open_connection(&config)?;
        initialize_schema(&mut write_connection)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0 .. config.read_pool_size {
            read_connections.push(Mutex::new(open_connection(&config)?));
        }
        info!(
            path = %config.path.display(),
            read_pool = config.read_pool_size,
            "sqlite store opened"
        );
        Ok(Self {
            config,
            write_connection: Arc::new(Mutex::new(write_connection)),
            read_connections: Arc::new(read_connections),
            read_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Verifies both the writer and a reader can execute a statement.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when either connection fails.
    pub fn readiness(&self) -> Result<(), SqliteStoreError> {
        self.read_connection()?
            .execute_batch("SELECT 1")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        self.write_connection()?
            .execute_batch("SELECT 1")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Returns true when the backend table exists.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the catalog query fails.
    pub fn table_exists(&self, storage_id: &StorageId) -> Result<bool, SqliteStoreError> {
        table_exists(&*self.read_connection()?, storage_id)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Locks the writer connection.
    fn write_connection(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.write_connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite write mutex poisoned".to_string()))
    }

    /// Locks the next read connection using round-robin selection.
    fn read_connection(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        let len = self.read_connections.len();
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % len;
        self.read_connections[index]
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite read mutex poisoned".to_string()))
    }

    /// Runs a read translation on the read pool and verifies its result.
    fn run_read(&self, translation: &Translation) -> Result<Vec<JsonRow>, DisposeError> {
        let statement = single_statement(translation)?;
        let rows = query_rows(&*self.read_connection()?, statement)?;
        translation.check.verify(0, &rows, false)?;
        Ok(rows)
    }
}

// ============================================================================
// SECTION: Executor
// ============================================================================

impl TxExecutor for SqliteTxStore {
    fn dispose(&self, request: &DisposeRequest<'_>) -> Result<DisposeReport, DisposeError> {
        let translation = translate(request.tx, request.rule)?;
        if translation.mode == AccessMode::Read {
            let rows = self.run_read(&translation)?;
            return Ok(DisposeReport {
                affected_rows: 0,
                rows,
                committed: false,
            });
        }
        let mut connection = self.write_connection()?;
        let transaction = connection.transaction().map_err(execution_error)?;
        let affected = execute_writes(&transaction, &translation.statements)?;
        translation.check.verify(affected, &[], request.verify_affected_rows)?;
        let committed = match request.mode {
            DisposeMode::Commit => {
                transaction.commit().map_err(execution_error)?;
                true
            }
            DisposeMode::DryRun => {
                transaction.rollback().map_err(execution_error)?;
                false
            }
        };
        debug!(
            storage_id = %request.tx.storage_id,
            op = request.tx.operation.label(),
            affected,
            committed,
            "sqlite dispose"
        );
        Ok(DisposeReport {
            affected_rows: affected,
            rows: Vec::new(),
            committed,
        })
    }

    fn tx_history(&self, tx: &TableTx, rule: &RuleOutcome) -> Result<Vec<JsonRow>, DisposeError> {
        let translation = translate(tx, rule)?;
        if translation.mode != AccessMode::Read {
            return Err(DisposeError::Invalid(format!(
                "{} is not a read operation",
                tx.operation.label()
            )));
        }
        self.run_read(&translation)
    }

    fn drop_table(&self, storage_id: &StorageId) -> Result<(), DisposeError> {
        execute_writes(&*self.write_connection()?, &[SqlStatement::plain(format!(
            "DROP TABLE {storage_id}"
        ))])?;
        info!(storage_id = %storage_id, "backend table dropped");
        Ok(())
    }
}

impl RowCounter for SqliteTxStore {
    fn count_rows(
        &self,
        storage_id: &StorageId,
        condition: &ConditionTree,
    ) -> Result<u64, RuleError> {
        let statement = count_statement(storage_id, condition)
            .map_err(|err| RuleError::Count(err.to_string()))?;
        let connection = self.read_connection().map_err(|err| RuleError::Count(err.to_string()))?;
        let exists =
            table_exists(&connection, storage_id).map_err(|err| RuleError::Count(err.to_string()))?;
        if !exists {
            return Ok(0);
        }
        query_count(&connection, &statement).map_err(|err| RuleError::Count(err.to_string()))
    }
}

// ============================================================================
// SECTION: Applier
// ============================================================================

impl TableApplier for SqliteTxStore {
    fn apply_and_record(&self, item: &SyncItem) -> Result<DisposeReport, DisposeError> {
        let translation = translate(&item.tx, &item.rule)?;
        let storage_id = &item.tx.storage_id;
        let mut connection = self.write_connection()?;
        let transaction = connection.transaction().map_err(execution_error)?;
        let affected = if translation.mode == AccessMode::Write {
            let affected = execute_writes(&transaction, &translation.statements)?;
            translation.check.verify(affected, &[], item.verify_affected_rows)?;
            affected
        } else {
            0
        };
        status::update_progress(&transaction, storage_id, &item.progress()).map_err(record_error)?;
        match &item.tx.operation {
            TableOperation::DropTable => {
                status::mark_deleted(&transaction, storage_id).map_err(record_error)?;
            }
            TableOperation::RenameTable {
                new_name,
            } => status::rename_record(&transaction, storage_id, new_name).map_err(record_error)?,
            _ => {}
        }
        transaction.commit().map_err(execution_error)?;
        Ok(DisposeReport {
            affected_rows: affected,
            rows: Vec::new(),
            committed: true,
        })
    }
}

// ============================================================================
// SECTION: Sync Records
// ============================================================================

impl SyncStatusStore for SqliteTxStore {
    fn load_auto_sync(&self, chain_id: &str) -> Result<Vec<SyncRecord>, SyncStatusError> {
        status::load_auto_sync(&*self.read_connection()?, chain_id)
    }

    fn list_records(&self) -> Result<Vec<SyncRecord>, SyncStatusError> {
        status::list_records(&*self.read_connection()?)
    }

    fn read_record(&self, storage_id: &StorageId) -> Result<Option<SyncRecord>, SyncStatusError> {
        status::read_record(&*self.read_connection()?, storage_id)
    }

    fn insert_record(&self, record: &SyncRecord) -> Result<(), SyncStatusError> {
        status::insert_record(&*self.write_connection()?, record)
    }

    fn update_progress(
        &self,
        storage_id: &StorageId,
        progress: &SyncProgress,
    ) -> Result<(), SyncStatusError> {
        status::update_progress(&*self.write_connection()?, storage_id, progress)
    }

    fn rename_record(
        &self,
        storage_id: &StorageId,
        new_name: &TableName,
    ) -> Result<(), SyncStatusError> {
        status::rename_record(&*self.write_connection()?, storage_id, new_name)
    }

    fn set_auto_sync(
        &self,
        storage_id: &StorageId,
        auto_sync: bool,
    ) -> Result<(), SyncStatusError> {
        status::set_auto_sync(&*self.write_connection()?, storage_id, auto_sync)
    }

    fn mark_deleted(&self, storage_id: &StorageId) -> Result<(), SyncStatusError> {
        status::mark_deleted(&*self.write_connection()?, storage_id)
    }

    fn find_storage_id(
        &self,
        owner: &AccountId,
        table_name: &TableName,
    ) -> Result<Option<StorageId>, SyncStatusError> {
        status::find_storage_id(&*self.read_connection()?, owner, table_name)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the only statement of a read translation.
fn single_statement(translation: &Translation) -> Result<&SqlStatement, DisposeError> {
    match translation.statements.as_slice() {
        [statement] => Ok(statement),
        other => Err(DisposeError::Invalid(format!(
            "read translation has {} statements, expected 1",
            other.len()
        ))),
    }
}

/// Maps a sync-record failure inside an apply transaction.
fn record_error(error: SyncStatusError) -> DisposeError {
    DisposeError::DbExecution(error.to_string())
}

/// Returns true when `storage_id` names an existing table.
fn table_exists(connection: &Connection, storage_id: &StorageId) -> rusqlite::Result<bool> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![storage_id.as_str()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path.display().to_string().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    if path.components().any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH) {
        return Err(SqliteStoreError::Invalid(
            "store path contains an overlong component".to_string(),
        ));
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(connection)
}

/// Initializes the schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(status::SYNC_STATUS_DDL)
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::*;

    #[test]
    fn io_errors_are_retryable_for_the_executor() {
        assert!(matches!(
            DisposeError::from(SqliteStoreError::Io("busy".to_string())),
            DisposeError::Unavailable(_)
        ));
        assert!(matches!(
            SyncStatusError::from(SqliteStoreError::Invalid("bad".to_string())),
            SyncStatusError::Invalid(_)
        ));
    }

    #[test]
    fn read_translation_must_have_one_statement() {
        let translation = Translation {
            statements: Vec::new(),
            mode: AccessMode::Read,
            check: ledgersql_core::runtime::ResultCheck::None,
        };
        assert!(matches!(single_statement(&translation), Err(DisposeError::Invalid(_))));
    }

    #[test]
    fn config_defaults_apply_when_omitted() {
        let config: SqliteStoreConfig =
            serde_json::from_str(r#"{"path": "db/ledger.sqlite"}"#).unwrap();
        assert_eq!(config, SqliteStoreConfig::at("db/ledger.sqlite"));
    }
}
