// crates/ledgersql-store-sqlite/src/status.rs
// ============================================================================
// Module: SQLite Sync Records
// Description: SQL for the per-table sync status table.
// Purpose: Read and write sync records on any connection or transaction.
// Dependencies: ledgersql-core, rusqlite
// ============================================================================

//! ## Overview
//! Sync records live in `sync_status` in the same database as the projected
//! tables. Every function takes a plain [`Connection`] so the applier can run
//! them inside the transaction that applied the item.

// ============================================================================
// SECTION: Imports
// ============================================================================

use ledgersql_core::AccountId;
use ledgersql_core::Hash256;
use ledgersql_core::StorageId;
use ledgersql_core::SyncProgress;
use ledgersql_core::SyncRecord;
use ledgersql_core::SyncStatusError;
use ledgersql_core::TableName;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// DDL for the sync status table.
pub(crate) const SYNC_STATUS_DDL: &str = "CREATE TABLE IF NOT EXISTS sync_status (
    storage_id TEXT NOT NULL PRIMARY KEY,
    table_name TEXT NOT NULL,
    owner TEXT NOT NULL,
    ledger_seq INTEGER NOT NULL,
    ledger_hash TEXT NOT NULL,
    tx_seq INTEGER NOT NULL,
    tx_hash TEXT NOT NULL,
    auto_sync INTEGER NOT NULL,
    chain_id TEXT NOT NULL,
    deleted INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sync_status_owner_name
    ON sync_status (owner, table_name);
CREATE INDEX IF NOT EXISTS idx_sync_status_chain
    ON sync_status (chain_id, auto_sync, deleted);";

/// Column list shared by every record query.
const RECORD_COLUMNS: &str = "storage_id, table_name, owner, ledger_seq, ledger_hash, tx_seq, \
                              tx_hash, auto_sync, chain_id, deleted";

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Loads live auto-sync records of a chain.
pub(crate) fn load_auto_sync(
    connection: &Connection,
    chain_id: &str,
) -> Result<Vec<SyncRecord>, SyncStatusError> {
    collect_records(
        connection,
        &format!(
            "SELECT {RECORD_COLUMNS} FROM sync_status WHERE chain_id = ?1 AND auto_sync = 1 AND \
             deleted = 0 ORDER BY storage_id"
        ),
        Some(chain_id),
    )
}

/// Lists every record.
pub(crate) fn list_records(connection: &Connection) -> Result<Vec<SyncRecord>, SyncStatusError> {
    collect_records(
        connection,
        &format!("SELECT {RECORD_COLUMNS} FROM sync_status ORDER BY storage_id"),
        None,
    )
}

/// Reads one record.
pub(crate) fn read_record(
    connection: &Connection,
    storage_id: &StorageId,
) -> Result<Option<SyncRecord>, SyncStatusError> {
    let raw = connection
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM sync_status WHERE storage_id = ?1"),
            params![storage_id.as_str()],
            RawRecord::from_row,
        )
        .optional()
        .map_err(db_error)?;
    raw.map(RawRecord::into_record).transpose()
}

/// Inserts a new record; duplicates are rejected.
pub(crate) fn insert_record(
    connection: &Connection,
    record: &SyncRecord,
) -> Result<(), SyncStatusError> {
    if read_record(connection, &record.storage_id)?.is_some() {
        return Err(SyncStatusError::Invalid(format!(
            "sync record already exists: {}",
            record.storage_id
        )));
    }
    connection
        .execute(
            &format!(
                "INSERT INTO sync_status ({RECORD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, \
                 ?8, ?9, ?10)"
            ),
            params![
                record.storage_id.as_str(),
                record.table_name.as_str(),
                record.owner.as_str(),
                to_sql_seq(record.ledger_seq)?,
                record.ledger_hash.to_string(),
                to_sql_seq(record.tx_seq)?,
                record.tx_hash.to_string(),
                record.auto_sync,
                record.chain_id,
                record.deleted
            ],
        )
        .map_err(db_error)?;
    Ok(())
}

/// Writes the applied position of a record.
pub(crate) fn update_progress(
    connection: &Connection,
    storage_id: &StorageId,
    progress: &SyncProgress,
) -> Result<(), SyncStatusError> {
    let changed = connection
        .execute(
            "UPDATE sync_status SET ledger_seq = ?2, ledger_hash = ?3, tx_seq = ?4, tx_hash = ?5 \
             WHERE storage_id = ?1",
            params![
                storage_id.as_str(),
                to_sql_seq(progress.position.ledger_seq)?,
                progress.ledger_hash.to_string(),
                to_sql_seq(progress.position.tx_seq)?,
                progress.tx_hash.to_string()
            ],
        )
        .map_err(db_error)?;
    require_changed(changed, storage_id)
}

/// Renames the logical table of a record.
pub(crate) fn rename_record(
    connection: &Connection,
    storage_id: &StorageId,
    new_name: &TableName,
) -> Result<(), SyncStatusError> {
    let changed = connection
        .execute(
            "UPDATE sync_status SET table_name = ?2 WHERE storage_id = ?1",
            params![storage_id.as_str(), new_name.as_str()],
        )
        .map_err(db_error)?;
    require_changed(changed, storage_id)
}

/// Sets the auto-sync flag.
pub(crate) fn set_auto_sync(
    connection: &Connection,
    storage_id: &StorageId,
    auto_sync: bool,
) -> Result<(), SyncStatusError> {
    let changed = connection
        .execute(
            "UPDATE sync_status SET auto_sync = ?2 WHERE storage_id = ?1",
            params![storage_id.as_str(), auto_sync],
        )
        .map_err(db_error)?;
    require_changed(changed, storage_id)
}

/// Marks a record deleted.
pub(crate) fn mark_deleted(
    connection: &Connection,
    storage_id: &StorageId,
) -> Result<(), SyncStatusError> {
    let changed = connection
        .execute(
            "UPDATE sync_status SET deleted = 1 WHERE storage_id = ?1",
            params![storage_id.as_str()],
        )
        .map_err(db_error)?;
    require_changed(changed, storage_id)
}

/// Resolves a live table by owner and logical name.
pub(crate) fn find_storage_id(
    connection: &Connection,
    owner: &AccountId,
    table_name: &TableName,
) -> Result<Option<StorageId>, SyncStatusError> {
    let raw: Option<String> = connection
        .query_row(
            "SELECT storage_id FROM sync_status WHERE owner = ?1 AND table_name = ?2 AND deleted \
             = 0 LIMIT 1",
            params![owner.as_str(), table_name.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_error)?;
    raw.map(|value| {
        StorageId::parse(&value).map_err(|err| SyncStatusError::Invalid(err.to_string()))
    })
        .transpose()
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Record columns as stored.
struct RawRecord {
    /// Backend table name.
    storage_id: String,
    /// Logical table name.
    table_name: String,
    /// Owner account.
    owner: String,
    /// Applied ledger sequence.
    ledger_seq: i64,
    /// Applied ledger hash (hex).
    ledger_hash: String,
    /// Applied transaction index.
    tx_seq: i64,
    /// Applied transaction hash (hex).
    tx_hash: String,
    /// Auto-sync flag.
    auto_sync: bool,
    /// Chain identifier.
    chain_id: String,
    /// Deleted flag.
    deleted: bool,
}

impl RawRecord {
    /// Reads the shared column list.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            storage_id: row.get(0)?,
            table_name: row.get(1)?,
            owner: row.get(2)?,
            ledger_seq: row.get(3)?,
            ledger_hash: row.get(4)?,
            tx_seq: row.get(5)?,
            tx_hash: row.get(6)?,
            auto_sync: row.get(7)?,
            chain_id: row.get(8)?,
            deleted: row.get(9)?,
        })
    }

    /// Validates stored columns into a record.
    fn into_record(self) -> Result<SyncRecord, SyncStatusError> {
        let invalid = |err: &dyn std::fmt::Display| {
            SyncStatusError::Invalid(format!("record {}: {err}", self.storage_id))
        };
        Ok(SyncRecord {
            table_name: TableName::new(self.table_name.clone()).map_err(|err| invalid(&err))?,
            storage_id: StorageId::parse(&self.storage_id).map_err(|err| invalid(&err))?,
            owner: AccountId::new(self.owner.clone()).map_err(|err| invalid(&err))?,
            ledger_seq: u64::try_from(self.ledger_seq).map_err(|err| invalid(&err))?,
            ledger_hash: self.ledger_hash.parse::<Hash256>().map_err(|err| invalid(&err))?,
            tx_seq: u64::try_from(self.tx_seq).map_err(|err| invalid(&err))?,
            tx_hash: self.tx_hash.parse::<Hash256>().map_err(|err| invalid(&err))?,
            auto_sync: self.auto_sync,
            chain_id: self.chain_id.clone(),
            deleted: self.deleted,
        })
    }
}

/// Runs a record query with an optional single text parameter.
fn collect_records(
    connection: &Connection,
    sql: &str,
    param: Option<&str>,
) -> Result<Vec<SyncRecord>, SyncStatusError> {
    let mut stmt = connection.prepare(sql).map_err(db_error)?;
    let raws = match param {
        Some(value) => stmt.query_map(params![value], RawRecord::from_row),
        None => stmt.query_map([], RawRecord::from_row),
    }
    .map_err(db_error)?
    .collect::<rusqlite::Result<Vec<_>>>()
    .map_err(db_error)?;
    raws.into_iter().map(RawRecord::into_record).collect()
}

/// Converts a sequence number for storage.
fn to_sql_seq(value: u64) -> Result<i64, SyncStatusError> {
    i64::try_from(value)
        .map_err(|_| SyncStatusError::Invalid(format!("sequence {value} too large")))
}

/// Maps zero changed rows to `NotFound`.
fn require_changed(changed: usize, storage_id: &StorageId) -> Result<(), SyncStatusError> {
    if changed == 0 {
        return Err(SyncStatusError::NotFound(storage_id.to_string()));
    }
    Ok(())
}

/// Maps a rusqlite failure.
fn db_error(err: rusqlite::Error) -> SyncStatusError {
    SyncStatusError::Db(err.to_string())
}
