// crates/ledgersql-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Unit Tests
// Description: Targeted tests for the SQLite table store.
// Purpose: Validate path safety, schema versioning, transactional dispose,
//          sync records, and row counting.
// ============================================================================

//! ## Overview
//! Unit-level tests for `SQLite` store invariants:
//! - Path safety checks (empty/overlong/directory rejection)
//! - Schema version validation
//! - Dry runs and failed verifications leave no trace
//! - Sync records round-trip and reject duplicates
//! - Row counts see committed rows only

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::PathBuf;

use ledgersql_core::AccountId;
use ledgersql_core::ConditionTree;
use ledgersql_core::DisposeError;
use ledgersql_core::DisposeMode;
use ledgersql_core::DisposeRequest;
use ledgersql_core::Hash256;
use ledgersql_core::RowCounter;
use ledgersql_core::RuleOutcome;
use ledgersql_core::StorageId;
use ledgersql_core::SyncPosition;
use ledgersql_core::SyncProgress;
use ledgersql_core::SyncRecord;
use ledgersql_core::SyncStatusError;
use ledgersql_core::SyncStatusStore;
use ledgersql_core::TableName;
use ledgersql_core::TableOperation;
use ledgersql_core::TableTx;
use ledgersql_core::TxExecutor;
use ledgersql_core::TxKind;
use ledgersql_store_sqlite::SqliteStoreConfig;
use ledgersql_store_sqlite::SqliteStoreError;
use ledgersql_store_sqlite::SqliteStoreMode;
use ledgersql_store_sqlite::SqliteTxStore;
use rusqlite::Connection;
use rusqlite::params;
use serde_json::Value as JsonValue;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open(dir: &TempDir) -> SqliteTxStore {
    SqliteTxStore::new(SqliteStoreConfig::at(dir.path().join("ledger.sqlite"))).unwrap()
}

fn owner() -> AccountId {
    AccountId::new("rOwner").unwrap()
}

fn storage_id(table: &str) -> StorageId {
    StorageId::derive(&owner(), &TableName::new(table).unwrap(), 1)
}

fn tx(table: &str, operation: JsonValue) -> TableTx {
    let operation: TableOperation = serde_json::from_value(operation).unwrap();
    TableTx {
        tx_hash: Hash256::from_bytes([7; 32]),
        kind: TxKind::SqlStatement,
        account: owner(),
        owner: owner(),
        table_name: TableName::new(table).unwrap(),
        storage_id: storage_id(table),
        operation,
        affected_rows: None,
        check: None,
    }
}

fn commit(
    store: &SqliteTxStore,
    tx: &TableTx,
    mode: DisposeMode,
) -> Result<ledgersql_core::DisposeReport, DisposeError> {
    store.dispose(&DisposeRequest {
        tx,
        rule: &RuleOutcome::passthrough(&tx.operation),
        verify_affected_rows: true,
        mode,
    })
}

fn create_people(store: &SqliteTxStore) {
    let create = tx("people", json!({
        "op": "create_table",
        "columns": [
            {"field": "id", "type": "int", "PK": true},
            {"field": "name", "type": "varchar", "length": 16, "NN": true},
            {"field": "score", "type": "decimal", "length": 8, "accuracy": 2, "default": 0}
        ]
    }));
    commit(store, &create, DisposeMode::Commit).unwrap();
}

fn record(table: &str) -> SyncRecord {
    SyncRecord {
        table_name: TableName::new(table).unwrap(),
        storage_id: storage_id(table),
        owner: owner(),
        ledger_seq: 0,
        ledger_hash: Hash256::ZERO,
        tx_seq: 0,
        tx_hash: Hash256::ZERO,
        auto_sync: true,
        chain_id: "main".to_string(),
        deleted: false,
    }
}

// ============================================================================
// SECTION: Path and Schema
// ============================================================================

#[test]
fn sqlite_rejects_directory_path() {
    let dir = TempDir::new().unwrap();
    let err = SqliteTxStore::new(SqliteStoreConfig::at(dir.path())).unwrap_err();
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn sqlite_rejects_empty_path_and_zero_pool() {
    let err = SqliteTxStore::new(SqliteStoreConfig::at(PathBuf::new())).unwrap_err();
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
    let dir = TempDir::new().unwrap();
    let mut config = SqliteStoreConfig::at(dir.path().join("db.sqlite"));
    config.read_pool_size = 0;
    assert!(matches!(SqliteTxStore::new(config).unwrap_err(), SqliteStoreError::Invalid(_)));
}

#[test]
fn sqlite_rejects_unknown_schema_version() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.sqlite");
    {
        let connection = Connection::open(&path).unwrap();
        connection
            .execute_batch("CREATE TABLE store_meta (version INTEGER NOT NULL);")
            .unwrap();
        connection
            .execute("INSERT INTO store_meta (version) VALUES (?1)", params![99_i64])
            .unwrap();
    }
    let err = SqliteTxStore::new(SqliteStoreConfig::at(&path)).unwrap_err();
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)));
}

#[test]
fn sqlite_reopen_keeps_data_and_delete_journal_works() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("ledger.sqlite");
    let mut config = SqliteStoreConfig::at(&path);
    config.journal_mode = SqliteStoreMode::Delete;
    {
        let store = SqliteTxStore::new(config.clone()).unwrap();
        store.readiness().unwrap();
        create_people(&store);
    }
    let store = SqliteTxStore::new(config).unwrap();
    assert!(store.table_exists(&storage_id("people")).unwrap());
}

// ============================================================================
// SECTION: Dispose
// ============================================================================

#[test]
fn sqlite_dry_run_does_not_persist() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let create = tx("people", json!({
        "op": "create_table",
        "columns": [{"field": "id", "type": "int", "PK": true}]
    }));
    let report = commit(&store, &create, DisposeMode::DryRun).unwrap();
    assert!(!report.committed);
    assert!(!store.table_exists(&storage_id("people")).unwrap());

    create_people(&store);
    let insert = tx("people", json!({"op": "insert", "rows": [{"id": 1, "name": "a"}]}));
    assert_eq!(commit(&store, &insert, DisposeMode::DryRun).unwrap().affected_rows, 1);
    let select = tx("people", json!({"op": "select", "fields": ["id"]}));
    assert!(commit(&store, &select, DisposeMode::Commit).unwrap().rows.is_empty());
}

#[test]
fn sqlite_affected_row_mismatch_rolls_back() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    create_people(&store);
    let insert = tx("people", json!({"op": "insert", "rows": [
        {"id": 1, "name": "a"},
        {"id": 2, "name": "b"}
    ]}));
    commit(&store, &insert, DisposeMode::Commit).unwrap();

    let mut delete = tx("people", json!({"op": "delete", "condition": {"id": {"in": [1, 2]}}}));
    delete.affected_rows = Some(1);
    let err = commit(&store, &delete, DisposeMode::Commit).unwrap_err();
    assert_eq!(err, DisposeError::AffectedRowMismatch {
        declared: 1,
        actual: 2
    });
    let select = tx("people", json!({
        "op": "select",
        "fields": ["id", "name", "score"],
        "order": [{"field": "id"}]
    }));
    let rows = store.tx_history(&select, &RuleOutcome::passthrough(&select.operation)).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("name"), Some(&json!("a")));
    assert_eq!(rows[0].get("score"), Some(&json!(0)));
}

#[test]
fn sqlite_constraint_violation_is_db_execution() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    create_people(&store);
    let missing_name = tx("people", json!({"op": "insert", "rows": [{"id": 1}]}));
    let err = commit(&store, &missing_name, DisposeMode::Commit).unwrap_err();
    assert!(matches!(err, DisposeError::DbExecution(message) if message.contains("NOT NULL")));
}

#[test]
fn sqlite_assert_and_history_require_reads() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    create_people(&store);
    let insert = tx("people", json!({"op": "insert", "rows": [{"id": 5, "name": "eve"}]}));
    commit(&store, &insert, DisposeMode::Commit).unwrap();

    let assert_ok = tx("people", json!({
        "op": "assert",
        "condition": {"name": {"like": "e%"}},
        "expected": [{"id": 5, "name": "eve"}]
    }));
    commit(&store, &assert_ok, DisposeMode::Commit).unwrap();
    let assert_bad = tx("people", json!({
        "op": "assert", "condition": {"id": 5}, "expected": [{"id": 5, "name": "bob"}]
    }));
    assert!(matches!(
        commit(&store, &assert_bad, DisposeMode::Commit).unwrap_err(),
        DisposeError::AssertMismatch(_)
    ));
    let err = store.tx_history(&insert, &RuleOutcome::passthrough(&insert.operation)).unwrap_err();
    assert!(matches!(err, DisposeError::Invalid(_)));
}

#[test]
fn sqlite_drop_table_removes_backend_table() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    create_people(&store);
    store.drop_table(&storage_id("people")).unwrap();
    assert!(!store.table_exists(&storage_id("people")).unwrap());
    assert!(matches!(
        store.drop_table(&storage_id("people")).unwrap_err(),
        DisposeError::DbExecution(_)
    ));
}

// ============================================================================
// SECTION: Counting
// ============================================================================

#[test]
fn sqlite_count_rows_sees_committed_rows() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let condition = ConditionTree::create_root(&json!({"name": "a"})).unwrap();
    assert_eq!(store.count_rows(&storage_id("people"), &condition).unwrap(), 0);
    create_people(&store);
    let insert = tx("people", json!({"op": "insert", "rows": [
        {"id": 1, "name": "a"},
        {"id": 2, "name": "a"},
        {"id": 3, "name": "b"}
    ]}));
    commit(&store, &insert, DisposeMode::DryRun).unwrap();
    assert_eq!(store.count_rows(&storage_id("people"), &condition).unwrap(), 0);
    commit(&store, &insert, DisposeMode::Commit).unwrap();
    assert_eq!(store.count_rows(&storage_id("people"), &condition).unwrap(), 2);
}

// ============================================================================
// SECTION: Sync Records
// ============================================================================

#[test]
fn sqlite_sync_records_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    store.insert_record(&record("people")).unwrap();
    store.insert_record(&record("archive")).unwrap();
    assert!(matches!(
        store.insert_record(&record("people")).unwrap_err(),
        SyncStatusError::Invalid(_)
    ));

    let progress = SyncProgress {
        position: SyncPosition {
            ledger_seq: 12,
            tx_seq: 3,
        },
        ledger_hash: Hash256::from_bytes([1; 32]),
        tx_hash: Hash256::from_bytes([2; 32]),
    };
    store.update_progress(&storage_id("people"), &progress).unwrap();
    let stored = store.read_record(&storage_id("people")).unwrap().unwrap();
    assert_eq!(stored.position(), Some(progress.position));
    assert_eq!(stored.tx_hash, progress.tx_hash);

    store.set_auto_sync(&storage_id("archive"), false).unwrap();
    let loaded = store.load_auto_sync("main").unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].storage_id, storage_id("people"));
    assert!(store.load_auto_sync("side").unwrap().is_empty());

    let renamed = TableName::new("staff").unwrap();
    store.rename_record(&storage_id("people"), &renamed).unwrap();
    assert_eq!(store.find_storage_id(&owner(), &renamed).unwrap(), Some(storage_id("people")));
    store.mark_deleted(&storage_id("people")).unwrap();
    assert!(store.find_storage_id(&owner(), &renamed).unwrap().is_none());
    assert_eq!(store.list_records().unwrap().len(), 2);

    let ghost = storage_id("ghost");
    assert!(matches!(store.mark_deleted(&ghost).unwrap_err(), SyncStatusError::NotFound(_)));
    assert!(store.read_record(&ghost).unwrap().is_none());
}

#[test]
fn sqlite_tampered_record_is_invalid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.sqlite");
    let store = SqliteTxStore::new(SqliteStoreConfig::at(&path)).unwrap();
    store.insert_record(&record("people")).unwrap();
    {
        let connection = Connection::open(&path).unwrap();
        connection
            .execute("UPDATE sync_status SET tx_hash = 'not-hex'", params![])
            .unwrap();
    }
    assert!(matches!(
        store.read_record(&storage_id("people")).unwrap_err(),
        SyncStatusError::Invalid(_)
    ));
}
