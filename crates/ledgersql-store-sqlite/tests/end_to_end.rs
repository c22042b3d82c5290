// crates/ledgersql-store-sqlite/tests/end_to_end.rs
// ============================================================================
// Module: SQLite End-to-End Tests
// Description: Apply path, sync worker, and restart over a SQLite database.
// Purpose: Validate that data and sync progress survive a restart together.
// ============================================================================

//! ## Overview
//! Wires [`TxProcessor`] and [`TableStorage`] to a file-backed
//! [`SqliteTxStore`], drives ledgers through the background sync worker, then
//! reopens the database and checks the reloaded sync state.

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

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use ledgersql_core::AccountId;
use ledgersql_core::ApplyContext;
use ledgersql_core::ApplyError;
use ledgersql_core::CheckDeclaration;
use ledgersql_core::CheckHashConfig;
use ledgersql_core::CheckHashTracker;
use ledgersql_core::DisposeError;
use ledgersql_core::Hash256;
use ledgersql_core::LedgerClock;
use ledgersql_core::ProcessorConfig;
use ledgersql_core::RuleOutcome;
use ledgersql_core::StorageId;
use ledgersql_core::SyncPosition;
use ledgersql_core::SyncStatus;
use ledgersql_core::SyncStatusStore;
use ledgersql_core::TableName;
use ledgersql_core::TableOperation;
use ledgersql_core::TableStorage;
use ledgersql_core::TableStorageConfig;
use ledgersql_core::TableTx;
use ledgersql_core::TxExecutor;
use ledgersql_core::TxKind;
use ledgersql_core::TxProcessor;
use ledgersql_core::runtime::ExpiryWorker;
use ledgersql_store_sqlite::SqliteStoreConfig;
use ledgersql_store_sqlite::SqliteTxStore;
use serde_json::Value as JsonValue;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const OWNER: &str = "rOwner";

fn owner() -> AccountId {
    AccountId::new(OWNER).unwrap()
}

fn storage_id(table: &str) -> StorageId {
    StorageId::derive(&owner(), &TableName::new(table).unwrap(), 1)
}

fn tx(table: &str, seed: u8, operation: JsonValue) -> TableTx {
    let operation: TableOperation = serde_json::from_value(operation).unwrap();
    TableTx {
        tx_hash: Hash256::from_bytes([seed; 32]),
        kind: TxKind::TableListSet,
        account: owner(),
        owner: owner(),
        table_name: TableName::new(table).unwrap(),
        storage_id: storage_id(table),
        operation,
        affected_rows: None,
        check: None,
    }
}

fn create(table: &str, seed: u8) -> TableTx {
    tx(table, seed, json!({
        "op": "create_table",
        "columns": [
            {"field": "id", "type": "int", "PK": true},
            {"field": "name", "type": "varchar", "length": 32}
        ]
    }))
}

fn insert(table: &str, seed: u8, id: i64, name: &str) -> TableTx {
    tx(table, seed, json!({"op": "insert", "rows": [{"id": id, "name": name}]}))
}

fn ctx(ledger_seq: u64, tx_seq: u64) -> ApplyContext {
    ApplyContext {
        ledger_seq,
        ledger_hash: Hash256::from_bytes([0xAB; 32]),
        tx_seq,
    }
}

struct Node {
    store: Arc<SqliteTxStore>,
    storage: Arc<TableStorage<SqliteTxStore>>,
    processor: TxProcessor<SqliteTxStore>,
}

impl Node {
    fn open(path: &Path) -> Self {
        let store = Arc::new(SqliteTxStore::new(SqliteStoreConfig::at(path)).unwrap());
        let storage = Arc::new(TableStorage::new(Arc::clone(&store), TableStorageConfig {
            idle_wait: Duration::from_millis(10),
            ..TableStorageConfig::default()
        }));
        storage.load_from_store().unwrap();
        storage.start().unwrap();
        let tracker = Arc::new(CheckHashTracker::new(CheckHashConfig {
            expiry_interval: Duration::from_millis(10),
            ..CheckHashConfig::default()
        }));
        let processor = TxProcessor::new(Arc::clone(&storage), tracker, ProcessorConfig::default());
        Self {
            store,
            storage,
            processor,
        }
    }

    fn settle(&self) {
        assert!(self.storage.wait_idle(Duration::from_secs(10)).unwrap());
    }

    fn select_names(&self, table: &str) -> Vec<String> {
        let select = tx(table, 0, json!({
            "op": "select",
            "fields": ["name"],
            "order": [{"field": "id"}]
        }));
        self.store
            .tx_history(&select, &RuleOutcome::passthrough(&select.operation))
            .unwrap()
            .iter()
            .map(|row| row.get("name").and_then(JsonValue::as_str).unwrap().to_string())
            .collect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn sqlite_projection_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.sqlite");
    {
        let node = Node::open(&path);
        node.processor.apply(&create("people", 1), None, &ctx(1, 0)).unwrap();
        node.settle();
        for (seq, name) in [(2_u8, "ann"), (3, "bob"), (4, "cy")] {
            let id = i64::from(seq);
            node.processor
                .apply(&insert("people", seq, id, name), None, &ctx(u64::from(seq), 0))
                .unwrap();
        }
        node.settle();
        let mut update = tx("people", 5, json!({
            "op": "update",
            "set": {"name": "bo"},
            "condition": {"id": 3}
        }));
        update.affected_rows = Some(1);
        node.processor.apply(&update, None, &ctx(5, 0)).unwrap();
        node.settle();
        assert_eq!(node.select_names("people"), vec!["ann", "bo", "cy"]);
        node.storage.shutdown().unwrap();
    }

    let node = Node::open(&path);
    let snapshot = node.storage.snapshot(&storage_id("people")).unwrap().unwrap();
    assert_eq!(snapshot.status, SyncStatus::Synced);
    assert_eq!(
        snapshot.last_applied,
        Some(SyncPosition {
            ledger_seq: 5,
            tx_seq: 0
        })
    );
    assert_eq!(snapshot.tx_hash, Hash256::from_bytes([5; 32]));
    assert_eq!(node.select_names("people"), vec!["ann", "bo", "cy"]);

    let mut stale = tx("people", 6, json!({"op": "delete", "condition": {"id": 9}}));
    stale.affected_rows = Some(1);
    let err = node.processor.apply(&stale, None, &ctx(6, 0)).unwrap_err();
    assert!(matches!(err, ApplyError::Dispose(DisposeError::AffectedRowMismatch { .. })));
    node.storage.shutdown().unwrap();
}

#[test]
fn sqlite_failed_table_parks_until_resync() {
    let dir = TempDir::new().unwrap();
    let node = Node::open(&dir.path().join("ledger.sqlite"));
    node.storage.set_sync_enabled(false);
    node.processor.apply(&create("alpha", 1), None, &ctx(1, 0)).unwrap();
    node.processor.apply(&create("beta", 2), None, &ctx(1, 1)).unwrap();
    node.processor.apply(&insert("alpha", 3, 1, "a"), None, &ctx(2, 0)).unwrap();
    node.processor.apply(&insert("alpha", 4, 1, "dup"), None, &ctx(3, 0)).unwrap();
    node.processor.apply(&insert("alpha", 5, 2, "b"), None, &ctx(4, 0)).unwrap();
    node.processor.apply(&insert("beta", 6, 1, "x"), None, &ctx(4, 1)).unwrap();
    node.storage.set_sync_enabled(true);
    node.settle();

    let alpha = node.storage.snapshot(&storage_id("alpha")).unwrap().unwrap();
    assert_eq!(alpha.status, SyncStatus::Error);
    assert_eq!(alpha.parked, 2);
    assert_eq!(node.select_names("alpha"), vec!["a"]);
    assert_eq!(node.select_names("beta"), vec!["x"]);
    let record = node.store.read_record(&storage_id("alpha")).unwrap().unwrap();
    assert_eq!(record.ledger_seq, 2);

    let cleanup = tx("alpha", 7, json!({"op": "delete", "condition": {"id": 1}}));
    node.store
        .dispose(&ledgersql_core::DisposeRequest {
            tx: &cleanup,
            rule: &RuleOutcome::passthrough(&cleanup.operation),
            verify_affected_rows: false,
            mode: ledgersql_core::DisposeMode::Commit,
        })
        .unwrap();
    assert_eq!(node.storage.resync(&storage_id("alpha")).unwrap(), 2);
    node.settle();
    assert_eq!(node.select_names("alpha"), vec!["dup", "b"]);
    assert_eq!(node.storage.status(&storage_id("alpha")).unwrap(), Some(SyncStatus::Synced));
    node.storage.shutdown().unwrap();
}

#[test]
fn sqlite_drop_and_rename_persist_records() {
    let dir = TempDir::new().unwrap();
    let node = Node::open(&dir.path().join("ledger.sqlite"));
    node.processor.apply(&create("people", 1), None, &ctx(1, 0)).unwrap();
    node.processor
        .apply(
            &tx("people", 2, json!({"op": "rename_table", "new_name": "staff"})),
            None,
            &ctx(2, 0),
        )
        .unwrap();
    node.settle();
    let staff = TableName::new("staff").unwrap();
    assert_eq!(node.store.find_storage_id(&owner(), &staff).unwrap(), Some(storage_id("people")));

    node.storage.set_auto_sync(&owner(), &staff, false).unwrap();
    let loaded =
        node.store.load_auto_sync(ledgersql_core::runtime::sync::DEFAULT_CHAIN_ID).unwrap();
    assert!(loaded.is_empty());

    node.processor.apply(&tx("people", 3, json!({"op": "drop_table"})), None, &ctx(3, 0)).unwrap();
    node.settle();
    assert!(!node.store.table_exists(&storage_id("people")).unwrap());
    assert!(node.store.read_record(&storage_id("people")).unwrap().unwrap().deleted);
    node.storage.shutdown().unwrap();
}

/// Ledger clock advanced by the test.
struct ManualClock(AtomicU64);

impl LedgerClock for ManualClock {
    fn current_ledger_seq(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[test]
fn sqlite_check_hash_expiry_rolls_back_head() {
    let dir = TempDir::new().unwrap();
    let node = Node::open(&dir.path().join("ledger.sqlite"));
    node.processor.apply(&create("people", 1), None, &ctx(1, 0)).unwrap();
    node.settle();

    let mut first = insert("people", 2, 1, "a");
    first.check = Some(CheckDeclaration {
        predecessor: None,
        strict: false,
        last_ledger_seq: 10,
    });
    let head = node.processor.apply(&first, None, &ctx(2, 0)).unwrap().check_hash.unwrap();
    node.processor.confirm(&first, 3).unwrap();

    let mut second = insert("people", 3, 2, "b");
    second.check = Some(CheckDeclaration {
        predecessor: Some(head),
        strict: true,
        last_ledger_seq: 4,
    });
    let pending = node.processor.apply(&second, None, &ctx(3, 0)).unwrap().check_hash.unwrap();
    assert_eq!(node.processor.tracker().get_check_hash(&storage_id("people")).unwrap(), pending);

    let clock = Arc::new(ManualClock(AtomicU64::new(3)));
    let worker = ExpiryWorker::spawn(
        Arc::clone(node.processor.tracker()),
        Arc::clone(&clock) as Arc<dyn LedgerClock>,
    )
    .unwrap();
    clock.0.store(5, Ordering::SeqCst);
    let tracker = node.processor.tracker();
    let mut rolled_back = false;
    for _ in 0 .. 100 {
        if tracker.get_check_hash(&storage_id("people")).unwrap() == head {
            rolled_back = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    worker.shutdown();
    assert!(rolled_back);
    node.storage.shutdown().unwrap();
}
