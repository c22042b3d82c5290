// crates/ledgersql-core/tests/sync_engine.rs
// ============================================================================
// Module: Table Storage Sync Engine Tests
// Description: Gating, ordering, duplicate, failure, and reload behavior.
// Purpose: Validate the sync engine against the in-memory backend.
// Dependencies: ledgersql-core
// ============================================================================
//! ## Overview
//! Drives [`TableStorage`] step by step with `run_once`/`drain` and through
//! its worker thread, checking that per-table order and progress records hold.

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

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::OWNER;
use common::account;
use common::create_op;
use common::id_name_pairs;
use common::insert_op;
use common::item;
use common::storage_id;
use common::tx;
use ledgersql_core::CheckDeclaration;
use ledgersql_core::CheckHashTracker;
use ledgersql_core::DisposeError;
use ledgersql_core::DisposeMode;
use ledgersql_core::DisposeRequest;
use ledgersql_core::Hash256;
use ledgersql_core::InMemoryTableStore;
use ledgersql_core::RuleOutcome;
use ledgersql_core::SyncPosition;
use ledgersql_core::SyncStatus;
use ledgersql_core::SyncStatusStore;
use ledgersql_core::TableName;
use ledgersql_core::TableStorage;
use ledgersql_core::TableStorageConfig;
use ledgersql_core::TxExecutor;
use ledgersql_core::runtime::SyncError;
use ledgersql_core::runtime::SyncStep;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn engine(enabled: bool) -> (Arc<InMemoryTableStore>, TableStorage<InMemoryTableStore>) {
    let backend = Arc::new(InMemoryTableStore::new());
    let storage = TableStorage::new(Arc::clone(&backend), TableStorageConfig {
        enabled,
        ..TableStorageConfig::default()
    });
    (backend, storage)
}

fn enqueue(storage: &TableStorage<InMemoryTableStore>, item: ledgersql_core::SyncItem) {
    storage.init_item(&item.tx, item.position.ledger_seq).unwrap();
    storage.enqueue(item).unwrap();
}

fn applied_positions(steps: &[SyncStep]) -> Vec<(u64, u64)> {
    steps
        .iter()
        .filter_map(|step| match step {
            SyncStep::Applied {
                position, ..
            } => Some((position.ledger_seq, position.tx_seq)),
            SyncStep::Rejected {
                ..
            }
            | SyncStep::Failed {
                ..
            } => None,
        })
        .collect()
}

// ============================================================================
// SECTION: Gating and Ordering
// ============================================================================

/// Verifies a closed gate queues work and re-enabling drains it in order.
#[test]
fn gate_off_queues_and_reenable_drains_in_order() {
    let (backend, storage) = engine(false);
    enqueue(&storage, item(tx("people", OWNER, 1, create_op()), 1, 0));
    enqueue(&storage, item(tx("people", OWNER, 2, insert_op(1, "a")), 2, 0));
    enqueue(&storage, item(tx("people", OWNER, 3, insert_op(2, "b")), 3, 0));

    assert!(storage.run_once().unwrap().is_none());
    assert_eq!(storage.status(&storage_id("people")).unwrap(), Some(SyncStatus::Off));
    assert!(backend.rows(&storage_id("people")).unwrap().is_none());

    storage.set_sync_enabled(true);
    let steps = storage.drain().unwrap();
    assert_eq!(applied_positions(&steps), vec![(1, 0), (2, 0), (3, 0)]);

    let rows = backend.rows(&storage_id("people")).unwrap().unwrap();
    assert_eq!(id_name_pairs(&rows), vec![(1, "a".to_string()), (2, "b".to_string())]);
    let snapshot = storage.snapshot(&storage_id("people")).unwrap().unwrap();
    assert_eq!(snapshot.status, SyncStatus::Synced);
    assert_eq!(
        snapshot.last_applied,
        Some(SyncPosition {
            ledger_seq: 3,
            tx_seq: 0
        })
    );
    let record = backend.read_record(&storage_id("people")).unwrap().unwrap();
    assert_eq!(record.ledger_seq, 3);
    assert_eq!(record.tx_hash, common::hash(3));
}

/// Verifies items at or below the last applied position are skipped.
#[test]
fn duplicate_items_are_not_reapplied() {
    let (backend, storage) = engine(true);
    enqueue(&storage, item(tx("people", OWNER, 1, create_op()), 1, 0));
    enqueue(&storage, item(tx("people", OWNER, 2, insert_op(1, "a")), 2, 0));
    assert_eq!(storage.drain().unwrap().len(), 2);

    enqueue(&storage, item(tx("people", OWNER, 2, insert_op(1, "a")), 2, 0));
    enqueue(&storage, item(tx("people", OWNER, 9, insert_op(9, "z")), 1, 5));
    assert!(storage.drain().unwrap().is_empty());
    assert_eq!(backend.rows(&storage_id("people")).unwrap().unwrap().len(), 1);
    assert_eq!(storage.status(&storage_id("people")).unwrap(), Some(SyncStatus::Synced));
}

/// Verifies enqueue requires registration.
#[test]
fn enqueue_requires_registered_table() {
    let (_, storage) = engine(true);
    let err = storage.enqueue(item(tx("people", OWNER, 1, create_op()), 1, 0)).unwrap_err();
    assert!(matches!(err, SyncError::Unregistered(_)));
}

// ============================================================================
// SECTION: Failure Isolation
// ============================================================================

/// Verifies a failing table parks its work while other tables keep syncing,
/// and that resync replays parked items in their original order.
#[test]
fn failed_table_is_isolated_until_resync() {
    let (backend, storage) = engine(true);
    enqueue(&storage, item(tx("alpha", OWNER, 1, create_op()), 1, 0));
    enqueue(&storage, item(tx("beta", OWNER, 2, create_op()), 1, 1));
    enqueue(&storage, item(tx("alpha", OWNER, 3, insert_op(1, "a")), 2, 0));
    enqueue(&storage, item(tx("alpha", OWNER, 4, insert_op(1, "dup")), 3, 0));
    enqueue(&storage, item(tx("alpha", OWNER, 5, insert_op(2, "b")), 4, 0));
    enqueue(&storage, item(tx("beta", OWNER, 6, insert_op(7, "x")), 4, 1));

    let steps = storage.drain().unwrap();
    assert!(steps.iter().any(|step| matches!(step, SyncStep::Failed { .. })));
    let alpha = storage.snapshot(&storage_id("alpha")).unwrap().unwrap();
    assert_eq!(alpha.status, SyncStatus::Error);
    assert_eq!(alpha.parked, 2);
    assert!(alpha.last_error.unwrap().contains("UNIQUE"));
    assert_eq!(storage.status(&storage_id("beta")).unwrap(), Some(SyncStatus::Synced));
    assert_eq!(backend.rows(&storage_id("beta")).unwrap().unwrap().len(), 1);

    enqueue(&storage, item(tx("alpha", OWNER, 7, insert_op(3, "c")), 5, 0));
    assert!(storage.drain().unwrap().is_empty());
    assert_eq!(storage.snapshot(&storage_id("alpha")).unwrap().unwrap().parked, 3);

    let cleanup = tx("alpha", OWNER, 8, json!({"op": "delete", "condition": {"id": 1}}));
    backend
        .dispose(&DisposeRequest {
            tx: &cleanup,
            rule: &RuleOutcome::passthrough(&cleanup.operation),
            verify_affected_rows: false,
            mode: DisposeMode::Commit,
        })
        .unwrap();

    assert_eq!(storage.resync(&storage_id("alpha")).unwrap(), 3);
    let steps = storage.drain().unwrap();
    assert_eq!(applied_positions(&steps), vec![(3, 0), (4, 0), (5, 0)]);
    let rows = backend.rows(&storage_id("alpha")).unwrap().unwrap();
    assert_eq!(
        id_name_pairs(&rows),
        vec![(1, "dup".to_string()), (2, "b".to_string()), (3, "c".to_string())]
    );
    assert_eq!(storage.status(&storage_id("alpha")).unwrap(), Some(SyncStatus::Synced));
}

/// Verifies resync is rejected for tables that are not failed.
#[test]
fn resync_requires_error_state() {
    let (_, storage) = engine(true);
    enqueue(&storage, item(tx("people", OWNER, 1, create_op()), 1, 0));
    storage.drain().unwrap();
    assert!(matches!(
        storage.resync(&storage_id("people")).unwrap_err(),
        SyncError::InvalidState(_)
    ));
}

/// Verifies a declared affected-row mismatch rejects only that item: its
/// position is consumed and later items of the table still apply.
#[test]
fn affected_row_mismatch_rejects_item_and_table_continues() {
    let (backend, storage) = engine(true);
    enqueue(&storage, item(tx("people", OWNER, 1, create_op()), 1, 0));
    enqueue(&storage, item(tx("people", OWNER, 2, insert_op(1, "a")), 2, 0));
    let mut update = tx("people", OWNER, 3, common::update_op(2, "x"));
    update.affected_rows = Some(1);
    enqueue(&storage, item(update, 2, 1));
    enqueue(&storage, item(tx("people", OWNER, 4, insert_op(3, "c")), 2, 2));

    let steps = storage.drain().unwrap();
    assert_eq!(applied_positions(&steps), vec![(1, 0), (2, 0), (2, 2)]);
    assert!(matches!(
        &steps[2],
        SyncStep::Rejected {
            error: DisposeError::AffectedRowMismatch {
                declared: 1,
                actual: 0
            },
            ..
        }
    ));
    let snapshot = storage.snapshot(&storage_id("people")).unwrap().unwrap();
    assert_eq!(snapshot.status, SyncStatus::Synced);
    assert_eq!(snapshot.parked, 0);
    assert!(snapshot.last_error.is_none());
    let rows = backend.rows(&storage_id("people")).unwrap().unwrap();
    assert_eq!(id_name_pairs(&rows), vec![(1, "a".to_string()), (3, "c".to_string())]);
    let record = backend.read_record(&storage_id("people")).unwrap().unwrap();
    assert_eq!((record.ledger_seq, record.tx_seq), (2, 2));
}

/// Verifies a rejected item is recorded so it counts as consumed when it is
/// the last item of the table.
#[test]
fn rejected_tail_item_advances_progress() {
    let (backend, storage) = engine(true);
    enqueue(&storage, item(tx("people", OWNER, 1, create_op()), 1, 0));
    let mut delete = tx("people", OWNER, 2, json!({"op": "delete", "condition": {"id": 9}}));
    delete.affected_rows = Some(1);
    enqueue(&storage, item(delete, 2, 0));
    storage.drain().unwrap();
    let record = backend.read_record(&storage_id("people")).unwrap().unwrap();
    assert_eq!(record.ledger_seq, 2);
    assert_eq!(record.tx_hash, common::hash(2));
    enqueue(&storage, item(tx("people", OWNER, 2, json!({"op": "drop_table"})), 2, 0));
    assert!(storage.drain().unwrap().is_empty());
}

/// Verifies a table's check-hash chain is released only once its drop is
/// applied.
#[test]
fn applied_drop_releases_check_hash_chain() {
    let (_, storage) = engine(true);
    let tracker = Arc::new(CheckHashTracker::default());
    storage.attach_check_hash(Arc::clone(&tracker));
    let mut create = tx("people", OWNER, 1, create_op());
    let declaration = CheckDeclaration {
        predecessor: None,
        strict: false,
        last_ledger_seq: 10,
    };
    create.check = Some(declaration.clone());
    let head = tracker.put(&create, &declaration, 1).unwrap();
    enqueue(&storage, item(create, 1, 0));
    storage.drain().unwrap();

    storage.set_sync_enabled(false);
    enqueue(&storage, item(tx("people", OWNER, 2, json!({"op": "drop_table"})), 2, 0));
    assert!(storage.drain().unwrap().is_empty());
    assert_eq!(tracker.get_check_hash(&storage_id("people")).unwrap(), head);

    storage.set_sync_enabled(true);
    storage.drain().unwrap();
    assert!(tracker.snapshot(&storage_id("people")).unwrap().is_none());
    assert_eq!(tracker.get_check_hash(&storage_id("people")).unwrap(), Hash256::ZERO);
}

// ============================================================================
// SECTION: Worker and Persistence
// ============================================================================

/// Verifies the worker thread drains the queue and stops on shutdown.
#[test]
fn worker_thread_drains_queue() {
    let backend = Arc::new(InMemoryTableStore::new());
    let storage = Arc::new(TableStorage::new(Arc::clone(&backend), TableStorageConfig {
        idle_wait: Duration::from_millis(10),
        ..TableStorageConfig::default()
    }));
    storage.start().unwrap();
    enqueue(&storage, item(tx("people", OWNER, 1, create_op()), 1, 0));
    for seed in 2_u8 ..= 6 {
        let id = i64::from(seed) - 1;
        enqueue(&storage, item(tx("people", OWNER, seed, insert_op(id, "n")), u64::from(seed), 0));
    }
    assert!(storage.wait_idle(Duration::from_secs(5)).unwrap());
    storage.shutdown().unwrap();
    assert_eq!(backend.rows(&storage_id("people")).unwrap().unwrap().len(), 5);
    assert_eq!(storage.status(&storage_id("people")).unwrap(), Some(SyncStatus::Synced));
}

/// Verifies startup reload only includes auto-sync tables.
#[test]
fn load_from_store_restores_auto_sync_tables() {
    let (backend, storage) = engine(true);
    enqueue(&storage, item(tx("people", OWNER, 1, create_op()), 1, 0));
    enqueue(&storage, item(tx("people", OWNER, 2, insert_op(1, "a")), 2, 0));
    enqueue(&storage, item(tx("archive", OWNER, 3, create_op()), 2, 1));
    storage.drain().unwrap();
    storage.set_auto_sync(&account(OWNER), &TableName::new("archive").unwrap(), false).unwrap();

    let restarted = TableStorage::new(Arc::clone(&backend), TableStorageConfig::default());
    assert_eq!(restarted.load_from_store().unwrap(), 1);
    let snapshot = restarted.snapshot(&storage_id("people")).unwrap().unwrap();
    assert_eq!(snapshot.status, SyncStatus::Synced);
    assert_eq!(
        snapshot.last_applied,
        Some(SyncPosition {
            ledger_seq: 2,
            tx_seq: 0
        })
    );
    assert!(restarted.snapshot(&storage_id("archive")).unwrap().is_none());

    let other_chain = TableStorage::new(Arc::clone(&backend), TableStorageConfig {
        chain_id: "other".to_string(),
        ..TableStorageConfig::default()
    });
    assert_eq!(other_chain.load_from_store().unwrap(), 0);
}

/// Verifies rename and drop update the persisted record.
#[test]
fn rename_and_drop_update_sync_record() {
    let (backend, storage) = engine(true);
    enqueue(&storage, item(tx("people", OWNER, 1, create_op()), 1, 0));
    enqueue(
        &storage,
        item(tx("people", OWNER, 2, json!({"op": "rename_table", "new_name": "staff"})), 2, 0),
    );
    storage.drain().unwrap();
    let staff = TableName::new("staff").unwrap();
    assert_eq!(
        backend.find_storage_id(&account(OWNER), &staff).unwrap(),
        Some(storage_id("people"))
    );
    assert_eq!(storage.snapshot(&storage_id("people")).unwrap().unwrap().table_name, staff);

    enqueue(&storage, item(tx("people", OWNER, 3, json!({"op": "drop_table"})), 3, 0));
    storage.drain().unwrap();
    assert!(storage.snapshot(&storage_id("people")).unwrap().is_none());
    assert!(backend.read_record(&storage_id("people")).unwrap().unwrap().deleted);
    assert!(backend.rows(&storage_id("people")).unwrap().is_none());
    assert!(backend.find_storage_id(&account(OWNER), &staff).unwrap().is_none());
    let retry = tx("people", OWNER, 4, insert_op(1, "a"));
    assert!(matches!(storage.init_item(&retry, 4).unwrap_err(), SyncError::Deleted(_)));
}
