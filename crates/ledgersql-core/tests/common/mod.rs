// crates/ledgersql-core/tests/common/mod.rs
// =============================================================================
// Module: Core Test Helpers
// Description: Shared transaction and table fixtures for core integration tests.
// Purpose: Reduce duplication across the sync, processor, and store suites.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use ledgersql_core::AccountId;
use ledgersql_core::Hash256;
use ledgersql_core::RuleOutcome;
use ledgersql_core::StorageId;
use ledgersql_core::SyncItem;
use ledgersql_core::SyncPosition;
use ledgersql_core::TableName;
use ledgersql_core::TableOperation;
use ledgersql_core::TableTx;
use ledgersql_core::TxKind;
use serde_json::Value as JsonValue;
use serde_json::json;

/// Owner of every fixture table.
pub const OWNER: &str = "rOwner";

/// Builds an account id.
pub fn account(name: &str) -> AccountId {
    AccountId::new(name).unwrap()
}

/// Builds a deterministic hash from a seed byte.
pub fn hash(seed: u8) -> Hash256 {
    Hash256::from_bytes([seed; 32])
}

/// Returns the storage id of a fixture table owned by [`OWNER`].
pub fn storage_id(table: &str) -> StorageId {
    StorageId::derive(&account(OWNER), &TableName::new(table).unwrap(), 1)
}

/// Builds a table transaction from an operation JSON payload.
pub fn tx(table: &str, caller: &str, seed: u8, operation: JsonValue) -> TableTx {
    let table_name = TableName::new(table).unwrap();
    let operation: TableOperation = serde_json::from_value(operation).unwrap();
    TableTx {
        tx_hash: hash(seed),
        kind: TxKind::TableListSet,
        account: account(caller),
        owner: account(OWNER),
        storage_id: storage_id(table),
        table_name,
        operation,
        affected_rows: None,
        check: None,
    }
}

/// Returns the `(id int primary key, name varchar(32))` table definition.
pub fn create_op() -> JsonValue {
    json!({
        "op": "create_table",
        "columns": [
            {"field": "id", "type": "int", "PK": true},
            {"field": "name", "type": "varchar", "length": 32}
        ]
    })
}

/// Returns an insert of one `(id, name)` row.
pub fn insert_op(id: i64, name: &str) -> JsonValue {
    json!({"op": "insert", "rows": [{"id": id, "name": name}]})
}

/// Returns an update setting `name` where `id` matches.
pub fn update_op(id: i64, name: &str) -> JsonValue {
    json!({"op": "update", "set": {"name": name}, "condition": {"id": id}})
}

/// Wraps an owner transaction into a sync item.
pub fn item(tx: TableTx, ledger_seq: u64, tx_seq: u64) -> SyncItem {
    SyncItem {
        position: SyncPosition {
            ledger_seq,
            tx_seq,
        },
        ledger_hash: hash(u8::try_from(ledger_seq % 250).unwrap()),
        rule: RuleOutcome::passthrough(&tx.operation),
        tx,
        verify_affected_rows: true,
    }
}

/// Projects rows into `(id, name)` pairs.
pub fn id_name_pairs(rows: &[serde_json::Map<String, JsonValue>]) -> Vec<(i64, String)> {
    rows.iter()
        .map(|row| {
            (
                row.get("id").and_then(JsonValue::as_i64).unwrap(),
                row.get("name").and_then(JsonValue::as_str).unwrap_or_default().to_string(),
            )
        })
        .collect()
}
