// crates/ledgersql-core/src/runtime/memory.rs
// ============================================================================
// Module: LedgerSQL In-Memory Table Store
// Description: In-memory executor and sync-status store for tests and demos.
// Purpose: Provide a deterministic backend without an external database.
// Dependencies: crate::{core, interfaces, runtime::translator}
// ============================================================================

//! ## Overview
//! [`InMemoryTableStore`] interprets table operations directly against rows
//! held in memory. Every operation runs on a cloned working copy that replaces
//! the live state only on commit, so a failed or dry-run operation leaves the
//! store untouched. Operations are still passed through
//! [`translate`](crate::runtime::translator::translate) first so both backends
//! reject the same malformed requests. It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use serde_json::Value as JsonValue;

use crate::core::condition::ConditionLeaf;
use crate::core::condition::ConditionNode;
use crate::core::condition::ConditionOp;
use crate::core::condition::ConditionTree;
use crate::core::identifiers::AccountId;
use crate::core::identifiers::StorageId;
use crate::core::identifiers::TableName;
use crate::core::rule::RowCounter;
use crate::core::rule::RuleError;
use crate::core::rule::RuleOutcome;
use crate::core::table::ColumnSpec;
use crate::core::table::JsonRow;
use crate::core::table::OrderSpec;
use crate::core::table::TableOperation;
use crate::core::table::TableTx;
use crate::core::value::CompareOp;
use crate::core::value::Value;
use crate::interfaces::DisposeError;
use crate::interfaces::DisposeMode;
use crate::interfaces::DisposeReport;
use crate::interfaces::DisposeRequest;
use crate::interfaces::SyncItem;
use crate::interfaces::SyncProgress;
use crate::interfaces::SyncRecord;
use crate::interfaces::SyncStatusError;
use crate::interfaces::SyncStatusStore;
use crate::interfaces::TableApplier;
use crate::interfaces::TxExecutor;
use crate::runtime::translator::AccessMode;
use crate::runtime::translator::translate;

// ============================================================================
// SECTION: State
// ============================================================================

/// One in-memory table.
#[derive(Debug, Clone, Default)]
struct MemoryTable {
    /// Column declarations in creation order.
    columns: Vec<ColumnSpec>,
    /// Rows in insertion order, stored with every column present.
    rows: Vec<JsonRow>,
}

/// Whole store state, cloned per operation.
#[derive(Debug, Clone, Default)]
struct MemoryState {
    /// Tables keyed by storage id.
    tables: BTreeMap<StorageId, MemoryTable>,
    /// Sync records keyed by storage id.
    records: BTreeMap<StorageId, SyncRecord>,
}

/// In-memory table store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTableStore {
    /// Store state protected by a mutex.
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryTableStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// Returns a copy of a table's rows, if the table exists.
    ///
    /// # Errors
    ///
    /// Returns [`DisposeError::Unavailable`] when the store mutex is poisoned.
    pub fn rows(&self, storage_id: &StorageId) -> Result<Option<Vec<JsonRow>>, DisposeError> {
        Ok(self.lock()?.tables.get(storage_id).map(|table| table.rows.clone()))
    }

    /// Locks the store state.
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, DisposeError> {
        self.state
            .lock()
            .map_err(|_| DisposeError::Unavailable("in-memory store mutex poisoned".to_string()))
    }

    /// Locks the store state for sync-status access.
    fn lock_status(&self) -> Result<MutexGuard<'_, MemoryState>, SyncStatusError> {
        self.state
            .lock()
            .map_err(|_| SyncStatusError::Db("in-memory store mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Executor
// ============================================================================

impl TxExecutor for InMemoryTableStore {
    fn dispose(&self, request: &DisposeRequest<'_>) -> Result<DisposeReport, DisposeError> {
        let translation = translate(request.tx, request.rule)?;
        let mut guard = self.lock()?;
        if translation.mode == AccessMode::Read {
            let rows = read_rows(&guard, request.tx, request.rule)?;
            translation.check.verify(0, &rows, request.verify_affected_rows)?;
            return Ok(DisposeReport {
                affected_rows: 0,
                rows,
                committed: false,
            });
        }
        let mut working = guard.clone();
        let affected = execute_write(&mut working, request.tx, request.rule)?;
        translation.check.verify(affected, &[], request.verify_affected_rows)?;
        let committed = request.mode == DisposeMode::Commit;
        if committed {
            *guard = working;
        }
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
        let rows = read_rows(&*self.lock()?, tx, rule)?;
        translation.check.verify(0, &rows, false)?;
        Ok(rows)
    }

    fn drop_table(&self, storage_id: &StorageId) -> Result<(), DisposeError> {
        self.lock()?
            .tables
            .remove(storage_id)
            .map(|_| ())
            .ok_or_else(|| DisposeError::DbExecution(format!("no such table: {storage_id}")))
    }
}

impl RowCounter for InMemoryTableStore {
    fn count_rows(
        &self,
        storage_id: &StorageId,
        condition: &ConditionTree,
    ) -> Result<u64, RuleError> {
        let state = self
            .state
            .lock()
            .map_err(|_| RuleError::Count("in-memory store mutex poisoned".to_string()))?;
        let Some(table) = state.tables.get(storage_id) else {
            return Ok(0);
        };
        let mut count = 0_u64;
        for row in &table.rows {
            if table
                .matches(condition.root(), row)
                .map_err(|err| RuleError::Count(err.to_string()))?
            {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl TableApplier for InMemoryTableStore {
    fn apply_and_record(&self, item: &SyncItem) -> Result<DisposeReport, DisposeError> {
        let translation = translate(&item.tx, &item.rule)?;
        let mut guard = self.lock()?;
        let mut working = guard.clone();
        let affected = if translation.mode == AccessMode::Write {
            let affected = execute_write(&mut working, &item.tx, &item.rule)?;
            translation.check.verify(affected, &[], item.verify_affected_rows)?;
            affected
        } else {
            0
        };
        let storage_id = &item.tx.storage_id;
        let record = working.records.get_mut(storage_id).ok_or_else(|| {
            DisposeError::DbExecution(format!("no sync record for table {storage_id}"))
        })?;
        record.ledger_seq = item.position.ledger_seq;
        record.tx_seq = item.position.tx_seq;
        record.ledger_hash = item.ledger_hash;
        record.tx_hash = item.tx.tx_hash;
        match &item.tx.operation {
            TableOperation::DropTable => record.deleted = true,
            TableOperation::RenameTable {
                new_name,
            } => record.table_name = new_name.clone(),
            _ => {}
        }
        *guard = working;
        Ok(DisposeReport {
            affected_rows: affected,
            rows: Vec::new(),
            committed: true,
        })
    }
}

// ============================================================================
// SECTION: Sync Status
// ============================================================================

impl SyncStatusStore for InMemoryTableStore {
    fn load_auto_sync(&self, chain_id: &str) -> Result<Vec<SyncRecord>, SyncStatusError> {
        Ok(self
            .lock_status()?
            .records
            .values()
            .filter(|record| record.auto_sync && !record.deleted && record.chain_id == chain_id)
            .cloned()
            .collect())
    }

    fn list_records(&self) -> Result<Vec<SyncRecord>, SyncStatusError> {
        Ok(self.lock_status()?.records.values().cloned().collect())
    }

    fn read_record(&self, storage_id: &StorageId) -> Result<Option<SyncRecord>, SyncStatusError> {
        Ok(self.lock_status()?.records.get(storage_id).cloned())
    }

    fn insert_record(&self, record: &SyncRecord) -> Result<(), SyncStatusError> {
        let mut state = self.lock_status()?;
        if state.records.contains_key(&record.storage_id) {
            return Err(SyncStatusError::Invalid(format!(
                "sync record already exists: {}",
                record.storage_id
            )));
        }
        state.records.insert(record.storage_id.clone(), record.clone());
        Ok(())
    }

    fn update_progress(
        &self,
        storage_id: &StorageId,
        progress: &SyncProgress,
    ) -> Result<(), SyncStatusError> {
        let mut state = self.lock_status()?;
        let record = record_mut(&mut state, storage_id)?;
        record.ledger_seq = progress.position.ledger_seq;
        record.tx_seq = progress.position.tx_seq;
        record.ledger_hash = progress.ledger_hash;
        record.tx_hash = progress.tx_hash;
        Ok(())
    }

    fn rename_record(
        &self,
        storage_id: &StorageId,
        new_name: &TableName,
    ) -> Result<(), SyncStatusError> {
        let mut state = self.lock_status()?;
        record_mut(&mut state, storage_id)?.table_name = new_name.clone();
        Ok(())
    }

    fn set_auto_sync(
        &self,
        storage_id: &StorageId,
        auto_sync: bool,
    ) -> Result<(), SyncStatusError> {
        let mut state = self.lock_status()?;
        record_mut(&mut state, storage_id)?.auto_sync = auto_sync;
        Ok(())
    }

    fn mark_deleted(&self, storage_id: &StorageId) -> Result<(), SyncStatusError> {
        let mut state = self.lock_status()?;
        record_mut(&mut state, storage_id)?.deleted = true;
        Ok(())
    }

    fn find_storage_id(
        &self,
        owner: &AccountId,
        table_name: &TableName,
    ) -> Result<Option<StorageId>, SyncStatusError> {
        Ok(self
            .lock_status()?
            .records
            .values()
            .find(|record| {
                !record.deleted && record.owner == *owner && record.table_name == *table_name
            })
            .map(|record| record.storage_id.clone()))
    }
}

/// Returns a mutable record or `NotFound`.
fn record_mut<'a>(
    state: &'a mut MemoryState,
    storage_id: &StorageId,
) -> Result<&'a mut SyncRecord, SyncStatusError> {
    state
        .records
        .get_mut(storage_id)
        .ok_or_else(|| SyncStatusError::NotFound(storage_id.to_string()))
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Applies a write operation to the working state. Returns affected rows.
fn execute_write(
    state: &mut MemoryState,
    tx: &TableTx,
    rule: &RuleOutcome,
) -> Result<u64, DisposeError> {
    let storage_id = &tx.storage_id;
    match &tx.operation {
        TableOperation::CreateTable {
            columns, ..
        } => {
            if state.tables.contains_key(storage_id) {
                return Err(DisposeError::DbExecution(format!("table {storage_id} already exists")));
            }
            state.tables.insert(
                storage_id.clone(),
                MemoryTable {
                    columns: columns.clone(),
                    rows: Vec::new(),
                },
            );
            Ok(0)
        }
        TableOperation::DropTable => {
            state
                .tables
                .remove(storage_id)
                .ok_or_else(|| DisposeError::DbExecution(format!("no such table: {storage_id}")))?;
            Ok(0)
        }
        TableOperation::RenameTable {
            ..
        } => Ok(0),
        TableOperation::Insert {
            rows,
        } => {
            let rows = rule.rows.as_deref().unwrap_or(rows);
            let table = table_mut(state, storage_id)?;
            for row in rows {
                let stored = table.build_row(row)?;
                table.rows.push(stored);
            }
            table.check_constraints()?;
            Ok(u64::try_from(rows.len()).unwrap_or(u64::MAX))
        }
        TableOperation::Update {
            set, ..
        } => {
            let tree = parse_condition(rule.condition.as_ref())?;
            let table = table_mut(state, storage_id)?;
            let mut assignments = Vec::with_capacity(set.len());
            for (field, literal) in set {
                let column = table.column(field)?;
                assignments.push((field.clone(), stored_cell(column, literal)?));
            }
            let mut affected = 0_u64;
            for index in 0..table.rows.len() {
                if table.row_matches(tree.as_ref(), index)? {
                    if let Some(row) = table.rows.get_mut(index) {
                        for (field, value) in &assignments {
                            row.insert(field.clone(), value.clone());
                        }
                    }
                    affected += 1;
                }
            }
            table.check_constraints()?;
            Ok(affected)
        }
        TableOperation::Delete {
            ..
        } => {
            let tree = parse_condition(rule.condition.as_ref())?;
            let table = table_mut(state, storage_id)?;
            let mut kept = Vec::with_capacity(table.rows.len());
            let mut affected = 0_u64;
            for index in 0..table.rows.len() {
                if table.row_matches(tree.as_ref(), index)? {
                    affected += 1;
                } else if let Some(row) = table.rows.get(index) {
                    kept.push(row.clone());
                }
            }
            table.rows = kept;
            Ok(affected)
        }
        TableOperation::Select {
            ..
        }
        | TableOperation::Assert {
            ..
        } => Err(DisposeError::Invalid(format!(
            "{} is not a write operation",
            tx.operation.label()
        ))),
    }
}

/// Runs a read operation against the state.
fn read_rows(
    state: &MemoryState,
    tx: &TableTx,
    rule: &RuleOutcome,
) -> Result<Vec<JsonRow>, DisposeError> {
    let table = state
        .tables
        .get(&tx.storage_id)
        .ok_or_else(|| DisposeError::DbExecution(format!("no such table: {}", tx.storage_id)))?;
    let tree = parse_condition(rule.condition.as_ref())?;
    let (fields, order, limit, offset) = match &tx.operation {
        TableOperation::Select {
            fields,
            order,
            limit,
            offset,
            ..
        } => (projection(fields, rule), order.as_slice(), *limit, *offset),
        TableOperation::Assert {
            fields,
            expected,
            ..
        } => {
            let mut projected = projection(fields, rule);
            if projected.is_empty() {
                let keys: BTreeSet<&String> = expected.iter().flat_map(JsonRow::keys).collect();
                projected = keys.into_iter().cloned().collect();
            }
            (projected, [].as_slice(), None, None)
        }
        _ => {
            return Err(DisposeError::Invalid(format!(
                "{} is not a read operation",
                tx.operation.label()
            )));
        }
    };
    for field in &fields {
        table.column(field)?;
    }
    let mut matched = Vec::new();
    for index in 0..table.rows.len() {
        if table.row_matches(tree.as_ref(), index)?
            && let Some(row) = table.rows.get(index)
        {
            matched.push(row);
        }
    }
    table.sort_rows(&mut matched, order)?;
    let skip = usize::try_from(offset.unwrap_or(0)).unwrap_or(usize::MAX);
    let take = limit.map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));
    Ok(matched
        .into_iter()
        .skip(skip)
        .take(take)
        .map(|row| project_row(row, &fields))
        .collect())
}

/// Returns the requested projection after rule overrides.
fn projection(fields: &[String], rule: &RuleOutcome) -> Vec<String> {
    if fields.is_empty()
        && let Some(projection) = &rule.projection
    {
        return projection.clone();
    }
    fields.to_vec()
}

/// Projects a row onto the given fields; empty projects every column.
fn project_row(row: &JsonRow, fields: &[String]) -> JsonRow {
    if fields.is_empty() {
        return row.clone();
    }
    fields
        .iter()
        .map(|field| (field.clone(), row.get(field).cloned().unwrap_or(JsonValue::Null)))
        .collect()
}

/// Parses an optional condition.
fn parse_condition(condition: Option<&JsonValue>) -> Result<Option<ConditionTree>, DisposeError> {
    condition
        .map(ConditionTree::create_root)
        .transpose()
        .map_err(|err| DisposeError::Parse(err.to_string()))
}

/// Returns a mutable table or a database error.
fn table_mut<'a>(
    state: &'a mut MemoryState,
    storage_id: &StorageId,
) -> Result<&'a mut MemoryTable, DisposeError> {
    state
        .tables
        .get_mut(storage_id)
        .ok_or_else(|| DisposeError::DbExecution(format!("no such table: {storage_id}")))
}

// ============================================================================
// SECTION: Table Helpers
// ============================================================================

impl MemoryTable {
    /// Finds a column by name.
    fn column(&self, field: &str) -> Result<&ColumnSpec, DisposeError> {
        self.columns
            .iter()
            .find(|column| column.field == field)
            .ok_or_else(|| DisposeError::DbExecution(format!("no such column: {field}")))
    }

    /// Builds a stored row with every column present.
    fn build_row(&self, row: &JsonRow) -> Result<JsonRow, DisposeError> {
        for field in row.keys() {
            self.column(field)?;
        }
        let mut stored = JsonRow::new();
        for column in &self.columns {
            let literal =
                row.get(&column.field).or(column.default.as_ref()).unwrap_or(&JsonValue::Null);
            stored.insert(column.field.clone(), stored_cell(column, literal)?);
        }
        Ok(stored)
    }

    /// Enforces unique and primary-key constraints over all rows.
    fn check_constraints(&self) -> Result<(), DisposeError> {
        for column in self.columns.iter().filter(|column| column.unique) {
            let mut seen = BTreeSet::new();
            for row in &self.rows {
                if let Some(value) = row.get(&column.field).filter(|value| !value.is_null())
                    && !seen.insert(value.to_string())
                {
                    return Err(DisposeError::DbExecution(format!(
                        "UNIQUE constraint failed: {}",
                        column.field
                    )));
                }
            }
        }
        let key: Vec<&str> = self
            .columns
            .iter()
            .filter(|column| column.primary_key)
            .map(|column| column.field.as_str())
            .collect();
        if key.is_empty() {
            return Ok(());
        }
        let mut seen = BTreeSet::new();
        for row in &self.rows {
            let tuple: Vec<String> = key
                .iter()
                .map(|field| row.get(*field).map_or_else(String::new, JsonValue::to_string))
                .collect();
            if !seen.insert(tuple) {
                return Err(DisposeError::DbExecution(format!(
                    "UNIQUE constraint failed: PRIMARY KEY ({})",
                    key.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Evaluates an optional condition against a row by index.
    fn row_matches(
        &self,
        tree: Option<&ConditionTree>,
        index: usize,
    ) -> Result<bool, DisposeError> {
        match (tree, self.rows.get(index)) {
            (None, Some(_)) => Ok(true),
            (Some(tree), Some(row)) => self.matches(tree.root(), row),
            (_, None) => Ok(false),
        }
    }

    /// Evaluates a condition node against a row.
    fn matches(&self, node: &ConditionNode, row: &JsonRow) -> Result<bool, DisposeError> {
        match node {
            ConditionNode::And(children) => {
                for child in children {
                    if !self.matches(child, row)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            ConditionNode::Or(children) => {
                for child in children {
                    if self.matches(child, row)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            ConditionNode::Leaf(leaf) => self.leaf_matches(leaf, row),
        }
    }

    /// Evaluates one leaf; NULL cells never match.
    fn leaf_matches(&self, leaf: &ConditionLeaf, row: &JsonRow) -> Result<bool, DisposeError> {
        let column = self.column(leaf.field())?;
        let Some(cell) = cell_value(column, row)? else {
            return Ok(false);
        };
        if leaf.op() == ConditionOp::Like {
            return match (&cell, leaf.values().first()) {
                (Value::Str(_, text), Some(Value::Str(_, pattern))) => {
                    Ok(like_matches(pattern, text))
                }
                _ => Err(DisposeError::TypeMismatch(format!(
                    "LIKE requires a string column: {}",
                    leaf.field()
                ))),
            };
        }
        let mut literals = Vec::with_capacity(leaf.values().len());
        for value in leaf.values() {
            literals.push(column.coerce(&value.to_json())?);
        }
        match leaf.op() {
            ConditionOp::In => {
                for literal in &literals {
                    if cell.compare(CompareOp::Eq, literal)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            ConditionOp::Between => match literals.as_slice() {
                [low, high] => {
                    Ok(cell.compare(CompareOp::Ge, low)? && cell.compare(CompareOp::Le, high)?)
                }
                _ => Err(DisposeError::Bind(format!("{} BETWEEN expects 2 values", leaf.field()))),
            },
            op => match (op.compare_op(), literals.first()) {
                (Some(compare), Some(literal)) => Ok(cell.compare(compare, literal)?),
                _ => Err(DisposeError::Bind(format!(
                    "{} {} expects 1 value",
                    leaf.field(),
                    op.sql()
                ))),
            },
        }
    }

    /// Sorts matched rows by the ordering terms; NULLs sort first.
    fn sort_rows(&self, rows: &mut [&JsonRow], order: &[OrderSpec]) -> Result<(), DisposeError> {
        if order.is_empty() {
            return Ok(());
        }
        let mut columns = Vec::with_capacity(order.len());
        for term in order {
            columns.push((self.column(&term.field)?, term.descending));
        }
        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            let mut key = Vec::with_capacity(columns.len());
            for (column, _) in &columns {
                key.push(cell_value(column, row)?);
            }
            keyed.push((key, *row));
        }
        keyed.sort_by(|(left, _), (right, _)| {
            for ((left, right), (_, descending)) in left.iter().zip(right).zip(&columns) {
                let ordering = match (left, right) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (Some(left), Some(right)) => left.try_cmp(right).unwrap_or(Ordering::Equal),
                };
                let ordering = if *descending { ordering.reverse() } else { ordering };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        for (slot, (_, row)) in rows.iter_mut().zip(keyed) {
            *slot = row;
        }
        Ok(())
    }
}

/// Converts a literal to its stored JSON form for a column.
fn stored_cell(column: &ColumnSpec, literal: &JsonValue) -> Result<JsonValue, DisposeError> {
    if literal.is_null() {
        if column.not_null || column.primary_key {
            return Err(DisposeError::DbExecution(format!(
                "NOT NULL constraint failed: {}",
                column.field
            )));
        }
        return Ok(JsonValue::Null);
    }
    Ok(column.coerce(literal)?.to_json())
}

/// Reads a stored cell as a typed value; `None` for NULL.
fn cell_value(column: &ColumnSpec, row: &JsonRow) -> Result<Option<Value>, DisposeError> {
    match row.get(&column.field) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(stored) => Ok(Some(column.coerce(stored)?)),
    }
}

/// SQL `LIKE` with `%` and `_` wildcards, ASCII case-insensitive.
fn like_matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();
    let (mut p, mut t) = (0_usize, 0_usize);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '_' || Some(&c) == text.get(t) => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern.get(p..).is_none_or(|rest| rest.iter().all(|c| *c == '%'))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::*;

    #[test]
    fn like_handles_wildcards() {
        assert!(like_matches("a%", "abc"));
        assert!(like_matches("%b%", "abc"));
        assert!(like_matches("a_c", "ABC"));
        assert!(like_matches("%", ""));
        assert!(!like_matches("a_", "abc"));
        assert!(!like_matches("%d", "abc"));
        assert!(like_matches("%c%c", "acbc"));
    }
}
