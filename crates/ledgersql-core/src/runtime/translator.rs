// crates/ledgersql-core/src/runtime/translator.rs
// ============================================================================
// Module: LedgerSQL Translator
// Description: Translation of table operations into parameterized statements.
// Purpose: Produce backend-neutral SQL plus the checks the store must enforce.
// Dependencies: bigdecimal, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`translate`] turns a [`TableTx`] and its approved [`RuleOutcome`] into a
//! [`Translation`]: the statements to run, whether they read or write, and the
//! [`ResultCheck`] the store applies after execution. The translator never
//! touches a database; callers own the transaction boundary.
//!
//! Identifiers (storage ids, column names) are validated before they are
//! interpolated; every literal from the ledger is bound as a parameter except
//! column defaults, which DDL cannot bind and which are rendered as escaped
//! literals.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::core::condition::ConditionError;
use crate::core::condition::ConditionTree;
use crate::core::condition::MAX_FIELD_NAME_LENGTH;
use crate::core::condition::PlaceholderAllocator;
use crate::core::condition::StatementBinder;
use crate::core::identifiers::StorageId;
use crate::core::identifiers::validate_sql_identifier;
use crate::core::rule::RuleOutcome;
use crate::core::table::ColumnSpec;
use crate::core::table::ColumnType;
use crate::core::table::DEFAULT_STRING_LENGTH;
use crate::core::table::IndexSpec;
use crate::core::table::JsonRow;
use crate::core::table::OrderSpec;
use crate::core::table::TableOperation;
use crate::core::table::TableTx;
use crate::core::value::MAX_DECIMAL_LENGTH;
use crate::core::value::Value;
use crate::interfaces::DisposeError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum rows accepted in one insert batch.
pub const MAX_INSERT_ROWS: usize = 1_000;
/// Maximum columns accepted in one table.
pub const MAX_COLUMNS: usize = 256;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Translation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// A condition failed to parse.
    #[error("translate parse error: {0}")]
    Parse(String),
    /// Condition values did not match operator arity.
    #[error("translate bind error: {0}")]
    Bind(String),
    /// The operation is structurally invalid.
    #[error("invalid operation: {0}")]
    Invalid(String),
}

impl From<ConditionError> for TranslateError {
    fn from(error: ConditionError) -> Self {
        match error {
            ConditionError::Parse(message) => Self::Parse(message),
            ConditionError::Bind(message) => Self::Bind(message),
        }
    }
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// Parameterized statement ready for a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    /// SQL text with `:name` placeholders.
    pub sql: String,
    /// Bound parameters in emission order.
    pub params: Vec<(String, Value)>,
}

impl SqlStatement {
    /// Creates a statement without parameters.
    #[must_use]
    pub fn plain(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

/// Whether a translation reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Statements modify schema or data.
    Write,
    /// Statements only read.
    Read,
}

/// Post-execution check applied by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultCheck {
    /// Nothing to verify.
    None,
    /// The last statement's row count must equal the declared count when
    /// verification is requested.
    AffectedRows {
        /// Declared row count, if the transaction carried one.
        declared: Option<u64>,
    },
    /// The query result must equal the expected rows.
    MatchRows {
        /// Expected rows in order.
        expected: Vec<JsonRow>,
    },
}

impl ResultCheck {
    /// Verifies an execution result against this check.
    ///
    /// `affected` is the row count of the last write statement and `rows` the
    /// rows returned by a read.
    ///
    /// # Errors
    ///
    /// Returns [`DisposeError::AffectedRowMismatch`] or
    /// [`DisposeError::AssertMismatch`] when the result differs.
    pub fn verify(
        &self,
        affected: u64,
        rows: &[JsonRow],
        verify_affected_rows: bool,
    ) -> Result<(), DisposeError> {
        match self {
            Self::None => Ok(()),
            Self::AffectedRows {
                declared,
            } => match declared {
                Some(declared) if verify_affected_rows && *declared != affected => {
                    Err(DisposeError::AffectedRowMismatch {
                        declared: *declared,
                        actual: affected,
                    })
                }
                _ => Ok(()),
            },
            Self::MatchRows {
                expected,
            } => match_expected_rows(expected, rows).map_err(DisposeError::from),
        }
    }
}

/// Statements plus the checks for one logical operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// Statements to execute in order inside one transaction.
    pub statements: Vec<SqlStatement>,
    /// Access mode.
    pub mode: AccessMode,
    /// Result verification.
    pub check: ResultCheck,
}

/// First difference between expected and actual rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "assert mismatch at row {row}{}: expected {expected}, found {actual}",
    .field.as_ref().map(|name| format!(" field {name}")).unwrap_or_default()
)]
pub struct RowMismatch {
    /// Zero-based row index.
    pub row: usize,
    /// Differing field, or `None` when the row counts differ.
    pub field: Option<String>,
    /// Expected rendering.
    pub expected: String,
    /// Actual rendering.
    pub actual: String,
}

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Translates a transaction whose rule evaluation already succeeded.
///
/// # Errors
///
/// Returns [`TranslateError`] when the operation is malformed, a condition
/// fails to parse, or bound values do not match operator arity.
pub fn translate(tx: &TableTx, outcome: &RuleOutcome) -> Result<Translation, TranslateError> {
    let table = &tx.storage_id;
    match &tx.operation {
        TableOperation::CreateTable {
            columns,
            indexes,
        } => Ok(Translation {
            statements: create_table_statements(table, columns, indexes)?,
            mode: AccessMode::Write,
            check: ResultCheck::None,
        }),
        TableOperation::DropTable => Ok(Translation {
            statements: vec![SqlStatement::plain(format!("DROP TABLE {table}"))],
            mode: AccessMode::Write,
            check: ResultCheck::None,
        }),
        TableOperation::RenameTable {
            ..
        } => Ok(Translation {
            statements: Vec::new(),
            mode: AccessMode::Write,
            check: ResultCheck::None,
        }),
        TableOperation::Insert {
            rows,
        } => {
            let rows = outcome.rows.as_deref().unwrap_or(rows);
            Ok(Translation {
                statements: vec![insert_statement(table, rows)?],
                mode: AccessMode::Write,
                check: ResultCheck::None,
            })
        }
        TableOperation::Update {
            set, ..
        } => Ok(Translation {
            statements: vec![update_statement(table, set, outcome.condition.as_ref())?],
            mode: AccessMode::Write,
            check: ResultCheck::AffectedRows {
                declared: tx.affected_rows,
            },
        }),
        TableOperation::Delete {
            ..
        } => Ok(Translation {
            statements: vec![delete_statement(table, outcome.condition.as_ref())?],
            mode: AccessMode::Write,
            check: ResultCheck::AffectedRows {
                declared: tx.affected_rows,
            },
        }),
        TableOperation::Select {
            fields,
            order,
            limit,
            offset,
            ..
        } => {
            let projection = effective_projection(fields, outcome);
            Ok(Translation {
                statements: vec![select_statement(
                    table,
                    &projection,
                    outcome.condition.as_ref(),
                    order,
                    *limit,
                    *offset,
                )?],
                mode: AccessMode::Read,
                check: ResultCheck::None,
            })
        }
        TableOperation::Assert {
            fields,
            expected,
            ..
        } => {
            let mut projection = effective_projection(fields, outcome);
            if projection.is_empty() {
                let keys: BTreeSet<&String> = expected.iter().flat_map(JsonRow::keys).collect();
                projection = keys.into_iter().cloned().collect();
            }
            Ok(Translation {
                statements: vec![select_statement(
                    table,
                    &projection,
                    outcome.condition.as_ref(),
                    &[],
                    None,
                    None,
                )?],
                mode: AccessMode::Read,
                check: ResultCheck::MatchRows {
                    expected: expected.clone(),
                },
            })
        }
    }
}

/// Builds `SELECT COUNT(*)` for a condition, used for quota checks.
///
/// # Errors
///
/// Returns [`TranslateError::Bind`] when condition values do not bind.
pub fn count_statement(
    table: &StorageId,
    condition: &ConditionTree,
) -> Result<SqlStatement, TranslateError> {
    let fragment = condition.to_sql_text();
    let mut params: Vec<(String, Value)> = Vec::new();
    condition.bind_values(&mut params)?;
    Ok(SqlStatement {
        sql: format!("SELECT COUNT(*) FROM {table} WHERE {}", fragment.text),
        params,
    })
}

/// Returns the projection after rule overrides.
fn effective_projection(fields: &[String], outcome: &RuleOutcome) -> Vec<String> {
    if fields.is_empty()
        && let Some(projection) = &outcome.projection
    {
        return projection.clone();
    }
    fields.to_vec()
}

// ============================================================================
// SECTION: DDL
// ============================================================================

/// Builds `CREATE TABLE` plus index statements.
fn create_table_statements(
    table: &StorageId,
    columns: &[ColumnSpec],
    indexes: &[IndexSpec],
) -> Result<Vec<SqlStatement>, TranslateError> {
    if columns.is_empty() {
        return Err(invalid("create_table requires at least one column"));
    }
    if columns.len() > MAX_COLUMNS {
        return Err(invalid("create_table exceeds max column count"));
    }
    let mut seen = BTreeSet::new();
    let mut definitions = Vec::with_capacity(columns.len() + 1);
    let mut primary = Vec::new();
    for column in columns {
        validate_field(&column.field)?;
        if !seen.insert(column.field.as_str()) {
            return Err(invalid(&format!("duplicate column {}", column.field)));
        }
        definitions.push(column_definition(column)?);
        if column.primary_key {
            primary.push(column.field.as_str());
        }
    }
    if !primary.is_empty() {
        definitions.push(format!("PRIMARY KEY ({})", primary.join(", ")));
    }
    let mut statements =
        vec![SqlStatement::plain(format!("CREATE TABLE {table} ({})", definitions.join(", ")))];
    for column in columns.iter().filter(|column| column.index) {
        statements.push(SqlStatement::plain(format!(
            "CREATE INDEX {table}_idx_{field} ON {table} ({field})",
            field = column.field
        )));
    }
    let mut index_names = BTreeSet::new();
    for index in indexes {
        validate_field(&index.name)?;
        if !index_names.insert(index.name.as_str()) {
            return Err(invalid(&format!("duplicate index {}", index.name)));
        }
        if index.fields.is_empty() {
            return Err(invalid(&format!("index {} has no fields", index.name)));
        }
        if let Some(missing) = index.fields.iter().find(|field| !seen.contains(field.as_str())) {
            return Err(invalid(&format!(
                "index {} references unknown column {missing}",
                index.name
            )));
        }
        statements.push(SqlStatement::plain(format!(
            "CREATE {}INDEX {table}_{} ON {table} ({})",
            if index.unique { "UNIQUE " } else { "" },
            index.name,
            index.fields.join(", ")
        )));
    }
    Ok(statements)
}

/// Renders one column definition.
fn column_definition(column: &ColumnSpec) -> Result<String, TranslateError> {
    let sql_type = match column.column_type {
        ColumnType::Int => "INT".to_string(),
        ColumnType::Uint => "INT UNSIGNED".to_string(),
        ColumnType::Bigint => "BIGINT".to_string(),
        ColumnType::Float => "FLOAT".to_string(),
        ColumnType::Double => "DOUBLE".to_string(),
        ColumnType::Decimal => {
            let (Some(length), Some(scale)) = (column.length, column.scale) else {
                return Err(invalid(&format!(
                    "decimal column {} requires length and scale",
                    column.field
                )));
            };
            if length == 0 || length > MAX_DECIMAL_LENGTH || scale > length {
                return Err(invalid(&format!(
                    "decimal column {} has invalid precision ({length},{scale})",
                    column.field
                )));
            }
            format!("DECIMAL({length},{scale})")
        }
        ColumnType::Varchar => {
            format!("VARCHAR({})", column.length.unwrap_or(DEFAULT_STRING_LENGTH))
        }
        ColumnType::Char => format!("CHAR({})", column.length.unwrap_or(DEFAULT_STRING_LENGTH)),
        ColumnType::Text => "TEXT".to_string(),
        ColumnType::Blob => "BLOB".to_string(),
        ColumnType::Date => "DATE".to_string(),
        ColumnType::Datetime => "DATETIME".to_string(),
    };
    let mut definition = format!("{} {sql_type}", column.field);
    if column.not_null {
        definition.push_str(" NOT NULL");
    }
    if column.unique && !column.primary_key {
        definition.push_str(" UNIQUE");
    }
    if let Some(default) = &column.default {
        column.coerce(default).map_err(|err| {
            invalid(&format!("default for column {}: {err}", column.field))
        })?;
        definition.push_str(&format!(" DEFAULT {}", render_literal(default)?));
    }
    Ok(definition)
}

/// Renders a JSON literal for DDL defaults.
fn render_literal(value: &JsonValue) -> Result<String, TranslateError> {
    match value {
        JsonValue::Number(number) => Ok(number.to_string()),
        JsonValue::Bool(flag) => Ok(if *flag { "1" } else { "0" }.to_string()),
        JsonValue::String(text) => Ok(format!("'{}'", text.replace('\'', "''"))),
        JsonValue::Null => Ok("NULL".to_string()),
        JsonValue::Array(_) | JsonValue::Object(_) => {
            Err(invalid("column default must be a scalar literal"))
        }
    }
}

// ============================================================================
// SECTION: DML
// ============================================================================

/// Builds a multi-row `INSERT` with column order fixed by the first row.
fn insert_statement(table: &StorageId, rows: &[JsonRow]) -> Result<SqlStatement, TranslateError> {
    let Some(first) = rows.first() else {
        return Err(invalid("insert requires at least one row"));
    };
    if rows.len() > MAX_INSERT_ROWS {
        return Err(invalid("insert exceeds max batch size"));
    }
    if first.is_empty() {
        return Err(invalid("insert row must have at least one field"));
    }
    let columns: Vec<&String> = first.keys().collect();
    for column in &columns {
        validate_field(column)?;
    }
    let mut allocator = PlaceholderAllocator::default();
    let mut params: Vec<(String, Value)> = Vec::with_capacity(rows.len() * columns.len());
    let mut tuples = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(invalid(&format!(
                "insert row {index} does not match the first row's fields"
            )));
        }
        let mut slots = Vec::with_capacity(columns.len());
        for column in &columns {
            let Some(literal) = row.get(column.as_str()) else {
                return Err(invalid(&format!("insert row {index} is missing field {column}")));
            };
            let placeholder = allocator.allocate(column);
            params.bind(&placeholder, &literal_value(column, literal)?)?;
            slots.push(placeholder);
        }
        tuples.push(format!("({})", slots.join(", ")));
    }
    let column_list: Vec<&str> = columns.iter().map(|column| column.as_str()).collect();
    Ok(SqlStatement {
        sql: format!(
            "INSERT INTO {table} ({}) VALUES {}",
            column_list.join(", "),
            tuples.join(", ")
        ),
        params,
    })
}

/// Builds `UPDATE ... SET ... [WHERE ...]`.
fn update_statement(
    table: &StorageId,
    set: &JsonRow,
    condition: Option<&JsonValue>,
) -> Result<SqlStatement, TranslateError> {
    if set.is_empty() {
        return Err(invalid("update requires at least one assignment"));
    }
    let tree = condition.map(ConditionTree::create_root).transpose()?;
    let mut allocator =
        PlaceholderAllocator::starting_at(
            tree.as_ref().map_or(0, ConditionTree::placeholder_count),
        );
    let mut params: Vec<(String, Value)> = Vec::new();
    let mut assignments = Vec::with_capacity(set.len());
    for (field, literal) in set {
        validate_field(field)?;
        let placeholder = allocator.allocate(field);
        params.bind(&placeholder, &literal_value(field, literal)?)?;
        assignments.push(format!("{field} = {placeholder}"));
    }
    let mut sql = format!("UPDATE {table} SET {}", assignments.join(", "));
    append_where(&mut sql, &mut params, tree.as_ref())?;
    Ok(SqlStatement {
        sql,
        params,
    })
}

/// Builds `DELETE FROM ... [WHERE ...]`.
fn delete_statement(
    table: &StorageId,
    condition: Option<&JsonValue>,
) -> Result<SqlStatement, TranslateError> {
    let tree = condition.map(ConditionTree::create_root).transpose()?;
    let mut sql = format!("DELETE FROM {table}");
    let mut params = Vec::new();
    append_where(&mut sql, &mut params, tree.as_ref())?;
    Ok(SqlStatement {
        sql,
        params,
    })
}

/// Builds a read-only `SELECT`.
fn select_statement(
    table: &StorageId,
    fields: &[String],
    condition: Option<&JsonValue>,
    order: &[OrderSpec],
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<SqlStatement, TranslateError> {
    for field in fields {
        validate_field(field)?;
    }
    let projection = if fields.is_empty() { "*".to_string() } else { fields.join(", ") };
    let tree = condition.map(ConditionTree::create_root).transpose()?;
    let mut sql = format!("SELECT {projection} FROM {table}");
    let mut params = Vec::new();
    append_where(&mut sql, &mut params, tree.as_ref())?;
    if !order.is_empty() {
        let mut terms = Vec::with_capacity(order.len());
        for term in order {
            validate_field(&term.field)?;
            terms.push(format!("{} {}", term.field, if term.descending { "DESC" } else { "ASC" }));
        }
        sql.push_str(&format!(" ORDER BY {}", terms.join(", ")));
    }
    match (limit, offset) {
        (Some(limit), Some(offset)) => {
            sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
        }
        (Some(limit), None) => {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        (None, Some(offset)) => {
            sql.push_str(&format!(" LIMIT -1 OFFSET {offset}"));
        }
        (None, None) => {}
    }
    Ok(SqlStatement {
        sql,
        params,
    })
}

/// Appends a rendered `WHERE` clause and its bindings.
fn append_where(
    sql: &mut String,
    params: &mut Vec<(String, Value)>,
    tree: Option<&ConditionTree>,
) -> Result<(), TranslateError> {
    if let Some(tree) = tree {
        let fragment = tree.to_sql_text();
        tree.bind_values(params)?;
        sql.push_str(&format!(" WHERE {}", fragment.text));
    }
    Ok(())
}

// ============================================================================
// SECTION: Result Matching
// ============================================================================

/// Compares expected rows with actual rows field by field.
///
/// Only fields present in an expected row are compared. Numbers compare by
/// decimal value, and numeric strings compare equal to the same number.
///
/// # Errors
///
/// Returns the first [`RowMismatch`] found.
pub fn match_expected_rows(expected: &[JsonRow], actual: &[JsonRow]) -> Result<(), RowMismatch> {
    for (row, expected_row) in expected.iter().enumerate() {
        let Some(actual_row) = actual.get(row) else {
            return Err(RowMismatch {
                row,
                field: None,
                expected: format!("{} rows", expected.len()),
                actual: format!("{} rows", actual.len()),
            });
        };
        for (field, expected_value) in expected_row {
            let actual_value = actual_row.get(field).unwrap_or(&JsonValue::Null);
            if !json_values_match(expected_value, actual_value) {
                return Err(RowMismatch {
                    row,
                    field: Some(field.clone()),
                    expected: expected_value.to_string(),
                    actual: actual_value.to_string(),
                });
            }
        }
    }
    if actual.len() > expected.len() {
        return Err(RowMismatch {
            row: expected.len(),
            field: None,
            expected: format!("{} rows", expected.len()),
            actual: format!("{} rows", actual.len()),
        });
    }
    Ok(())
}

/// Compares two JSON scalars with numeric normalization.
fn json_values_match(expected: &JsonValue, actual: &JsonValue) -> bool {
    match (numeric(expected), numeric(actual)) {
        (Some(left), Some(right)) => left == right,
        _ => expected == actual,
    }
}

/// Parses a JSON number or numeric string into a decimal.
fn numeric(value: &JsonValue) -> Option<BigDecimal> {
    match value {
        JsonValue::Number(number) => BigDecimal::from_str(&number.to_string()).ok(),
        JsonValue::String(text) if !text.trim().is_empty() => {
            BigDecimal::from_str(text.trim()).ok()
        }
        _ => None,
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates a column or index identifier.
fn validate_field(field: &str) -> Result<(), TranslateError> {
    validate_sql_identifier("field name", field, MAX_FIELD_NAME_LENGTH)
        .map_err(|err| invalid(&err.to_string()))
}

/// Converts a row literal into a bound value; `null` binds SQL NULL and is
/// left to the column's constraints.
fn literal_value(field: &str, literal: &JsonValue) -> Result<Value, TranslateError> {
    if literal.is_null() {
        return Ok(Value::Unknown);
    }
    Value::from_json(literal).map_err(|err| invalid(&format!("field {field}: {err}")))
}

/// Builds an invalid-operation error.
fn invalid(message: &str) -> TranslateError {
    TranslateError::Invalid(message.to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use super::*;
    use crate::core::identifiers::AccountId;
    use crate::core::identifiers::Hash256;
    use crate::core::identifiers::TableName;
    use crate::core::table::TxKind;

    fn table_tx(operation: TableOperation) -> TableTx {
        let owner = AccountId::new("owner").unwrap();
        let table_name = TableName::new("people").unwrap();
        TableTx {
            tx_hash: Hash256::ZERO,
            kind: TxKind::SqlStatement,
            account: owner.clone(),
            storage_id: StorageId::derive(&owner, &table_name, 1),
            owner,
            table_name,
            operation,
            affected_rows: Some(1),
            check: None,
        }
    }

    fn row(value: JsonValue) -> JsonRow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn create_table_requires_decimal_precision() {
        let tx = table_tx(serde_json::from_value(json!({
            "op": "create_table",
            "columns": [{"field": "price", "type": "decimal"}]
        })).unwrap());
        let err = translate(&tx, &RuleOutcome::passthrough(&tx.operation)).unwrap_err();
        assert!(matches!(
            err,
            TranslateError::Invalid(message) if message.contains("length and scale")
        ));
    }

    #[test]
    fn create_table_renders_columns_and_indexes() {
        let tx = table_tx(serde_json::from_value(json!({
            "op": "create_table",
            "columns": [
                {"field": "id", "type": "int", "PK": true},
                {"field": "name", "type": "varchar", "length": 32, "index": true}
            ],
            "indexes": [{"name": "by_both", "fields": ["id", "name"], "unique": true}]
        })).unwrap());
        let translation = translate(&tx, &RuleOutcome::passthrough(&tx.operation)).unwrap();
        let table = tx.storage_id.as_str();
        assert_eq!(
            translation.statements[0].sql,
            format!("CREATE TABLE {table} (id INT, name VARCHAR(32), PRIMARY KEY (id))")
        );
        assert_eq!(
            translation.statements[1].sql,
            format!("CREATE INDEX {table}_idx_name ON {table} (name)")
        );
        assert_eq!(
            translation.statements[2].sql,
            format!("CREATE UNIQUE INDEX {table}_by_both ON {table} (id, name)")
        );
    }

    #[test]
    fn insert_batch_requires_homogeneous_rows() {
        let tx = table_tx(TableOperation::Insert {
            rows: vec![row(json!({"id": 1, "name": "a"})), row(json!({"id": 2}))],
        });
        assert!(translate(&tx, &RuleOutcome::passthrough(&tx.operation)).is_err());
    }

    #[test]
    fn insert_batch_binds_every_value() {
        let tx = table_tx(TableOperation::Insert {
            rows: vec![row(json!({"id": 1, "name": "a"})), row(json!({"id": 2, "name": "b"}))],
        });
        let translation = translate(&tx, &RuleOutcome::passthrough(&tx.operation)).unwrap();
        let statement = &translation.statements[0];
        assert!(statement.sql.ends_with("(id, name) VALUES (:id_0, :name_1), (:id_2, :name_3)"));
        assert_eq!(statement.params.len(), 4);
        assert_eq!(statement.params[3], (":name_3".to_string(), Value::text("b")));
    }

    #[test]
    fn null_row_literals_bind_sql_null() {
        let tx = table_tx(TableOperation::Insert {
            rows: vec![row(json!({"id": 1, "name": null}))],
        });
        let translation = translate(&tx, &RuleOutcome::passthrough(&tx.operation)).unwrap();
        assert_eq!(translation.statements[0].params[1], (":name_1".to_string(), Value::Unknown));

        let tx = table_tx(TableOperation::Update {
            set: row(json!({"name": null})),
            condition: Some(json!({"id": 1})),
        });
        let translation = translate(&tx, &RuleOutcome::passthrough(&tx.operation)).unwrap();
        assert_eq!(translation.statements[0].params[0], (":name_1".to_string(), Value::Unknown));
    }

    #[test]
    fn update_numbers_set_params_after_condition() {
        let tx = table_tx(TableOperation::Update {
            set: row(json!({"name": "b"})),
            condition: Some(json!({"id": 1})),
        });
        let translation = translate(&tx, &RuleOutcome::passthrough(&tx.operation)).unwrap();
        let statement = &translation.statements[0];
        assert!(statement.sql.ends_with("SET name = :name_1 WHERE id = :id_0"));
        assert_eq!(translation.check, ResultCheck::AffectedRows {
            declared: Some(1)
        });
        let names: Vec<&str> = statement.params.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec![":name_1", ":id_0"]);
    }

    #[test]
    fn select_renders_order_and_limit() {
        let tx = table_tx(TableOperation::Select {
            fields: vec!["id".to_string()],
            condition: Some(json!({"id": {">=": 2}})),
            order: vec![OrderSpec {
                field: "id".to_string(),
                descending: true,
            }],
            limit: Some(10),
            offset: Some(5),
        });
        let translation = translate(&tx, &RuleOutcome::passthrough(&tx.operation)).unwrap();
        assert_eq!(translation.mode, AccessMode::Read);
        assert!(translation.statements[0].sql.ends_with(
            "WHERE id >= :id_0 ORDER BY id DESC LIMIT 10 OFFSET 5"
        ));
    }

    #[test]
    fn rule_outcome_condition_replaces_caller_condition() {
        let tx = table_tx(TableOperation::Delete {
            condition: Some(json!({"id": 1})),
        });
        let outcome = RuleOutcome {
            condition: Some(json!({"And": [{"creator": "alice"}, {"id": 1}]})),
            ..RuleOutcome::default()
        };
        let translation = translate(&tx, &outcome).unwrap();
        assert!(translation.statements[0]
            .sql
            .ends_with("WHERE (creator = :creator_0 AND id = :id_1)"));
    }

    #[test]
    fn expected_rows_match_with_numeric_normalization() {
        let expected = vec![row(json!({"id": 1, "price": "12.50"}))];
        let actual = vec![row(json!({"id": 1.0, "price": 12.5, "extra": "x"}))];
        assert!(match_expected_rows(&expected, &actual).is_ok());
        let wrong = vec![row(json!({"id": 1, "price": 13}))];
        let mismatch = match_expected_rows(&expected, &wrong).unwrap_err();
        assert_eq!(mismatch.field.as_deref(), Some("price"));
        assert!(match_expected_rows(&expected, &[]).is_err());
    }
}
