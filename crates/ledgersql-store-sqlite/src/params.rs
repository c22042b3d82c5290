// crates/ledgersql-store-sqlite/src/params.rs
// ============================================================================
// Module: SQLite Statement Execution
// Description: Value binding and row decoding for translated statements.
// Purpose: Run backend-neutral statements on a rusqlite connection.
// Dependencies: ledgersql-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! Translated statements carry `:name` placeholders and typed [`Value`]
//! parameters. This module binds them by name, executes writes and reads, and
//! decodes result rows into JSON objects keyed by column name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use ledgersql_core::DisposeError;
use ledgersql_core::JsonRow;
use ledgersql_core::core::hashing::hex_encode;
use ledgersql_core::core::value::Value;
use ledgersql_core::runtime::SqlStatement;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::ToSql;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde_json::Number;
use serde_json::Value as JsonValue;

// ============================================================================
// SECTION: Binding
// ============================================================================

/// Borrowed [`Value`] bound as a `SQLite` parameter.
struct SqlParam<'a>(&'a Value);

impl ToSql for SqlParam<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Int32(value) => ToSqlOutput::from(i64::from(*value)),
            Value::UInt32(value) => ToSqlOutput::from(i64::from(*value)),
            Value::Int64(value) => ToSqlOutput::from(*value),
            Value::Float32(value) => ToSqlOutput::from(f64::from(*value)),
            Value::Float64(value) => ToSqlOutput::from(*value),
            Value::Str(_, text) => ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes())),
            Value::Decimal(_) | Value::Date(_) | Value::DateTime(_) => {
                ToSqlOutput::Owned(rusqlite::types::Value::Text(self.0.to_string()))
            }
            Value::Unknown => ToSqlOutput::Owned(rusqlite::types::Value::Null),
        })
    }
}

/// Runs `f` with the statement parameters bound by name.
fn with_named<T>(
    params: &[(String, Value)],
    f: impl FnOnce(&[(&str, &dyn ToSql)]) -> rusqlite::Result<T>,
) -> rusqlite::Result<T> {
    let wrapped: Vec<(&str, SqlParam<'_>)> =
        params.iter().map(|(name, value)| (name.as_str(), SqlParam(value))).collect();
    let named: Vec<(&str, &dyn ToSql)> =
        wrapped.iter().map(|(name, param)| (*name, param as &dyn ToSql)).collect();
    f(&named)
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Executes write statements in order and returns the row count of the last.
pub(crate) fn execute_writes(
    connection: &Connection,
    statements: &[SqlStatement],
) -> Result<u64, DisposeError> {
    let mut affected = 0_u64;
    for statement in statements {
        let mut prepared = connection.prepare(&statement.sql).map_err(execution_error)?;
        let changed = with_named(&statement.params, |named| prepared.execute(named))
            .map_err(execution_error)?;
        affected = u64::try_from(changed).unwrap_or(u64::MAX);
    }
    Ok(affected)
}

/// Executes a read statement and decodes every row.
pub(crate) fn query_rows(
    connection: &Connection,
    statement: &SqlStatement,
) -> Result<Vec<JsonRow>, DisposeError> {
    let mut prepared = connection.prepare(&statement.sql).map_err(execution_error)?;
    let names: Vec<String> = prepared.column_names().into_iter().map(str::to_string).collect();
    with_named(&statement.params, |named| {
        let mut rows = prepared.query(named)?;
        let mut decoded = Vec::new();
        while let Some(row) = rows.next()? {
            let mut object = JsonRow::new();
            for (index, name) in names.iter().enumerate() {
                object.insert(name.clone(), decode_cell(row.get_ref(index)?));
            }
            decoded.push(object);
        }
        Ok(decoded)
    })
    .map_err(execution_error)
}

/// Executes a single-value `COUNT(*)` statement.
pub(crate) fn query_count(
    connection: &Connection,
    statement: &SqlStatement,
) -> rusqlite::Result<u64> {
    let mut prepared = connection.prepare(&statement.sql)?;
    let count: i64 =
        with_named(&statement.params, |named| prepared.query_row(named, |row| row.get(0)))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Decodes one `SQLite` cell into JSON.
fn decode_cell(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(number) => JsonValue::from(number),
        ValueRef::Real(number) => {
            Number::from_f64(number).map_or(JsonValue::Null, JsonValue::Number)
        }
        ValueRef::Text(bytes) => JsonValue::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => JsonValue::String(hex_encode(bytes)),
    }
}

/// Maps a rusqlite failure to an execution error; busy and locked databases
/// are retryable.
pub(crate) fn execution_error(err: rusqlite::Error) -> DisposeError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            DisposeError::Unavailable(err.to_string())
        }
        _ => DisposeError::DbExecution(err.to_string()),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
