// crates/ledgersql-core/src/core/table.rs
// ============================================================================
// Module: LedgerSQL Table Operations
// Description: Column model, ledger table operations, and transaction envelope.
// Purpose: Define the structured inputs the translator and runtime consume.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`TableTx`] is the ledger's view of one table transaction: who submitted
//! it, which table it targets, the [`TableOperation`] to perform, the declared
//! affected-row count, and optional check-hash declarations. Operations
//! serialize with an `op` tag:
//!
//! ```text
//! {"op": "update", "set": {"name": "b"}, "condition": {"id": 1}}
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value as JsonValue;

use crate::core::identifiers::AccountId;
use crate::core::identifiers::CheckHash;
use crate::core::identifiers::StorageId;
use crate::core::identifiers::TableName;
use crate::core::identifiers::TxHash;
use crate::core::value::StringKind;
use crate::core::value::Value;
use crate::core::value::ValueError;
use crate::core::value::ValueKind;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default length applied to `varchar`/`char` columns declared without one.
pub const DEFAULT_STRING_LENGTH: u32 = 255;

/// A row as supplied by the ledger: column name to JSON literal.
pub type JsonRow = Map<String, JsonValue>;

// ============================================================================
// SECTION: Columns
// ============================================================================

/// Logical column types accepted by `create_table`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Signed 32-bit integer.
    Int,
    /// Unsigned 32-bit integer.
    #[serde(alias = "unsigned")]
    Uint,
    /// Signed 64-bit integer.
    #[serde(alias = "long64")]
    Bigint,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Fixed-precision decimal; requires `length` and `scale`.
    Decimal,
    /// Bounded string.
    Varchar,
    /// Fixed-length string.
    Char,
    /// Unbounded text.
    Text,
    /// Binary payload.
    Blob,
    /// Calendar date.
    Date,
    /// Date and time.
    Datetime,
}

/// Column declaration inside `create_table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub field: String,
    /// Logical type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Length for strings; total digits for decimals.
    #[serde(default)]
    pub length: Option<u32>,
    /// Fractional digits for decimals.
    #[serde(default, alias = "accuracy")]
    pub scale: Option<u32>,
    /// Column is (part of) the primary key.
    #[serde(default, alias = "PK")]
    pub primary_key: bool,
    /// Column rejects NULL.
    #[serde(default, alias = "NN")]
    pub not_null: bool,
    /// Column values are unique.
    #[serde(default, alias = "UQ")]
    pub unique: bool,
    /// Create a single-column secondary index.
    #[serde(default)]
    pub index: bool,
    /// Default literal.
    #[serde(default)]
    pub default: Option<JsonValue>,
}

impl ColumnSpec {
    /// Converts a JSON literal into a value of this column's kind.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] when the literal cannot represent the column type.
    pub fn coerce(&self, literal: &JsonValue) -> Result<Value, ValueError> {
        let conversion = |kind: ValueKind| ValueError::Conversion {
            kind,
            value: literal.to_string(),
        };
        match (self.column_type, literal) {
            (ColumnType::Int, JsonValue::Number(number)) => number
                .as_i64()
                .and_then(|value| i32::try_from(value).ok())
                .map(Value::Int32)
                .ok_or_else(|| conversion(ValueKind::Int32)),
            (ColumnType::Uint, JsonValue::Number(number)) => number
                .as_u64()
                .and_then(|value| u32::try_from(value).ok())
                .map(Value::UInt32)
                .ok_or_else(|| conversion(ValueKind::UInt32)),
            (ColumnType::Bigint, JsonValue::Number(number)) => {
                number.as_i64().map(Value::Int64).ok_or_else(|| conversion(ValueKind::Int64))
            }
            (ColumnType::Float, JsonValue::Number(number)) => {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "float columns store f32 by declaration."
                )]
                let narrowed = number.as_f64().map(|value| value as f32);
                narrowed.map(Value::Float32).ok_or_else(|| conversion(ValueKind::Float32))
            }
            (ColumnType::Double, JsonValue::Number(number)) => {
                number.as_f64().map(Value::Float64).ok_or_else(|| conversion(ValueKind::Float64))
            }
            (ColumnType::Decimal, JsonValue::Number(number)) => {
                Value::parse_decimal(
                    &number.to_string(),
                    self.length.unwrap_or(0),
                    self.scale.unwrap_or(0),
                )
            }
            (ColumnType::Decimal, JsonValue::String(text)) => {
                Value::parse_decimal(text, self.length.unwrap_or(0), self.scale.unwrap_or(0))
            }
            (ColumnType::Varchar, JsonValue::String(text)) => {
                Ok(Value::Str(StringKind::Varchar, text.clone()))
            }
            (ColumnType::Char, JsonValue::String(text)) => {
                Ok(Value::Str(StringKind::Char, text.clone()))
            }
            (ColumnType::Text, JsonValue::String(text)) => {
                Ok(Value::Str(StringKind::Text, text.clone()))
            }
            (ColumnType::Blob, JsonValue::String(text)) => {
                Ok(Value::Str(StringKind::Blob, text.clone()))
            }
            (ColumnType::Date, JsonValue::String(text)) => Value::parse_date(text),
            (ColumnType::Datetime, JsonValue::String(text)) => Value::parse_datetime(text),
            (ColumnType::Int, JsonValue::Bool(flag)) => Ok(Value::Int32(i32::from(*flag))),
            (ColumnType::Uint, JsonValue::Bool(flag)) => Ok(Value::UInt32(u32::from(*flag))),
            (ColumnType::Bigint, JsonValue::Bool(flag)) => Ok(Value::Int64(i64::from(*flag))),
            _ => Err(conversion(self.value_kind())),
        }
    }

    /// Returns the value kind stored in this column.
    #[must_use]
    pub const fn value_kind(&self) -> ValueKind {
        match self.column_type {
            ColumnType::Int => ValueKind::Int32,
            ColumnType::Uint => ValueKind::UInt32,
            ColumnType::Bigint => ValueKind::Int64,
            ColumnType::Float => ValueKind::Float32,
            ColumnType::Double => ValueKind::Float64,
            ColumnType::Decimal => ValueKind::Decimal,
            ColumnType::Varchar => ValueKind::String(StringKind::Varchar),
            ColumnType::Char => ValueKind::String(StringKind::Char),
            ColumnType::Text => ValueKind::String(StringKind::Text),
            ColumnType::Blob => ValueKind::String(StringKind::Blob),
            ColumnType::Date => ValueKind::Date,
            ColumnType::Datetime => ValueKind::DateTime,
        }
    }
}

/// Secondary index declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name, unique within the table.
    pub name: String,
    /// Indexed columns in order.
    pub fields: Vec<String>,
    /// Whether the index enforces uniqueness.
    #[serde(default)]
    pub unique: bool,
}

/// Ordering term for `select`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Column to order by.
    pub field: String,
    /// Descending when true.
    #[serde(default)]
    pub descending: bool,
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Structured table operation carried by a ledger transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TableOperation {
    /// Create the backend table.
    CreateTable {
        /// Column declarations.
        columns: Vec<ColumnSpec>,
        /// Secondary indexes.
        #[serde(default)]
        indexes: Vec<IndexSpec>,
    },
    /// Drop the backend table.
    DropTable,
    /// Rename the logical table; the backend table keeps its storage id.
    RenameTable {
        /// New logical name.
        new_name: TableName,
    },
    /// Insert one row or a homogeneous batch.
    Insert {
        /// Rows; column order is fixed by the first row.
        rows: Vec<JsonRow>,
    },
    /// Update matching rows.
    Update {
        /// Columns to assign.
        set: JsonRow,
        /// Optional row filter.
        #[serde(default)]
        condition: Option<JsonValue>,
    },
    /// Delete matching rows.
    Delete {
        /// Optional row filter.
        #[serde(default)]
        condition: Option<JsonValue>,
    },
    /// Read rows; never part of a write transaction.
    Select {
        /// Projected columns; empty selects all.
        #[serde(default)]
        fields: Vec<String>,
        /// Optional row filter.
        #[serde(default)]
        condition: Option<JsonValue>,
        /// Ordering terms.
        #[serde(default)]
        order: Vec<OrderSpec>,
        /// Maximum rows returned.
        #[serde(default)]
        limit: Option<u64>,
        /// Rows skipped before returning.
        #[serde(default)]
        offset: Option<u64>,
    },
    /// Compare the rows matching a condition with an expected row set.
    Assert {
        /// Projected columns; empty compares all expected keys.
        #[serde(default)]
        fields: Vec<String>,
        /// Optional row filter.
        #[serde(default)]
        condition: Option<JsonValue>,
        /// Expected rows in result order.
        expected: Vec<JsonRow>,
    },
}

/// Operation kinds that may carry a row-level rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Row insertion.
    Insert,
    /// Row update.
    Update,
    /// Row deletion.
    Delete,
    /// Row read (select and assert).
    #[serde(alias = "get")]
    Select,
}

impl TableOperation {
    /// Returns the rule kind governing this operation, if any.
    #[must_use]
    pub const fn rule_kind(&self) -> Option<OperationKind> {
        match self {
            Self::Insert {
                ..
            } => Some(OperationKind::Insert),
            Self::Update {
                ..
            } => Some(OperationKind::Update),
            Self::Delete {
                ..
            } => Some(OperationKind::Delete),
            Self::Select {
                ..
            }
            | Self::Assert {
                ..
            } => Some(OperationKind::Select),
            Self::CreateTable {
                ..
            }
            | Self::DropTable
            | Self::RenameTable {
                ..
            } => None,
        }
    }

    /// Returns true for operations that never modify data.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::Select {
                ..
            } | Self::Assert {
                ..
            }
        )
    }

    /// Returns the caller-supplied condition, if the operation has one.
    #[must_use]
    pub const fn condition(&self) -> Option<&JsonValue> {
        match self {
            Self::Update {
                condition, ..
            }
            | Self::Delete {
                condition,
            }
            | Self::Select {
                condition, ..
            }
            | Self::Assert {
                condition, ..
            } => condition.as_ref(),
            _ => None,
        }
    }

    /// Returns a short label for logs and diagnostics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CreateTable {
                ..
            } => "create_table",
            Self::DropTable => "drop_table",
            Self::RenameTable {
                ..
            } => "rename_table",
            Self::Insert {
                ..
            } => "insert",
            Self::Update {
                ..
            } => "update",
            Self::Delete {
                ..
            } => "delete",
            Self::Select {
                ..
            } => "select",
            Self::Assert {
                ..
            } => "assert",
        }
    }
}

// ============================================================================
// SECTION: Transaction Envelope
// ============================================================================

/// Ledger transaction family carrying the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    /// Table-list transaction (structured per-table operations).
    TableListSet,
    /// SQL-statement transaction.
    SqlStatement,
}

/// Check-hash declarations attached to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDeclaration {
    /// Predecessor check hash the submitter built on.
    #[serde(default)]
    pub predecessor: Option<CheckHash>,
    /// Strict mode requires a declared predecessor.
    #[serde(default)]
    pub strict: bool,
    /// Last ledger sequence in which the submission may be confirmed.
    pub last_ledger_seq: u64,
}

/// One table transaction as seen by the apply layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableTx {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Transaction family.
    pub kind: TxKind,
    /// Submitting account.
    pub account: AccountId,
    /// Table owner.
    pub owner: AccountId,
    /// Logical table name.
    pub table_name: TableName,
    /// Backend table name.
    pub storage_id: StorageId,
    /// Operation to perform.
    pub operation: TableOperation,
    /// Declared affected-row count for update/delete verification.
    #[serde(default)]
    pub affected_rows: Option<u64>,
    /// Optional check-hash declarations.
    #[serde(default)]
    pub check: Option<CheckDeclaration>,
}

/// Canonical payload folded into the check-hash chain.
#[derive(Debug, Serialize)]
pub struct CheckPayload<'a> {
    /// Backend table name.
    pub storage_id: &'a StorageId,
    /// Submitting account.
    pub account: &'a AccountId,
    /// Transaction hash.
    pub tx_hash: &'a TxHash,
    /// Operation performed.
    pub operation: &'a TableOperation,
}

impl TableTx {
    /// Returns the payload hashed into the table's check-hash chain.
    #[must_use]
    pub const fn check_payload(&self) -> CheckPayload<'_> {
        CheckPayload {
            storage_id: &self.storage_id,
            account: &self.account,
            tx_hash: &self.tx_hash,
            operation: &self.operation,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
