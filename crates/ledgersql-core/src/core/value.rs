// crates/ledgersql-core/src/core/value.rs
// ============================================================================
// Module: LedgerSQL Values
// Description: Tagged scalar values used as column data and bound parameters.
// Purpose: Provide type-strict comparisons and JSON conversions for row data.
// Dependencies: bigdecimal, serde_json, time
// ============================================================================

//! ## Overview
//! [`Value`] is the scalar every row cell and bound parameter is expressed in.
//! Comparisons are strict: operands of different kinds fail with
//! [`ValueError::TypeMismatch`] rather than silently returning `false`.
//! The string kinds (plain, varchar, char, text) form one comparison family;
//! blobs compare only with blobs. Dates and datetimes compare chronologically.
//!
//! JSON literals are typed by range: integers become `int32`, then `uint32`,
//! then `int64`; any fractional number becomes `float64`; booleans become
//! `int32` 0/1. `null` has no value kind and is rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use bigdecimal::RoundingMode;
use serde_json::Number;
use serde_json::Value as JsonValue;
use thiserror::Error;
use time::Date;
use time::PrimitiveDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Canonical text form for date values.
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
/// Canonical text form for datetime values.
const DATETIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
/// Maximum decimal precision accepted for decimal columns.
pub const MAX_DECIMAL_LENGTH: u32 = 65;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Value construction and comparison errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// Operands of different kinds were compared.
    #[error("type mismatch: cannot compare {left} with {right}")]
    TypeMismatch {
        /// Kind of the left operand.
        left: ValueKind,
        /// Kind of the right operand.
        right: ValueKind,
    },
    /// Operands had no defined ordering (unknown values, NaN).
    #[error("values of kind {0} are not comparable")]
    Incomparable(ValueKind),
    /// JSON input could not be represented as a value.
    #[error("unsupported json literal: {0}")]
    UnsupportedLiteral(String),
    /// Input could not be converted to the requested kind.
    #[error("cannot convert {value} to {kind}")]
    Conversion {
        /// Target kind.
        kind: ValueKind,
        /// Rendered input value.
        value: String,
    },
    /// Decimal value does not fit its declared precision.
    #[error("decimal overflow: {value} exceeds decimal({length},{scale})")]
    DecimalOverflow {
        /// Rendered decimal value.
        value: String,
        /// Declared total digits.
        length: u32,
        /// Declared fractional digits.
        scale: u32,
    },
}

// ============================================================================
// SECTION: Kinds and Operators
// ============================================================================

/// Storage flavour of a string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringKind {
    /// Untyped string literal.
    Plain,
    /// Bounded variable-length string.
    Varchar,
    /// Fixed-length string.
    Char,
    /// Unbounded text.
    Text,
    /// Binary payload carried as text.
    Blob,
}

/// Discriminant of a [`Value`], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// Fixed-precision decimal.
    Decimal,
    /// String of the given flavour.
    String(StringKind),
    /// Calendar date.
    Date,
    /// Date and time without offset.
    DateTime,
    /// Value with no known kind.
    Unknown,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Decimal => "decimal",
            Self::String(StringKind::Plain) => "string",
            Self::String(StringKind::Varchar) => "varchar",
            Self::String(StringKind::Char) => "char",
            Self::String(StringKind::Text) => "text",
            Self::String(StringKind::Blob) => "blob",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Binary comparison operators over values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Less than.
    Lt,
    /// Greater than or equal.
    Ge,
    /// Less than or equal.
    Le,
}

impl CompareOp {
    /// Returns whether the ordering satisfies the operator.
    #[must_use]
    pub const fn matches(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Ne => !matches!(ordering, Ordering::Equal),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::Ge => !matches!(ordering, Ordering::Less),
            Self::Le => !matches!(ordering, Ordering::Greater),
        }
    }
}

// ============================================================================
// SECTION: Decimal
// ============================================================================

/// Fixed-precision decimal with declared total digits and scale.
///
/// # Invariants
/// - `value` is always rounded to exactly `scale` fractional digits.
/// - The digit count of `value` never exceeds `length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalValue {
    /// Rounded decimal value.
    value: BigDecimal,
    /// Declared total digits.
    length: u32,
    /// Declared fractional digits.
    scale: u32,
}

impl DecimalValue {
    /// Creates a decimal rounded half-up to `scale` digits.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::DecimalOverflow`] when the rounded value needs
    /// more than `length` digits, or when the declaration itself is invalid.
    pub fn new(value: BigDecimal, length: u32, scale: u32) -> Result<Self, ValueError> {
        let rounded = fit_decimal(&value, length, scale)?;
        Ok(Self {
            value: rounded,
            length,
            scale,
        })
    }

    /// Replaces the value in place, keeping the declared precision.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::DecimalOverflow`] when the new value does not fit;
    /// the stored value is left unchanged in that case.
    pub fn update(&mut self, value: BigDecimal) -> Result<(), ValueError> {
        self.value = fit_decimal(&value, self.length, self.scale)?;
        Ok(())
    }

    /// Returns the rounded value.
    #[must_use]
    pub const fn value(&self) -> &BigDecimal {
        &self.value
    }

    /// Returns the declared total digits.
    #[must_use]
    pub const fn length(&self) -> u32 {
        self.length
    }

    /// Returns the declared fractional digits.
    #[must_use]
    pub const fn scale(&self) -> u32 {
        self.scale
    }
}

/// Rounds a decimal to `scale` and checks it fits in `length` digits.
fn fit_decimal(value: &BigDecimal, length: u32, scale: u32) -> Result<BigDecimal, ValueError> {
    let overflow = || ValueError::DecimalOverflow {
        value: value.to_string(),
        length,
        scale,
    };
    if length == 0 || length > MAX_DECIMAL_LENGTH || scale > length {
        return Err(overflow());
    }
    let rounded = value.with_scale_round(i64::from(scale), RoundingMode::HalfUp);
    if rounded.digits() > u64::from(length) {
        return Err(overflow());
    }
    Ok(rounded)
}

// ============================================================================
// SECTION: Value
// ============================================================================

/// Tagged scalar used as a column value and as a bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// Fixed-precision decimal.
    Decimal(DecimalValue),
    /// String of a given flavour.
    Str(StringKind, String),
    /// Calendar date.
    Date(Date),
    /// Date and time without offset.
    DateTime(PrimitiveDateTime),
    /// Value with no known kind; never comparable.
    Unknown,
}

impl Value {
    /// Creates a plain string value.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Str(StringKind::Plain, value.into())
    }

    /// Returns the value kind.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Int32(_) => ValueKind::Int32,
            Self::UInt32(_) => ValueKind::UInt32,
            Self::Int64(_) => ValueKind::Int64,
            Self::Float32(_) => ValueKind::Float32,
            Self::Float64(_) => ValueKind::Float64,
            Self::Decimal(_) => ValueKind::Decimal,
            Self::Str(kind, _) => ValueKind::String(*kind),
            Self::Date(_) => ValueKind::Date,
            Self::DateTime(_) => ValueKind::DateTime,
            Self::Unknown => ValueKind::Unknown,
        }
    }

    /// Orders two values of the same kind.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::TypeMismatch`] for operands of different kinds and
    /// [`ValueError::Incomparable`] for unknown values or NaN floats.
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering, ValueError> {
        let mismatch = || ValueError::TypeMismatch {
            left: self.kind(),
            right: other.kind(),
        };
        match (self, other) {
            (Self::Int32(left), Self::Int32(right)) => Ok(left.cmp(right)),
            (Self::UInt32(left), Self::UInt32(right)) => Ok(left.cmp(right)),
            (Self::Int64(left), Self::Int64(right)) => Ok(left.cmp(right)),
            (Self::Float32(left), Self::Float32(right)) => {
                left.partial_cmp(right).ok_or(ValueError::Incomparable(ValueKind::Float32))
            }
            (Self::Float64(left), Self::Float64(right)) => {
                left.partial_cmp(right).ok_or(ValueError::Incomparable(ValueKind::Float64))
            }
            (Self::Decimal(left), Self::Decimal(right)) => Ok(left.value.cmp(&right.value)),
            (Self::Str(left_kind, left), Self::Str(right_kind, right)) => {
                let left_blob = *left_kind == StringKind::Blob;
                let right_blob = *right_kind == StringKind::Blob;
                if left_blob != right_blob {
                    return Err(mismatch());
                }
                Ok(left.as_bytes().cmp(right.as_bytes()))
            }
            (Self::Date(left), Self::Date(right)) => Ok(left.cmp(right)),
            (Self::DateTime(left), Self::DateTime(right)) => Ok(left.cmp(right)),
            (Self::Unknown, Self::Unknown) => Err(ValueError::Incomparable(ValueKind::Unknown)),
            _ => Err(mismatch()),
        }
    }

    /// Applies a comparison operator.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] when the operands cannot be ordered.
    pub fn compare(&self, op: CompareOp, other: &Self) -> Result<bool, ValueError> {
        self.try_cmp(other).map(|ordering| op.matches(ordering))
    }

    /// Converts a JSON literal into a value using range-based integer typing.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::UnsupportedLiteral`] for `null`, arrays, and objects.
    pub fn from_json(value: &JsonValue) -> Result<Self, ValueError> {
        match value {
            JsonValue::Bool(flag) => Ok(Self::Int32(i32::from(*flag))),
            JsonValue::Number(number) => Ok(number_to_value(number)),
            JsonValue::String(text) => Ok(Self::text(text.clone())),
            JsonValue::Null => Err(ValueError::UnsupportedLiteral("null".to_string())),
            JsonValue::Array(_) => Err(ValueError::UnsupportedLiteral("array".to_string())),
            JsonValue::Object(_) => Err(ValueError::UnsupportedLiteral("object".to_string())),
        }
    }

    /// Renders the value as JSON for result rows and diagnostics.
    ///
    /// Decimals render as strings to keep their exact digits.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Int32(value) => JsonValue::from(*value),
            Self::UInt32(value) => JsonValue::from(*value),
            Self::Int64(value) => JsonValue::from(*value),
            Self::Float32(value) => JsonValue::from(f64::from(*value)),
            Self::Float64(value) => JsonValue::from(*value),
            Self::Decimal(decimal) => JsonValue::String(decimal.value.to_string()),
            Self::Str(_, text) => JsonValue::String(text.clone()),
            Self::Date(date) => {
                JsonValue::String(date.format(DATE_FORMAT).unwrap_or_else(|_| date.to_string()))
            }
            Self::DateTime(datetime) => JsonValue::String(
                datetime.format(DATETIME_FORMAT).unwrap_or_else(|_| datetime.to_string()),
            ),
            Self::Unknown => JsonValue::Null,
        }
    }

    /// Parses a `YYYY-MM-DD` date value.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Conversion`] when the text is not a valid date.
    pub fn parse_date(text: &str) -> Result<Self, ValueError> {
        Date::parse(text, DATE_FORMAT).map(Self::Date).map_err(|_| ValueError::Conversion {
            kind: ValueKind::Date,
            value: text.to_string(),
        })
    }

    /// Parses a `YYYY-MM-DD HH:MM:SS` datetime value.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Conversion`] when the text is not a valid datetime.
    pub fn parse_datetime(text: &str) -> Result<Self, ValueError> {
        PrimitiveDateTime::parse(text, DATETIME_FORMAT).map(Self::DateTime).map_err(|_| {
            ValueError::Conversion {
                kind: ValueKind::DateTime,
                value: text.to_string(),
            }
        })
    }

    /// Parses decimal text into a value with the given precision.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] when the text is not numeric or does not fit.
    pub fn parse_decimal(text: &str, length: u32, scale: u32) -> Result<Self, ValueError> {
        let parsed = BigDecimal::from_str(text).map_err(|_| ValueError::Conversion {
            kind: ValueKind::Decimal,
            value: text.to_string(),
        })?;
        DecimalValue::new(parsed, length, scale).map(Self::Decimal)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            JsonValue::String(text) => f.write_str(&text),
            other => write!(f, "{other}"),
        }
    }
}

/// Types a JSON number by range.
fn number_to_value(number: &Number) -> Value {
    if let Some(signed) = number.as_i64() {
        if let Ok(narrow) = i32::try_from(signed) {
            return Value::Int32(narrow);
        }
        if let Ok(unsigned) = u32::try_from(signed) {
            return Value::UInt32(unsigned);
        }
        return Value::Int64(signed);
    }
    if let Some(unsigned) = number.as_u64() {
        return i64::try_from(unsigned).map_or_else(
            |_| {
                BigDecimal::from_str(&number.to_string())
                    .ok()
                    .and_then(|value| DecimalValue::new(value, MAX_DECIMAL_LENGTH, 0).ok())
                    .map_or(Value::Unknown, Value::Decimal)
            },
            Value::Int64,
        );
    }
    number.as_f64().map_or(Value::Unknown, Value::Float64)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use super::*;

    #[test]
    fn json_integers_are_typed_by_range() {
        assert_eq!(Value::from_json(&json!(7)).unwrap(), Value::Int32(7));
        assert_eq!(
            Value::from_json(&json!(3_000_000_000_u64)).unwrap(),
            Value::UInt32(3_000_000_000)
        );
        assert_eq!(
            Value::from_json(&json!(-3_000_000_000_i64)).unwrap(),
            Value::Int64(-3_000_000_000)
        );
        assert_eq!(Value::from_json(&json!(1.5)).unwrap(), Value::Float64(1.5));
        assert_eq!(Value::from_json(&json!(true)).unwrap(), Value::Int32(1));
        assert!(Value::from_json(&json!(null)).is_err());
    }

    #[test]
    fn mismatched_kinds_fail_instead_of_comparing_false() {
        let err = Value::Int32(1).compare(CompareOp::Eq, &Value::Int64(1)).unwrap_err();
        assert_eq!(
            err,
            ValueError::TypeMismatch {
                left: ValueKind::Int32,
                right: ValueKind::Int64,
            }
        );
        assert!(Value::text("a").compare(CompareOp::Eq, &Value::Int32(1)).is_err());
        let blob = Value::Str(StringKind::Blob, "a".into());
        assert!(blob.compare(CompareOp::Eq, &Value::text("a")).is_err());
    }

    #[test]
    fn string_flavours_share_a_family() {
        let varchar = Value::Str(StringKind::Varchar, "abc".into());
        assert!(varchar.compare(CompareOp::Eq, &Value::text("abc")).unwrap());
        assert!(varchar.compare(CompareOp::Lt, &Value::text("abd")).unwrap());
    }

    #[test]
    fn dates_compare_chronologically() {
        let earlier = Value::parse_date("2023-12-31").unwrap();
        let later = Value::parse_date("2024-01-01").unwrap();
        assert!(earlier.compare(CompareOp::Lt, &later).unwrap());
        assert!(later.compare(CompareOp::Ge, &earlier).unwrap());
        let morning = Value::parse_datetime("2024-01-01 08:00:00").unwrap();
        let evening = Value::parse_datetime("2024-01-01 20:30:00").unwrap();
        assert!(evening.compare(CompareOp::Gt, &morning).unwrap());
        assert!(earlier.compare(CompareOp::Lt, &morning).is_err());
    }

    #[test]
    fn unknown_values_never_compare() {
        assert!(matches!(
            Value::Unknown.compare(CompareOp::Eq, &Value::Unknown),
            Err(ValueError::Incomparable(ValueKind::Unknown))
        ));
    }

    #[test]
    fn decimal_rounds_and_updates_in_place() {
        let mut decimal = DecimalValue::new(BigDecimal::from_str("12.345").unwrap(), 5, 2).unwrap();
        assert_eq!(decimal.value().to_string(), "12.35");
        decimal.update(BigDecimal::from_str("1.1").unwrap()).unwrap();
        assert_eq!(decimal.value().to_string(), "1.10");
        let overflow = decimal.update(BigDecimal::from_str("12345.6").unwrap());
        assert!(matches!(overflow, Err(ValueError::DecimalOverflow { .. })));
        assert_eq!(decimal.value().to_string(), "1.10");
    }

    #[test]
    fn decimals_compare_by_value_across_precision() {
        let left = Value::parse_decimal("1.5", 10, 1).unwrap();
        let right = Value::parse_decimal("1.50", 10, 4).unwrap();
        assert!(left.compare(CompareOp::Eq, &right).unwrap());
    }
}
