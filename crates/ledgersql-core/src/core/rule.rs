// crates/ledgersql-core/src/core/rule.rs
// ============================================================================
// Module: LedgerSQL Operation Rules
// Description: Row-level access rules evaluated before translation.
// Purpose: Restrict which fields and rows a caller may touch per operation.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A table may carry one [`OperationRule`] per [`OperationKind`]. A rule can:
//! - restrict the fields a caller may reference (`fields`),
//! - add a predicate template that is conjoined with the caller's condition
//!   (`condition`; the literal `"$account"` is replaced by the caller),
//! - force an insert column to the caller's account (`account_field`),
//! - cap the number of rows each account may insert (`count`).
//!
//! Table-list and SQL-statement transactions run through the same
//! [`deal_with_rule`] path, so equivalent requests get identical outcomes.
//! Schema operations (create, drop, rename) are reserved to the table owner.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_json::json;
use thiserror::Error;

use crate::core::condition::ConditionTree;
use crate::core::identifiers::AccountId;
use crate::core::identifiers::StorageId;
use crate::core::table::JsonRow;
use crate::core::table::OperationKind;
use crate::core::table::TableOperation;
use crate::core::table::TableTx;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Template token replaced by the calling account.
pub const ACCOUNT_TOKEN: &str = "$account";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Rule evaluation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// The request violates the table's rule.
    #[error("rule violation: {0}")]
    Violation(String),
    /// The caller or rule condition is malformed.
    #[error("rule condition invalid: {0}")]
    Condition(String),
    /// Counting existing rows for the insert quota failed.
    #[error("rule row count failed: {0}")]
    Count(String),
}

// ============================================================================
// SECTION: Rule Types
// ============================================================================

/// Per-account insert quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertQuota {
    /// Column holding the inserting account.
    pub account_field: String,
    /// Maximum rows per account.
    pub count_limit: u64,
}

/// Rule attached to one operation kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRule {
    /// Predicate template conjoined with the caller's condition.
    #[serde(default)]
    pub condition: Option<JsonValue>,
    /// Fields the caller may reference; `None` allows every field.
    #[serde(default)]
    pub fields: Option<BTreeSet<String>>,
    /// Insert column forced to the caller's account.
    #[serde(default)]
    pub account_field: Option<String>,
    /// Insert quota per account.
    #[serde(default)]
    pub count: Option<InsertQuota>,
}

/// All rules of one table keyed by operation kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableRules {
    /// Rules by operation kind.
    pub rules: BTreeMap<OperationKind, OperationRule>,
}

impl TableRules {
    /// Returns the rule for an operation kind.
    #[must_use]
    pub fn get(&self, kind: OperationKind) -> Option<&OperationRule> {
        self.rules.get(&kind)
    }

    /// Returns true when a rule exists for the kind.
    #[must_use]
    pub fn has_rule(&self, kind: OperationKind) -> bool {
        self.rules.contains_key(&kind)
    }
}

/// Caller-side inputs for rule evaluation.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Rules of the target table, if it has any.
    pub rules: Option<&'a TableRules>,
}

/// Quota check deferred until rows can be counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaCheck {
    /// Column holding the inserting account.
    pub account_field: String,
    /// Account being charged.
    pub account: AccountId,
    /// Maximum rows per account.
    pub count_limit: u64,
}

/// Result of rule evaluation consumed by the translator.
///
/// # Invariants
/// - `condition` already includes the rule predicate; it is the only
///   condition the translator may use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
    /// Effective condition (rule AND caller).
    pub condition: Option<JsonValue>,
    /// Insert rows after rule defaults were applied.
    pub rows: Option<Vec<JsonRow>>,
    /// Projection forced by the rule for reads.
    pub projection: Option<Vec<String>>,
    /// Pending insert quota check.
    pub quota: Option<QuotaCheck>,
}

impl RuleOutcome {
    /// Outcome that passes the operation through unchanged.
    #[must_use]
    pub fn passthrough(operation: &TableOperation) -> Self {
        Self {
            condition: operation.condition().cloned(),
            rows: None,
            projection: None,
            quota: None,
        }
    }
}

/// Counts rows for insert quota enforcement.
pub trait RowCounter {
    /// Counts rows of `storage_id` matching `condition`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::Count`] when the backend query fails.
    fn count_rows(
        &self,
        storage_id: &StorageId,
        condition: &ConditionTree,
    ) -> Result<u64, RuleError>;
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Verifies every field referenced by `condition` is in `allowed`.
///
/// # Errors
///
/// Returns [`RuleError::Condition`] when the condition does not parse and
/// [`RuleError::Violation`] naming the first disallowed field.
pub fn check_rule_fields(
    allowed: &BTreeSet<String>,
    condition: &JsonValue,
) -> Result<(), RuleError> {
    let tree = ConditionTree::create_root(condition)
        .map_err(|err| RuleError::Condition(err.to_string()))?;
    check_field_names(allowed, tree.fields().iter().map(String::as_str))
}

/// Evaluates the table rule for a transaction.
///
/// # Errors
///
/// Returns [`RuleError::Violation`] when the caller may not perform the
/// request and [`RuleError::Condition`] when a condition is malformed.
pub fn deal_with_rule(ctx: &RuleContext<'_>, tx: &TableTx) -> Result<RuleOutcome, RuleError> {
    let Some(kind) = tx.operation.rule_kind() else {
        if tx.account != tx.owner {
            return Err(RuleError::Violation(format!(
                "{} is reserved to the table owner",
                tx.operation.label()
            )));
        }
        return Ok(RuleOutcome::passthrough(&tx.operation));
    };
    let Some(rule) = ctx.rules.and_then(|rules| rules.get(kind)) else {
        let outcome = RuleOutcome::passthrough(&tx.operation);
        if let Some(condition) = &outcome.condition {
            ConditionTree::create_root(condition)
                .map_err(|err| RuleError::Condition(err.to_string()))?;
        }
        return Ok(outcome);
    };
    let caller_condition = tx.operation.condition();
    if let (Some(allowed), Some(condition)) = (&rule.fields, caller_condition) {
        check_rule_fields(allowed, condition)?;
    }
    let mut outcome = RuleOutcome {
        condition: conjoin(
            rule.condition.as_ref().map(|template| substitute_account(template, &tx.account)),
            caller_condition.cloned(),
        ),
        rows: None,
        projection: None,
        quota: None,
    };
    if let Some(condition) = &outcome.condition {
        ConditionTree::create_root(condition)
            .map_err(|err| RuleError::Condition(err.to_string()))?;
    }
    match &tx.operation {
        TableOperation::Insert {
            rows,
        } => {
            outcome.rows = Some(apply_insert_rule(rule, rows, &tx.account)?);
            outcome.condition = None;
            outcome.quota = rule.count.as_ref().map(|quota| QuotaCheck {
                account_field: quota.account_field.clone(),
                account: tx.account.clone(),
                count_limit: quota.count_limit,
            });
        }
        TableOperation::Update {
            set, ..
        } => {
            if let Some(allowed) = &rule.fields {
                check_field_names(allowed, set.keys().map(String::as_str))?;
            }
        }
        TableOperation::Select {
            fields, ..
        }
        | TableOperation::Assert {
            fields, ..
        } => {
            if let Some(allowed) = &rule.fields {
                if fields.is_empty() {
                    outcome.projection = Some(allowed.iter().cloned().collect());
                } else {
                    check_field_names(allowed, fields.iter().map(String::as_str))?;
                }
            }
        }
        _ => {}
    }
    Ok(outcome)
}

/// Enforces the insert quota by counting the caller's existing rows.
///
/// # Errors
///
/// Returns [`RuleError::Violation`] when inserting `new_rows` would exceed the
/// quota, and [`RuleError::Count`] when counting fails.
pub fn adjust_insert_count(
    outcome: &RuleOutcome,
    storage_id: &StorageId,
    new_rows: u64,
    counter: &dyn RowCounter,
) -> Result<(), RuleError> {
    let Some(quota) = &outcome.quota else {
        return Ok(());
    };
    let mut filter = JsonRow::new();
    filter.insert(
        quota.account_field.clone(),
        JsonValue::String(quota.account.as_str().to_string()),
    );
    let condition = ConditionTree::create_root(&JsonValue::Object(filter))
        .map_err(|err| RuleError::Condition(err.to_string()))?;
    let existing = counter.count_rows(storage_id, &condition)?;
    let total = existing.saturating_add(new_rows);
    if total > quota.count_limit {
        return Err(RuleError::Violation(format!(
            "insert quota exceeded for {}: {existing} existing + {new_rows} new > {}",
            quota.account, quota.count_limit
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Checks a list of field names against the allowed set.
fn check_field_names<'a>(
    allowed: &BTreeSet<String>,
    mut fields: impl Iterator<Item = &'a str>,
) -> Result<(), RuleError> {
    fields.find(|field| !allowed.contains(*field)).map_or(Ok(()), |field| {
        Err(RuleError::Violation(format!("field {field} is not permitted by the table rule")))
    })
}

/// Applies the insert rule to each row.
fn apply_insert_rule(
    rule: &OperationRule,
    rows: &[JsonRow],
    account: &AccountId,
) -> Result<Vec<JsonRow>, RuleError> {
    let mut adjusted = Vec::with_capacity(rows.len());
    for row in rows {
        let mut row = row.clone();
        if let Some(field) = &rule.account_field {
            match row.get(field) {
                Some(JsonValue::String(value)) if value == account.as_str() => {}
                Some(_) => {
                    return Err(RuleError::Violation(format!(
                        "field {field} must equal the submitting account"
                    )));
                }
                None => {
                    row.insert(field.clone(), JsonValue::String(account.as_str().to_string()));
                }
            }
        }
        if let Some(allowed) = &rule.fields {
            let forced = rule.account_field.as_deref();
            check_field_names(
                allowed,
                row.keys().map(String::as_str).filter(|key| Some(*key) != forced),
            )?;
        }
        adjusted.push(row);
    }
    Ok(adjusted)
}

/// Replaces every `"$account"` string in the template with the caller.
fn substitute_account(template: &JsonValue, account: &AccountId) -> JsonValue {
    match template {
        JsonValue::String(text) if text == ACCOUNT_TOKEN => {
            JsonValue::String(account.as_str().to_string())
        }
        JsonValue::Array(items) => {
            JsonValue::Array(items.iter().map(|item| substitute_account(item, account)).collect())
        }
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), substitute_account(value, account)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Combines an optional rule predicate with an optional caller condition.
fn conjoin(rule: Option<JsonValue>, caller: Option<JsonValue>) -> Option<JsonValue> {
    match (rule, caller) {
        (Some(rule), Some(caller)) => Some(json!({"And": [rule, caller]})),
        (Some(single), None) | (None, Some(single)) => Some(single),
        (None, None) => None,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
