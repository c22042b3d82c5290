// crates/ledgersql-core/tests/proptest_condition.rs
// ============================================================================
// Module: Condition Compiler Property-Based Tests
// Description: Property tests for rendering, binding, and value comparison.
// Purpose: Check that emitted SQL mirrors the tree and binds every placeholder.
// ============================================================================

//! Property-based tests for condition compiler invariants.

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

use std::collections::BTreeSet;

use ledgersql_core::CompareOp;
use ledgersql_core::ConditionTree;
use ledgersql_core::Value;
use ledgersql_core::ValueError;
use proptest::prelude::*;
use serde_json::Value as JsonValue;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Shape {
    Leaf(String),
    And(Vec<Self>),
    Or(Vec<Self>),
}

#[derive(Debug, Clone)]
enum GenNode {
    Leaf(String, &'static str, i32),
    And(Vec<Self>),
    Or(Vec<Self>),
}

impl GenNode {
    fn to_json(&self) -> JsonValue {
        match self {
            Self::Leaf(field, op, value) => {
                let mut operators = serde_json::Map::new();
                operators.insert((*op).to_string(), json!(value));
                let mut leaf = serde_json::Map::new();
                leaf.insert(field.clone(), JsonValue::Object(operators));
                JsonValue::Object(leaf)
            }
            Self::And(children) => {
                json!({ "And": children.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
            Self::Or(children) => {
                json!({ "Or": children.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
        }
    }

    fn shape(&self) -> Shape {
        match self {
            Self::Leaf(field, ..) => Shape::Leaf(field.clone()),
            Self::And(children) => Shape::And(children.iter().map(Self::shape).collect()),
            Self::Or(children) => Shape::Or(children.iter().map(Self::shape).collect()),
        }
    }

    fn leaves(&self) -> usize {
        match self {
            Self::Leaf(..) => 1,
            Self::And(children) | Self::Or(children) => children.iter().map(Self::leaves).sum(),
        }
    }
}

fn node_strategy() -> impl Strategy<Value = GenNode> {
    let op = prop_oneof![Just("="), Just("!="), Just(">"), Just("<"), Just(">="), Just("<=")];
    let leaf = ("c_[a-z]{1,5}", op, any::<i32>())
        .prop_map(|(field, op, value)| GenNode::Leaf(field, op, value));
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1 .. 4).prop_map(GenNode::And),
            prop::collection::vec(inner, 1 .. 4).prop_map(GenNode::Or),
        ]
    })
}

/// Parses rendered SQL back into a grouping shape.
fn reparse(text: &str) -> Shape {
    let mut rest = text;
    let shape = parse_term(&mut rest);
    assert!(rest.is_empty(), "trailing text: {rest}");
    shape
}

fn parse_term(rest: &mut &str) -> Shape {
    if let Some(inner) = rest.strip_prefix('(') {
        *rest = inner;
        let mut children = vec![parse_term(rest)];
        let mut kind: Option<&str> = None;
        loop {
            if let Some(after) = rest.strip_prefix(')') {
                *rest = after;
                break;
            }
            let (joiner, after) = if let Some(after) = rest.strip_prefix(" AND ") {
                ("AND", after)
            } else if let Some(after) = rest.strip_prefix(" OR ") {
                ("OR", after)
            } else {
                panic!("unexpected text: {rest}");
            };
            assert!(kind.is_none_or(|seen| seen == joiner), "mixed joiners in one group");
            kind = Some(joiner);
            *rest = after;
            children.push(parse_term(rest));
        }
        return match kind {
            Some("OR") => Shape::Or(children),
            _ => Shape::And(children),
        };
    }
    let end = [" AND ", " OR ", ")"]
        .iter()
        .filter_map(|token| rest.find(token))
        .min()
        .unwrap_or(rest.len());
    let (leaf, after) = rest.split_at(end);
    *rest = after;
    Shape::Leaf(leaf.split(' ').next().unwrap().to_string())
}

/// Normalizes single-child groups, whose joiner cannot be recovered from text.
fn normalize(shape: Shape) -> Shape {
    match shape {
        Shape::Leaf(field) => Shape::Leaf(field),
        Shape::And(children) | Shape::Or(children) if children.len() == 1 => {
            Shape::And(children.into_iter().map(normalize).collect())
        }
        Shape::And(children) => Shape::And(children.into_iter().map(normalize).collect()),
        Shape::Or(children) => Shape::Or(children.into_iter().map(normalize).collect()),
    }
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn rendered_grouping_mirrors_tree(node in node_strategy()) {
        let tree = ConditionTree::create_root(&node.to_json()).unwrap();
        let fragment = tree.to_sql_text();
        prop_assert_eq!(normalize(reparse(&fragment.text)), normalize(node.shape()));
    }

    #[test]
    fn binding_matches_emitted_placeholders(node in node_strategy()) {
        let tree = ConditionTree::create_root(&node.to_json()).unwrap();
        let fragment = tree.to_sql_text();
        let mut bound: Vec<(String, Value)> = Vec::new();
        tree.bind_values(&mut bound).unwrap();
        let names: Vec<String> = bound.into_iter().map(|(name, _)| name).collect();
        prop_assert_eq!(&names, &fragment.params);
        prop_assert_eq!(names.len(), node.leaves());
        prop_assert_eq!(names.len(), tree.placeholder_count());
        let distinct: BTreeSet<&String> = names.iter().collect();
        prop_assert_eq!(distinct.len(), names.len());
    }

    #[test]
    fn same_kind_comparison_follows_integer_order(left in any::<i32>(), right in any::<i32>()) {
        let ordering = Value::Int32(left).try_cmp(&Value::Int32(right)).unwrap();
        prop_assert_eq!(ordering, left.cmp(&right));
        prop_assert_eq!(
            Value::Int32(left).compare(CompareOp::Lt, &Value::Int32(right)).unwrap(),
            left < right
        );
    }

    #[test]
    fn cross_kind_comparison_is_type_mismatch(number in any::<i64>(), text in "[a-z]{0,8}") {
        let err = Value::Int64(number).compare(CompareOp::Eq, &Value::text(text)).unwrap_err();
        let is_mismatch = matches!(err, ValueError::TypeMismatch { .. });
        prop_assert!(is_mismatch);
    }
}
