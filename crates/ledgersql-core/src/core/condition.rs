// crates/ledgersql-core/src/core/condition.rs
// ============================================================================
// Module: LedgerSQL Condition Compiler
// Description: Expression trees for the JSON condition grammar.
// Purpose: Parse conditions once and render parameterized SQL plus bindings.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! Conditions arrive as JSON:
//!
//! ```text
//! {"And": [cond, ...]} | {"Or": [cond, ...]} | {field: {operator: value | [values]}}
//! ```
//!
//! `{field: value}` is shorthand for equality, a multi-key object is an
//! implicit `And` over its keys in sorted order, and a top-level array is an
//! implicit `And` over its elements.
//!
//! Every bound parameter receives its placeholder when the tree is built:
//! `:field_N`, where `N` is a counter over all parameters of the statement.
//! Because `N` is unique and always follows the last underscore, two
//! placeholders never collide even when field names contain underscores.
//! Rendering and binding walk the same in-order traversal, so the bound
//! names always match the rendered text one-to-one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::Map;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::core::identifiers::validate_sql_identifier;
use crate::core::value::CompareOp;
use crate::core::value::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum nesting depth of logical nodes.
pub const MAX_CONDITION_DEPTH: usize = 32;
/// Maximum number of leaves in one condition.
pub const MAX_CONDITION_LEAVES: usize = 256;
/// Maximum length of a column name.
pub const MAX_FIELD_NAME_LENGTH: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Condition parsing and binding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    /// Condition JSON is malformed.
    #[error("condition parse error: {0}")]
    Parse(String),
    /// Bound values do not match the operator arity.
    #[error("condition bind error: {0}")]
    Bind(String),
}

// ============================================================================
// SECTION: Operators
// ============================================================================

/// Comparison operators accepted in leaf conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `IN (...)`
    In,
    /// `LIKE`
    Like,
    /// `BETWEEN a AND b`
    Between,
}

impl ConditionOp {
    /// Parses an operator token (symbolic, keyword, or `$`-prefixed).
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let lowered = token.trim().to_ascii_lowercase();
        let bare = lowered.strip_prefix('$').unwrap_or(&lowered);
        match bare {
            "=" | "==" | "eq" => Some(Self::Eq),
            "!=" | "<>" | "\u{2260}" | "ne" => Some(Self::Ne),
            ">" | "gt" => Some(Self::Gt),
            "<" | "lt" => Some(Self::Lt),
            ">=" | "\u{2265}" | "ge" | "gte" => Some(Self::Ge),
            "<=" | "\u{2264}" | "le" | "lte" => Some(Self::Le),
            "in" => Some(Self::In),
            "like" => Some(Self::Like),
            "between" => Some(Self::Between),
            _ => None,
        }
    }

    /// Returns the SQL spelling of the operator.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::In => "IN",
            Self::Like => "LIKE",
            Self::Between => "BETWEEN",
        }
    }

    /// Returns the scalar comparison for single-valued operators.
    #[must_use]
    pub const fn compare_op(self) -> Option<CompareOp> {
        match self {
            Self::Eq => Some(CompareOp::Eq),
            Self::Ne => Some(CompareOp::Ne),
            Self::Gt => Some(CompareOp::Gt),
            Self::Lt => Some(CompareOp::Lt),
            Self::Ge => Some(CompareOp::Ge),
            Self::Le => Some(CompareOp::Le),
            Self::In | Self::Like | Self::Between => None,
        }
    }
}

// ============================================================================
// SECTION: Tree Types
// ============================================================================

/// Logical node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicKind {
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
}

impl LogicKind {
    /// Returns the SQL keyword joining children.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Leaf predicate `field operator values`.
///
/// # Invariants
/// - `field` is a validated SQL identifier.
/// - `placeholders` are fixed at construction and unique within the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionLeaf {
    /// Column name.
    field: String,
    /// Comparison operator.
    op: ConditionOp,
    /// Literal values in declaration order.
    values: Vec<Value>,
    /// Placeholder names (with `:` prefix) rendered into the SQL text.
    placeholders: Vec<String>,
}

impl ConditionLeaf {
    /// Returns the column name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the operator.
    #[must_use]
    pub const fn op(&self) -> ConditionOp {
        self.op
    }

    /// Returns the literal values.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the placeholder names.
    #[must_use]
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Renders the leaf as SQL text.
    fn render(&self) -> String {
        match self.op {
            ConditionOp::In => {
                format!("{} IN ({})", self.field, self.placeholders.join(", "))
            }
            ConditionOp::Between => format!(
                "{} BETWEEN {} AND {}",
                self.field,
                self.placeholders.first().map_or("", String::as_str),
                self.placeholders.get(1).map_or("", String::as_str)
            ),
            op => format!(
                "{} {} {}",
                self.field,
                op.sql(),
                self.placeholders.first().map_or("", String::as_str)
            ),
        }
    }

    /// Checks the value count against the operator arity.
    fn check_arity(&self) -> Result<(), ConditionError> {
        let count = self.values.len();
        let ok = match self.op {
            ConditionOp::In => count >= 1,
            ConditionOp::Between => count == 2,
            _ => count == 1,
        };
        if ok && count == self.placeholders.len() {
            return Ok(());
        }
        Err(ConditionError::Bind(format!(
            "{} {} expects {} value(s), got {count}",
            self.field,
            self.op.sql(),
            match self.op {
                ConditionOp::In => "at least 1",
                ConditionOp::Between => "2",
                _ => "1",
            }
        )))
    }
}

/// Condition tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionNode {
    /// Conjunction of at least one child.
    And(Vec<Self>),
    /// Disjunction of at least one child.
    Or(Vec<Self>),
    /// Leaf predicate.
    Leaf(ConditionLeaf),
}

/// Parsed condition with its placeholder allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionTree {
    /// Root node.
    root: ConditionNode,
    /// Number of placeholders allocated by this tree.
    placeholder_count: usize,
}

// ============================================================================
// SECTION: Placeholder Allocation
// ============================================================================

/// Allocates `:field_N` placeholders with a statement-wide counter.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderAllocator {
    /// Next suffix to hand out.
    next: usize,
}

impl PlaceholderAllocator {
    /// Creates an allocator starting at `start`.
    #[must_use]
    pub const fn starting_at(start: usize) -> Self {
        Self {
            next: start,
        }
    }

    /// Returns a fresh placeholder for `field`.
    pub fn allocate(&mut self, field: &str) -> String {
        let name = format!(":{field}_{}", self.next);
        self.next += 1;
        name
    }

    /// Returns the number of placeholders handed out so far.
    #[must_use]
    pub const fn allocated(&self) -> usize {
        self.next
    }
}

// ============================================================================
// SECTION: Traversal
// ============================================================================

/// Phase reported to node callbacks during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitPhase {
    /// Before the first child.
    Begin,
    /// Between two consecutive children.
    Processing,
    /// After the last child.
    End,
}

/// Visitor over a condition tree.
pub trait ConditionVisitor {
    /// Error returned by callbacks to abort the traversal.
    type Error;

    /// Called for every leaf in order.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` to stop traversal.
    fn visit_leaf(&mut self, leaf: &ConditionLeaf) -> Result<(), Self::Error>;

    /// Called around and between the children of logical nodes.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` to stop traversal.
    fn visit_node(&mut self, _kind: LogicKind, _phase: VisitPhase) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Walks `node` in order, invoking the visitor callbacks.
///
/// # Errors
///
/// Returns the first error produced by the visitor.
pub fn traverse<V: ConditionVisitor>(
    node: &ConditionNode,
    visitor: &mut V,
) -> Result<(), V::Error> {
    match node {
        ConditionNode::Leaf(leaf) => visitor.visit_leaf(leaf),
        ConditionNode::And(children) => traverse_children(LogicKind::And, children, visitor),
        ConditionNode::Or(children) => traverse_children(LogicKind::Or, children, visitor),
    }
}

/// Walks the children of a logical node.
fn traverse_children<V: ConditionVisitor>(
    kind: LogicKind,
    children: &[ConditionNode],
    visitor: &mut V,
) -> Result<(), V::Error> {
    visitor.visit_node(kind, VisitPhase::Begin)?;
    for (index, child) in children.iter().enumerate() {
        if index > 0 {
            visitor.visit_node(kind, VisitPhase::Processing)?;
        }
        traverse(child, visitor)?;
    }
    visitor.visit_node(kind, VisitPhase::End)
}

/// Renders SQL text and collects placeholders in emission order.
#[derive(Default)]
struct SqlRenderer {
    /// Accumulated text.
    text: String,
    /// Placeholders in emission order.
    params: Vec<String>,
}

impl ConditionVisitor for SqlRenderer {
    type Error = std::convert::Infallible;

    fn visit_leaf(&mut self, leaf: &ConditionLeaf) -> Result<(), Self::Error> {
        self.text.push_str(&leaf.render());
        self.params.extend(leaf.placeholders.iter().cloned());
        Ok(())
    }

    fn visit_node(&mut self, kind: LogicKind, phase: VisitPhase) -> Result<(), Self::Error> {
        match phase {
            VisitPhase::Begin => self.text.push('('),
            VisitPhase::Processing => {
                self.text.push(' ');
                self.text.push_str(kind.sql());
                self.text.push(' ');
            }
            VisitPhase::End => self.text.push(')'),
        }
        Ok(())
    }
}

/// Collects referenced field names.
#[derive(Default)]
struct FieldCollector {
    /// Distinct field names.
    fields: BTreeSet<String>,
}

impl ConditionVisitor for FieldCollector {
    type Error = std::convert::Infallible;

    fn visit_leaf(&mut self, leaf: &ConditionLeaf) -> Result<(), Self::Error> {
        self.fields.insert(leaf.field.clone());
        Ok(())
    }
}

/// Receives `(placeholder, value)` pairs during binding.
pub trait StatementBinder {
    /// Binds one value to a named placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError::Bind`] when the backend rejects the binding.
    fn bind(&mut self, placeholder: &str, value: &Value) -> Result<(), ConditionError>;
}

impl StatementBinder for Vec<(String, Value)> {
    fn bind(&mut self, placeholder: &str, value: &Value) -> Result<(), ConditionError> {
        self.push((placeholder.to_string(), value.clone()));
        Ok(())
    }
}

/// Binds leaf values through a [`StatementBinder`].
struct BindVisitor<'a, B: StatementBinder> {
    /// Target binder.
    binder: &'a mut B,
}

impl<B: StatementBinder> ConditionVisitor for BindVisitor<'_, B> {
    type Error = ConditionError;

    fn visit_leaf(&mut self, leaf: &ConditionLeaf) -> Result<(), Self::Error> {
        leaf.check_arity()?;
        for (placeholder, value) in leaf.placeholders.iter().zip(&leaf.values) {
            self.binder.bind(placeholder, value)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Condition Tree
// ============================================================================

/// Rendered condition text and its placeholders in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFragment {
    /// SQL text suitable for a `WHERE` clause.
    pub text: String,
    /// Placeholder names in the order they appear in `text`.
    pub params: Vec<String>,
}

impl ConditionTree {
    /// Parses the JSON condition grammar into a tree.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError::Parse`] for malformed conditions: missing
    /// operators, empty children, invalid field names, or unsupported literals.
    pub fn create_root(conditions: &JsonValue) -> Result<Self, ConditionError> {
        let mut parser = Parser {
            allocator: PlaceholderAllocator::default(),
            leaves: 0,
        };
        let root = parser.parse_condition(conditions, 0)?;
        Ok(Self {
            root,
            placeholder_count: parser.allocator.allocated(),
        })
    }

    /// Returns the root node.
    #[must_use]
    pub const fn root(&self) -> &ConditionNode {
        &self.root
    }

    /// Returns how many placeholders this tree allocated.
    ///
    /// Statements adding their own parameters continue numbering from here.
    #[must_use]
    pub const fn placeholder_count(&self) -> usize {
        self.placeholder_count
    }

    /// Renders the tree as parameterized SQL.
    #[must_use]
    pub fn to_sql_text(&self) -> SqlFragment {
        let mut renderer = SqlRenderer::default();
        let Ok(()) = traverse(&self.root, &mut renderer);
        SqlFragment {
            text: renderer.text,
            params: renderer.params,
        }
    }

    /// Binds every leaf value to its placeholder in traversal order.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError::Bind`] when a leaf's value count does not
    /// match its operator (`IN` needs at least one, `BETWEEN` exactly two,
    /// scalar operators exactly one), or when the binder rejects a value.
    pub fn bind_values<B: StatementBinder>(&self, binder: &mut B) -> Result<(), ConditionError> {
        traverse(&self.root, &mut BindVisitor {
            binder,
        })
    }

    /// Returns every field referenced by the condition.
    #[must_use]
    pub fn fields(&self) -> BTreeSet<String> {
        let mut collector = FieldCollector::default();
        let Ok(()) = traverse(&self.root, &mut collector);
        collector.fields
    }

    /// Runs a caller-supplied visitor over the tree.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by the visitor.
    pub fn visit<V: ConditionVisitor>(&self, visitor: &mut V) -> Result<(), V::Error> {
        traverse(&self.root, visitor)
    }
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Recursive-descent parser state.
struct Parser {
    /// Placeholder allocator shared by all leaves.
    allocator: PlaceholderAllocator,
    /// Leaves created so far.
    leaves: usize,
}

impl Parser {
    /// Parses any condition form.
    fn parse_condition(
        &mut self,
        value: &JsonValue,
        depth: usize,
    ) -> Result<ConditionNode, ConditionError> {
        if depth > MAX_CONDITION_DEPTH {
            return Err(parse_error("condition nesting exceeds max depth"));
        }
        match value {
            JsonValue::Object(map) => self.parse_object(map, depth),
            JsonValue::Array(items) => {
                Ok(ConditionNode::And(self.parse_children(items, depth)?))
            }
            _ => Err(parse_error("condition must be an object or array")),
        }
    }

    /// Parses an object: logical node, single leaf, or implicit conjunction.
    fn parse_object(
        &mut self,
        map: &Map<String, JsonValue>,
        depth: usize,
    ) -> Result<ConditionNode, ConditionError> {
        if map.is_empty() {
            return Err(parse_error("condition object must not be empty"));
        }
        let mut nodes = Vec::with_capacity(map.len());
        for (key, body) in map {
            nodes.push(self.parse_entry(key, body, depth)?);
        }
        if nodes.len() == 1 {
            return Ok(nodes.remove(0));
        }
        Ok(ConditionNode::And(nodes))
    }

    /// Parses one `key: body` entry.
    fn parse_entry(
        &mut self,
        key: &str,
        body: &JsonValue,
        depth: usize,
    ) -> Result<ConditionNode, ConditionError> {
        if let Some(kind) = logic_key(key) {
            let JsonValue::Array(items) = body else {
                return Err(parse_error(&format!("{key} expects an array of conditions")));
            };
            let children = self.parse_children(items, depth)?;
            return Ok(match kind {
                LogicKind::And => ConditionNode::And(children),
                LogicKind::Or => ConditionNode::Or(children),
            });
        }
        validate_sql_identifier("field name", key, MAX_FIELD_NAME_LENGTH)
            .map_err(|err| parse_error(&err.to_string()))?;
        match body {
            JsonValue::Object(operators) => {
                if operators.is_empty() {
                    return Err(parse_error(&format!("field {key} is missing an operator")));
                }
                let mut leaves = Vec::with_capacity(operators.len());
                for (token, operand) in operators {
                    let op = ConditionOp::parse(token)
                        .ok_or_else(|| parse_error(&format!("unknown operator {token}")))?;
                    leaves.push(self.make_leaf(key, op, operand)?);
                }
                if leaves.len() == 1 {
                    return Ok(leaves.remove(0));
                }
                Ok(ConditionNode::And(leaves))
            }
            JsonValue::Array(_) => Err(parse_error(&format!("field {key} is missing an operator"))),
            scalar => self.make_leaf(key, ConditionOp::Eq, scalar),
        }
    }

    /// Parses the children of a logical node.
    fn parse_children(
        &mut self,
        items: &[JsonValue],
        depth: usize,
    ) -> Result<Vec<ConditionNode>, ConditionError> {
        if items.is_empty() {
            return Err(parse_error("logical node must have at least one child"));
        }
        items.iter().map(|item| self.parse_condition(item, depth + 1)).collect()
    }

    /// Builds a leaf and allocates its placeholders.
    fn make_leaf(
        &mut self,
        field: &str,
        op: ConditionOp,
        operand: &JsonValue,
    ) -> Result<ConditionNode, ConditionError> {
        self.leaves += 1;
        if self.leaves > MAX_CONDITION_LEAVES {
            return Err(parse_error("condition exceeds max leaf count"));
        }
        let literals: Vec<&JsonValue> = match operand {
            JsonValue::Array(items) => items.iter().collect(),
            single => vec![single],
        };
        let mut values = Vec::with_capacity(literals.len());
        for literal in literals {
            let value = Value::from_json(literal)
                .map_err(|err| parse_error(&format!("field {field}: {err}")))?;
            if op == ConditionOp::Like && !matches!(value, Value::Str(..)) {
                return Err(parse_error(&format!("field {field}: LIKE expects a string pattern")));
            }
            values.push(value);
        }
        let slots = match op {
            ConditionOp::In => values.len(),
            ConditionOp::Between => 2,
            _ => 1,
        };
        let placeholders = (0 .. slots).map(|_| self.allocator.allocate(field)).collect();
        Ok(ConditionNode::Leaf(ConditionLeaf {
            field: field.to_string(),
            op,
            values,
            placeholders,
        }))
    }
}

/// Recognizes logical keys (`And`, `AND`, `$and`, and the `Or` forms).
fn logic_key(key: &str) -> Option<LogicKind> {
    match key {
        "And" | "AND" | "$and" => Some(LogicKind::And),
        "Or" | "OR" | "$or" => Some(LogicKind::Or),
        _ => None,
    }
}

/// Builds a parse error.
fn parse_error(message: &str) -> ConditionError {
    ConditionError::Parse(message.to_string())
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
    fn renders_nested_tree_with_parentheses() {
        let tree = ConditionTree::create_root(&json!({
            "Or": [
                {"id": {">": 1}},
                {"And": [{"name": "a"}, {"age": {"<=": 30}}]}
            ]
        }))
        .unwrap();
        let fragment = tree.to_sql_text();
        assert_eq!(fragment.text, "(id > :id_0 OR (name = :name_1 AND age <= :age_2))");
        assert_eq!(fragment.params, vec![":id_0", ":name_1", ":age_2"]);
    }

    #[test]
    fn single_leaf_renders_without_parentheses() {
        let tree = ConditionTree::create_root(&json!({"id": 1})).unwrap();
        assert_eq!(tree.to_sql_text().text, "id = :id_0");
    }

    #[test]
    fn in_and_between_allocate_one_placeholder_per_value() {
        let tree = ConditionTree::create_root(&json!({
            "And": [{"id": {"in": [1, 2, 3]}}, {"age": {"$between": [10, 20]}}]
        }))
        .unwrap();
        let fragment = tree.to_sql_text();
        assert_eq!(
            fragment.text,
            "(id IN (:id_0, :id_1, :id_2) AND age BETWEEN :age_3 AND :age_4)"
        );
        let mut bound: Vec<(String, Value)> = Vec::new();
        tree.bind_values(&mut bound).unwrap();
        let names: Vec<String> = bound.iter().map(|(name, _)| name.clone()).collect();
        assert_eq!(names, fragment.params);
        assert_eq!(bound[4].1, Value::Int32(20));
    }

    #[test]
    fn arity_mismatch_is_a_bind_error() {
        let between = ConditionTree::create_root(&json!({"age": {"between": [1, 2, 3]}})).unwrap();
        assert!(matches!(between.bind_values(&mut Vec::new()), Err(ConditionError::Bind(_))));
        let empty_in = ConditionTree::create_root(&json!({"id": {"in": []}})).unwrap();
        assert!(matches!(empty_in.bind_values(&mut Vec::new()), Err(ConditionError::Bind(_))));
        let scalar = ConditionTree::create_root(&json!({"id": {"=": [1, 2]}})).unwrap();
        assert!(matches!(scalar.bind_values(&mut Vec::new()), Err(ConditionError::Bind(_))));
    }

    #[test]
    fn malformed_conditions_are_parse_errors() {
        for bad in [
            json!({"And": []}),
            json!({"id": {}}),
            json!({"id": {"~": 1}}),
            json!({"id": null}),
            json!({"bad field": 1}),
            json!({"name": {"like": 5}}),
            json!(42),
            json!({}),
        ] {
            assert!(
                matches!(ConditionTree::create_root(&bad), Err(ConditionError::Parse(_))),
                "expected parse error for {bad}"
            );
        }
    }

    #[test]
    fn operator_spellings_are_equivalent() {
        for token in ["!=", "<>", "\u{2260}", "$ne", "NE"] {
            let tree = ConditionTree::create_root(&json!({"id": {token: 1}})).unwrap();
            assert_eq!(tree.to_sql_text().text, "id <> :id_0");
        }
    }

    #[test]
    fn underscore_fields_never_collide() {
        let tree = ConditionTree::create_root(&json!({
            "And": [{"a": {"in": [1, 2]}}, {"a_1": 3}]
        }))
        .unwrap();
        let params = tree.to_sql_text().params;
        let unique: BTreeSet<&String> = params.iter().collect();
        assert_eq!(unique.len(), params.len());
    }

    #[test]
    fn visitor_reports_node_phases() {
        struct Phases(Vec<VisitPhase>);
        impl ConditionVisitor for Phases {
            type Error = ();
            fn visit_leaf(&mut self, _leaf: &ConditionLeaf) -> Result<(), ()> {
                Ok(())
            }
            fn visit_node(&mut self, _kind: LogicKind, phase: VisitPhase) -> Result<(), ()> {
                self.0.push(phase);
                Ok(())
            }
        }
        let tree = ConditionTree::create_root(&json!([{"a": 1}, {"b": 2}, {"c": 3}])).unwrap();
        let mut phases = Phases(Vec::new());
        tree.visit(&mut phases).unwrap();
        assert_eq!(
            phases.0,
            vec![VisitPhase::Begin, VisitPhase::Processing, VisitPhase::Processing, VisitPhase::End]
        );
        assert_eq!(tree.fields().len(), 3);
    }
}
