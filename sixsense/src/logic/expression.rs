//! Flow connectors and logical expression trees.

use serde::{Deserialize, Serialize};

use super::relation::BinaryRelation;
use super::result::ExpressionResult;
use super::substitution::evaluate_against_dynamic_fields;
use super::Variables;

/// Aggregation applied to the members of a [`LogicalExpression`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalCondition {
    And,
    #[default]
    Or,
    Nand,
    Nor,
}

/// A resolvable predicate: a binary relation plus the result it carries
/// once it resolves.
pub trait FlowConnector {
    /// `(candidate, relation, expected)` after variable substitution.
    fn comparison(&self, output: &str, variables: &Variables) -> (String, BinaryRelation, String);

    /// Result returned when this connector decides an aggregation.
    fn expression_result(&self) -> &ExpressionResult;
}

/// Gates whether a node runs, by comparing a variable against a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutionCondition {
    /// Usually a `$variable` reference; substituted before comparison.
    pub variable: String,
    pub binary_relation: BinaryRelation,
    pub expected_value: String,
    pub expression_result: ExpressionResult,
}

impl ExecutionCondition {
    pub fn new(
        variable: impl Into<String>,
        binary_relation: BinaryRelation,
        expected_value: impl Into<String>,
    ) -> Self {
        Self {
            variable: variable.into(),
            binary_relation,
            expected_value: expected_value.into(),
            expression_result: ExpressionResult::default(),
        }
    }

    pub fn with_expression_result(mut self, result: ExpressionResult) -> Self {
        self.expression_result = result;
        self
    }
}

impl FlowConnector for ExecutionCondition {
    fn comparison(&self, _output: &str, variables: &Variables) -> (String, BinaryRelation, String) {
        (
            evaluate_against_dynamic_fields(&self.variable, variables),
            self.binary_relation,
            evaluate_against_dynamic_fields(&self.expected_value, variables),
        )
    }

    fn expression_result(&self) -> &ExpressionResult {
        &self.expression_result
    }
}

/// Compares a command's parsed output against an expected value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpectedOutcome {
    pub binary_relation: BinaryRelation,
    pub expected_value: String,
    pub expression_result: ExpressionResult,
}

impl ExpectedOutcome {
    pub fn new(binary_relation: BinaryRelation, expected_value: impl Into<String>) -> Self {
        Self {
            binary_relation,
            expected_value: expected_value.into(),
            expression_result: ExpressionResult::default(),
        }
    }

    pub fn with_expression_result(mut self, result: ExpressionResult) -> Self {
        self.expression_result = result;
        self
    }

    /// Matches any output.
    pub fn default_outcome() -> Self {
        Self::new(BinaryRelation::None, "")
    }
}

impl FlowConnector for ExpectedOutcome {
    fn comparison(&self, output: &str, variables: &Variables) -> (String, BinaryRelation, String) {
        (
            output.to_string(),
            self.binary_relation,
            evaluate_against_dynamic_fields(&self.expected_value, variables),
        )
    }

    fn expression_result(&self) -> &ExpressionResult {
        &self.expression_result
    }
}

/// A member of a [`LogicalExpression`]: a leaf or a nested expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolvable<E> {
    Connector(E),
    Expression(LogicalExpression<E>),
}

/// An ordered set of resolvables combined by one [`LogicalCondition`].
///
/// Insertion order is preserved and decides which member wins a
/// short-circuit; inserting an equal member twice is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogicalExpression<E> {
    resolvable_expressions: Vec<Resolvable<E>>,
    logical_condition: LogicalCondition,
}

impl<E> Default for LogicalExpression<E> {
    fn default() -> Self {
        Self {
            resolvable_expressions: Vec::new(),
            logical_condition: LogicalCondition::default(),
        }
    }
}

impl<E: PartialEq> LogicalExpression<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expression holding a single connector.
    pub fn of(connector: E) -> Self {
        Self::new().add_resolvable(connector)
    }

    pub fn add_resolvable(mut self, connector: E) -> Self {
        self.push(Resolvable::Connector(connector));
        self
    }

    pub fn add_expression(mut self, expression: LogicalExpression<E>) -> Self {
        self.push(Resolvable::Expression(expression));
        self
    }

    pub fn with_logical_condition(mut self, condition: LogicalCondition) -> Self {
        self.logical_condition = condition;
        self
    }

    fn push(&mut self, member: Resolvable<E>) {
        if !self.resolvable_expressions.contains(&member) {
            self.resolvable_expressions.push(member);
        }
    }
}

impl<E> LogicalExpression<E> {
    pub fn resolvables(&self) -> &[Resolvable<E>] {
        &self.resolvable_expressions
    }

    pub fn logical_condition(&self) -> LogicalCondition {
        self.logical_condition
    }

    pub fn is_empty(&self) -> bool {
        self.resolvable_expressions.is_empty()
    }
}

impl<E> std::fmt::Display for LogicalExpression<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "LogicalExpression<Empty>")
        } else {
            write!(
                f,
                "LogicalExpression[{}] with aggregation {:?}",
                self.resolvable_expressions.len(),
                self.logical_condition
            )
        }
    }
}
