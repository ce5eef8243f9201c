//! Resolution of logical expressions against command output and variables.
//!
//! Members are evaluated in insertion order and aggregation short-circuits:
//!
//! | Condition | Returns |
//! |---|---|
//! | `OR`   | first member that resolves true, else the generic failure |
//! | `NOR`  | generic failure if any member resolves true, else generic success |
//! | `AND`  | generic failure if any member resolves false, else generic success |
//! | `NAND` | first member that resolves false, else the generic failure |
//!
//! An empty expression is a generic success.

use log::trace;

use super::expression::{FlowConnector, LogicalCondition, LogicalExpression, Resolvable};
use super::result::{ExpressionResult, messages};
use super::Variables;

/// Resolve `expression` against `output` and `variables`.
pub fn resolve<E: FlowConnector>(
    output: &str,
    variables: &Variables,
    expression: &LogicalExpression<E>,
) -> ExpressionResult {
    if expression.is_empty() {
        return ExpressionResult::default_outcome();
    }

    let mut members = expression
        .resolvables()
        .iter()
        .map(|member| resolve_member(output, variables, member));

    let result = match expression.logical_condition() {
        LogicalCondition::Or => members
            .find(|r| r.resolved)
            .unwrap_or_else(did_not_reach_outcome),
        LogicalCondition::Nor => {
            if members.any(|r| r.resolved) {
                did_not_reach_outcome()
            } else {
                ExpressionResult::default_outcome()
            }
        }
        LogicalCondition::And => {
            if members.any(|r| !r.resolved) {
                did_not_reach_outcome()
            } else {
                ExpressionResult::default_outcome()
            }
        }
        LogicalCondition::Nand => members
            .find(|r| !r.resolved)
            .unwrap_or_else(did_not_reach_outcome),
    };

    trace!("Resolved {} to {}", expression, result);
    result
}

fn resolve_member<E: FlowConnector>(
    output: &str,
    variables: &Variables,
    member: &Resolvable<E>,
) -> ExpressionResult {
    match member {
        Resolvable::Connector(connector) => resolve_connector(output, variables, connector),
        Resolvable::Expression(nested) => resolve(output, variables, nested),
    }
}

fn resolve_connector<E: FlowConnector>(
    output: &str,
    variables: &Variables,
    connector: &E,
) -> ExpressionResult {
    let (candidate, relation, expected) = connector.comparison(output, variables);
    match relation.evaluate(&candidate, &expected) {
        Ok(holds) => connector.expression_result().clone().with_resolved(holds),
        Err(fault) => ExpressionResult::execution_error(fault.message()),
    }
}

fn did_not_reach_outcome() -> ExpressionResult {
    ExpressionResult::execution_error(messages::COMMAND_DID_NOT_REACH_OUTCOME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{BinaryRelation, ExecutionCondition, ExpectedOutcome, ResultStatus};

    fn contains(value: &str) -> ExpectedOutcome {
        ExpectedOutcome::new(BinaryRelation::Contains, value)
    }

    fn tagged(value: &str, message: &str) -> ExpectedOutcome {
        contains(value).with_expression_result(ExpressionResult::new(
            false,
            ResultStatus::Failure,
            message,
        ))
    }

    fn expr(condition: LogicalCondition, leaves: &[&str]) -> LogicalExpression<ExpectedOutcome> {
        leaves
            .iter()
            .fold(LogicalExpression::new(), |e, leaf| e.add_resolvable(contains(leaf)))
            .with_logical_condition(condition)
    }

    #[test]
    fn test_empty_expression_succeeds() {
        let empty: LogicalExpression<ExpectedOutcome> = LogicalExpression::new();
        assert_eq!(
            resolve("anything", &Variables::new(), &empty),
            ExpressionResult::default_outcome()
        );
    }

    #[test]
    fn test_and_all_true_then_each_single_flip() {
        let vars = Variables::new();
        let leaves = ["alpha", "beta", "gamma"];
        let output = "alpha beta gamma";

        let all = resolve(output, &vars, &expr(LogicalCondition::And, &leaves));
        assert_eq!(all, ExpressionResult::default_outcome());

        for missing in leaves {
            let flipped = output.replace(missing, "");
            let result = resolve(&flipped, &vars, &expr(LogicalCondition::And, &leaves));
            assert!(result.is_failure(), "flipping {missing} should fail");
            assert!(!result.resolved);
        }
    }

    #[test]
    fn test_or_all_false_fails() {
        let result = resolve(
            "nothing here",
            &Variables::new(),
            &expr(LogicalCondition::Or, &["a1", "b2", "c3"]),
        );
        assert!(result.is_failure());
        assert_eq!(result.message, messages::COMMAND_DID_NOT_REACH_OUTCOME);
    }

    #[test]
    fn test_or_returns_embedded_result_of_the_true_leaf() {
        let expression = LogicalExpression::new()
            .add_resolvable(contains("#"))
            .add_resolvable(tagged("Permission denied", "Wrong username or password"))
            .with_logical_condition(LogicalCondition::Or);

        let result = resolve("Permission denied, please try again", &Variables::new(), &expression);
        assert!(result.resolved);
        assert_eq!(result.outcome, ResultStatus::Failure);
        assert_eq!(result.message, "Wrong username or password");
    }

    #[test]
    fn test_nor() {
        let vars = Variables::new();
        let e = expr(LogicalCondition::Nor, &["error", "denied"]);
        assert_eq!(resolve("all good", &vars, &e), ExpressionResult::default_outcome());
        assert!(resolve("access denied", &vars, &e).is_failure());
    }

    #[test]
    fn test_nand_returns_first_false_leaf() {
        let vars = Variables::new();
        let expression = LogicalExpression::new()
            .add_resolvable(contains("up"))
            .add_resolvable(tagged("ready", "not ready"))
            .with_logical_condition(LogicalCondition::Nand);

        let partial = resolve("link up", &vars, &expression);
        assert!(!partial.resolved);
        assert_eq!(partial.message, "not ready");

        let all_true = resolve("link up and ready", &vars, &expression);
        assert_eq!(all_true.message, messages::COMMAND_DID_NOT_REACH_OUTCOME);
    }

    #[test]
    fn test_nested_expressions() {
        // (A and B) or C
        let vars = Variables::new();
        let a_and_b = expr(LogicalCondition::And, &["A", "B"]);
        let expression = LogicalExpression::new()
            .add_expression(a_and_b)
            .add_resolvable(contains("C"))
            .with_logical_condition(LogicalCondition::Or);

        assert!(resolve("A B", &vars, &expression).resolved);
        assert!(resolve("C", &vars, &expression).resolved);
        assert!(!resolve("A", &vars, &expression).resolved);
    }

    #[test]
    fn test_non_numeric_comparand_fails_without_panic() {
        let expression = LogicalExpression::of(ExpectedOutcome::new(
            BinaryRelation::GreaterThan,
            "10",
        ))
        .with_logical_condition(LogicalCondition::Nand);

        let result = resolve("not a number", &Variables::new(), &expression);
        assert!(result.is_failure());
        assert_eq!(result.message, messages::EXPECTED_OUTCOME_NOT_NUMERIC);
    }

    #[test]
    fn test_execution_condition_against_variables() {
        let mut vars = Variables::new();
        vars.insert("var.counter".into(), "4".into());
        vars.insert("var.repeatCount".into(), "5".into());

        let cond = LogicalExpression::of(ExecutionCondition::new(
            "$var.counter",
            BinaryRelation::LesserOrEqualTo,
            "$var.repeatCount",
        ));
        assert!(resolve("", &vars, &cond).resolved);

        vars.insert("var.counter".into(), "6".into());
        assert!(!resolve("", &vars, &cond).resolved);
    }
}
