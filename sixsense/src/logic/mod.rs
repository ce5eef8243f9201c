//! Logical expression engine.
//!
//! Evaluates trees of binary-relation predicates ("flow connectors")
//! against a command's output and the session's variable table.

mod expression;
mod relation;
mod resolver;
mod result;
mod substitution;

use std::collections::HashMap;

pub use expression::{
    ExecutionCondition, ExpectedOutcome, FlowConnector, LogicalCondition, LogicalExpression,
    Resolvable,
};
pub use relation::{BinaryRelation, RelationFault};
pub use resolver::resolve;
pub use result::{ExpressionResult, ResultStatus, messages};
pub use substitution::{VARIABLE_MARK, evaluate_against_dynamic_fields};

/// Current value of every visible variable.
pub type Variables = HashMap<String, String>;
