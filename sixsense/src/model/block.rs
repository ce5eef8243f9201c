//! Ordered groups of nodes with an optional repeat condition.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Node;
use crate::logic::{ExecutionCondition, ExpectedOutcome, LogicalExpression};

/// An ordered sequence of commands and nested blocks.
///
/// With an empty repeat condition the children run once. Otherwise, each
/// time the last child finishes the condition is resolved against the
/// session variables and, while it holds, the whole block runs again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Block {
    pub uuid: Uuid,
    pub children: Vec<Node>,
    pub repeat_condition: LogicalExpression<ExecutionCondition>,
    pub execution_condition: LogicalExpression<ExecutionCondition>,
    /// Resolved against the last command output once all children succeed.
    pub expected_outcome: LogicalExpression<ExpectedOutcome>,
    pub dynamic_fields: IndexMap<String, String>,
}

impl Default for Block {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            children: Vec::new(),
            repeat_condition: LogicalExpression::new(),
            execution_condition: LogicalExpression::new(),
            expected_outcome: LogicalExpression::new(),
            dynamic_fields: IndexMap::new(),
        }
    }
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_repeat_condition(
        mut self,
        condition: LogicalExpression<ExecutionCondition>,
    ) -> Self {
        self.repeat_condition = condition;
        self
    }

    pub fn with_execution_condition(
        mut self,
        condition: LogicalExpression<ExecutionCondition>,
    ) -> Self {
        self.execution_condition = condition;
        self
    }

    pub fn with_expected_outcome(mut self, outcome: LogicalExpression<ExpectedOutcome>) -> Self {
        self.expected_outcome = outcome;
        self
    }

    pub fn with_dynamic_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.dynamic_fields.insert(key.into(), value.into());
        self
    }

    /// Whether every child can run inside a session.
    pub fn is_valid(&self) -> bool {
        self.children.iter().all(|child| match child {
            Node::Command(_) => true,
            Node::Block(block) => block.is_valid(),
            Node::Operation(_) | Node::Workflow(_) => false,
        })
    }
}
