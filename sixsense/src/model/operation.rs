//! Device-bound execution trees.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Node, ParallelWorkflow};
use crate::logic::{ExecutionCondition, ExpectedOutcome, LogicalExpression};

/// One command tree bound to one device, run in its own session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Operation {
    pub uuid: Uuid,
    pub operation_name: String,
    /// A command or a block.
    pub execution_block: Box<Node>,
    /// Upper-case names of the channels the session opens.
    pub channel_names: IndexSet<String>,
    pub execution_condition: LogicalExpression<ExecutionCondition>,
    pub expected_outcome: LogicalExpression<ExpectedOutcome>,
    pub dynamic_fields: IndexMap<String, String>,
    pub sequence_upon_success: Vec<ParallelWorkflow>,
    pub sequence_upon_failure: Vec<ParallelWorkflow>,
}

impl Default for Operation {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            operation_name: String::new(),
            execution_block: Box::new(Node::Block(Default::default())),
            channel_names: IndexSet::new(),
            execution_condition: LogicalExpression::new(),
            expected_outcome: LogicalExpression::new(),
            dynamic_fields: IndexMap::new(),
            sequence_upon_success: Vec::new(),
            sequence_upon_failure: Vec::new(),
        }
    }
}

impl Operation {
    pub fn new(name: impl Into<String>, execution_block: impl Into<Node>) -> Self {
        Self {
            operation_name: name.into(),
            execution_block: Box::new(execution_block.into()),
            ..Default::default()
        }
    }

    pub fn add_channel(mut self, channel_name: &str) -> Self {
        self.channel_names.insert(channel_name.to_uppercase());
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

    pub fn add_success_sequence(mut self, workflow: ParallelWorkflow) -> Self {
        self.sequence_upon_success.push(workflow);
        self
    }

    pub fn add_failure_sequence(mut self, workflow: ParallelWorkflow) -> Self {
        self.sequence_upon_failure.push(workflow);
        self
    }

    /// Every workflow this operation may continue with.
    pub fn continuations(&self) -> impl Iterator<Item = &ParallelWorkflow> {
        self.sequence_upon_success
            .iter()
            .chain(self.sequence_upon_failure.iter())
    }
}
