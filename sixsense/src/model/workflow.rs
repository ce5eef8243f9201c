//! Sets of operations that run concurrently.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Operation;
use crate::logic::{ExecutionCondition, LogicalExpression};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowPolicy {
    /// A failing operation does not affect its siblings.
    OperationsIndependent,
    /// A failing operation terminates every sibling still running.
    OperationsDependent,
    /// Continuations fire once every operation has completed.
    SelfSequenceLazy,
    /// Continuations fire on the first operation outcome.
    SelfSequenceEager,
}

impl WorkflowPolicy {
    fn opposite(&self) -> WorkflowPolicy {
        match self {
            WorkflowPolicy::OperationsIndependent => WorkflowPolicy::OperationsDependent,
            WorkflowPolicy::OperationsDependent => WorkflowPolicy::OperationsIndependent,
            WorkflowPolicy::SelfSequenceLazy => WorkflowPolicy::SelfSequenceEager,
            WorkflowPolicy::SelfSequenceEager => WorkflowPolicy::SelfSequenceLazy,
        }
    }
}

/// Operations fanned out together, with continuations keyed by outcome.
///
/// The same workflow (by uuid) may be listed as a continuation of several
/// parents; it then runs once, after every parent has completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParallelWorkflow {
    pub uuid: Uuid,
    pub parallel_operations: Vec<Operation>,
    pub workflow_policies: IndexSet<WorkflowPolicy>,
    pub execution_condition: LogicalExpression<ExecutionCondition>,
    pub dynamic_fields: IndexMap<String, String>,
    pub sequence_upon_success: Vec<ParallelWorkflow>,
    pub sequence_upon_failure: Vec<ParallelWorkflow>,
}

impl Default for ParallelWorkflow {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            parallel_operations: Vec::new(),
            workflow_policies: IndexSet::from([
                WorkflowPolicy::OperationsIndependent,
                WorkflowPolicy::SelfSequenceLazy,
            ]),
            execution_condition: LogicalExpression::new(),
            dynamic_fields: IndexMap::new(),
            sequence_upon_success: Vec::new(),
            sequence_upon_failure: Vec::new(),
        }
    }
}

impl ParallelWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_operation(mut self, operation: Operation) -> Self {
        self.parallel_operations.push(operation);
        self
    }

    /// Set a policy, replacing its mutually exclusive counterpart.
    pub fn with_policy(mut self, policy: WorkflowPolicy) -> Self {
        self.workflow_policies.shift_remove(&policy.opposite());
        self.workflow_policies.insert(policy);
        self
    }

    pub fn has_policy(&self, policy: WorkflowPolicy) -> bool {
        self.workflow_policies.contains(&policy)
    }

    pub fn with_execution_condition(
        mut self,
        condition: LogicalExpression<ExecutionCondition>,
    ) -> Self {
        self.execution_condition = condition;
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

    /// Fixed when the workflow is composed.
    pub fn total_operations(&self) -> usize {
        self.parallel_operations.len()
    }

    pub fn continuations(&self) -> impl Iterator<Item = &ParallelWorkflow> {
        self.sequence_upon_success
            .iter()
            .chain(self.sequence_upon_failure.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies() {
        let workflow = ParallelWorkflow::new();
        assert!(workflow.has_policy(WorkflowPolicy::OperationsIndependent));
        assert!(workflow.has_policy(WorkflowPolicy::SelfSequenceLazy));
    }

    #[test]
    fn test_policy_replaces_opposite() {
        let workflow = ParallelWorkflow::new()
            .with_policy(WorkflowPolicy::OperationsDependent)
            .with_policy(WorkflowPolicy::SelfSequenceEager);
        assert!(!workflow.has_policy(WorkflowPolicy::OperationsIndependent));
        assert!(!workflow.has_policy(WorkflowPolicy::SelfSequenceLazy));
        assert_eq!(workflow.workflow_policies.len(), 2);
    }

    #[test]
    fn test_policy_serde_names() {
        let json = serde_json::to_string(&WorkflowPolicy::SelfSequenceEager).unwrap();
        assert_eq!(json, "\"SELF_SEQUENCE_EAGER\"");
    }
}
