//! Command and workflow model.
//!
//! Nodes are plain data: templates that can run any number of times.
//! Execution progress (cursors, executed flags, counters) lives in the
//! session and orchestrator, never on the nodes themselves.

mod block;
mod command;
pub mod internal;
mod operation;
mod pipes;
mod retention;
mod workflow;

pub use block::Block;
pub use command::{Command, DEFAULT_CHANNEL};
pub use operation::Operation;
pub use pipes::{OutputPipe, PipeContext, collapse_whitespace};
pub use retention::{DataType, DatabaseVariable, OperationResult, ResultRetention, RetentionMode};
pub use workflow::{ParallelWorkflow, WorkflowPolicy};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::{ExecutionCondition, LogicalExpression};

/// Any node of an execution tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    Command(Command),
    Block(Block),
    Operation(Operation),
    Workflow(ParallelWorkflow),
}

impl Node {
    pub fn uuid(&self) -> Uuid {
        match self {
            Node::Command(c) => c.uuid,
            Node::Block(b) => b.uuid,
            Node::Operation(o) => o.uuid,
            Node::Workflow(w) => w.uuid,
        }
    }

    pub fn execution_condition(&self) -> &LogicalExpression<ExecutionCondition> {
        match self {
            Node::Command(c) => &c.execution_condition,
            Node::Block(b) => &b.execution_condition,
            Node::Operation(o) => &o.execution_condition,
            Node::Workflow(w) => &w.execution_condition,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Command(_) => "Command",
            Node::Block(_) => "Block",
            Node::Operation(_) => "Operation",
            Node::Workflow(_) => "ParallelWorkflow",
        }
    }
}

impl From<Command> for Node {
    fn from(command: Command) -> Self {
        Node::Command(command)
    }
}

impl From<Block> for Node {
    fn from(block: Block) -> Self {
        Node::Block(block)
    }
}

impl From<Operation> for Node {
    fn from(operation: Operation) -> Self {
        Node::Operation(operation)
    }
}

impl From<ParallelWorkflow> for Node {
    fn from(workflow: ParallelWorkflow) -> Self {
        Node::Workflow(workflow)
    }
}

/// Nodes carrying static `key -> value` pairs pushed as a variable scope.
pub trait DynamicFieldBearer {
    fn dynamic_fields(&self) -> &IndexMap<String, String>;

    fn dynamic_fields_mut(&mut self) -> &mut IndexMap<String, String>;

    fn add_dynamic_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.dynamic_fields_mut().insert(key.into(), value.into());
    }

    fn add_dynamic_fields(&mut self, fields: &IndexMap<String, String>) {
        for (key, value) in fields {
            self.dynamic_fields_mut().insert(key.clone(), value.clone());
        }
    }
}

/// Nodes whose resolved value can be retained.
pub trait Retainable {
    fn save_to(&self) -> &ResultRetention;
}

/// Templates that can produce an independent copy of themselves.
pub trait Resettable: Clone {
    /// Give this node and every descendant a fresh identity.
    fn reset(&mut self);

    /// A copy sharing nothing with `self`, including uuids.
    fn deep_clone(&self) -> Self {
        let mut copy = self.clone();
        copy.reset();
        copy
    }
}

macro_rules! dynamic_field_bearer {
    ($($node:ty),*) => {
        $(
            impl DynamicFieldBearer for $node {
                fn dynamic_fields(&self) -> &IndexMap<String, String> {
                    &self.dynamic_fields
                }

                fn dynamic_fields_mut(&mut self) -> &mut IndexMap<String, String> {
                    &mut self.dynamic_fields
                }
            }
        )*
    };
}

dynamic_field_bearer!(Command, Block, Operation, ParallelWorkflow);

impl DynamicFieldBearer for Node {
    fn dynamic_fields(&self) -> &IndexMap<String, String> {
        match self {
            Node::Command(c) => c.dynamic_fields(),
            Node::Block(b) => b.dynamic_fields(),
            Node::Operation(o) => o.dynamic_fields(),
            Node::Workflow(w) => w.dynamic_fields(),
        }
    }

    fn dynamic_fields_mut(&mut self) -> &mut IndexMap<String, String> {
        match self {
            Node::Command(c) => c.dynamic_fields_mut(),
            Node::Block(b) => b.dynamic_fields_mut(),
            Node::Operation(o) => o.dynamic_fields_mut(),
            Node::Workflow(w) => w.dynamic_fields_mut(),
        }
    }
}

impl Retainable for Command {
    fn save_to(&self) -> &ResultRetention {
        &self.save_to
    }
}

impl Resettable for Command {
    fn reset(&mut self) {
        self.uuid = Uuid::new_v4();
    }
}

impl Resettable for Block {
    fn reset(&mut self) {
        self.uuid = Uuid::new_v4();
        self.children.iter_mut().for_each(Resettable::reset);
    }
}

impl Resettable for Operation {
    fn reset(&mut self) {
        self.uuid = Uuid::new_v4();
        self.execution_block.reset();
        self.sequence_upon_success.iter_mut().for_each(Resettable::reset);
        self.sequence_upon_failure.iter_mut().for_each(Resettable::reset);
    }
}

impl Resettable for ParallelWorkflow {
    fn reset(&mut self) {
        self.uuid = Uuid::new_v4();
        self.parallel_operations.iter_mut().for_each(Resettable::reset);
        self.sequence_upon_success.iter_mut().for_each(Resettable::reset);
        self.sequence_upon_failure.iter_mut().for_each(Resettable::reset);
    }
}

impl Resettable for Node {
    fn reset(&mut self) {
        match self {
            Node::Command(c) => c.reset(),
            Node::Block(b) => b.reset(),
            Node::Operation(o) => o.reset(),
            Node::Workflow(w) => w.reset(),
        }
    }
}
