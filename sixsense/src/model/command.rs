//! A single shell interaction.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pipes::OutputPipe;
use super::retention::ResultRetention;
use crate::logic::{ExecutionCondition, ExpectedOutcome, LogicalExpression};

/// Channel commands run on unless told otherwise.
pub const DEFAULT_CHANNEL: &str = "REMOTE";

/// One command written to a channel and judged by its output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Command {
    pub uuid: Uuid,
    pub channel_name: String,
    /// May contain `$variable` references.
    pub command_text: String,
    /// Quiet period before the first completion check.
    pub minimal_seconds_to_response: u64,
    pub seconds_to_timeout: u64,
    /// Trim the channel buffer to its last line once the command finishes.
    pub requires_cleanup: bool,
    /// Join buffered lines verbatim instead of filtering echo and prompt.
    pub use_raw_output: bool,
    pub output_pipes: IndexSet<OutputPipe>,
    pub retention_pipes: IndexSet<OutputPipe>,
    pub execution_condition: LogicalExpression<ExecutionCondition>,
    pub expected_outcome: LogicalExpression<ExpectedOutcome>,
    pub dynamic_fields: IndexMap<String, String>,
    pub save_to: ResultRetention,
}

impl Default for Command {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            channel_name: DEFAULT_CHANNEL.to_string(),
            command_text: String::new(),
            minimal_seconds_to_response: 0,
            seconds_to_timeout: 10,
            requires_cleanup: true,
            use_raw_output: false,
            output_pipes: IndexSet::new(),
            retention_pipes: IndexSet::new(),
            execution_condition: LogicalExpression::new(),
            expected_outcome: LogicalExpression::new(),
            dynamic_fields: IndexMap::new(),
            save_to: ResultRetention::default(),
        }
    }
}

impl Command {
    pub fn new(channel_name: &str, command_text: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.to_uppercase(),
            command_text: command_text.into(),
            ..Default::default()
        }
    }

    pub fn with_channel_name(mut self, channel_name: &str) -> Self {
        self.channel_name = channel_name.to_uppercase();
        self
    }

    pub fn with_command_text(mut self, text: impl Into<String>) -> Self {
        self.command_text = text.into();
        self
    }

    pub fn with_minimal_seconds_to_response(mut self, seconds: u64) -> Self {
        self.minimal_seconds_to_response = seconds;
        self
    }

    pub fn with_seconds_to_timeout(mut self, seconds: u64) -> Self {
        self.seconds_to_timeout = seconds;
        self
    }

    pub fn with_requires_cleanup(mut self, requires_cleanup: bool) -> Self {
        self.requires_cleanup = requires_cleanup;
        self
    }

    pub fn with_use_raw_output(mut self, use_raw_output: bool) -> Self {
        self.use_raw_output = use_raw_output;
        self
    }

    pub fn add_output_pipe(mut self, pipe: OutputPipe) -> Self {
        self.output_pipes.insert(pipe);
        self
    }

    pub fn add_retention_pipe(mut self, pipe: OutputPipe) -> Self {
        self.retention_pipes.insert(pipe);
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

    pub fn with_save_to(mut self, save_to: ResultRetention) -> Self {
        self.save_to = save_to;
        self
    }
}
