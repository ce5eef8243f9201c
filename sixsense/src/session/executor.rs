//! Walking command trees inside a session.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::{debug, trace};
use uuid::Uuid;

use super::Session;
use super::command::terminated;
use super::iterator::{ExecutionState, NodePath, child_path};
use crate::engine::EngineEvent;
use crate::logic::{
    ExecutionCondition, ExpectedOutcome, ExpressionResult, LogicalExpression, ResultStatus,
    messages, resolve,
};
use crate::model::{Block, Command, Node, Operation, OperationResult};

impl Session {
    /// Run a whole operation: its scope, execution condition, tree and
    /// expected outcome.
    ///
    /// Database-eventual variables collected before a failure are still
    /// part of the result.
    pub async fn execute_operation(&self, operation: &Operation) -> OperationResult {
        self.emit(EngineEvent::OperationStart {
            session_id: self.id,
            operation_id: operation.uuid,
            operation_name: operation.operation_name.clone(),
        });
        self.load_scope(&operation.dynamic_fields).await;

        let result = if !is_valid_execution_block(&operation.execution_block) {
            self.anomaly(format!(
                "Operation {} has an invalid execution block",
                operation.operation_name
            ));
            ExpressionResult::execution_error(messages::INVALID_EXECUTION_BLOCK)
        } else if self.is_terminated() {
            terminated()
        } else if !self
            .condition_met(operation.uuid, &operation.execution_condition)
            .await
        {
            not_matched()
        } else {
            let mut state = ExecutionState::new();
            let result = self
                .walk(&operation.execution_block, Vec::new(), &mut state)
                .await;
            self.apply_expected_outcome(operation.uuid, result, &operation.expected_outcome)
                .await
        };

        let result = if self.is_terminated() && !result.is_skip() {
            terminated()
        } else {
            result
        };

        let database_variables = self.take_database_variables().await;
        self.unload_scope(&operation.dynamic_fields).await;
        self.emit(EngineEvent::OperationEnd {
            session_id: self.id,
            operation_id: operation.uuid,
            result: result.clone(),
        });

        OperationResult::new(result).with_database_variables(database_variables)
    }

    /// Run a command or block outside of any operation.
    pub async fn execute_node(&self, node: &Node) -> ExpressionResult {
        let mut state = ExecutionState::new();
        self.walk(node, Vec::new(), &mut state).await
    }

    fn walk<'a>(
        &'a self,
        node: &'a Node,
        path: NodePath,
        state: &'a mut ExecutionState,
    ) -> BoxFuture<'a, ExpressionResult> {
        async move {
            match node {
                Node::Command(command) => self.run_command(command).await,
                Node::Block(block) => self.run_block(block, path, state).await,
                Node::Operation(_) | Node::Workflow(_) => {
                    self.anomaly(format!(
                        "{} {} cannot run inside a block",
                        node.kind(),
                        node.uuid()
                    ));
                    ExpressionResult::execution_error(messages::INVALID_EXECUTION_BLOCK)
                }
            }
        }
        .boxed()
    }

    async fn run_command(&self, command: &Command) -> ExpressionResult {
        self.load_scope(&command.dynamic_fields).await;

        let result = if self
            .condition_met(command.uuid, &command.execution_condition)
            .await
        {
            self.ensure_prompt(&command.channel_name).await;
            self.emit(EngineEvent::CommandStart {
                session_id: self.id,
                command_id: command.uuid,
            });
            let result = self.execute_command(command).await;
            self.emit(EngineEvent::CommandEnd {
                session_id: self.id,
                command_id: command.uuid,
                result: result.clone(),
            });
            result
        } else {
            not_matched()
        };

        self.unload_scope(&command.dynamic_fields).await;
        result
    }

    async fn run_block(
        &self,
        block: &Block,
        path: NodePath,
        state: &mut ExecutionState,
    ) -> ExpressionResult {
        self.load_scope(&block.dynamic_fields).await;

        let result = if self
            .condition_met(block.uuid, &block.execution_condition)
            .await
        {
            self.emit(EngineEvent::BlockStart {
                session_id: self.id,
                block_id: block.uuid,
            });
            let result = self.run_children(block, &path, state).await;
            let result = self
                .apply_expected_outcome(block.uuid, result, &block.expected_outcome)
                .await;
            self.emit(EngineEvent::BlockEnd {
                session_id: self.id,
                block_id: block.uuid,
                result: result.clone(),
            });
            result
        } else {
            not_matched()
        };

        self.unload_scope(&block.dynamic_fields).await;
        result
    }

    /// Run children until the block is exhausted or one of them fails.
    ///
    /// Skipped children leave the progressive result alone.
    async fn run_children(
        &self,
        block: &Block,
        path: &NodePath,
        state: &mut ExecutionState,
    ) -> ExpressionResult {
        let mut progressive = ExpressionResult::default_outcome();

        loop {
            if self.is_terminated() {
                return terminated();
            }

            let variables = self.variables().await;
            let Some(index) = state.next_child(block, path, &variables) else {
                break;
            };
            let child = child_path(path, index);
            let result = self
                .walk(&block.children[index], child.clone(), state)
                .await;
            state.mark_executed(&child);

            trace!(
                "Session {} child {:?} of block {} finished: {}",
                self.short_id(),
                child,
                block.uuid,
                result
            );
            if result.is_skip() {
                continue;
            }
            let failed = result.is_failure();
            progressive = result;
            if failed {
                debug!(
                    "Session {} halts block {} on failure: {}",
                    self.short_id(),
                    block.uuid,
                    progressive.message
                );
                break;
            }
        }

        progressive
    }

    /// Once all children succeeded, judge the last command output against
    /// the container's own expected outcome.
    async fn apply_expected_outcome(
        &self,
        node_id: Uuid,
        result: ExpressionResult,
        expected: &LogicalExpression<ExpectedOutcome>,
    ) -> ExpressionResult {
        if expected.is_empty() || result.outcome != ResultStatus::Success {
            return result;
        }

        let output = self.last_output().await;
        let outcome = resolve(&output, &self.variables().await, expected);
        self.emit(EngineEvent::OutcomeEvaluation {
            session_id: self.id,
            node_id,
            output,
            result: outcome.clone(),
        });
        outcome
    }

    async fn condition_met(
        &self,
        node_id: Uuid,
        condition: &LogicalExpression<ExecutionCondition>,
    ) -> bool {
        if condition.is_empty() {
            return true;
        }

        let result = resolve("", &self.variables().await, condition);
        self.emit(EngineEvent::ConditionEvaluation {
            session_id: self.id,
            node_id,
            result: result.clone(),
        });
        result.resolved
    }
}

/// Only commands and blocks of commands can run in a session.
fn is_valid_execution_block(node: &Node) -> bool {
    match node {
        Node::Command(_) => true,
        Node::Block(block) => block.is_valid(),
        Node::Operation(_) | Node::Workflow(_) => false,
    }
}

fn not_matched() -> ExpressionResult {
    ExpressionResult::skip().with_message(messages::COMMAND_DID_NOT_MATCH_CONDITIONS)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::engine::{EngineConfig, EngineEvent};
    use crate::logic::BinaryRelation;
    use crate::model::internal::{assign_value, prompt_variable};
    use crate::model::{DataType, ResultRetention, RetentionMode};
    use crate::session::test_support::{FakeConnector, Harness, PROMPT, harness};

    async fn open(harness: &Harness) -> Session {
        let channels = vec!["LOCAL".to_string()];
        Session::open(
            &FakeConnector::new(),
            &channels,
            Uuid::new_v4(),
            harness.services.clone(),
        )
        .await
        .unwrap()
    }

    fn local(text: &str) -> Command {
        Command::new("LOCAL", text).with_minimal_seconds_to_response(1)
    }

    fn expecting(relation: BinaryRelation, value: &str) -> LogicalExpression<ExpectedOutcome> {
        LogicalExpression::of(ExpectedOutcome::new(relation, value))
    }

    fn inputs(harness: &Harness) -> Vec<String> {
        harness
            .sink
            .events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::InputSent { input, .. } => Some(input),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_echo_resolves_after_quiet_period() {
        let harness = harness(EngineConfig::default());
        let session = open(&harness).await;

        // First command learns the prompt on the way
        let first = local("echo 1").with_expected_outcome(expecting(BinaryRelation::Contains, "1"));
        let result = session.execute_node(&first.into()).await;
        assert!(result.is_success(), "{result}");
        assert_eq!(session.variable(&prompt_variable("LOCAL")).await, PROMPT);

        let start = Instant::now();
        let second = local("echo 2").with_expected_outcome(expecting(BinaryRelation::Equals, "2"));
        let result = session.execute_node(&second.into()).await;
        let elapsed = start.elapsed();

        assert!(result.is_success(), "{result}");
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
        assert_eq!(inputs(&harness), vec!["", "", "echo 1", "echo 2"]);

        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_outcome_times_out_at_deadline() {
        let harness = harness(EngineConfig::default());
        let session = open(&harness).await;
        assert!(session.learn_prompt("LOCAL").await.is_success());

        let command = local("hang")
            .with_seconds_to_timeout(5)
            .with_expected_outcome(expecting(BinaryRelation::Contains, "never"));
        let start = Instant::now();
        let result = session.execute_command(&command).await;
        let elapsed = start.elapsed();

        assert!(result.is_failure());
        assert!(!result.resolved);
        assert_eq!(result.message, messages::TIMEOUT_IN_COMMAND);
        assert!(elapsed >= Duration::from_secs(5), "took {elapsed:?}");
        assert!(elapsed < Duration::from_secs(6), "took {elapsed:?}");

        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retained_variable_feeds_next_command() {
        let harness = harness(EngineConfig::default());
        let session = open(&harness).await;

        let block = Block::new()
            .add_child(
                local("echo hello")
                    .with_save_to(ResultRetention::new(RetentionMode::Variable, "var.greeting")),
            )
            .add_child(
                local("echo $var.greeting world")
                    .with_expected_outcome(expecting(BinaryRelation::Contains, "hello world")),
            );

        let result = session.execute_node(&block.into()).await;
        assert!(result.is_success(), "{result}");
        assert!(inputs(&harness).contains(&"echo hello world".to_string()));
        assert_eq!(session.variable("var.greeting").await, "hello");

        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_block_runs_until_counter_bound() {
        let harness = harness(EngineConfig::default());
        let session = open(&harness).await;

        let repeat = Block::new()
            .add_child(local("echo tick"))
            .add_child(assign_value("var.counter", "$var.counter + 1"))
            .with_repeat_condition(LogicalExpression::of(ExecutionCondition::new(
                "$var.counter",
                BinaryRelation::LesserThan,
                "3",
            )));
        let outer = Block::new()
            .add_child(repeat)
            .with_dynamic_field("var.counter", "0");

        let result = session.execute_node(&outer.into()).await;
        assert!(result.is_success(), "{result}");

        let inputs = inputs(&harness);
        assert_eq!(inputs.iter().filter(|i| *i == "echo tick").count(), 3);
        assert_eq!(
            inputs.iter().filter(|i| i.starts_with("expr")).cloned().collect::<Vec<_>>(),
            vec!["expr 0 + 1", "expr 1 + 1", "expr 2 + 1"]
        );
        // The counter escaped every scope it was assigned in
        assert_eq!(session.variable("var.counter").await, "3");

        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_without_repeat_runs_once() {
        let harness = harness(EngineConfig::default());
        let session = open(&harness).await;

        let block = Block::new()
            .add_child(local("echo a"))
            .add_child(Block::new().add_child(local("echo b")))
            .add_child(local("echo c"));
        assert!(session.execute_node(&block.into()).await.is_success());

        let inputs = inputs(&harness);
        assert_eq!(&inputs[2..], ["echo a", "echo b", "echo c"]);

        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_halts_the_tree() {
        let harness = harness(EngineConfig::default());
        let session = open(&harness).await;

        let block = Block::new()
            .add_child(
                local("fail").with_expected_outcome(expecting(BinaryRelation::Contains, "ok")),
            )
            .add_child(local("echo unreachable"));
        let result = session.execute_node(&block.into()).await;

        assert!(result.is_failure());
        assert_eq!(result.message, messages::COMMAND_DID_NOT_REACH_OUTCOME);
        assert!(!inputs(&harness).contains(&"echo unreachable".to_string()));

        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmet_condition_skips_node() {
        let harness = harness(EngineConfig::default());
        let session = open(&harness).await;

        let gated = local("echo gated").with_execution_condition(LogicalExpression::of(
            ExecutionCondition::new("$var.mode", BinaryRelation::Equals, "fast"),
        ));
        let block = Block::new()
            .add_child(gated)
            .add_child(local("echo always"))
            .with_dynamic_field("var.mode", "slow");

        let result = session.execute_node(&block.into()).await;
        assert!(result.is_success(), "{result}");

        let inputs = inputs(&harness);
        assert!(!inputs.contains(&"echo gated".to_string()));
        assert!(inputs.contains(&"echo always".to_string()));

        let skipped = session
            .execute_node(
                &local("echo gated")
                    .with_execution_condition(LogicalExpression::of(ExecutionCondition::new(
                        "a",
                        BinaryRelation::Equals,
                        "b",
                    )))
                    .into(),
            )
            .await;
        assert!(skipped.is_skip());
        assert_eq!(skipped.message, messages::COMMAND_DID_NOT_MATCH_CONDITIONS);

        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_expected_outcome_judges_last_output() {
        let harness = harness(EngineConfig::default());
        let session = open(&harness).await;

        let above = Block::new()
            .add_child(local("echo 5"))
            .with_expected_outcome(expecting(BinaryRelation::GreaterThan, "3"));
        assert!(session.execute_node(&above.into()).await.is_success());

        let below = Block::new()
            .add_child(local("echo 5"))
            .with_expected_outcome(expecting(BinaryRelation::GreaterThan, "9"));
        assert!(session.execute_node(&below.into()).await.is_failure());

        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_keeps_partial_results() {
        let harness = harness(EngineConfig::default());
        let session = open(&harness).await;

        let operation = Operation::new(
            "partial",
            Block::new()
                .add_child(
                    local("echo 42").with_save_to(
                        ResultRetention::new(RetentionMode::DatabaseEventual, "answer")
                            .with_data_type(DataType::Number),
                    ),
                )
                .add_child(
                    local("fail").with_expected_outcome(expecting(BinaryRelation::Equals, "0")),
                ),
        )
        .add_channel("LOCAL");

        let result = session.execute_operation(&operation).await;
        assert!(result.is_failure());
        assert_eq!(result.database_variables.len(), 1);
        assert_eq!(result.database_variables[0].name, "answer");
        assert_eq!(result.database_variables[0].value, "42");
        assert_eq!(result.database_variables[0].data_type, DataType::Number);

        let names = harness.sink.names();
        assert!(names.contains(&"OperationStart"));
        assert!(names.contains(&"OperationEnd"));

        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_file_and_immediate_retention() {
        let harness = harness(EngineConfig::default());
        let session = open(&harness).await;

        let operation = Operation::new(
            "retention",
            Block::new()
                .add_child(
                    local("echo report")
                        .with_save_to(ResultRetention::new(RetentionMode::File, "report.txt")),
                )
                .add_child(local("echo 7").with_save_to(ResultRetention::new(
                    RetentionMode::DatabaseImmediate,
                    "$var.metric",
                )))
                .with_dynamic_field("var.metric", "seven"),
        );

        let result = session.execute_operation(&operation).await;
        assert!(result.is_success(), "{}", result.expression_result);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let written = harness.files.written();
        assert_eq!(
            written,
            vec![(
                session.short_id(),
                "report.txt".to_string(),
                "report".to_string()
            )]
        );
        assert_eq!(
            result.database_variables[0].value,
            format!("logs/sessions/{}/report.txt", session.short_id())
        );
        assert_eq!(result.database_variables[0].data_type, DataType::Path);

        let produced = harness.results.produced();
        assert_eq!(produced.len(), 1);
        assert_eq!(produced[0].0, session.operation_id());
        assert_eq!(produced[0].1.name, "seven");
        assert_eq!(produced[0].1.value, "7");

        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminate_interrupts_waiting_command() {
        let harness = harness(EngineConfig::default());
        let session = Arc::new(open(&harness).await);
        assert!(session.learn_prompt("LOCAL").await.is_success());

        let running = session.clone();
        let start = Instant::now();
        let task = tokio::spawn(async move {
            let command = local("hang")
                .with_seconds_to_timeout(600)
                .with_expected_outcome(expecting(BinaryRelation::Contains, "never"));
            running.execute_node(&command.into()).await
        });

        tokio::time::sleep(Duration::from_secs(3)).await;
        session.terminate();
        let result = task.await.unwrap();

        assert_eq!(result.message, messages::OPERATION_TERMINATED);
        assert!(result.is_failure());
        assert!(start.elapsed() < Duration::from_secs(10));

        // Nothing is written after termination
        let after = session.execute_command(&local("echo late")).await;
        assert_eq!(after.message, messages::OPERATION_TERMINATED);
        assert!(!inputs(&harness).contains(&"echo late".to_string()));

        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_channel_is_invalid() {
        let harness = harness(EngineConfig::default());
        let session = open(&harness).await;

        let result = session
            .execute_command(&Command::new("REMOTE", "echo 1"))
            .await;
        assert!(result.is_failure());
        assert_eq!(result.message, messages::INVALID_COMMAND_PARAMETERS);
        assert!(harness.sink.names().contains(&"ExecutionAnomaly"));

        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_execution_block() {
        let harness = harness(EngineConfig::default());
        let session = open(&harness).await;

        let nested = Operation::new("inner", local("echo 1"));
        let operation = Operation::new("outer", Block::new().add_child(nested));
        let result = session.execute_operation(&operation).await;

        assert!(result.is_failure());
        assert_eq!(result.expression_result.message, messages::INVALID_EXECUTION_BLOCK);
        assert!(inputs(&harness).is_empty());

        session.close().await.unwrap();
    }
}
