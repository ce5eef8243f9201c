//! The command protocol: write, wait, inspect, resolve.

use std::time::Duration;

use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use tokio::time::{Instant, sleep, sleep_until};

use super::boundary::{filter_raw_output, remove_outdated_chunks};
use super::{Session, SessionState};
use crate::engine::EngineEvent;
use crate::error::ChannelError;
use crate::logic::{
    ExpressionResult, ResultStatus, evaluate_against_dynamic_fields, messages, resolve,
};
use crate::model::internal::{default_prompt_variable, prompt_variable};
use crate::model::{Command, PipeContext};

/// Learned prompt of `channel`, falling back to the default prompt.
///
/// The fallback is pinned as the channel's prompt from then on.
pub(super) fn current_prompt(state: &mut SessionState, channel: &str) -> String {
    let reference = prompt_variable(channel);
    let prompt = state.variables.get(&reference);
    if !prompt.is_empty() {
        return prompt;
    }

    let fallback = state.variables.get(&default_prompt_variable());
    if !fallback.is_empty() {
        state
            .variables
            .load_scope(&[(reference, fallback.clone())].into_iter().collect());
    }
    fallback
}

impl Session {
    /// Run one command on its channel and judge its output.
    ///
    /// Never fails: transport faults, timeouts and termination all come
    /// back as FAILURE results. A successful result has already been
    /// retained according to the command's `save_to`.
    pub async fn execute_command(&self, command: &Command) -> ExpressionResult {
        if self.is_terminated() {
            return terminated();
        }

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.closed {
            warn!("Session {} is closed, dropping command", self.short_id());
            return ExpressionResult::execution_error(format!(
                "Session {} is closed",
                self.short_id()
            ));
        }
        if !state.channels.contains_key(&command.channel_name) {
            self.anomaly(format!(
                "Command {} references unknown channel {}",
                command.uuid, command.channel_name
            ));
            return ExpressionResult::execution_error(messages::INVALID_COMMAND_PARAMETERS);
        }

        let prompt = current_prompt(state, &command.channel_name);
        let variables = state.variables.current();
        let evaluated = evaluate_against_dynamic_fields(&command.command_text, &variables);
        state.command_ordinal += 1;
        let ordinal = state.command_ordinal;

        let Some(channel) = state.channels.get_mut(&command.channel_name) else {
            return ExpressionResult::execution_error(messages::INVALID_COMMAND_PARAMETERS);
        };
        let output = channel.output.clone();

        let start = Instant::now();
        let line = format!("{}{}", evaluated, self.services.config.line_terminator);
        if let Err(e) = write_line(&mut channel.writer, &line).await {
            let e = ChannelError::Write(e);
            self.anomaly(format!(
                "Failed to write command {:?} to channel {}: {}",
                evaluated, command.channel_name, e
            ));
            return ExpressionResult::execution_error(e.to_string());
        }
        self.emit(EngineEvent::InputSent {
            session_id: self.id,
            ordinal,
            channel: command.channel_name.clone(),
            input: evaluated.clone(),
        });

        let minimal = Duration::from_secs(command.minimal_seconds_to_response);
        let deadline = start
            + Duration::from_secs(
                command
                    .seconds_to_timeout
                    .max(command.minimal_seconds_to_response),
            );

        // Quiet period; only termination cuts it short
        {
            let interrupted = self.interrupt.notified();
            tokio::pin!(interrupted);
            interrupted.as_mut().enable();
            if !self.is_terminated() {
                tokio::select! {
                    _ = sleep(minimal) => {}
                    _ = interrupted => {}
                }
            }
        }

        let context = PipeContext {
            command: &evaluated,
            prompt: &prompt,
        };
        let mut parsed = String::new();
        let mut resolved =
            ExpressionResult::execution_error(messages::COMMAND_DID_NOT_REACH_OUTCOME);
        let mut boundary_closed = false;

        loop {
            let new_chunk = output.notified();
            let interrupted = self.interrupt.notified();
            tokio::pin!(new_chunk, interrupted);
            new_chunk.as_mut().enable();
            interrupted.as_mut().enable();

            if self.is_terminated() {
                break;
            }

            let lines = output.with_lines(|lines| {
                boundary_closed = remove_outdated_chunks(lines, &prompt, &evaluated);
                lines.clone()
            });
            let piped = command
                .output_pipes
                .iter()
                .fold(lines, |lines, pipe| pipe.pipe_lines(lines, &context));
            parsed = if command.use_raw_output {
                piped.join("\n")
            } else {
                filter_raw_output(&piped, &prompt, &evaluated)
            };
            resolved = resolve(&parsed, &variables, &command.expected_outcome);

            if boundary_closed || resolved.resolved || Instant::now() >= deadline {
                break;
            }
            if output.is_closed() {
                debug!(
                    "{}-cmd-{}: channel {} closed while waiting",
                    self.short_id(),
                    ordinal,
                    command.channel_name
                );
                break;
            }

            tokio::select! {
                _ = new_chunk => {}
                _ = interrupted => {}
                _ = sleep_until(deadline) => {}
            }
        }

        if !self.is_terminated() {
            self.emit(EngineEvent::OutputReceived {
                session_id: self.id,
                ordinal,
                output: parsed.clone(),
            });
            self.emit(EngineEvent::OutcomeEvaluation {
                session_id: self.id,
                node_id: command.uuid,
                output: parsed.clone(),
                result: resolved.clone(),
            });
        }

        let outcome = if self.is_terminated() {
            terminated()
        } else if !resolved.resolved && Instant::now() >= deadline {
            debug!(
                "{}-cmd-{} timed out after {:?}",
                self.short_id(),
                ordinal,
                start.elapsed()
            );
            ExpressionResult::new(false, ResultStatus::Failure, messages::TIMEOUT_IN_COMMAND)
        } else {
            resolved
        };

        if outcome.is_success() {
            self.retain_result(state, command, &parsed, &context);
        }
        if command.requires_cleanup || boundary_closed {
            output.keep_last_line();
        }
        state.last_output = parsed;

        outcome
    }

    pub(super) fn anomaly(&self, message: String) {
        warn!("Session {}: {}", self.short_id(), message);
        self.emit(EngineEvent::ExecutionAnomaly {
            session_id: Some(self.id),
            message,
        });
    }
}

pub(super) fn terminated() -> ExpressionResult {
    ExpressionResult::new(false, ResultStatus::Failure, messages::OPERATION_TERMINATED)
}

async fn write_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}
