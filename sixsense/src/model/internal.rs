//! Commands the engine issues on its own behalf.
//!
//! Variable names produced here are part of the engine's contract with
//! operation authors and must not change.

use super::{Block, Command, DataType, OutputPipe, ResultRetention, RetentionMode};
use crate::logic::{
    BinaryRelation, ExpectedOutcome, ExpressionResult, LogicalCondition, LogicalExpression,
    ResultStatus,
};

/// Last idle line captured by the first prompt probe.
pub const LAST_LINE_VARIABLE: &str = "sixsense.session.lastLine";

/// Per-session directory for file retention.
pub const WORKING_DIR_VARIABLE: &str = "sixsense.session.workingDir";

const PROMPT_VARIABLE_PREFIX: &str = "sixsense.session.prompt.";

/// Name of the variable holding the learned prompt of `channel_name`.
pub fn prompt_variable(channel_name: &str) -> String {
    format!("{PROMPT_VARIABLE_PREFIX}{}", channel_name.to_lowercase())
}

/// Fallback prompt used by channels with nothing learned.
pub fn default_prompt_variable() -> String {
    prompt_variable("default")
}

/// Two blank probes that capture the idle prompt of `channel_name`.
///
/// The first records the last idle line; the second waits until a fresh
/// line equals it and stores that as the channel prompt. Run it again
/// after anything that changes the prompt, such as logging into a device.
pub fn invalidate_current_prompt(
    channel_name: &str,
    minimal_seconds: u64,
    seconds_to_timeout: u64,
) -> Block {
    let not_blank = ExpectedOutcome::new(BinaryRelation::NotEquals, "");

    let last_line = Command::new(channel_name, "")
        .with_minimal_seconds_to_response(minimal_seconds)
        .with_seconds_to_timeout(seconds_to_timeout)
        .with_use_raw_output(true)
        .add_output_pipe(OutputPipe::LastLine)
        .with_expected_outcome(LogicalExpression::of(not_blank.clone()))
        .with_save_to(ResultRetention::new(RetentionMode::Variable, LAST_LINE_VARIABLE));

    let current_prompt = Command::new(channel_name, "")
        .with_minimal_seconds_to_response(minimal_seconds)
        .with_seconds_to_timeout(seconds_to_timeout)
        .with_use_raw_output(true)
        .add_output_pipe(OutputPipe::LastLine)
        .with_expected_outcome(
            LogicalExpression::new()
                .with_logical_condition(LogicalCondition::And)
                .add_resolvable(ExpectedOutcome::new(
                    BinaryRelation::Equals,
                    format!("${LAST_LINE_VARIABLE}"),
                ))
                .add_resolvable(not_blank),
        )
        .with_save_to(ResultRetention::new(
            RetentionMode::Variable,
            prompt_variable(channel_name),
        ));

    Block::new().add_child(last_line).add_child(current_prompt)
}

/// Evaluate `expression` with `expr` on the LOCAL channel and store the
/// result in `field`, replacing the parent scope's value.
pub fn assign_value(field: &str, expression: &str) -> Command {
    Command::new("LOCAL", format!("expr {expression}"))
        .with_minimal_seconds_to_response(1)
        .with_seconds_to_timeout(5)
        .with_expected_outcome(LogicalExpression::of(ExpectedOutcome::new(
            BinaryRelation::NotEquals,
            "",
        )))
        .with_save_to(
            ResultRetention::new(RetentionMode::Variable, field).with_overwrite_parent(true),
        )
}

/// Copy `source_file` from the device into the session working directory.
///
/// Relies on the `device.*` credential fields of the owning operation.
pub fn copy_file(source_file: &str, destination_file: &str, seconds_to_timeout: u64) -> Block {
    let scp_init = Command::new(
        "DOWNLOAD",
        format!(
            "scp $device.username@$device.host:$var.scp.source \
             ${WORKING_DIR_VARIABLE}/$var.scp.destination"
        ),
    )
    .with_seconds_to_timeout(10)
    .with_expected_outcome(LogicalExpression::of(ExpectedOutcome::new(
        BinaryRelation::Contains,
        "assword:",
    )));

    let failure = |message: &str| ExpressionResult::new(false, ResultStatus::Failure, message);

    let type_password = Command::new("DOWNLOAD", "$device.password")
        .with_seconds_to_timeout(seconds_to_timeout)
        .with_use_raw_output(true)
        .with_expected_outcome(
            LogicalExpression::new()
                .add_resolvable(ExpectedOutcome::new(
                    BinaryRelation::EndsWith,
                    format!("${}", prompt_variable("DOWNLOAD")),
                ))
                .add_resolvable(
                    ExpectedOutcome::new(
                        BinaryRelation::MatchesRegex,
                        r"[pP]assword:?\s+[pP]assword:?",
                    )
                    .with_expression_result(failure("Wrong username or password")),
                )
                .add_resolvable(
                    ExpectedOutcome::new(BinaryRelation::Contains, "No such")
                        .with_expression_result(failure("File does not exist")),
                ),
        )
        .with_save_to(
            ResultRetention::new(RetentionMode::DatabaseEventual, "$var.scp.destination")
                .with_data_type(DataType::Path)
                .with_value(format!("${WORKING_DIR_VARIABLE}/$var.scp.destination")),
        );

    let file_name = source_file.rsplit('/').next().unwrap_or(source_file);

    Block::new()
        .add_child(scp_init)
        .add_child(type_password)
        .with_dynamic_field("var.scp.source", source_file)
        .with_dynamic_field("var.scp.source.fileName", file_name)
        .with_dynamic_field("var.scp.destination", destination_file)
}
