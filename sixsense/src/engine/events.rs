//! Lifecycle events and the sink they are delivered to.

use log::{debug, trace, warn};
use uuid::Uuid;

use crate::logic::ExpressionResult;
use crate::model::ResultRetention;

/// Something observable that happened while executing work.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    SessionCreated {
        session_id: Uuid,
        operation_id: Uuid,
        channels: Vec<String>,
    },
    SessionClosed {
        session_id: Uuid,
    },
    OperationStart {
        session_id: Uuid,
        operation_id: Uuid,
        operation_name: String,
    },
    OperationEnd {
        session_id: Uuid,
        operation_id: Uuid,
        result: ExpressionResult,
    },
    BlockStart {
        session_id: Uuid,
        block_id: Uuid,
    },
    BlockEnd {
        session_id: Uuid,
        block_id: Uuid,
        result: ExpressionResult,
    },
    CommandStart {
        session_id: Uuid,
        command_id: Uuid,
    },
    CommandEnd {
        session_id: Uuid,
        command_id: Uuid,
        result: ExpressionResult,
    },
    /// Text written to a channel; `ordinal` counts commands per session.
    InputSent {
        session_id: Uuid,
        ordinal: usize,
        channel: String,
        input: String,
    },
    OutputReceived {
        session_id: Uuid,
        ordinal: usize,
        output: String,
    },
    ConditionEvaluation {
        session_id: Uuid,
        node_id: Uuid,
        result: ExpressionResult,
    },
    OutcomeEvaluation {
        session_id: Uuid,
        node_id: Uuid,
        output: String,
        result: ExpressionResult,
    },
    ResultRetained {
        session_id: Uuid,
        retention: ResultRetention,
    },
    ExecutionAnomaly {
        session_id: Option<Uuid>,
        message: String,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::SessionCreated { .. } => "SessionCreated",
            EngineEvent::SessionClosed { .. } => "SessionClosed",
            EngineEvent::OperationStart { .. } => "OperationStart",
            EngineEvent::OperationEnd { .. } => "OperationEnd",
            EngineEvent::BlockStart { .. } => "BlockStart",
            EngineEvent::BlockEnd { .. } => "BlockEnd",
            EngineEvent::CommandStart { .. } => "CommandStart",
            EngineEvent::CommandEnd { .. } => "CommandEnd",
            EngineEvent::InputSent { .. } => "InputSent",
            EngineEvent::OutputReceived { .. } => "OutputReceived",
            EngineEvent::ConditionEvaluation { .. } => "ConditionEvaluation",
            EngineEvent::OutcomeEvaluation { .. } => "OutcomeEvaluation",
            EngineEvent::ResultRetained { .. } => "ResultRetained",
            EngineEvent::ExecutionAnomaly { .. } => "ExecutionAnomaly",
        }
    }

    /// Session the event belongs to, if any.
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            EngineEvent::SessionCreated { session_id, .. }
            | EngineEvent::SessionClosed { session_id }
            | EngineEvent::OperationStart { session_id, .. }
            | EngineEvent::OperationEnd { session_id, .. }
            | EngineEvent::BlockStart { session_id, .. }
            | EngineEvent::BlockEnd { session_id, .. }
            | EngineEvent::CommandStart { session_id, .. }
            | EngineEvent::CommandEnd { session_id, .. }
            | EngineEvent::InputSent { session_id, .. }
            | EngineEvent::OutputReceived { session_id, .. }
            | EngineEvent::ConditionEvaluation { session_id, .. }
            | EngineEvent::OutcomeEvaluation { session_id, .. }
            | EngineEvent::ResultRetained { session_id, .. } => Some(*session_id),
            EngineEvent::ExecutionAnomaly { session_id, .. } => *session_id,
        }
    }
}

/// Receives engine events.
///
/// `emit` is called from the middle of command execution and must not
/// block; hand the event off if real work is needed.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Mirrors every event to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: EngineEvent) {
        match &event {
            EngineEvent::SessionCreated {
                session_id,
                operation_id,
                channels,
            } => debug!(
                "Session {} created for operation {} with channels [{}]",
                short(session_id),
                operation_id,
                channels.join(", ")
            ),
            EngineEvent::SessionClosed { session_id } => {
                debug!("Session {} closed", short(session_id))
            }
            EngineEvent::OperationStart {
                session_id,
                operation_name,
                ..
            } => debug!(
                "Session {} started operation {}",
                short(session_id),
                operation_name
            ),
            EngineEvent::OperationEnd {
                session_id, result, ..
            } => debug!("Session {} finished operation: {}", short(session_id), result),
            EngineEvent::InputSent {
                session_id,
                ordinal,
                channel,
                input,
            } => trace!(
                "{}-cmd-{} >> {}: {:?}",
                short(session_id),
                ordinal,
                channel,
                input
            ),
            EngineEvent::OutputReceived {
                session_id,
                ordinal,
                output,
            } => trace!("{}-cmd-{} << {:?}", short(session_id), ordinal, output),
            EngineEvent::ExecutionAnomaly {
                session_id,
                message,
            } => match session_id {
                Some(id) => warn!("Session {}: {}", short(id), message),
                None => warn!("{}", message),
            },
            other => trace!("{} {:?}", other.name(), other),
        }
    }
}

fn short(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}
