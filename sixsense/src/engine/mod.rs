//! Orchestration of operations across devices.
//!
//! [`EngineBuilder`] wires a transport, an [`EventSink`] and the retention
//! stores into a [`WorkflowOrchestrator`], which runs each operation of a
//! [`ParallelWorkflow`](crate::model::ParallelWorkflow) in its own session.

mod builder;
mod compose;
mod config;
mod events;
mod orchestrator;
mod stores;

pub use builder::EngineBuilder;
pub use compose::{
    DEVICE_HOST_FIELD, DEVICE_ID_FIELD, DEVICE_PASSWORD_FIELD, DEVICE_PORT_FIELD,
    DEVICE_USERNAME_FIELD, Device, compose_workflow,
};
pub use config::EngineConfig;
pub use events::{EngineEvent, EventSink, LogEventSink};
pub use orchestrator::{WorkflowOrchestrator, WorkflowReport};
pub use stores::{
    FileRetentionWriter, FsRetentionWriter, LogResultsProducer, MemoryResultsProducer,
    ResultsProducer,
};
