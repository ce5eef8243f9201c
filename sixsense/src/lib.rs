//! # Sixsense
//!
//! Unattended interactive shell sessions and workflow orchestration for
//! network device automation.
//!
//! Sixsense writes commands to pseudo-terminal backed channels (a local
//! shell, SSH shells on a device), works out from the unstructured text
//! that comes back when each command has finished and whether it reached
//! its expected outcome, and runs graphs of such commands across many
//! devices concurrently.
//!
//! ## Features
//!
//! - Prompt learning and prompt-based completion detection
//! - Boolean expressions over command output and session variables
//! - Command trees with repeat loops, execution conditions and retention
//! - Parallel workflows with fail-fast, eager/lazy sequencing and fan-in
//! - Async SSH channels via russh, or local shell processes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sixsense::engine::{Device, EngineBuilder, compose_workflow};
//! use sixsense::logic::{BinaryRelation, ExpectedOutcome, LogicalExpression};
//! use sixsense::model::{Command, Operation};
//! use sixsense::transport::LocalShellConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sixsense::Error> {
//!     let orchestrator = EngineBuilder::new()
//!         .local_shell(LocalShellConfig::default())
//!         .build()?;
//!
//!     let ping = Command::new("LOCAL", "ping -c 1 $device.host")
//!         .with_seconds_to_timeout(10)
//!         .with_expected_outcome(LogicalExpression::of(ExpectedOutcome::new(
//!             BinaryRelation::Contains,
//!             "1 received",
//!         )));
//!     let template = Operation::new("ping", ping).add_channel("LOCAL");
//!     let devices = vec![Device::new("r1", "10.0.0.1", "admin", "secret")];
//!
//!     let workflow = compose_workflow(&devices, &template);
//!     let report = orchestrator.execute(&workflow).await?;
//!     for (device, result) in report.per_device(&workflow) {
//!         println!("{}: {}", device, result.expression_result);
//!     }
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod engine;
pub mod error;
pub mod logic;
pub mod model;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use engine::{EngineBuilder, EngineConfig, WorkflowOrchestrator, WorkflowReport};
pub use error::{Error, Result};
pub use logic::{ExpressionResult, ResultStatus};
pub use model::{Block, Command, Node, Operation, OperationResult, ParallelWorkflow};
pub use session::Session;
pub use transport::{AuthMethod, SshConfig};
