//! Builder for creating workflow orchestrators.

use std::path::PathBuf;
use std::sync::Arc;

use super::config::EngineConfig;
use super::events::{EventSink, LogEventSink};
use super::orchestrator::WorkflowOrchestrator;
use super::stores::{FileRetentionWriter, FsRetentionWriter, LogResultsProducer, ResultsProducer};
use crate::error::{Result, WorkflowError};
use crate::session::SessionServices;
use crate::transport::{
    LocalShellConfig, LocalShellConnector, ShellConnector, SshConfig, SshConnector,
};

/// Builder for constructing a [`WorkflowOrchestrator`].
///
/// # Example
///
/// ```rust,no_run
/// use sixsense::engine::EngineBuilder;
/// use sixsense::transport::{AuthMethod, SshConfig};
///
/// # fn example() -> Result<(), sixsense::Error> {
/// let orchestrator = EngineBuilder::new()
///     .ssh(SshConfig::new("192.168.1.1", "admin", AuthMethod::password("secret")))
///     .session_execution_dir("/var/lib/sixsense/sessions")
///     .max_concurrent_operations(8)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    connector: Option<Arc<dyn ShellConnector>>,
    events: Option<Arc<dyn EventSink>>,
    files: Option<Arc<dyn FileRetentionWriter>>,
    results: Option<Arc<dyn ResultsProducer>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every setting at once.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Open channels with a custom transport.
    pub fn connector(mut self, connector: Arc<dyn ShellConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Open every channel as its own SSH connection.
    pub fn ssh(self, config: SshConfig) -> Self {
        self.connector(Arc::new(SshConnector::new(config)))
    }

    /// Open every channel as a local shell process.
    pub fn local_shell(self, config: LocalShellConfig) -> Self {
        self.connector(Arc::new(LocalShellConnector::new(config)))
    }

    /// Where lifecycle and I/O events go (default: the log).
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Where file retention writes (default: below the session directory).
    pub fn file_writer(mut self, files: Arc<dyn FileRetentionWriter>) -> Self {
        self.files = Some(files);
        self
    }

    /// Where database retention goes (default: the log).
    pub fn results_producer(mut self, results: Arc<dyn ResultsProducer>) -> Self {
        self.results = Some(results);
        self
    }

    pub fn session_execution_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.session_execution_dir = dir.into();
        self
    }

    pub fn max_concurrent_operations(mut self, max: usize) -> Self {
        self.config.max_concurrent_operations = max;
        self
    }

    /// Probe a channel's prompt before its first command when unknown.
    pub fn learn_prompts(mut self, learn: bool) -> Self {
        self.config.learn_prompts = learn;
        self
    }

    /// Build the orchestrator. Nothing connects until a workflow runs.
    pub fn build(self) -> Result<WorkflowOrchestrator> {
        self.config.validate()?;

        let connector = self.connector.ok_or_else(|| WorkflowError::InvalidConfig {
            message: "A shell connector is required".to_string(),
        })?;

        let files = self.files.unwrap_or_else(|| {
            Arc::new(FsRetentionWriter::new(self.config.session_execution_dir.clone()))
        });
        let services = SessionServices {
            config: Arc::new(self.config),
            events: self.events.unwrap_or_else(|| Arc::new(LogEventSink)),
            files,
            results: self.results.unwrap_or_else(|| Arc::new(LogResultsProducer)),
        };

        Ok(WorkflowOrchestrator::new(connector, services))
    }
}
