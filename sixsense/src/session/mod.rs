//! Execution contexts over one or more named shell channels.
//!
//! A [`Session`] is created per operation run. It owns a stream reader
//! per channel, a scoped variable table and the command lock that keeps
//! commands strictly sequential. [`Session::terminate`] may be called
//! from anywhere; the in-flight command then fails with
//! "operation terminated" and nothing else is attempted.

mod boundary;
mod command;
mod executor;
mod iterator;
mod prompt;
mod retention;
mod variables;

pub use boundary::{filter_file_output, filter_raw_output, remove_outdated_chunks};
pub use iterator::{BlockState, ExecutionState, NodePath, child_path};
pub use variables::VariableTable;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use log::{debug, error, warn};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::channel::{
    ChannelGuard, ChannelOutput, ChannelWriter, ChunkDecoder, StreamReader, compile_rules,
};
use crate::engine::{EngineConfig, EngineEvent, EventSink, FileRetentionWriter, ResultsProducer};
use crate::error::{ChannelError, Result, SessionError};
use crate::logic::Variables;
use crate::model::DatabaseVariable;
use crate::model::internal::WORKING_DIR_VARIABLE;
use crate::transport::ShellConnector;

/// Collaborators every session reports to.
#[derive(Clone)]
pub struct SessionServices {
    pub config: Arc<EngineConfig>,
    pub events: Arc<dyn EventSink>,
    pub files: Arc<dyn FileRetentionWriter>,
    pub results: Arc<dyn ResultsProducer>,
}

/// Write half, output buffer and reader of one channel.
struct SessionChannel {
    writer: ChannelWriter,
    output: Arc<ChannelOutput>,
    reader: StreamReader,
    guard: Option<Box<dyn ChannelGuard>>,
}

/// Everything only the command holder may touch.
struct SessionState {
    channels: HashMap<String, SessionChannel>,
    variables: VariableTable,
    database_variables: Vec<DatabaseVariable>,
    command_ordinal: usize,
    /// Output of the most recent command, for block and operation outcomes.
    last_output: String,
    prompt_attempts: HashSet<String>,
    closed: bool,
}

pub struct Session {
    id: Uuid,
    operation_id: Uuid,
    state: Mutex<SessionState>,
    terminated: AtomicBool,
    interrupt: Notify,
    services: SessionServices,
}

impl Session {
    /// Open every channel in `channel_names` through `connector`.
    ///
    /// If one channel fails to open, those already open are closed again.
    pub async fn open<'a>(
        connector: &dyn ShellConnector,
        channel_names: impl IntoIterator<Item = &'a String>,
        operation_id: Uuid,
        services: SessionServices,
    ) -> Result<Self> {
        let id = Uuid::new_v4();
        let config = services.config.clone();
        let rules = compile_rules(&config.substitution_rules).map_err(ChannelError::from)?;

        let mut channels = HashMap::new();
        for name in channel_names {
            let shell = match connector.open_channel(name).await {
                Ok(shell) => shell,
                Err(e) => {
                    error!("Session {} failed to open channel {}: {}", short(&id), name, e);
                    for (name, channel) in channels {
                        close_channel(&id, name, channel).await;
                    }
                    return Err(e);
                }
            };

            let (name, reader, writer, guard) = shell.into_parts();
            let output = Arc::new(ChannelOutput::new());
            let reader = StreamReader::spawn(
                format!("{}-{}", short(&id), name),
                reader,
                output.clone(),
                ChunkDecoder::new(rules.clone(), config.strip_ansi),
                config.read_buffer_size,
            );
            channels.insert(
                name,
                SessionChannel {
                    writer,
                    output,
                    reader,
                    guard,
                },
            );
        }

        let mut variables = VariableTable::new();
        let working_dir = config.session_execution_dir.join(short(&id));
        variables.load_scope(&IndexMap::from([(
            WORKING_DIR_VARIABLE.to_string(),
            working_dir.display().to_string(),
        )]));

        let mut channel_list: Vec<String> = channels.keys().cloned().collect();
        channel_list.sort();
        services.events.emit(EngineEvent::SessionCreated {
            session_id: id,
            operation_id,
            channels: channel_list,
        });

        Ok(Self {
            id,
            operation_id,
            state: Mutex::new(SessionState {
                channels,
                variables,
                database_variables: Vec::new(),
                command_ordinal: 0,
                last_output: String::new(),
                prompt_attempts: HashSet::new(),
                closed: false,
            }),
            terminated: AtomicBool::new(false),
            interrupt: Notify::new(),
            services,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// First eight characters of the session id, used in paths and logs.
    pub fn short_id(&self) -> String {
        short(&self.id)
    }

    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Stop the session: the in-flight command stops waiting and fails,
    /// and no further command is written.
    pub fn terminate(&self) {
        if !self.terminated.swap(true, Ordering::SeqCst) {
            debug!("Session {} terminated externally", self.short_id());
        }
        self.interrupt.notify_waiters();
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Close every channel. Waits for the in-flight command, if any.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(());
        }
        state.closed = true;

        let mut failed = Vec::new();
        for (name, channel) in state.channels.drain() {
            if !close_channel(&self.id, name.clone(), channel).await {
                failed.push(name);
            }
        }
        self.interrupt.notify_waiters();
        self.services
            .events
            .emit(EngineEvent::SessionClosed { session_id: self.id });

        if failed.is_empty() {
            Ok(())
        } else {
            failed.sort();
            Err(SessionError::CloseFailed { channels: failed }.into())
        }
    }

    /// Current value of `name`, empty when unset.
    pub async fn variable(&self, name: &str) -> String {
        self.state.lock().await.variables.get(name)
    }

    /// Top frame of every variable.
    pub async fn variables(&self) -> Variables {
        self.state.lock().await.variables.current()
    }

    pub async fn load_scope(&self, fields: &IndexMap<String, String>) {
        if !fields.is_empty() {
            self.state.lock().await.variables.load_scope(fields);
        }
    }

    pub async fn unload_scope(&self, fields: &IndexMap<String, String>) {
        if !fields.is_empty() {
            self.state.lock().await.variables.unload_scope(fields);
        }
    }

    /// Hand over the database-eventual variables collected so far.
    pub async fn take_database_variables(&self) -> Vec<DatabaseVariable> {
        std::mem::take(&mut self.state.lock().await.database_variables)
    }

    async fn last_output(&self) -> String {
        self.state.lock().await.last_output.clone()
    }

    fn emit(&self, event: EngineEvent) {
        self.services.events.emit(event);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.state.get_mut().closed {
            warn!("Session {} dropped without being closed", self.short_id());
        }
    }
}

fn short(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// Returns false if the transport reported a failure while closing.
async fn close_channel(session_id: &Uuid, name: String, channel: SessionChannel) -> bool {
    let SessionChannel {
        writer,
        reader,
        guard,
        ..
    } = channel;

    reader.expect_close();
    drop(writer);
    let closed = match guard {
        Some(guard) => match guard.close().await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Session {} failed to close channel {}: {}",
                    short(session_id),
                    name,
                    e
                );
                false
            }
        },
        None => true,
    };
    reader.close().await;
    closed
}

#[cfg(test)]
pub(crate) mod test_support;
