//! In-process fake shell and recording collaborators for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

use super::SessionServices;
use crate::channel::{ChannelGuard, ShellChannel};
use crate::engine::{
    EngineConfig, EngineEvent, EventSink, FileRetentionWriter, MemoryResultsProducer,
};
use crate::error::{ChannelError, Result};
use crate::transport::ShellConnector;

pub(crate) const PROMPT: &str = "user@host:~$";

/// What the fake shell prints for one input line, before its prompt.
///
/// `None` means the command never returns.
fn respond(line: &str) -> Option<String> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let reply = match words.next() {
        None => String::new(),
        Some("echo") => line["echo".len()..].trim().to_string(),
        Some("expr") => {
            let terms: Vec<&str> = words.collect();
            match terms.as_slice() {
                [a, "+", b] => match (a.parse::<i64>(), b.parse::<i64>()) {
                    (Ok(a), Ok(b)) => (a + b).to_string(),
                    _ => "expr: non-integer argument".to_string(),
                },
                [a, "-", b] => match (a.parse::<i64>(), b.parse::<i64>()) {
                    (Ok(a), Ok(b)) => (a - b).to_string(),
                    _ => "expr: non-integer argument".to_string(),
                },
                _ => "expr: syntax error".to_string(),
            }
        }
        Some("fail") => "error".to_string(),
        Some("hang") => return None,
        Some(other) => format!("{other}: command not found"),
    };
    Some(reply)
}

async fn fake_shell(stream: DuplexStream, prompt: String) {
    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();

    if write
        .write_all(format!("Welcome\r\n{prompt} ").as_bytes())
        .await
        .is_err()
    {
        return;
    }

    while let Ok(Some(line)) = lines.next_line().await {
        let reply = match respond(&line) {
            Some(reply) if reply.is_empty() => format!("{line}\r\n{prompt} "),
            Some(reply) => format!("{line}\r\n{reply}\r\n{prompt} "),
            None => format!("{line}\r\n"),
        };
        if write.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
    }
}

struct FakeShellTask(JoinHandle<()>);

#[async_trait]
impl ChannelGuard for FakeShellTask {
    async fn close(self: Box<Self>) -> Result<()> {
        self.0.abort();
        Ok(())
    }
}

/// Opens a fake shell per channel.
pub(crate) struct FakeConnector {
    opened: AtomicUsize,
    refused: HashSet<String>,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        Self {
            opened: AtomicUsize::new(0),
            refused: HashSet::new(),
        }
    }

    pub(crate) fn refuse(mut self, channel_name: &str) -> Self {
        self.refused.insert(channel_name.to_uppercase());
        self
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShellConnector for FakeConnector {
    async fn open_channel(&self, channel_name: &str) -> Result<ShellChannel> {
        if self.refused.contains(channel_name) {
            return Err(ChannelError::UnknownChannel(channel_name.to_string()).into());
        }

        let (client, server) = tokio::io::duplex(4096);
        let task = tokio::spawn(fake_shell(server, PROMPT.to_string()));
        let (reader, writer) = tokio::io::split(client);
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ShellChannel::new(channel_name, reader, writer).with_guard(FakeShellTask(task)))
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(EngineEvent::name).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[derive(Default)]
pub(crate) struct RecordingFiles {
    written: Mutex<Vec<(String, String, String)>>,
}

impl RecordingFiles {
    pub(crate) fn written(&self) -> Vec<(String, String, String)> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl FileRetentionWriter for RecordingFiles {
    async fn write(&self, short_session_id: &str, name: &str, value: &str) -> Result<()> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((short_session_id.into(), name.into(), value.into()));
        Ok(())
    }
}

pub(crate) struct Harness {
    pub(crate) services: SessionServices,
    pub(crate) sink: Arc<RecordingSink>,
    pub(crate) files: Arc<RecordingFiles>,
    pub(crate) results: Arc<MemoryResultsProducer>,
}

pub(crate) fn harness(config: EngineConfig) -> Harness {
    let sink = Arc::new(RecordingSink::default());
    let files = Arc::new(RecordingFiles::default());
    let results = Arc::new(MemoryResultsProducer::new());
    Harness {
        services: SessionServices {
            config: Arc::new(config),
            events: sink.clone(),
            files: files.clone(),
            results: results.clone(),
        },
        sink,
        files,
        results,
    }
}

pub(crate) fn services() -> (SessionServices, Arc<RecordingSink>) {
    let harness = harness(EngineConfig::default());
    (harness.services, harness.sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_shell_replies() {
        assert_eq!(respond("echo hello world").as_deref(), Some("hello world"));
        assert_eq!(respond("expr 2 + 3").as_deref(), Some("5"));
        assert_eq!(respond("expr 2 - 3").as_deref(), Some("-1"));
        assert_eq!(respond("").as_deref(), Some(""));
        assert_eq!(respond("fail").as_deref(), Some("error"));
        assert_eq!(respond("hang"), None);
    }
}
