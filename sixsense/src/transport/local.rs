//! Local interactive shell processes.

use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use tokio::process::{Child, Command};

use super::ShellConnector;
use super::config::LocalShellConfig;
use crate::channel::{ChannelGuard, ShellChannel};
use crate::error::{ChannelError, Result, TransportError};

/// Spawns one shell process per channel.
#[derive(Debug, Clone, Default)]
pub struct LocalShellConnector {
    config: LocalShellConfig,
}

impl LocalShellConnector {
    pub fn new(config: LocalShellConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ShellConnector for LocalShellConnector {
    async fn open_channel(&self, channel_name: &str) -> Result<ShellChannel> {
        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransportError::SpawnFailed {
                program: self.config.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(ChannelError::PtyOpenFailed)?;
        let stdout = child.stdout.take().ok_or(ChannelError::PtyOpenFailed)?;
        debug!(
            "Spawned {} for {} channel (pid {:?})",
            self.config.program,
            channel_name,
            child.id()
        );

        Ok(ShellChannel::new(channel_name, stdout, stdin).with_guard(ShellProcess(child)))
    }
}

struct ShellProcess(Child);

#[async_trait]
impl ChannelGuard for ShellProcess {
    async fn close(mut self: Box<Self>) -> Result<()> {
        if self.0.try_wait().map_err(TransportError::Io)?.is_none() {
            self.0.kill().await.map_err(TransportError::Io)?;
        }
        Ok(())
    }
}
