//! Transport providers.
//!
//! A [`ShellConnector`] opens one authenticated interactive shell per
//! named channel. The session never cares which transport is behind it.

pub mod config;
mod local;
mod ssh;

pub use config::{AuthMethod, HostKeyVerification, LocalShellConfig, SshConfig};
pub use local::LocalShellConnector;
pub use ssh::{SshConnector, SshTransport};

use async_trait::async_trait;

use crate::channel::ShellChannel;
use crate::error::Result;

/// Opens shell channels for sessions.
#[async_trait]
pub trait ShellConnector: Send + Sync {
    /// Open a fresh interactive shell named `channel_name`.
    async fn open_channel(&self, channel_name: &str) -> Result<ShellChannel>;
}
