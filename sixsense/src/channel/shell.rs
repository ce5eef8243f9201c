//! A named, open channel handed over by a transport.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

pub type ChannelReader = Box<dyn AsyncRead + Send + Unpin>;
pub type ChannelWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Whatever keeps a channel's underlying resource alive (an SSH
/// connection, a child process) and knows how to release it.
#[async_trait]
pub trait ChannelGuard: Send {
    async fn close(self: Box<Self>) -> Result<()>;
}

/// An open, authenticated bidirectional stream with a name such as
/// `LOCAL`, `REMOTE` or `DOWNLOAD`.
pub struct ShellChannel {
    name: String,
    reader: ChannelReader,
    writer: ChannelWriter,
    guard: Option<Box<dyn ChannelGuard>>,
}

impl ShellChannel {
    pub fn new<R, W>(name: &str, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            name: name.to_uppercase(),
            reader: Box::new(reader),
            writer: Box::new(writer),
            guard: None,
        }
    }

    pub fn with_guard(mut self, guard: impl ChannelGuard + 'static) -> Self {
        self.guard = Some(Box::new(guard));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_parts(
        self,
    ) -> (
        String,
        ChannelReader,
        ChannelWriter,
        Option<Box<dyn ChannelGuard>>,
    ) {
        (self.name, self.reader, self.writer, self.guard)
    }
}

impl std::fmt::Debug for ShellChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellChannel")
            .field("name", &self.name)
            .field("guarded", &self.guard.is_some())
            .finish()
    }
}
