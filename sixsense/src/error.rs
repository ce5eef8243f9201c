//! Error types for sixsense.
//!
//! Only the edges that can genuinely fail return these: opening transports,
//! writing to channels and validating configuration. Command evaluation
//! never errors; it folds faults into a FAILURE [`ExpressionResult`].
//!
//! [`ExpressionResult`]: crate::logic::ExpressionResult

use std::io;
use thiserror::Error;

/// Main error type for sixsense operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH or process transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel read/write errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Session lifecycle errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Orchestrator and configuration errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Transport layer errors (SSH connection, authentication, process spawn).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// The server presented a key different from the recorded one
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Strict verification and the host is not in known_hosts
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Local shell process could not be spawned
    #[error("Failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Failed to open PTY channel
    #[error("Failed to open PTY channel")]
    PtyOpenFailed,

    /// No channel with this name is attached to the session
    #[error("Unknown channel '{0}'")]
    UnknownChannel(String),

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    Closed,

    /// Writing to the channel failed
    #[error("Channel write failed: {0}")]
    Write(#[source] io::Error),

    /// Invalid substitution rule pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Session layer errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Session has already been closed
    #[error("Session {0} is closed")]
    Closed(String),

    /// Some channels failed to close cleanly
    #[error("Failed to close channels: {}", channels.join(", "))]
    CloseFailed { channels: Vec<String> },

    /// A retained file could not be written
    #[error("Failed to write retention file {path}: {source}")]
    RetentionWrite {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Orchestrator and engine configuration errors.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Invalid configuration in the engine builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The orchestrator stopped accepting work
    #[error("Session services has been shut down")]
    EngineShutdown,
}

/// Result type alias using sixsense's Error.
pub type Result<T> = std::result::Result<T, Error>;
