//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use russh::Channel;
use russh::client::{self, Handle, Msg};
use russh::keys::known_hosts::{learn_known_hosts, learn_known_hosts_path};
use russh::keys::{
    PrivateKeyWithHashAlg, PublicKey, check_known_hosts, check_known_hosts_path, load_secret_key,
};
use secrecy::ExposeSecret;

use super::ShellConnector;
use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use crate::channel::{ChannelGuard, ShellChannel};
use crate::error::{Result, TransportError};

/// One authenticated SSH connection.
pub struct SshTransport {
    session: Handle<HostKeyPolicy>,
    config: SshConfig,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate.
    pub async fn connect(config: SshConfig) -> Result<Self> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(config.timeout),
            ..Default::default()
        });

        let policy = HostKeyPolicy {
            host: config.host.clone(),
            port: config.port,
            verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
        };

        let address = (config.host.as_str(), config.port);
        let mut session =
            tokio::time::timeout(config.timeout, client::connect(ssh_config, address, policy))
                .await
                .map_err(|_| TransportError::Timeout(config.timeout))??;

        Self::authenticate(&mut session, &config).await?;
        debug!("Connected to {}", config.socket_addr());

        Ok(Self { session, config })
    }

    /// Open a session channel with a PTY and an interactive shell.
    pub async fn open_shell(&self) -> Result<Channel<Msg>> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                "xterm",
                self.config.terminal_width,
                self.config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok(channel)
    }

    async fn authenticate(session: &mut Handle<HostKeyPolicy>, config: &SshConfig) -> Result<()> {
        let user = config.username.as_str();
        let outcome = match &config.auth {
            AuthMethod::None => session.authenticate_none(user).await,
            AuthMethod::Password(password) => {
                session
                    .authenticate_password(user, password.expose_secret())
                    .await
            }
            AuthMethod::PrivateKey { path, passphrase } => {
                let passphrase = passphrase.as_ref().map(|p| p.expose_secret());
                let key = load_secret_key(path, passphrase)
                    .map_err(|e| TransportError::Key(e.to_string()))?;
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();
                let key = PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg);
                session.authenticate_publickey(user, key).await
            }
        }
        .map_err(TransportError::Ssh)?;

        if outcome.success() {
            Ok(())
        } else {
            Err(TransportError::AuthenticationFailed {
                user: user.to_string(),
            }
            .into())
        }
    }

    /// Disconnect.
    pub async fn close(self) -> Result<()> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

#[async_trait]
impl ChannelGuard for SshTransport {
    async fn close(self: Box<Self>) -> Result<()> {
        SshTransport::close(*self).await
    }
}

/// Opens every channel as its own SSH connection to one jump host.
///
/// Devices are reached from these shells by the commands of the
/// operation itself (`ssh $device.username@$device.host`, `scp`, ...).
#[derive(Debug, Clone)]
pub struct SshConnector {
    config: SshConfig,
}

impl SshConnector {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ShellConnector for SshConnector {
    async fn open_channel(&self, channel_name: &str) -> Result<ShellChannel> {
        let transport = SshTransport::connect(self.config.clone()).await?;
        let shell = transport.open_shell().await?;
        let (reader, writer) = tokio::io::split(shell.into_stream());
        debug!("Opened {} channel on {}", channel_name, self.config.socket_addr());
        Ok(ShellChannel::new(channel_name, reader, writer).with_guard(transport))
    }
}

/// Host key policy applied while connecting.
///
/// Rejections surface from `connect` as the matching [`TransportError`].
struct HostKeyPolicy {
    host: String,
    port: u16,
    verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
}

impl HostKeyPolicy {
    fn remember(&self, key: &PublicKey) {
        let learned = match &self.known_hosts_path {
            Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
            None => learn_known_hosts(&self.host, self.port, key),
        };
        if let Err(e) = learned {
            warn!("Failed to save host key of {}: {}", self.host, e);
        }
    }
}

impl client::Handler for HostKeyPolicy {
    type Error = TransportError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        if matches!(self.verification, HostKeyVerification::Disabled) {
            return Ok(true);
        }

        let known = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };
        match known {
            Ok(true) => Ok(true),
            Ok(false) if matches!(self.verification, HostKeyVerification::Strict) => {
                Err(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })
            }
            Ok(false) => {
                self.remember(server_public_key);
                Ok(true)
            }
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }
}
