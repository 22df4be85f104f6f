//! Relay session lifecycle.
//!
//! A [`RelaySession`] owns the command channel for exactly one relay. It is
//! created disconnected, [`connect`](RelaySession::connect)ed once, and
//! [`close`](RelaySession::close)d with a polite logout.

use std::sync::Arc;
use std::time::Duration;

use strum_macros::Display;

use crate::channel::CommandChannel;
use crate::config::{SessionConfig, TextEncoding};
use crate::constants::{IDENTITY_COMMAND, LOGOUT_COMMANDS};
use crate::error::{RelayError, Result};
use crate::identity::IdentityReport;
use crate::transport::{PingProbe, ReachabilityProbe, TcpTransport, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    Disconnected,
    Connected,
    Closing,
    Closed,
}

pub struct RelaySession {
    config: SessionConfig,
    channel: CommandChannel,
    state: SessionState,
    probe: Arc<dyn ReachabilityProbe>,
}

impl RelaySession {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_probe(config, Arc::new(PingProbe))
    }

    pub fn with_probe(config: SessionConfig, probe: Arc<dyn ReachabilityProbe>) -> Self {
        let channel = CommandChannel::new(&config);
        Self {
            config,
            channel,
            state: SessionState::Disconnected,
            probe,
        }
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn encoding(&self) -> TextEncoding {
        self.config.encoding
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected && self.channel.is_attached()
    }

    /// Open the TCP stream and let Telnet negotiation settle.
    ///
    /// On failure the host is probed so the error says whether the relay is
    /// reachable but busy or not reachable at all; the original error is kept
    /// as the source.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state == SessionState::Connected {
            return Ok(());
        }
        let addr = self.config.addr();
        match TcpTransport::connect_with_timeout(&addr, self.config.connect_timeout).await {
            Ok(transport) => self.attach(Box::new(transport)).await,
            Err(source) => {
                let diagnosis = self.probe.probe(&self.config.host).await;
                tracing::warn!(addr = %addr, %diagnosis, error = %source, "Failed to connect");
                Err(RelayError::ConnectFailed {
                    addr,
                    diagnosis,
                    source: Box::new(source),
                })
            }
        }
    }

    /// Adopt an already-open transport, e.g. one accepted in a test.
    pub async fn attach(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        self.channel.attach(transport);
        self.channel.drain(self.config.negotiation_wait).await;
        self.state = SessionState::Connected;
        tracing::info!(host = %self.config.host, port = self.config.port, "Connected to SEL relay");
        Ok(())
    }

    /// Send a command with the default command timeout.
    pub async fn send_command(&mut self, command: &str) -> Result<String> {
        self.send_command_with_timeout(command, self.config.command_timeout).await
    }

    pub async fn send_command_with_timeout(&mut self, command: &str, timeout: Duration) -> Result<String> {
        if self.state != SessionState::Connected {
            return Err(RelayError::NotConnected);
        }
        self.channel.send(command, timeout).await
    }

    /// Raw `ID` response.
    pub async fn identity(&mut self) -> Result<String> {
        self.send_command(IDENTITY_COMMAND).await
    }

    /// Query the firmware id, retrying on empty replies, a missing `FID`
    /// field, or connection failures. The connection failure of the last
    /// attempt is returned as the error.
    pub async fn firmware_id(&mut self, attempts: u32, backoff: Duration) -> Result<Option<String>> {
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            match self.identity().await {
                Ok(response) if response.trim().is_empty() => {
                    tracing::error!(attempt, "Empty ID response received");
                }
                Ok(response) => match IdentityReport::parse(&response).firmware_id {
                    Some(fid) => return Ok(Some(fid)),
                    None => tracing::error!(attempt, "FID not found in the response"),
                },
                Err(e) if e.is_connection_failure() => {
                    tracing::warn!(attempt, error = %e, "ID attempt failed");
                    if attempt == attempts {
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
            if attempt < attempts {
                tokio::time::sleep(backoff).await;
            }
        }
        Ok(None)
    }

    /// Relay name from the `DEVID` field, if the relay reports one.
    pub async fn device_id(&mut self) -> Result<Option<String>> {
        let response = self.identity().await?;
        Ok(IdentityReport::parse(&response).device_id)
    }

    /// Log out politely and shut the stream.
    ///
    /// Closing an already closing or closed session only logs. Logout
    /// command failures are logged and do not stop the teardown.
    pub async fn close(&mut self) -> Result<()> {
        tracing::info!("SEL relay connection close requested");
        match self.state {
            SessionState::Disconnected => {
                tracing::warn!("Connection was not established");
                return Err(RelayError::NotConnected);
            }
            SessionState::Closing | SessionState::Closed => {
                tracing::warn!(state = %self.state, "Connection is already closing");
                return Ok(());
            }
            SessionState::Connected => {}
        }

        self.state = SessionState::Closing;
        for command in LOGOUT_COMMANDS {
            if let Err(e) = self.channel.send(command, self.config.logout_timeout).await {
                tracing::warn!(command = %command, error = %e, "Logout command failed");
            }
        }
        let result = self.channel.detach().await;
        tokio::time::sleep(self.config.close_linger).await;
        self.state = SessionState::Closed;
        tracing::info!("SEL relay connection closed");
        result
    }
}
