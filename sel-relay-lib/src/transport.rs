//! Byte-stream transport to the relay.
//!
//! [`Transport`] abstracts the duplex stream so the command channel can run
//! against a real [`TcpTransport`] or a scripted mock in tests.
//! [`ReachabilityProbe`] is consulted after a failed connect to tell a busy
//! Telnet port apart from an unreachable host.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::process::Command;

use crate::error::{Reachability, RelayError, Result};

/// Asynchronous byte-level transport to a relay.
#[async_trait]
pub trait Transport: Send {
    /// Write all bytes and flush.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read whatever is available into `buf`, waiting at most `timeout`.
    ///
    /// Returns [`RelayError::Timeout`] when nothing arrived in time and
    /// [`RelayError::ConnectionLost`] when the peer closed the stream.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Shut the stream down. Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;
}

/// TCP transport to the relay's Telnet port.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    addr: String,
}

impl TcpTransport {
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        tracing::debug!(addr = %addr, timeout_ms = timeout.as_millis(), "Connecting to relay");

        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                tracing::warn!(addr = %addr, "TCP connection timed out");
                RelayError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(addr = %addr, error = %e, "TCP connection failed");
                map_connect_error(e, addr)
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "Failed to set TCP_NODELAY (continuing anyway)");
        }

        tracing::info!(addr = %addr, "Connected to relay");
        Ok(Self {
            stream: Some(stream),
            addr: addr.to_string(),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(RelayError::NotConnected)?;
        tracing::trace!(addr = %self.addr, bytes = hex::encode(data), "TCP write");

        stream.write_all(data).await.map_err(map_io_error)?;
        stream.flush().await.map_err(map_io_error)?;
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(RelayError::NotConnected)?;

        match tokio::time::timeout(timeout, stream.read(buf)).await {
            Ok(Ok(0)) => {
                tracing::debug!(addr = %self.addr, "Peer closed connection (0 bytes read)");
                Err(RelayError::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(addr = %self.addr, bytes = hex::encode(&buf[..n]), "TCP read");
                Ok(n)
            }
            Ok(Err(e)) => Err(map_io_error(e)),
            Err(_) => Err(RelayError::Timeout),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::warn!(addr = %self.addr, error = %e, "Failed to shutdown TCP stream (continuing anyway)");
            }
            tracing::debug!(addr = %self.addr, "TCP connection closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

fn map_connect_error(e: std::io::Error, addr: &str) -> RelayError {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => RelayError::Connection(format!("connection refused: {}", addr)),
        _ => RelayError::Io(e),
    }
}

fn map_io_error(e: std::io::Error) -> RelayError {
    match e.kind() {
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::ConnectionAborted => RelayError::ConnectionLost,
        _ => RelayError::Io(e),
    }
}

/// Basic network reachability check used to diagnose connect failures.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, host: &str) -> Reachability;
}

/// Probe that runs one ICMP echo through the system `ping` binary.
#[derive(Debug, Clone, Default)]
pub struct PingProbe;

#[async_trait]
impl ReachabilityProbe for PingProbe {
    async fn probe(&self, host: &str) -> Reachability {
        let count_flag = if cfg!(windows) { "-n" } else { "-c" };
        let output = Command::new("ping").args([count_flag, "1", host]).output().await;

        match output {
            Ok(out) if out.status.success() => {
                tracing::info!(host = %host, "Ping successful");
                Reachability::HostReachable
            }
            Ok(out) => {
                tracing::warn!(
                    host = %host,
                    stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                    "Ping failed"
                );
                Reachability::HostUnreachable
            }
            Err(e) => {
                tracing::error!(host = %host, error = %e, "Error during ping");
                Reachability::Unknown
            }
        }
    }
}
