use std::fmt;
use std::io;
use thiserror::Error;

/// Outcome of the reachability probe run after a failed connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// The host answers ping; the Telnet port is busy or refused.
    HostReachable,
    /// The host does not answer ping.
    HostUnreachable,
    /// The probe itself could not be run.
    Unknown,
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reachability::HostReachable => write!(f, "host reachable, it might be in use by another user"),
            Reachability::HostUnreachable => write!(f, "host unreachable"),
            Reachability::Unknown => write!(f, "reachability unknown"),
        }
    }
}

/// The primary error type for the `sel-relay-lib` library.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Not connected to SEL relay")]
    NotConnected,

    #[error("Timeout waiting for data")]
    Timeout,

    #[error("Connection lost")]
    ConnectionLost,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Failed to connect to {addr} ({diagnosis}): {source}")]
    ConnectFailed {
        addr: String,
        diagnosis: Reachability,
        #[source]
        source: Box<RelayError>,
    },

    #[error("{command} - The command '{denied}' is not allowed.")]
    ProhibitedCommand { command: String, denied: String },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RelayError {
    /// True for every failure that means the link to the relay is unusable.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            RelayError::NotConnected
                | RelayError::Timeout
                | RelayError::ConnectionLost
                | RelayError::Connection(_)
                | RelayError::ConnectFailed { .. }
                | RelayError::Io(_)
        )
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, RelayError::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
