//! Session and workflow configuration.
//!
//! Both structs are plain data with `Default` values matching what the relay
//! family tolerates in the field; front ends override individual fields.

use std::time::Duration;

use strum_macros::Display;

use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_COMMAND_TIMEOUT, DEFAULT_PORT, DEFAULT_WAVEFORM_TIMEOUT, PROHIBITED_COMMANDS,
};

/// Text encoding used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum TextEncoding {
    #[default]
    #[strum(to_string = "utf-8")]
    Utf8,
    #[strum(to_string = "latin-1")]
    Latin1,
}

impl TextEncoding {
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
                .collect(),
        }
    }
}

/// Connection and command-channel settings for one relay session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub encoding: TextEncoding,
    /// Upper bound for the TCP connect.
    pub connect_timeout: Duration,
    /// How long banner and Telnet negotiation bytes are drained after connect.
    pub negotiation_wait: Duration,
    /// Read timeout of a single stale-data drain poll.
    pub drain_poll: Duration,
    /// Total time a drain may keep discarding data.
    pub drain_budget: Duration,
    pub command_timeout: Duration,
    /// Timeout for each logout command sent on close.
    pub logout_timeout: Duration,
    /// Pause after a session-terminating command instead of reading a reply.
    pub terminate_settle: Duration,
    /// Pause after shutting the stream so the relay observes the close.
    pub close_linger: Duration,
    pub chunk_size: usize,
    pub show_progress: bool,
    pub prohibited_commands: Vec<String>,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            encoding: TextEncoding::default(),
            connect_timeout: Duration::from_secs(5),
            negotiation_wait: Duration::from_secs(3),
            drain_poll: Duration::from_secs(1),
            drain_budget: Duration::from_secs(10),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            logout_timeout: Duration::from_secs(1),
            terminate_settle: Duration::from_secs(1),
            close_linger: Duration::from_millis(500),
            chunk_size: DEFAULT_CHUNK_SIZE,
            show_progress: false,
            prohibited_commands: PROHIBITED_COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Settings for the download workflow.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub identity_attempts: u32,
    pub identity_backoff: Duration,
    pub waveform_timeout: Duration,
    /// Informational commands whose replies open the audit log.
    pub audit_commands: Vec<String>,
    /// History query issued when no dated window returned records.
    pub fallback_history_command: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            identity_attempts: 5,
            identity_backoff: Duration::from_secs(3),
            waveform_timeout: DEFAULT_WAVEFORM_TIMEOUT,
            audit_commands: ["ACC", "PASS", "HIS"].iter().map(|c| c.to_string()).collect(),
            fallback_history_command: "SER 50".to_string(),
        }
    }
}
