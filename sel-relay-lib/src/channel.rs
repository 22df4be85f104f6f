//! One-command-at-a-time request/response channel.
//!
//! The relay sends no length prefix and no fixed delimiter, so a response is
//! considered complete when one of these heuristics fires on a received
//! chunk (first match wins):
//!
//! 1. the chunk contains the command prompt `=>` or `Password:`;
//! 2. an ETX byte (0x03) has been seen in the response so far and the chunk
//!    contains `=`.
//!
//! Heuristic 2 can fire early if the relay emits `=` in ordinary data after
//! an unrelated ETX within the same read. It is kept as-is because the relay
//! family relies on it to end `CEV`/`CHI` blocks.
//!
//! Before each command (except session-terminating ones) stale bytes left
//! over from the previous exchange are drained, so a late tail of an old
//! response can never be mistaken for the start of the next.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::time::Instant;

use crate::config::{SessionConfig, TextEncoding};
use crate::constants::{ETX, LINE_TERMINATOR, PASSWORD_PROMPT, PROMPT_MARKER, TERMINATING_COMMANDS};
use crate::error::{RelayError, Result};
use crate::policy::CommandPolicy;
use crate::progress::ProgressGuard;
use crate::telnet::TelnetFilter;
use crate::transport::Transport;

static CRLF_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r\n+").expect("static regex"));

/// Why a response was considered complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Pending,
    Prompt,
    PasswordPrompt,
    EtxThenEquals,
}

/// Accumulates the chunks of one response and evaluates the completion
/// heuristics.
#[derive(Debug, Default)]
pub struct ResponseFramer {
    buffer: String,
    etx_seen: bool,
}

impl ResponseFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> Completion {
        let chunk = CRLF_RUN.replace_all(chunk, "\n");
        self.buffer.push_str(&chunk);

        if chunk.contains(ETX) {
            tracing::debug!("Response reached ETX");
            self.etx_seen = true;
        }
        if chunk.contains(PROMPT_MARKER) {
            Completion::Prompt
        } else if chunk.contains(PASSWORD_PROMPT) {
            Completion::PasswordPrompt
        } else if self.etx_seen && chunk.contains('=') {
            tracing::debug!("Response has ETX and '=', complete");
            Completion::EtxThenEquals
        } else {
            Completion::Pending
        }
    }

    pub fn etx_seen(&self) -> bool {
        self.etx_seen
    }

    /// Final text with the trailing line breaks canonicalized to one CRLF.
    pub fn finish(self) -> String {
        let collapsed = CRLF_RUN.replace_all(&self.buffer, "\n");
        let trimmed = collapsed.trim_end_matches(['\r', '\n']);
        if trimmed.len() == collapsed.len() {
            collapsed.into_owned()
        } else {
            format!("{trimmed}{LINE_TERMINATOR}")
        }
    }
}

/// Incremental decoder that holds back a UTF-8 sequence split across chunks.
#[derive(Debug)]
struct TextDecoder {
    encoding: TextEncoding,
    pending: Vec<u8>,
}

impl TextDecoder {
    fn new(encoding: TextEncoding) -> Self {
        Self {
            encoding,
            pending: Vec::new(),
        }
    }

    fn decode(&mut self, bytes: &[u8]) -> String {
        match self.encoding {
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            TextEncoding::Utf8 => {
                self.pending.extend_from_slice(bytes);
                let split = match std::str::from_utf8(&self.pending) {
                    Ok(_) => self.pending.len(),
                    Err(e) if e.error_len().is_none() => e.valid_up_to(),
                    Err(_) => self.pending.len(),
                };
                let rest = self.pending.split_off(split);
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending = rest;
                text
            }
        }
    }

    /// Forget a partial sequence held back from earlier chunks.
    fn reset(&mut self) {
        self.pending.clear();
    }
}

pub fn is_terminating(command: &str) -> bool {
    let normalized = command.trim().to_lowercase();
    TERMINATING_COMMANDS.contains(&normalized.as_str())
}

/// Serialized command channel over a [`Transport`].
pub struct CommandChannel {
    transport: Option<Box<dyn Transport>>,
    telnet: TelnetFilter,
    decoder: TextDecoder,
    policy: CommandPolicy,
    encoding: TextEncoding,
    chunk_size: usize,
    drain_poll: Duration,
    drain_budget: Duration,
    terminate_settle: Duration,
    show_progress: bool,
}

impl CommandChannel {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            transport: None,
            telnet: TelnetFilter::new(),
            decoder: TextDecoder::new(config.encoding),
            policy: CommandPolicy::new(config.prohibited_commands.iter().cloned()),
            encoding: config.encoding,
            chunk_size: config.chunk_size.max(1),
            drain_poll: config.drain_poll,
            drain_budget: config.drain_budget,
            terminate_settle: config.terminate_settle,
            show_progress: config.show_progress,
        }
    }

    pub fn attach(&mut self, transport: Box<dyn Transport>) {
        self.telnet = TelnetFilter::new();
        self.decoder = TextDecoder::new(self.encoding);
        self.transport = Some(transport);
    }

    pub fn is_attached(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_connected())
    }

    /// Close and drop the underlying transport.
    pub async fn detach(&mut self) -> Result<()> {
        match self.transport.take() {
            Some(mut transport) => transport.close().await,
            None => Ok(()),
        }
    }

    /// Send one command and wait for its complete response.
    pub async fn send(&mut self, command: &str, timeout: Duration) -> Result<String> {
        self.policy.check(command)?;
        if self.transport.is_none() {
            return Err(RelayError::NotConnected);
        }

        let terminating = is_terminating(command);
        if !terminating {
            tracing::debug!(command = %command, "Waiting for previous data");
            self.drain(self.drain_budget).await;
        }

        self.write_line(command).await?;

        if terminating {
            tokio::time::sleep(self.terminate_settle).await;
            tracing::info!(command = %command, "Session-terminating command sent");
            return Ok(String::new());
        }

        let response = self.read_response(command, timeout).await?;
        tracing::info!(command = %command, bytes = response.len(), "Response received");
        tracing::debug!(command = %command, response = %response, "Response text");
        Ok(response)
    }

    /// Discard incoming data until the relay is quiet or `budget` is spent.
    pub async fn drain(&mut self, budget: Duration) {
        let started = Instant::now();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            match self.read_chunk(&mut buf, self.drain_poll).await {
                Ok(stale) => {
                    if !stale.is_empty() {
                        tracing::debug!(stale = %stale, "Discarded stale data");
                    }
                    if started.elapsed() > budget {
                        tracing::warn!(budget_ms = budget.as_millis(), "Relay still sending, stop draining");
                        break;
                    }
                }
                Err(RelayError::Timeout) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Stopped draining previous data");
                    break;
                }
            }
        }
        self.decoder.reset();
    }

    async fn write_line(&mut self, command: &str) -> Result<()> {
        let line = format!("{command}{LINE_TERMINATOR}");
        let bytes = self.encoding.encode(&line);
        let transport = self.transport.as_deref_mut().ok_or(RelayError::NotConnected)?;
        tracing::debug!(command = %command, "Sending command to relay");

        transport.send(&bytes).await.map_err(|e| match e {
            RelayError::NotConnected => RelayError::NotConnected,
            other => {
                tracing::warn!(command = %command, error = %other, "Failed to send command");
                RelayError::Connection(format!("Writer is closing or already closed: {other}"))
            }
        })
    }

    async fn read_response(&mut self, command: &str, timeout: Duration) -> Result<String> {
        let _progress = ProgressGuard::start(self.show_progress);
        let mut framer = ResponseFramer::new();
        let mut buf = vec![0u8; self.chunk_size];
        let mut last_data = Instant::now();

        loop {
            let remaining = timeout.saturating_sub(last_data.elapsed());
            if remaining.is_zero() {
                return Err(response_timeout(command));
            }
            match self.read_chunk(&mut buf, remaining).await {
                Ok(text) if text.is_empty() => continue,
                Ok(text) => {
                    last_data = Instant::now();
                    let completion = framer.push(&text);
                    if completion != Completion::Pending {
                        tracing::trace!(command = %command, ?completion, "Response complete");
                        return Ok(framer.finish());
                    }
                }
                Err(RelayError::Timeout) => return Err(response_timeout(command)),
                Err(RelayError::NotConnected) => return Err(RelayError::NotConnected),
                Err(e) => {
                    tracing::error!(command = %command, error = %e, "Read failed");
                    return Err(RelayError::Connection(format!(
                        "Lost connection waiting for response to command: {command} ({e})"
                    )));
                }
            }
        }
    }

    async fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<String> {
        let transport = self.transport.as_deref_mut().ok_or(RelayError::NotConnected)?;
        let n = transport.receive(buf, timeout).await?;
        let filtered = self.telnet.feed(&buf[..n]);
        if !filtered.replies.is_empty() {
            transport.send(&filtered.replies).await?;
        }
        Ok(self.decoder.decode(&filtered.data))
    }
}

fn response_timeout(command: &str) -> RelayError {
    let message = format!("Timeout waiting for response to command: {command}");
    tracing::error!("{}", message);
    RelayError::Connection(message)
}
