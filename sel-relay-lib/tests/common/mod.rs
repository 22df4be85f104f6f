#![allow(dead_code)]

//! Shared helpers for the integration tests: a scripted in-memory relay,
//! a scripted prompter and an in-memory artifact sink.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sel_relay_lib::error::{Reachability, RelayError, Result};
use sel_relay_lib::prompt::Prompter;
use sel_relay_lib::sink::ArtifactSink;
use sel_relay_lib::transport::{ReachabilityProbe, Transport};
use sel_relay_lib::{RelaySession, SessionConfig};

pub const HOST: &str = "10.0.0.5";

pub const ID_351: &str = "ID\r\n\"FID=SEL-351-5-R507-V0-Z103100-D20110209\",\"08F6\"\r\n\
    \"BFID=SLBT-3CF1-R102-V0-Z100100-D20091207\",\"0970\"\r\n\"DEVID=FEEDER 12\",\"041B\"\r\n\r\n=>";

pub const ID_487E: &str = "ID\r\n\"FID=SEL-487E-3-R310-V0-Z014007-D20190913\",\"0A1C\"\r\n\
    \"DEVID=BUS 2\",\"03F0\"\r\n\r\n=>";

pub const CHI_TABLE: &str = "CHI\r\n\u{2}\"REC_NUM\",\"REF_NUM\",\"MONTH\",\"DAY\",\"YEAR\",\"HOUR\",\"MIN\",\"SEC\",\"MSEC\",\"EVENT\",\"0A3F\"\r\n\
    7,10007,3,15,2024,1,2,3,4,\"TRIP\",\"0C01\"\r\n\
    4,10004,3,14,2024,10,0,0,500,\"ER\",\"0B30\"\r\n\
    3,10003,3,14,2024,9,5,7,42,\"BCG T\",\"0B21\"\r\n\u{3}\r\n=>";

pub const CEV_DATA: &str = "\u{2}\"FID\",\"0208\"\r\n\"SEL-351-5\",\"0A1B\"\r\n\"IA\",\"IB\",\"IC\"\r\n1,2,3\r\n\u{3}\r\n=>";

pub const NO_DATA: &str = "No Data Available\r\n\r\n=>";

pub const SER_RECORDS: &str = "SER\r\n#  DATE       TIME          ELEMENT\r\n1  03/14/2024 09:05:07.042  51G Asserted\r\n=>";

/// One scripted reply: chunks delivered after an optional delay each.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    chunks: Vec<(Duration, Vec<u8>)>,
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Self::chunks(&[text])
    }

    pub fn chunks(parts: &[&str]) -> Self {
        Self {
            chunks: parts.iter().map(|p| (Duration::ZERO, p.as_bytes().to_vec())).collect(),
        }
    }

    pub fn bytes(bytes: &[u8]) -> Self {
        Self {
            chunks: vec![(Duration::ZERO, bytes.to_vec())],
        }
    }

    /// No reply at all.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn then_after(mut self, delay: Duration, text: &str) -> Self {
        self.chunks.push((delay, text.as_bytes().to_vec()));
        self
    }
}

#[derive(Default)]
struct MockState {
    inbox: VecDeque<(Duration, Vec<u8>)>,
    line: Vec<u8>,
    sent: Vec<String>,
    negotiation: Vec<u8>,
    queued: HashMap<String, VecDeque<Reply>>,
    always: HashMap<String, Reply>,
    closed: bool,
    close_calls: usize,
}

/// In-memory relay answering commands from a script.
///
/// Lookup order per received line: queued one-shot replies, then the
/// repeating reply, then `Invalid Command`.
#[derive(Clone, Default)]
pub struct MockRelay {
    state: Arc<Mutex<MockState>>,
}

impl MockRelay {
    pub fn new() -> Self {
        let relay = Self::default();
        relay.always("QUI", Reply::silent());
        relay.always("EXIT", Reply::silent());
        relay
    }

    /// Answer every `command` with `reply`.
    pub fn always(&self, command: &str, reply: Reply) -> &Self {
        self.state.lock().unwrap().always.insert(command.to_string(), reply);
        self
    }

    /// Answer the next `command` with `reply`; earlier queued replies go first.
    pub fn once(&self, command: &str, reply: Reply) -> &Self {
        self.state
            .lock()
            .unwrap()
            .queued
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Bytes the relay sends without being asked.
    pub fn push_unsolicited(&self, text: &str) {
        self.state
            .lock()
            .unwrap()
            .inbox
            .push_back((Duration::ZERO, text.as_bytes().to_vec()));
    }

    pub fn push_unsolicited_bytes(&self, bytes: &[u8]) {
        self.state.lock().unwrap().inbox.push_back((Duration::ZERO, bytes.to_vec()));
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn count_sent(&self, command: &str) -> usize {
        self.sent().iter().filter(|c| *c == command).count()
    }

    /// Telnet negotiation bytes written by the client.
    pub fn negotiation(&self) -> Vec<u8> {
        self.state.lock().unwrap().negotiation.clone()
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().unwrap().close_calls
    }
}

impl MockState {
    fn reply_for(&mut self, command: &str) -> Reply {
        if let Some(reply) = self.queued.get_mut(command).and_then(VecDeque::pop_front) {
            return reply;
        }
        if let Some(reply) = self.always.get(command) {
            return reply.clone();
        }
        Reply::text(&format!("{command}\r\nInvalid Command\r\n\r\n=>"))
    }
}

#[async_trait]
impl Transport for MockRelay {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(RelayError::ConnectionLost);
        }
        if data.first() == Some(&0xFF) {
            state.negotiation.extend_from_slice(data);
            return Ok(());
        }
        state.line.extend_from_slice(data);
        while let Some(pos) = state.line.windows(2).position(|w| w == b"\r\n") {
            let line: Vec<u8> = state.line.drain(..pos + 2).collect();
            let command = String::from_utf8_lossy(&line[..pos]).into_owned();
            let reply = state.reply_for(&command);
            state.sent.push(command);
            state.inbox.extend(reply.chunks);
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let next = {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return Err(RelayError::ConnectionLost);
            }
            state.inbox.pop_front()
        };

        let Some((delay, mut bytes)) = next else {
            tokio::time::sleep(timeout).await;
            return Err(RelayError::Timeout);
        };

        if delay > timeout {
            tokio::time::sleep(timeout).await;
            self.state.lock().unwrap().inbox.push_front((delay - timeout, bytes));
            return Err(RelayError::Timeout);
        }
        tokio::time::sleep(delay).await;

        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        if n < bytes.len() {
            let rest = bytes.split_off(n);
            self.state.lock().unwrap().inbox.push_front((Duration::ZERO, rest));
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.close_calls += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.state.lock().unwrap().closed
    }
}

/// Probe with a fixed answer.
pub struct FixedProbe(pub Reachability);

#[async_trait]
impl ReachabilityProbe for FixedProbe {
    async fn probe(&self, _host: &str) -> Reachability {
        self.0
    }
}

/// Route library logs to the test harness; `RUST_LOG` selects the level.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

pub fn config() -> SessionConfig {
    SessionConfig::new(HOST, 23)
}

/// Session attached to `relay`, past the negotiation window.
pub async fn connected_session(relay: &MockRelay) -> RelaySession {
    init_tracing();
    let mut session = RelaySession::with_probe(config(), Arc::new(FixedProbe(Reachability::Unknown)));
    session.attach(Box::new(relay.clone())).await.unwrap();
    session
}

/// Prompter answering from a fixed list; closed input once it runs out.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub questions: Vec<String>,
    pub shown: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn ask(&mut self, question: &str) -> Result<String> {
        self.questions.push(question.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| RelayError::Cancelled("input closed".into()))
    }

    fn show(&mut self, message: &str) {
        self.shown.push(message.to_string());
    }
}

/// Sink keeping every artifact in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub audits: BTreeMap<String, String>,
    pub waveforms: BTreeMap<String, String>,
    pub cancellation: Option<String>,
}

impl ArtifactSink for RecordingSink {
    fn write_audit(&mut self, name: &str, lines: &[String]) -> Result<()> {
        self.audits.insert(name.to_string(), lines.join("\n"));
        Ok(())
    }

    fn append_audit(&mut self, name: &str, text: &str) -> Result<()> {
        self.audits.entry(name.to_string()).or_default().push_str(text);
        Ok(())
    }

    fn write_waveform(&mut self, name: &str, content: &str) -> Result<()> {
        self.waveforms.insert(name.to_string(), content.to_string());
        Ok(())
    }

    fn write_cancellation(&mut self, lines: &[String]) -> Result<()> {
        self.cancellation = Some(lines.join("\n"));
        Ok(())
    }
}

/// Relay scripted with the informational commands every workflow issues.
pub fn relay_with_audit(id_reply: &str) -> MockRelay {
    let relay = MockRelay::new();
    relay
        .always("ID", Reply::text(id_reply))
        .always("ACC", Reply::text("ACC\r\nLevel 1\r\n=>"))
        .always("PASS", Reply::text("PASS\r\nInvalid Access Level\r\n=>"))
        .always("HIS", Reply::text("HIS\r\nFEEDER 12\r\n#  DATE  TIME  EVENT\r\n=>"))
        .always("CHI", Reply::text(CHI_TABLE));
    relay
}
