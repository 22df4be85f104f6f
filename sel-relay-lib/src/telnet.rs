//! Minimal Telnet option handling.
//!
//! The relay's port speaks Telnet, so option negotiation may be interleaved
//! with response text. [`TelnetFilter`] strips every `IAC` sequence from the
//! incoming bytes and produces a refusal for each option request: the client
//! never enables any option and stays in plain NVT line mode.

pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const SE: u8 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Data,
    Iac,
    Option(u8),
    Sub,
    SubIac,
}

/// Result of filtering one received chunk.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Filtered {
    /// Payload bytes with all Telnet commands removed.
    pub data: Vec<u8>,
    /// Refusals to write back to the peer.
    pub replies: Vec<u8>,
}

/// Streaming `IAC` stripper; state carries across chunk boundaries.
#[derive(Debug, Default)]
pub struct TelnetFilter {
    state: State,
}

impl TelnetFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, input: &[u8]) -> Filtered {
        let mut out = Filtered {
            data: Vec::with_capacity(input.len()),
            replies: Vec::new(),
        };

        for &byte in input {
            self.state = match (self.state, byte) {
                (State::Data, IAC) => State::Iac,
                (State::Data, b) => {
                    out.data.push(b);
                    State::Data
                }
                (State::Iac, IAC) => {
                    out.data.push(IAC);
                    State::Data
                }
                (State::Iac, cmd @ (DO | DONT | WILL | WONT)) => State::Option(cmd),
                (State::Iac, SB) => State::Sub,
                (State::Iac, _) => State::Data,
                (State::Option(cmd), option) => {
                    match cmd {
                        DO => out.replies.extend_from_slice(&[IAC, WONT, option]),
                        WILL => out.replies.extend_from_slice(&[IAC, DONT, option]),
                        _ => {}
                    }
                    tracing::trace!(command = cmd, option, "Refused Telnet option");
                    State::Data
                }
                (State::Sub, IAC) => State::SubIac,
                (State::Sub, _) => State::Sub,
                (State::SubIac, SE) => State::Data,
                (State::SubIac, _) => State::Sub,
            };
        }

        out
    }
}
