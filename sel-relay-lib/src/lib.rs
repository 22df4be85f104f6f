//! Client for the ASCII command dialect spoken by SEL protective relays over
//! their Telnet port, and the download workflow built on top of it.
//!
//! Layers, lowest first:
//!
//! - [`transport`] and [`telnet`]: the byte stream and Telnet option refusal
//! - [`channel`]: one-command-at-a-time request/response framing
//! - [`session`] and [`identity`]: connect/close lifecycle and `ID` parsing
//! - [`event_table`], [`id_range`]: event history parsing and selection
//! - [`model`], [`waveform`]: per-model `CEV` command dispatch
//! - [`workflow`]: the end-to-end download state machine

pub mod channel;
pub mod config;
pub mod constants;
pub mod error;
pub mod event_table;
pub mod id_range;
pub mod identity;
pub mod model;
pub mod policy;
pub mod progress;
pub mod prompt;
pub mod session;
pub mod sink;
pub mod telnet;
pub mod transport;
pub mod waveform;
pub mod workflow;

pub use config::{SessionConfig, TextEncoding, WorkflowConfig};
pub use error::{Reachability, RelayError, Result};
pub use event_table::{EventRecord, EventSelection, EventTable, SelectedEvent, parse_table};
pub use id_range::expand_id_ranges;
pub use model::{DeviceModel, SamplesMode};
pub use session::RelaySession;
pub use waveform::{WaveformDispatcher, WaveformResult};
pub use workflow::{DownloadOutcome, DownloadReport, DownloadRequest, DownloadWorkflow, WorkflowState};
