//! End-to-end download of event waveforms from one relay.
//!
//! ```text
//! IDENTIFY -> LOG_FETCH -> EVENT_RESOLVE -> SAMPLE_VALIDATE -> CYCLES_VALIDATE -> PER_EVENT_DOWNLOAD -> DONE
//!                              |                                   |
//!                              +------------> CANCELLED <----------+
//! ```
//!
//! The workflow owns the session, so a shutdown path (signal handler,
//! early return) always has one place to close it from.

use chrono::{Local, NaiveDate};
use strum_macros::Display;

use crate::config::WorkflowConfig;
use crate::constants::{CANCEL_TOKEN, EVENT_TABLE_COMMAND};
use crate::error::{RelayError, Result};
use crate::event_table::{EventSelection, EventTable, SelectedEvent};
use crate::id_range::expand_id_ranges;
use crate::model::{DeviceModel, SamplesMode};
use crate::prompt::{Prompter, ask_positive, is_cancel_token, parse_positive};
use crate::session::{RelaySession, SessionState};
use crate::sink::{ArtifactSink, CANCEL_MARKER, audit_name, failed_waveform_note, waveform_name};
use crate::waveform::WaveformDispatcher;

const DATE_FORMAT: &str = "%m/%d/%Y";
const SEPARATOR_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Identify,
    LogFetch,
    EventResolve,
    SampleValidate,
    CyclesValidate,
    PerEventDownload,
    Done,
    Cancelled,
}

/// What the caller already knows. Missing values, unknown event ids and
/// invalid cycle counts are asked for; an unrecognized samples value is
/// coerced to 4 samples/cycle.
#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
    /// Range expression such as `1,2,5-8`.
    pub event_ids: Option<String>,
    pub samples: Option<String>,
    pub cycles: Option<String>,
}

/// Result of one event's waveform download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDownload {
    pub event: SelectedEvent,
    pub command: Option<String>,
    pub cycles: u32,
    pub artifact: String,
    pub succeeded: bool,
}

#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub model: DeviceModel,
    pub firmware_id: Option<String>,
    pub device_id: Option<String>,
    /// `None` when there was nothing to select and no audit log was written.
    pub audit_artifact: Option<String>,
    pub history_commands: Vec<String>,
    pub events: Vec<EventDownload>,
}

impl DownloadReport {
    pub fn failed_events(&self) -> impl Iterator<Item = &EventDownload> {
        self.events.iter().filter(|e| !e.succeeded)
    }
}

#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    Completed(DownloadReport),
    Cancelled(String),
}

/// Previous calendar day of a `MM/DD/YYYY` date, in the same format.
pub fn previous_day(date: &str) -> Result<String> {
    let parsed = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|e| RelayError::Validation(format!("invalid event date '{date}': {e}")))?;
    let previous = parsed
        .pred_opt()
        .ok_or_else(|| RelayError::Validation(format!("no day before '{date}'")))?;
    Ok(previous.format(DATE_FORMAT).to_string())
}

/// True when a history reply means the dated window did not work.
fn history_needs_fallback(response: Option<&String>) -> bool {
    match response {
        None => true,
        Some(text) => {
            let lower = text.to_lowercase();
            lower.contains("invalid") || lower.contains("no ser data")
        }
    }
}

/// Context object that owns the session and its collaborators for one run.
pub struct DownloadWorkflow<P, S> {
    session: RelaySession,
    prompter: P,
    sink: S,
    config: WorkflowConfig,
    state: WorkflowState,
    audit: Vec<String>,
}

impl<P: Prompter, S: ArtifactSink> DownloadWorkflow<P, S> {
    pub fn new(session: RelaySession, prompter: P, sink: S, config: WorkflowConfig) -> Self {
        Self {
            session,
            prompter,
            sink,
            config,
            state: WorkflowState::Identify,
            audit: Vec::new(),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn session(&self) -> &RelaySession {
        &self.session
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    /// Connect, run the whole download and close the session.
    pub async fn run(&mut self, request: DownloadRequest) -> Result<DownloadOutcome> {
        self.session.connect().await?;
        let outcome = self.execute(request).await;
        self.shutdown().await;
        outcome
    }

    /// Run the download on an already connected session. User cancellation
    /// is returned as [`DownloadOutcome::Cancelled`] after the cancellation
    /// artifact is written.
    pub async fn execute(&mut self, request: DownloadRequest) -> Result<DownloadOutcome> {
        match self.download(request).await {
            Ok(report) => {
                self.transition(WorkflowState::Done);
                Ok(DownloadOutcome::Completed(report))
            }
            Err(RelayError::Cancelled(reason)) => {
                self.transition(WorkflowState::Cancelled);
                tracing::info!(reason = %reason, "{}", CANCEL_MARKER);
                let mut lines = self.audit.clone();
                lines.push(CANCEL_MARKER.to_string());
                self.sink.write_cancellation(&lines)?;
                Ok(DownloadOutcome::Cancelled(reason))
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort close. Never fails; teardown errors are logged.
    pub async fn shutdown(&mut self) {
        match self.session.state() {
            SessionState::Connected => {
                if let Err(e) = self.session.close().await {
                    tracing::warn!(error = %e, "Error while closing the relay session");
                }
            }
            state => tracing::debug!(%state, "No session to close"),
        }
    }

    fn transition(&mut self, next: WorkflowState) {
        tracing::info!(from = %self.state, to = %next, "Workflow state");
        self.state = next;
    }

    async fn download(&mut self, request: DownloadRequest) -> Result<DownloadReport> {
        self.transition(WorkflowState::Identify);
        let firmware_id = self
            .session
            .firmware_id(self.config.identity_attempts, self.config.identity_backoff)
            .await?;
        let model = match firmware_id.as_deref() {
            Some(fid) => DeviceModel::from_firmware_id(fid),
            None => {
                tracing::warn!("No firmware id reported, treating the relay as an unknown model");
                DeviceModel::Other
            }
        };
        tracing::info!(fid = ?firmware_id, %model, "Relay identified");

        self.transition(WorkflowState::LogFetch);
        self.fetch_audit_logs().await;

        self.transition(WorkflowState::EventResolve);
        let chi = self.session.send_command(EVENT_TABLE_COMMAND).await?;
        let table = EventTable::parse(&chi);
        if table.is_empty() {
            tracing::error!("Relay returned no events, nothing to download");
            return Ok(DownloadReport {
                model,
                firmware_id,
                device_id: None,
                audit_artifact: None,
                history_commands: Vec::new(),
                events: Vec::new(),
            });
        }
        let selection = self.resolve_events(&table, request.event_ids.as_deref()).await?;

        self.transition(WorkflowState::SampleValidate);
        let samples = self.resolve_samples(request.samples.as_deref()).await?;

        self.transition(WorkflowState::CyclesValidate);
        let cycles = self.resolve_cycles(request.cycles.as_deref()).await?;

        self.transition(WorkflowState::PerEventDownload);
        let device_id = match self.session.device_id().await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read the relay name");
                None
            }
        };

        let history_commands = self.fetch_history(&selection).await;

        let last_timestamp = selection.events.last().map(|e| e.timestamp.as_str()).unwrap_or_default();
        let audit_artifact = audit_name(device_id.as_deref(), last_timestamp);
        tracing::debug!(name = %audit_artifact, "Writing audit log");
        self.sink.write_audit(&audit_artifact, &self.audit)?;

        let dispatcher = WaveformDispatcher::new(model).with_timeout(self.config.waveform_timeout);
        let mut cycles = cycles;
        let mut events = Vec::with_capacity(selection.len());
        for event in selection.events {
            let result = dispatcher
                .download(&mut self.session, &event.record_number, cycles, samples, &mut self.prompter)
                .await?;
            cycles = result.cycles;

            let command = result.command.clone().unwrap_or_default();
            let artifact = waveform_name(device_id.as_deref(), &event.timestamp, &event.label, &command);
            let succeeded = match &result.response {
                Some(response) => {
                    tracing::debug!(name = %artifact, "Writing waveform");
                    self.sink.write_waveform(&artifact, response)?;
                    true
                }
                None => {
                    tracing::error!(event_id = %event.record_number, name = %artifact, "Failed to download waveform");
                    self.sink.append_audit(&audit_artifact, &failed_waveform_note(&artifact))?;
                    false
                }
            };
            events.push(EventDownload {
                event,
                command: result.command,
                cycles: result.cycles,
                artifact,
                succeeded,
            });
        }

        Ok(DownloadReport {
            model,
            firmware_id,
            device_id,
            audit_artifact: Some(audit_artifact),
            history_commands,
            events,
        })
    }

    async fn fetch_audit_logs(&mut self) {
        let now = Local::now().format("%Y/%m/%d %A %H:%M:%S.%6f");
        self.audit.push(format!("Connect IP: {}", self.session.host()));
        self.audit.push(format!("Current computer time: {now}"));
        self.audit.push(format!("{}\n", "=".repeat(SEPARATOR_WIDTH)));

        for command in self.config.audit_commands.clone() {
            match self.session.send_command(&command).await {
                Ok(response) => self.audit.push(response),
                Err(e) if e.is_connection_failure() => {
                    tracing::warn!(command = %command, error = %e, "Audit command lost the connection")
                }
                Err(e) => tracing::error!(command = %command, error = %e, "Audit command failed"),
            }
        }
    }

    async fn resolve_events(&mut self, table: &EventTable, expression: Option<&str>) -> Result<EventSelection> {
        let ids = expand_id_ranges(expression.unwrap_or_default());
        let selection = table.select(&ids);
        if !selection.is_empty() {
            return Ok(selection);
        }
        if expression.is_some() {
            tracing::warn!(ids = ?ids, "None of the requested event ids are in the event table");
        }

        self.prompter.show(&table.render());
        loop {
            let answer = self
                .prompter
                .ask("Please enter the Id Numbers to download, e.g. 1,2,5-8,10 (or 'exit' to exit): ")
                .await?;
            if is_cancel_token(&answer) {
                return Err(RelayError::Cancelled(format!("user typed '{CANCEL_TOKEN}' at event selection")));
            }
            match table.select_expression(&answer) {
                Ok(selection) => return Ok(selection),
                Err(e) => self.prompter.show(&e.to_string()),
            }
        }
    }

    async fn resolve_samples(&mut self, requested: Option<&str>) -> Result<SamplesMode> {
        if let Some(requested) = requested {
            return Ok(SamplesMode::coerce(requested));
        }
        loop {
            let answer = self
                .prompter
                .ask("Please enter Samples/Cycles (4 or all) to download: ")
                .await?;
            match SamplesMode::parse(&answer) {
                Some(samples) => return Ok(samples),
                None => self
                    .prompter
                    .show("Samples/Cycles can only enter 4 or all, please enter again."),
            }
        }
    }

    async fn resolve_cycles(&mut self, requested: Option<&str>) -> Result<u32> {
        if let Some(cycles) = requested.and_then(parse_positive) {
            return Ok(cycles);
        }
        let cycles = ask_positive(
            &mut self.prompter,
            "Please enter Event Length (Cycles) to download (or 'exit' to exit): ",
        )
        .await?;
        tracing::debug!(cycles, "Event length entered");
        Ok(cycles)
    }

    /// One history window per distinct event date, plus the broad fallback
    /// when any window came back empty or invalid.
    async fn fetch_history(&mut self, selection: &EventSelection) -> Vec<String> {
        let mut dates: Vec<&str> = Vec::new();
        for event in selection.iter() {
            if !dates.contains(&event.date.as_str()) {
                dates.push(&event.date);
            }
        }

        let mut commands = Vec::new();
        let mut replies = Vec::new();
        for date in dates {
            let command = match previous_day(date) {
                Ok(previous) => format!("SER {previous} {date}"),
                Err(e) => {
                    tracing::error!(error = %e, "Skipping history window");
                    replies.push(None);
                    continue;
                }
            };
            let reply = self.history_query(&command).await;
            commands.push(command);
            replies.push(reply);
        }

        if replies.iter().any(|r| history_needs_fallback(r.as_ref())) {
            let command = self.config.fallback_history_command.clone();
            tracing::info!(command = %command, "Dated history window returned no records, using fallback");
            self.history_query(&command).await;
            commands.push(command);
        }
        commands
    }

    async fn history_query(&mut self, command: &str) -> Option<String> {
        match self.session.send_command(command).await {
            Ok(response) => {
                self.audit.push(response.clone());
                Some(response)
            }
            Err(e) => {
                tracing::error!(command = %command, error = %e, "History query failed");
                None
            }
        }
    }
}
