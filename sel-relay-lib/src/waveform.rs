//! Waveform (`CEV`) download for one event.

use std::time::Duration;

use crate::constants::{DEFAULT_WAVEFORM_TIMEOUT, NO_DATA_AVAILABLE};
use crate::error::Result;
use crate::model::{DeviceModel, SamplesMode};
use crate::prompt::{Prompter, is_cancel_token, parse_positive};
use crate::session::RelaySession;

/// Outcome of one event download. `response` is `None` when the download
/// failed; `command` is the last command attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformResult {
    pub response: Option<String>,
    pub cycles: u32,
    pub command: Option<String>,
}

impl WaveformResult {
    pub fn succeeded(&self) -> bool {
        self.response.is_some()
    }
}

fn is_no_data(response: &str) -> bool {
    response.to_lowercase().contains(NO_DATA_AVAILABLE)
}

/// Issues the model's `CEV` command and handles "No Data Available".
#[derive(Debug, Clone, Copy)]
pub struct WaveformDispatcher {
    model: DeviceModel,
    timeout: Duration,
}

impl WaveformDispatcher {
    pub fn new(model: DeviceModel) -> Self {
        Self {
            model,
            timeout: DEFAULT_WAVEFORM_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> DeviceModel {
        self.model
    }

    /// Download the waveform of `event_id`.
    ///
    /// Models with a selectable capture length ask `prompter` for a shorter
    /// length after "No Data Available" and retry; typing the cancel token
    /// there gives up on this event only. Other models fail the event on the
    /// first "No Data Available". Connection failures fail the event and keep
    /// the attempted command. Closed input propagates as `Err(Cancelled)`.
    pub async fn download(
        &self,
        session: &mut RelaySession,
        event_id: &str,
        cycles: u32,
        samples: SamplesMode,
        prompter: &mut dyn Prompter,
    ) -> Result<WaveformResult> {
        let profile = self.model.profile();
        if self.model == DeviceModel::Other {
            tracing::warn!(event_id = %event_id, "Full waveform download is not supported for this relay model");
        }

        let mut cycles = cycles;
        loop {
            let command = self.model.command_for(samples, event_id, cycles);
            tracing::info!(event_id = %event_id, command = %command, timeout_ms = self.timeout.as_millis(), "Downloading waveform");

            let response = match session.send_command_with_timeout(&command, self.timeout).await {
                Ok(response) => response,
                Err(e) if e.is_connection_failure() => {
                    tracing::error!(event_id = %event_id, command = %command, error = %e, "Waveform download failed");
                    return Ok(failed(cycles, command));
                }
                Err(e) => return Err(e),
            };

            if !is_no_data(&response) {
                tracing::info!(event_id = %event_id, command = %command, "Download waveform completed");
                return Ok(WaveformResult {
                    response: Some(response),
                    cycles,
                    command: Some(command),
                });
            }

            if !profile.narrows_on_no_data {
                tracing::error!(command = %command, "No data can download");
                return Ok(failed(cycles, command));
            }

            prompter.show("No Data Available. The entered Event Length is too long. Please re-enter.");
            match self.ask_shorter(prompter).await? {
                Some(shorter) => cycles = shorter,
                None => {
                    tracing::warn!(event_id = %event_id, "User skipped the event after No Data Available");
                    return Ok(failed(cycles, command));
                }
            }
        }
    }

    /// `None` when the user typed the cancel token.
    async fn ask_shorter(&self, prompter: &mut dyn Prompter) -> Result<Option<u32>> {
        loop {
            let answer = prompter
                .ask("Please enter Event Length (Cycles) to download (or 'exit' to skip this event): ")
                .await?;
            if is_cancel_token(&answer) {
                return Ok(None);
            }
            match parse_positive(&answer) {
                Some(cycles) => return Ok(Some(cycles)),
                None => prompter.show("Invalid input. Please enter a positive integer."),
            }
        }
    }
}

fn failed(cycles: u32, command: String) -> WaveformResult {
    WaveformResult {
        response: None,
        cycles,
        command: Some(command),
    }
}
