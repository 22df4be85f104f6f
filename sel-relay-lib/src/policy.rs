//! Deny-list of destructive or administrative relay commands.

use crate::constants::PROHIBITED_COMMANDS;
use crate::error::{RelayError, Result};

/// Rejects commands containing any denied substring, ignoring case.
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    denied: Vec<String>,
}

impl CommandPolicy {
    pub fn new<I, S>(denied: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            denied: denied.into_iter().map(Into::into).collect(),
        }
    }

    /// Check a command before any I/O happens.
    pub fn check(&self, command: &str) -> Result<()> {
        let lowered = command.to_lowercase();
        match self.denied.iter().find(|d| lowered.contains(&d.to_lowercase())) {
            Some(denied) => {
                tracing::warn!(command = %command, denied = %denied, "Prohibited command rejected");
                Err(RelayError::ProhibitedCommand {
                    command: command.to_string(),
                    denied: denied.clone(),
                })
            }
            None => Ok(()),
        }
    }
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self::new(PROHIBITED_COMMANDS.iter().copied())
    }
}
