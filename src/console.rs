//! Stdin/stdout implementation of the workflow's prompts.
//!
//! Lines are read on a dedicated OS thread and handed over a channel, so a
//! pending prompt never holds up runtime shutdown.

use std::io::{self, BufRead, BufReader, Write};
use std::thread;

use async_trait::async_trait;
use sel_relay_lib::prompt::Prompter;
use sel_relay_lib::{RelayError, Result};
use tokio::sync::mpsc;

use crate::files::is_valid_ipv4;

pub struct ConsolePrompter {
    lines: mpsc::Receiver<io::Result<String>>,
}

impl ConsolePrompter {
    pub fn new() -> io::Result<Self> {
        Self::from_reader(BufReader::new(io::stdin()))
    }

    /// Prompt from any line source; the reader thread ends at EOF or once the
    /// prompter is dropped.
    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel(1);
        thread::Builder::new().name("console-input".into()).spawn(move || {
            for line in reader.lines() {
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        })?;
        Ok(Self { lines: rx })
    }
}

#[async_trait]
impl Prompter for ConsolePrompter {
    async fn ask(&mut self, question: &str) -> Result<String> {
        print!("{question}");
        io::stdout().flush()?;
        match self.lines.recv().await {
            Some(line) => Ok(line?),
            None => Err(RelayError::Cancelled("input closed".into())),
        }
    }

    fn show(&mut self, message: &str) {
        println!("{message}");
    }
}

/// Ask until a dotted-quad IPv4 address is entered.
pub async fn ask_ip(prompter: &mut dyn Prompter) -> Result<String> {
    loop {
        let ip = prompter.ask("Please enter SEL Relay IP to download waveform: ").await?;
        let ip = ip.trim();
        if is_valid_ipv4(ip) {
            return Ok(ip.to_string());
        }
        prompter.show("Invalid IP address format. Please enter a valid IP address.");
    }
}
