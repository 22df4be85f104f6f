use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use sel_relay_lib::DownloadRequest;
use sel_relay_lib::constants::DEFAULT_PORT;

/// Download event waveforms and history logs from an SEL protective relay.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Relay IPv4 address. Asked for interactively when missing or invalid.
    #[arg(short, long)]
    pub ip: Option<String>,
    /// Relay Telnet port.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Directory to save the waveform and history files in.
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
    /// Event length (cycles) to download.
    #[arg(short, long)]
    pub cycles: Option<String>,
    /// Samples per cycle to download: 4 or all.
    #[arg(short, long)]
    pub samples: Option<String>,
    /// Event ids to download, e.g. '1,2,5-8,10'.
    #[arg(short, long)]
    pub event_id: Option<String>,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,
    /// Do not draw the progress spinner while waiting for the relay.
    #[arg(long)]
    pub no_progress: bool,
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Cli {
    pub fn request(&self) -> DownloadRequest {
        DownloadRequest {
            event_ids: self.event_id.clone(),
            samples: self.samples.clone(),
            cycles: self.cycles.clone(),
        }
    }
}
