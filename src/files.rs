//! Directory-backed artifact storage and address validation.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Context;
use regex::Regex;
use sel_relay_lib::Result;
use sel_relay_lib::sink::{ArtifactSink, CANCEL_ARTIFACT};
use tracing::{debug, info};

static IPV4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[0-9]{1,3}\.){3}[0-9]{1,3}$").expect("static regex"));

pub fn is_valid_ipv4(ip: &str) -> bool {
    IPV4.is_match(ip) && ip.split('.').all(|octet| octet.parse::<u8>().is_ok())
}

/// Use `dir` (or the current directory) as the output directory, creating it
/// when missing.
pub fn prepare_dir(dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = dir.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create output directory {:?}", dir))?;
    info!(dir = ?dir, "Saving files to");
    Ok(dir)
}

/// Writes audit logs as `<name>.txt` and waveforms as `<name>.cev`.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self, name: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{name}.{extension}"))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        debug!(path = ?path, bytes = content.len(), "Writing file");
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

impl ArtifactSink for DirectorySink {
    fn write_audit(&mut self, name: &str, lines: &[String]) -> Result<()> {
        self.write(&self.path(name, "txt"), &lines.join("\n"))
    }

    fn append_audit(&mut self, name: &str, text: &str) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(self.path(name, "txt"))?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }

    fn write_waveform(&mut self, name: &str, content: &str) -> Result<()> {
        self.write(&self.path(name, "cev"), content)
    }

    fn write_cancellation(&mut self, lines: &[String]) -> Result<()> {
        self.write(&self.path(CANCEL_ARTIFACT, "txt"), &lines.join("\n"))
    }
}
