//! Artifact naming and the storage seam the workflow writes through.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;

/// Last line of a cancellation artifact.
pub const CANCEL_MARKER: &str = "!!!User cancel download.!!!";

/// Name of the artifact written when the user cancels.
pub const CANCEL_ARTIFACT: &str = "his+ser_cancel";

static ILLEGAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("static regex"));

/// Where the workflow stores what it downloaded.
///
/// Names carry no extension; the implementation decides on `.txt`/`.cev`.
pub trait ArtifactSink: Send {
    /// Create or replace the audit log.
    fn write_audit(&mut self, name: &str, lines: &[String]) -> Result<()>;

    /// Append text to an audit log written earlier.
    fn append_audit(&mut self, name: &str, text: &str) -> Result<()>;

    fn write_waveform(&mut self, name: &str, content: &str) -> Result<()>;

    fn write_cancellation(&mut self, lines: &[String]) -> Result<()>;
}

/// Strip characters that are not allowed in file names.
pub fn clean_filename(name: &str) -> String {
    ILLEGAL.replace_all(name, "").into_owned()
}

pub fn audit_name(device_id: Option<&str>, timestamp: &str) -> String {
    let name = match device_id {
        Some(device) => format!("his+ser_{device}_{timestamp}"),
        None => format!("his+ser_{timestamp}"),
    };
    clean_filename(&name)
}

pub fn waveform_name(device_id: Option<&str>, timestamp: &str, label: &str, command: &str) -> String {
    let name = match device_id {
        Some(device) => format!("{device}_{timestamp}_{label}_{command}"),
        None => format!("{command}_{label}_{timestamp}"),
    };
    clean_filename(&name)
}

pub fn failed_waveform_note(name: &str) -> String {
    format!("\nFailed to download waveform file: {name}.cev")
}
