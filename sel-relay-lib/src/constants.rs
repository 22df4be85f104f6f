// Wire-level constants for the SEL relay ASCII command dialect

use std::time::Duration;

/// Default Telnet port of the relay
pub const DEFAULT_PORT: u16 = 23;

/// Line terminator appended to every command
pub const LINE_TERMINATOR: &str = "\r\n";

/// End-of-text control byte marking the end of a data block
pub const ETX: char = '\x03';

/// Command prompt printed by the relay when it is ready for input
pub const PROMPT_MARKER: &str = "=>";

/// Prompt printed after `ACC`/`2AC` while a password is expected
pub const PASSWORD_PROMPT: &str = "Password:";

/// Reply fragment meaning the requested capture is not stored on the relay
pub const NO_DATA_AVAILABLE: &str = "no data available";

/// Column that anchors the header row of a `CHI` event table
pub const RECORD_NUMBER_COLUMN: &str = "REC_NUM";

/// Commands that end the session on the relay side
pub const TERMINATING_COMMANDS: &[&str] = &["exit", "qui", "quit"];

/// Polite logout sequence sent on close
pub const LOGOUT_COMMANDS: &[&str] = &["QUI", "EXIT"];

/// Command substrings that are never sent to a relay
pub const PROHIBITED_COMMANDS: &[&str] = &["SER C", "HIS C", "COM C", "2AC"];

/// Identity query
pub const IDENTITY_COMMAND: &str = "ID";

/// Event summary table query
pub const EVENT_TABLE_COMMAND: &str = "CHI";

/// Most event ids one selector may expand to; relays keep far fewer records
pub const MAX_SELECTED_IDS: u64 = 10_000;

/// Token a user types to abandon an interactive prompt
pub const CANCEL_TOKEN: &str = "exit";

/// Default read size per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default per-command response timeout
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Default waveform (`CEV`) response timeout
pub const DEFAULT_WAVEFORM_TIMEOUT: Duration = Duration::from_secs(60);
