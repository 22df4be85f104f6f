//! Parsing of the `CHI` (compressed history) event table.
//!
//! The relay answers `CHI` with a comma-separated table whose header row
//! carries quoted column names, one of them `REC_NUM`:
//!
//! ```text
//! <STX>"REC_NUM","REF_NUM","MONTH","DAY","YEAR","HOUR","MIN","SEC","MSEC","EVENT",...,"0A3F"
//! 3,10003,3,14,2024,9,5,7,42,"BCG T",...,"0B21"
//! <ETX>
//! ```
//!
//! Time fields are kept as zero-padded strings so leading zeros survive into
//! display strings and file names.

use std::fmt::Write as _;

use crate::constants::{ETX, RECORD_NUMBER_COLUMN};
use crate::error::{RelayError, Result};
use crate::id_range::expand_id_ranges;

const REQUIRED_COLUMNS: [&str; 9] = [
    RECORD_NUMBER_COLUMN,
    "YEAR",
    "MONTH",
    "DAY",
    "HOUR",
    "MIN",
    "SEC",
    "MSEC",
    "EVENT",
];

/// One row of the event table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub record_number: String,
    pub year: String,
    pub month: String,
    pub day: String,
    pub hour: String,
    pub minute: String,
    pub second: String,
    pub millisecond: String,
    pub label: String,
}

impl EventRecord {
    /// `YYYY/MM/DD HH:MM:SS.mmm`
    pub fn display_time(&self) -> String {
        format!(
            "{}/{}/{} {}:{}:{}.{}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.millisecond
        )
    }

    /// `YYYY.MM.DD-HH.MM.SS.mmm`, safe for file names.
    pub fn file_timestamp(&self) -> String {
        format!(
            "{}.{}.{}-{}.{}.{}.{}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.millisecond
        )
    }

    /// `MM/DD/YYYY`, the date form accepted by history commands.
    pub fn date(&self) -> String {
        format!("{}/{}/{}", self.month, self.day, self.year)
    }

    fn from_fields(fields: &[&str], columns: &[usize; 9]) -> Option<Self> {
        let get = |i: usize| fields.get(columns[i]).map(|f| clean_field(f));
        Some(Self {
            record_number: get(0)?.to_string(),
            year: pad(get(1)?, 4),
            month: pad(get(2)?, 2),
            day: pad(get(3)?, 2),
            hour: pad(get(4)?, 2),
            minute: pad(get(5)?, 2),
            second: pad(get(6)?, 2),
            millisecond: pad(get(7)?, 3),
            label: get(8)?.to_string(),
        })
    }
}

/// An event chosen for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedEvent {
    pub record_number: String,
    /// `MM/DD/YYYY`
    pub date: String,
    /// `YYYY.MM.DD-HH.MM.SS.mmm`
    pub timestamp: String,
    pub label: String,
}

impl From<&EventRecord> for SelectedEvent {
    fn from(record: &EventRecord) -> Self {
        Self {
            record_number: record.record_number.clone(),
            date: record.date(),
            timestamp: record.file_timestamp(),
            label: record.label.clone(),
        }
    }
}

/// Ordered list of events that drive the downloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSelection {
    pub events: Vec<SelectedEvent>,
}

impl EventSelection {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectedEvent> {
        self.events.iter()
    }
}

/// Parsed event table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTable {
    records: Vec<EventRecord>,
}

impl EventTable {
    /// Parse a raw `CHI` response. A response without a recognizable header
    /// yields an empty table and an error log entry.
    pub fn parse(raw: &str) -> Self {
        tracing::debug!(raw = %raw, "CHI original data");
        let lines: Vec<&str> = raw.lines().collect();

        let Some(header_index) = lines.iter().position(|l| l.contains(RECORD_NUMBER_COLUMN)) else {
            tracing::error!("No valid CHI data found");
            return Self::default();
        };

        let headers: Vec<&str> = lines[header_index].split(',').map(clean_field).collect();
        let mut columns = [0usize; 9];
        for (slot, name) in columns.iter_mut().zip(REQUIRED_COLUMNS) {
            match headers.iter().position(|h| *h == name) {
                Some(i) => *slot = i,
                None => {
                    tracing::error!(column = name, "CHI header is missing a required column");
                    return Self::default();
                }
            }
        }

        let mut records = Vec::new();
        for line in &lines[header_index + 1..] {
            if line.contains(ETX) {
                break;
            }
            if is_filler(line) {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            match EventRecord::from_fields(&fields, &columns) {
                Some(record) => records.push(record),
                None => tracing::warn!(line = %line, "Skipping short CHI row"),
            }
        }

        tracing::debug!(count = records.len(), "CHI table parsed");
        Self { records }
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, record_number: &str) -> Option<&EventRecord> {
        self.records.iter().find(|r| r.record_number == record_number)
    }

    /// Select the given ids; ids absent from the table are skipped.
    pub fn select(&self, ids: &[String]) -> EventSelection {
        let events = ids
            .iter()
            .filter_map(|id| self.find(id))
            .inspect(|r| tracing::info!(record = %r.record_number, date = %r.date(), "Using provided event id"))
            .map(SelectedEvent::from)
            .collect();
        EventSelection { events }
    }

    /// Select every id of a range expression; all of them must exist.
    pub fn select_expression(&self, expression: &str) -> Result<EventSelection> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(RelayError::Validation(
                "Input cannot be empty. Please enter valid Id Numbers.".into(),
            ));
        }
        let ids = expand_id_ranges(expression);
        if ids.is_empty() {
            return Err(RelayError::Validation(format!(
                "'{expression}' is not a valid list of Id Numbers, e.g. '1,2,5-8,10'."
            )));
        }
        if let Some(missing) = ids.iter().find(|id| self.find(id).is_none()) {
            return Err(RelayError::Validation(format!(
                "Id Number {missing} is not in the list. Please enter valid Id Numbers."
            )));
        }
        Ok(self.select(&ids))
    }

    /// Three-column text rendering: record number, time, event label.
    pub fn render(&self) -> String {
        let rows: Vec<[String; 3]> = self
            .records
            .iter()
            .map(|r| [r.record_number.clone(), r.display_time(), r.label.clone()])
            .collect();
        let header = [RECORD_NUMBER_COLUMN.to_string(), "Formatted_Time".into(), "EVENT".into()];

        let mut widths = header.each_ref().map(|h| h.len());
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.len());
            }
        }

        let mut out = String::new();
        for row in std::iter::once(&header).chain(rows.iter()) {
            let _ = writeln!(
                out,
                "{:>w0$}  {:<w1$}  {}",
                row[0],
                row[1],
                row[2],
                w0 = widths[0],
                w1 = widths[1]
            );
        }
        out
    }
}

/// Parse a `CHI` response and select the caller-supplied ids that exist.
pub fn parse_table(raw: &str, ids: &[String]) -> EventSelection {
    EventTable::parse(raw).select(ids)
}

fn clean_field(field: &str) -> &str {
    field.trim_matches(|c: char| c.is_whitespace() || c.is_control() || c == '"')
}

fn is_filler(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.chars().all(|c| c == '=' || c == '>')
}

fn pad(value: &str, width: usize) -> String {
    format!("{value:0>width$}")
}
