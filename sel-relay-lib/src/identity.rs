//! Parsing of the relay's `ID` response.
//!
//! A typical reply:
//!
//! ```text
//! "FID=SEL-351-5-R507-V0-Z103100-D20110209","08F6"
//! "BFID=SLBT-3CF1-R102-V0-Z100100-D20091207","0970"
//! "CID=7F5B","0252"
//! "DEVID=FEEDER 12","041B"
//! ```

/// Fields extracted from an `ID` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityReport {
    pub firmware_id: Option<String>,
    pub device_id: Option<String>,
}

impl IdentityReport {
    pub fn parse(response: &str) -> Self {
        Self {
            firmware_id: field_value(response, "FID"),
            device_id: field_value(response, "DEVID"),
        }
    }
}

/// Value of the first `KEY=value` line whose key matches exactly, with the
/// trailing checksum column and quotes removed.
pub fn field_value(response: &str, key: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let (name, rest) = line.split_once('=')?;
        if name.trim().trim_matches('"') != key {
            return None;
        }
        let value = rest.split(',').next().unwrap_or_default();
        Some(value.trim().trim_matches('"').to_string())
    })
}
