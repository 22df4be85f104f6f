//! Event-id selector expansion: `"1,2,5-8,10"` → `["1","2","5","6","7","8","10"]`.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::constants::MAX_SELECTED_IDS;

static ALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\d,\- ]*$").expect("static regex"));
static RANGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)-(\d+)$").expect("static regex"));

/// Expand a comma-separated list of ids and `start-end` ranges into sorted,
/// de-duplicated decimal strings.
///
/// Input containing anything other than digits, commas, hyphens and spaces
/// yields an empty list. Reversed ranges are expanded ascending. Tokens that
/// are neither a number nor a range are ignored. A selector that would
/// expand to more than [`MAX_SELECTED_IDS`] ids yields an empty list.
pub fn expand_id_ranges(selector: &str) -> Vec<String> {
    if !ALLOWED.is_match(selector) {
        return Vec::new();
    }

    let mut ids = BTreeSet::new();
    for token in selector.split(',').map(str::trim) {
        if let Some(caps) = RANGE.captures(token) {
            let (Ok(start), Ok(end)) = (caps[1].parse::<u64>(), caps[2].parse::<u64>()) else {
                continue;
            };
            let (low, high) = (start.min(end), start.max(end));
            if high - low >= MAX_SELECTED_IDS {
                tracing::warn!(token = %token, "Id range too wide");
                return Vec::new();
            }
            ids.extend(low..=high);
        } else if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = token.parse::<u64>() {
                ids.insert(id);
            }
        }
        if ids.len() as u64 > MAX_SELECTED_IDS {
            tracing::warn!(count = ids.len(), "Selector expands to too many ids");
            return Vec::new();
        }
    }

    ids.into_iter().map(|id| id.to_string()).collect()
}
