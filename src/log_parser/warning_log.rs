use std::path::Path;

use super::{parse_lines, read_log, split_timestamp};
use crate::error::{RiskError, RiskResult};
use crate::types::{ParsedWarning, RiskKind};

const WARNING_MARKER: &str = "collision warning";

/// Parse one event-log line.
///
/// Returns `Ok(None)` for lines that are not collision warnings.
pub fn parse_warning_line(line: &str) -> RiskResult<Option<ParsedWarning>> {
    if !line.contains(WARNING_MARKER) {
        return Ok(None);
    }

    let (stamp, message) = split_timestamp(line)?;

    let (warning_info, vehicles) = message
        .split_once(':')
        .ok_or_else(|| RiskError::malformed_line("warning has no participant list"))?;
    let collision_type = warning_info.replace(WARNING_MARKER, "").trim().to_string();

    let tokens: Vec<&str> = vehicles.split_whitespace().collect();
    let kind = if tokens.contains(&RiskKind::RearEnd.connector()) {
        RiskKind::RearEnd
    } else if tokens.contains(&RiskKind::SideSwipe.connector()) {
        RiskKind::SideSwipe
    } else {
        return Err(RiskError::malformed_line(format!(
            "no 'leading' or 'and' in '{}'",
            vehicles.trim()
        )));
    };

    let participants: Vec<String> = tokens
        .split(|t| *t == kind.connector())
        .map(|group| group.concat())
        .collect();

    match participants.as_slice() {
        [victim, collider] if !victim.is_empty() && !collider.is_empty() => Ok(Some(ParsedWarning {
            date: stamp.date,
            time: stamp.time,
            sequence_number: stamp.sequence_number,
            victim_id: victim.clone(),
            collider_id: collider.clone(),
            collision_type,
            kind,
        })),
        [_, _] => Err(RiskError::malformed_line("empty participant identifier")),
        many => Err(RiskError::malformed_line(format!(
            "multi-vehicle warning with {} participants",
            many.len()
        ))),
    }
}

/// Parse all warnings in log order, skipping malformed lines.
pub fn parse_warning_log(text: &str) -> Vec<ParsedWarning> {
    parse_lines(text, parse_warning_line)
}

/// Read and parse a warning log; a missing or unreadable file yields no warnings.
pub fn load_warning_log(path: impl AsRef<Path>) -> Vec<ParsedWarning> {
    let path = path.as_ref();
    match read_log(path) {
        Some(text) => {
            let warnings = parse_warning_log(&text);
            log::info!("Parsed {} warnings from {}", warnings.len(), path.display());
            warnings
        }
        None => Vec::new(),
    }
}
