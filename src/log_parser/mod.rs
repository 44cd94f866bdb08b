//! Parsers that rebuild structured records from the detector's text logs and
//! the simulator's XML collision output.
//!
//! Every grammar comes in two flavours: a strict `parse_*` that returns
//! `RiskResult`, and a tolerant `load_*` that logs and degrades to an empty
//! result so one bad file never stops an evaluation run.

pub mod collision_xml;
pub mod prediction_log;
pub mod warning_log;

pub use collision_xml::{load_collision_log, parse_collision_xml, GroundTruth, GroundTruthStatus};
pub use prediction_log::{load_prediction_log, parse_prediction_line, parse_prediction_log};
pub use warning_log::{load_warning_log, parse_warning_line, parse_warning_log};

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{RiskError, RiskResult};
use crate::event_log::TIMESTAMP_WIDTH;

/// Timestamp prefix of a log line, split the way the warning records carry it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogStamp {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub sequence_number: u32,
}

/// Split `YYYY-MM-DD HH:MM:SS,mmm:<message>` into its stamp and message.
pub fn split_timestamp(line: &str) -> RiskResult<(LogStamp, &str)> {
    let prefix = line
        .get(..TIMESTAMP_WIDTH)
        .ok_or_else(|| RiskError::malformed_line("line shorter than timestamp prefix"))?;

    let (seconds, millis) = prefix
        .split_once(',')
        .ok_or_else(|| RiskError::malformed_line("timestamp has no millisecond field"))?;

    let parsed = NaiveDateTime::parse_from_str(seconds, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| RiskError::malformed_line(format!("bad timestamp '{}': {}", seconds, e)))?;

    if millis.len() != 3 || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RiskError::malformed_line(format!(
            "bad millisecond field '{}'",
            millis
        )));
    }
    let sequence_number: u32 = millis
        .parse()
        .map_err(|_| RiskError::malformed_line(format!("bad millisecond field '{}'", millis)))?;

    let message = line[TIMESTAMP_WIDTH..]
        .strip_prefix(':')
        .ok_or_else(|| RiskError::malformed_line("missing ':' after timestamp"))?;

    Ok((
        LogStamp {
            date: parsed.date(),
            time: parsed.time(),
            sequence_number,
        },
        message.trim_end_matches(['\r', '\n']),
    ))
}

/// Apply a line parser to every line, skipping and logging the malformed ones.
///
/// `parse_line` returns `Ok(None)` for lines that belong to some other record
/// type; those are skipped silently.
pub(crate) fn parse_lines<T>(
    text: &str,
    mut parse_line: impl FnMut(&str) -> RiskResult<Option<T>>,
) -> Vec<T> {
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => log::warn!("Skipping line: {}", e.at_line(idx + 1)),
        }
    }
    records
}

/// Read a whole log file, logging and returning `None` on failure.
pub(crate) fn read_log(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::error!("File not found: {}", path.display());
            None
        }
        Err(e) => {
            log::error!("Error reading log file {}: {}", path.display(), e);
            None
        }
    }
}
