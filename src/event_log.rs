//! Append-only textual event log.
//!
//! Line format: `YYYY-MM-DD HH:MM:SS,mmm:<message>`. Warning messages follow
//! `<Type> collision warning: <id> <leading|and> <id>`; prediction-trace
//! messages follow `vehicle_id: <id>, cs_prediction: <f>, kf_prediction: <f>`.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveDateTime;

use crate::error::{RiskError, RiskResult};
use crate::types::RiskEvent;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";
/// Width of the formatted timestamp prefix.
pub const TIMESTAMP_WIDTH: usize = 23;

pub fn format_line(at: &NaiveDateTime, message: &str) -> String {
    format!("{}:{}", at.format(TIMESTAMP_FORMAT), message)
}

pub fn prediction_message(vehicle_id: &str, cs_prediction: f64, kf_prediction: f64) -> String {
    format!(
        "vehicle_id: {}, cs_prediction: {}, kf_prediction: {}",
        vehicle_id, cs_prediction, kf_prediction
    )
}

pub struct EventLog<W: Write> {
    writer: W,
    lines_written: u64,
}

impl EventLog<BufWriter<File>> {
    /// Open `path` for appending, creating it if needed.
    pub fn append_to(path: impl AsRef<Path>) -> RiskResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| RiskError::io(path, e))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> EventLog<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            lines_written: 0,
        }
    }

    pub fn record_at(&mut self, event: &RiskEvent, at: &NaiveDateTime) -> std::io::Result<()> {
        self.write_line(at, &event.message())
    }

    pub fn record_prediction_at(
        &mut self,
        vehicle_id: &str,
        cs_prediction: f64,
        kf_prediction: f64,
        at: &NaiveDateTime,
    ) -> std::io::Result<()> {
        self.write_line(at, &prediction_message(vehicle_id, cs_prediction, kf_prediction))
    }

    fn write_line(&mut self, at: &NaiveDateTime, message: &str) -> std::io::Result<()> {
        writeln!(self.writer, "{}", format_line(at, message))?;
        self.lines_written += 1;
        Ok(())
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 14)
            .unwrap()
            .and_hms_milli_opt(17, 20, 30, 49)
            .unwrap()
    }

    #[test]
    fn test_timestamp_prefix_width() {
        let line = format_line(&at(), "x");
        assert_eq!(&line[..TIMESTAMP_WIDTH], "2024-04-14 17:20:30,049");
        assert_eq!(&line[TIMESTAMP_WIDTH..], ":x");
    }

    #[test]
    fn test_record_events_in_order() {
        let mut log = EventLog::new(Vec::new());
        log.record_at(&RiskEvent::rear_end("right_7", "left_3", 0), &at())
            .unwrap();
        log.record_at(&RiskEvent::side_swipe("a", "b", 0), &at())
            .unwrap();
        assert_eq!(log.lines_written(), 2);

        let text = String::from_utf8(log.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "2024-04-14 17:20:30,049:Rear-end collision warning: left_3 leading right_7",
                "2024-04-14 17:20:30,049:Side-swipe collision warning: a and b",
            ]
        );
    }

    #[test]
    fn test_prediction_line() {
        let mut log = EventLog::new(Vec::new());
        log.record_prediction_at("veh0", 12.5, 12.25, &at()).unwrap();
        let text = String::from_utf8(log.into_inner()).unwrap();
        assert_eq!(
            text,
            "2024-04-14 17:20:30,049:vehicle_id: veh0, cs_prediction: 12.5, kf_prediction: 12.25\n"
        );
    }

    #[test]
    fn test_append_to_file() {
        let path = std::env::temp_dir().join(format!("event_log_{}.log", std::process::id()));
        std::fs::remove_file(&path).ok();
        for _ in 0..2 {
            let mut log = EventLog::append_to(&path).unwrap();
            log.record_at(&RiskEvent::side_swipe("a", "b", 0), &at()).unwrap();
            log.flush().unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(text.lines().count(), 2);
    }
}
