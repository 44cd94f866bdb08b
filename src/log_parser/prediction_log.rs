use std::path::Path;

use super::{parse_lines, read_log, split_timestamp};
use crate::error::{RiskError, RiskResult};
use crate::types::PredictionRecord;

/// Parse one prediction-trace line.
///
/// Lines without a `vehicle_id:` field belong to other record types and yield `Ok(None)`.
pub fn parse_prediction_line(line: &str) -> RiskResult<Option<PredictionRecord>> {
    if !line.contains("vehicle_id:") {
        return Ok(None);
    }

    let (stamp, message) = split_timestamp(line)?;

    let mut vehicle_id = None;
    let mut cs_prediction = None;
    let mut kf_prediction = None;

    for pair in message.split(',') {
        let (key, value) = pair
            .split_once(':')
            .ok_or_else(|| RiskError::malformed_line(format!("field '{}' has no value", pair.trim())))?;
        let value = value.trim();
        match key.trim() {
            "vehicle_id" => vehicle_id = Some(value.to_string()),
            "cs_prediction" => cs_prediction = Some(parse_float("cs_prediction", value)?),
            "kf_prediction" => kf_prediction = Some(parse_float("kf_prediction", value)?),
            _ => {}
        }
    }

    match (vehicle_id, cs_prediction, kf_prediction) {
        (Some(vehicle_id), Some(cs_prediction), Some(kf_prediction)) if !vehicle_id.is_empty() => {
            Ok(Some(PredictionRecord {
                date: stamp.date,
                time: stamp.time,
                sequence_number: stamp.sequence_number,
                vehicle_id,
                cs_prediction,
                kf_prediction,
            }))
        }
        _ => Err(RiskError::malformed_line(
            "prediction line needs vehicle_id, cs_prediction and kf_prediction",
        )),
    }
}

fn parse_float(field: &str, value: &str) -> RiskResult<f64> {
    value
        .parse::<f64>()
        .map_err(|e| RiskError::malformed_line(format!("{} '{}': {}", field, value, e)))
}

pub fn parse_prediction_log(text: &str) -> Vec<PredictionRecord> {
    parse_lines(text, parse_prediction_line)
}

pub fn load_prediction_log(path: impl AsRef<Path>) -> Vec<PredictionRecord> {
    let path = path.as_ref();
    match read_log(path) {
        Some(text) => parse_prediction_log(&text),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::EventLog;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_prediction_line() {
        let r = parse_prediction_line(
            "2024-04-14 17:20:30,049:vehicle_id: veh0, cs_prediction: 105.5, kf_prediction: 100.25",
        )
        .unwrap()
        .unwrap();
        assert_eq!(r.vehicle_id, "veh0");
        assert_eq!(r.cs_prediction, 105.5);
        assert_eq!(r.kf_prediction, 100.25);
        assert_eq!(r.sequence_number, 49);
    }

    #[test]
    fn test_bad_float_is_malformed() {
        let err = parse_prediction_line(
            "2024-04-14 17:20:30,049:vehicle_id: veh0, cs_prediction: fast, kf_prediction: 1",
        )
        .unwrap_err();
        assert!(matches!(err, RiskError::MalformedLogLine { .. }));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        assert!(parse_prediction_line("2024-04-14 17:20:30,049:vehicle_id: veh0, cs_prediction: 1").is_err());
    }

    #[test]
    fn test_reads_back_what_event_log_writes() {
        let at = NaiveDate::from_ymd_opt(2024, 4, 14)
            .unwrap()
            .and_hms_milli_opt(9, 0, 0, 7)
            .unwrap();
        let mut log = EventLog::new(Vec::new());
        log.record_prediction_at("a", 1.0 / 3.0, -2.5, &at).unwrap();
        log.record_prediction_at("b", 0.0, 1e-7, &at).unwrap();
        let text = String::from_utf8(log.into_inner()).unwrap();

        let records = parse_prediction_log(&text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].cs_prediction, 1.0 / 3.0);
        assert_eq!(records[0].kf_prediction, -2.5);
        assert_eq!(records[1].kf_prediction, 1e-7);
        assert_eq!(records[1].sequence_number, 7);
    }
}
