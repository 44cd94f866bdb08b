// monitor.rs: Frame loop tying telemetry, estimators, detector and logs together
//
// One `RiskMonitor` drives any number of estimator strategies over the same
// frames. Each strategy owns its estimator and event log, so a comparison run
// produces one warning log per strategy from a single pass over the trace.

use std::collections::HashSet;
use std::io::Write;

use chrono::{Datelike, NaiveDateTime, TimeDelta};
use serde::Serialize;

use crate::config::{DetectorConfig, KalmanConfig};
use crate::detector::{FrameAnalysis, RiskDetector};
use crate::error::RiskResult;
use crate::event_log::EventLog;
use crate::filters::{ConstantVelocity, KalmanEstimator, StateEstimator};
use crate::highlight::{apply_highlights, NoopHighlighter, VehicleHighlighter};
use crate::telemetry::{RecordedTrace, TelemetrySource};

// ─── Strategy runs ───────────────────────────────────────────────────────────

/// One estimator strategy with its own warning log.
pub struct StrategyRun<W: Write> {
    name: String,
    estimator: Box<dyn StateEstimator>,
    log: EventLog<W>,
    events: usize,
    write_failures: usize,
}

impl<W: Write> StrategyRun<W> {
    pub fn new(estimator: Box<dyn StateEstimator>, log: EventLog<W>) -> Self {
        Self {
            name: estimator.kind().name().to_string(),
            estimator,
            log,
            events: 0,
            write_failures: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> usize {
        self.events
    }

    pub fn into_log(self) -> EventLog<W> {
        self.log
    }
}

/// Side-by-side predictions of both estimators, logged per vehicle per frame.
pub struct PredictionTrace<W: Write> {
    constant: ConstantVelocity,
    kalman: KalmanEstimator,
    log: EventLog<W>,
}

impl<W: Write> PredictionTrace<W> {
    pub fn new(kalman: KalmanConfig, log: EventLog<W>) -> Self {
        Self {
            constant: ConstantVelocity,
            kalman: KalmanEstimator::new(kalman),
            log,
        }
    }

    pub fn lines_written(&self) -> u64 {
        self.log.lines_written()
    }

    pub fn into_log(self) -> EventLog<W> {
        self.log
    }

    fn record_frame(
        &mut self,
        source: &dyn TelemetrySource,
        frame: u64,
        horizon: f64,
        at: &NaiveDateTime,
    ) {
        let mut active = HashSet::new();
        for vehicle_id in source.vehicle_ids() {
            let sample = match source.sample(&vehicle_id, frame) {
                Ok(sample) => sample,
                Err(e) => {
                    log::warn!("Error processing vehicle {}: {}", vehicle_id, e);
                    continue;
                }
            };

            let cs = self.constant.predict(&sample, horizon);
            let kf = self.kalman.predict(&sample, horizon);
            match (cs, kf) {
                (Ok(cs), Ok(kf)) => {
                    if let Err(e) = self.log.record_prediction_at(
                        &vehicle_id,
                        cs.predicted_position,
                        kf.predicted_position,
                        at,
                    ) {
                        log::error!("Failed to write prediction for {}: {}", vehicle_id, e);
                    }
                }
                (Err(e), _) | (_, Err(e)) => {
                    log::warn!("No prediction for {}: {}", vehicle_id, e);
                }
            }
            active.insert(vehicle_id);
        }
        self.kalman.retain(&active);
    }
}

/// `start` shifted by `time` seconds, if the result fits the log's four-digit-year stamp.
fn frame_stamp(start: NaiveDateTime, time: f64) -> Option<NaiveDateTime> {
    if !(time.is_finite() && time >= 0.0) {
        return None;
    }
    let millis = (time * 1000.0).round();
    if millis >= i64::MAX as f64 {
        return None;
    }
    let at = start.checked_add_signed(TimeDelta::try_milliseconds(millis as i64)?)?;
    (at.year() <= 9999).then_some(at)
}

// ─── Monitor ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StrategySummary {
    pub strategy: String,
    pub events: usize,
    pub write_failures: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MonitorSummary {
    pub frames: u64,
    pub skipped_vehicles: usize,
    pub strategies: Vec<StrategySummary>,
    pub prediction_lines: u64,
}

pub struct RiskMonitor<W: Write> {
    detector: RiskDetector,
    runs: Vec<StrategyRun<W>>,
    prediction_trace: Option<PredictionTrace<W>>,
    highlighter: Box<dyn VehicleHighlighter>,
    frames: u64,
    skipped_vehicles: usize,
}

impl<W: Write> RiskMonitor<W> {
    pub fn new(config: DetectorConfig) -> RiskResult<Self> {
        Ok(Self {
            detector: RiskDetector::new(config)?,
            runs: Vec::new(),
            prediction_trace: None,
            highlighter: Box::new(NoopHighlighter),
            frames: 0,
            skipped_vehicles: 0,
        })
    }

    pub fn with_strategy(mut self, run: StrategyRun<W>) -> Self {
        self.runs.push(run);
        self
    }

    pub fn with_prediction_trace(mut self, trace: PredictionTrace<W>) -> Self {
        self.prediction_trace = Some(trace);
        self
    }

    pub fn with_highlighter(mut self, highlighter: Box<dyn VehicleHighlighter>) -> Self {
        self.highlighter = highlighter;
        self
    }

    /// Process one frame with every strategy, stamping log lines with `at`.
    pub fn step_at(&mut self, source: &dyn TelemetrySource, at: &NaiveDateTime) -> Vec<FrameAnalysis> {
        let frame = self.frames;
        self.frames += 1;

        let mut analyses = Vec::with_capacity(self.runs.len());
        for run in &mut self.runs {
            let analysis = self.detector.process_frame(source, run.estimator.as_mut(), frame);
            self.skipped_vehicles += analysis.skipped.len();

            for event in &analysis.events {
                log::info!("[{}] {}", run.name, event.message());
                match run.log.record_at(event, at) {
                    Ok(()) => run.events += 1,
                    Err(e) => {
                        run.write_failures += 1;
                        log::error!("Failed to write warning to {} log: {}", run.name, e);
                    }
                }
            }
            apply_highlights(self.highlighter.as_mut(), &analysis.events);
            analyses.push(analysis);
        }

        if let Some(trace) = self.prediction_trace.as_mut() {
            trace.record_frame(source, frame, self.detector.config().horizon, at);
        }

        analyses
    }

    /// Replay every frame of `trace`, stamping each at `start` plus the frame's simulation time.
    pub fn replay(&mut self, trace: &RecordedTrace, start: NaiveDateTime) -> MonitorSummary {
        for frame in &trace.frames {
            let at = match frame_stamp(start, frame.time) {
                Some(at) => at,
                None => {
                    log::warn!("Frame with invalid time {}; stamping at trace start", frame.time);
                    start
                }
            };
            self.step_at(frame, &at);
        }
        self.flush();
        self.summary()
    }

    pub fn summary(&self) -> MonitorSummary {
        MonitorSummary {
            frames: self.frames,
            skipped_vehicles: self.skipped_vehicles,
            strategies: self
                .runs
                .iter()
                .map(|r| StrategySummary {
                    strategy: r.name.clone(),
                    events: r.events,
                    write_failures: r.write_failures,
                })
                .collect(),
            prediction_lines: self
                .prediction_trace
                .as_ref()
                .map(|t| t.lines_written())
                .unwrap_or(0),
        }
    }

    /// Flush all logs; failures are logged, not returned.
    pub fn flush(&mut self) {
        for run in &mut self.runs {
            if let Err(e) = run.log.flush() {
                log::error!("Failed to flush {} log: {}", run.name, e);
            }
        }
        if let Some(trace) = self.prediction_trace.as_mut() {
            if let Err(e) = trace.log.flush() {
                log::error!("Failed to flush prediction trace: {}", e);
            }
        }
    }

    pub fn into_parts(self) -> (Vec<StrategyRun<W>>, Option<PredictionTrace<W>>) {
        (self.runs, self.prediction_trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EstimatorKind;
    use crate::error::RiskError;
    use crate::evaluation::{evaluate, prediction_divergence};
    use crate::filters::build_estimator;
    use crate::highlight::Rgba;
    use crate::log_parser::{parse_collision_xml, parse_prediction_log, parse_warning_log};
    use crate::telemetry::{RecordedFrame, RecordedVehicle};
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 14)
            .unwrap()
            .and_hms_milli_opt(17, 20, 30, 0)
            .unwrap()
    }

    fn run(kind: EstimatorKind) -> StrategyRun<Vec<u8>> {
        StrategyRun::new(
            build_estimator(kind, &KalmanConfig::default()),
            EventLog::new(Vec::new()),
        )
    }

    fn monitor() -> RiskMonitor<Vec<u8>> {
        RiskMonitor::new(DetectorConfig::default())
            .unwrap()
            .with_strategy(run(EstimatorKind::Kalman))
            .with_strategy(run(EstimatorKind::ConstantVelocity))
    }

    // Two cars closing on one lane, far from a third that never interacts.
    fn trace() -> RecordedTrace {
        let frame = |time: f64, follower_x: f64, leader_x: f64| RecordedFrame {
            time,
            vehicles: vec![
                RecordedVehicle::new("right_7", follower_x, 10.0)
                    .with_leader("left_3", leader_x - follower_x),
                RecordedVehicle::new("left_3", leader_x, 10.0),
                RecordedVehicle::new("bystander", 500.0, 10.0),
            ],
        };
        RecordedTrace {
            frames: vec![frame(0.0, 0.0, 30.0), frame(0.1, 1.0, 4.0)],
        }
    }

    fn text(run: StrategyRun<Vec<u8>>) -> String {
        String::from_utf8(run.into_log().into_inner()).unwrap()
    }

    #[test]
    fn test_replay_then_evaluate() {
        let mut monitor = monitor();
        let summary = monitor.replay(&trace(), start());
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.skipped_vehicles, 0);

        let ground_truth = parse_collision_xml(
            r#"<collisions>
                <collision time="0.4" type="collision" lane="E0_0" pos="12.0"
                    collider="right_7" victim="left_3" colliderType="car" victimType="car"
                    colliderSpeed="10" victimSpeed="10"/>
                <collision time="9.0" type="collision" lane="E0_1" pos="80.0"
                    collider="x" victim="y" colliderType="car" victimType="car"
                    colliderSpeed="3" victimSpeed="0"/>
            </collisions>"#,
        )
        .unwrap();

        let (runs, _) = monitor.into_parts();
        for run in runs {
            let name = run.name().to_string();
            let warnings = parse_warning_log(&text(run));
            assert_eq!(warnings.len(), 1, "{}", name);
            assert_eq!(warnings[0].victim_id, "left_3");
            assert_eq!(warnings[0].collider_id, "right_7");
            assert_eq!(warnings[0].sequence_number, 100);

            let report = evaluate(&name, &ground_truth, &warnings);
            assert_eq!(report.detected, 1);
            assert_eq!(report.total_collisions, 2);
            assert_eq!(report.precision, 0.5);
        }
    }

    #[test]
    fn test_strategy_names_and_counts() {
        let mut monitor = monitor();
        let summary = monitor.replay(&trace(), start());
        let names: Vec<&str> = summary.strategies.iter().map(|s| s.strategy.as_str()).collect();
        assert_eq!(names, vec!["kalman", "constant-velocity"]);
        assert!(summary.strategies.iter().all(|s| s.events == 1));
    }

    #[test]
    fn test_prediction_trace_is_parseable() {
        let mut monitor = RiskMonitor::new(DetectorConfig::default())
            .unwrap()
            .with_prediction_trace(PredictionTrace::new(
                KalmanConfig::default(),
                EventLog::new(Vec::new()),
            ));
        let summary = monitor.replay(&trace(), start());
        assert_eq!(summary.prediction_lines, 6);

        let (_, trace) = monitor.into_parts();
        let text = String::from_utf8(trace.unwrap().into_log().into_inner()).unwrap();
        let records = parse_prediction_log(&text);
        assert_eq!(records.len(), 6);
        assert_eq!(records[0].vehicle_id, "right_7");
        assert_eq!(records[0].cs_prediction, 10.0);

        let divergence = prediction_divergence(&records);
        assert_eq!(divergence.vehicles, 3);
        assert!(divergence.max_abs_diff.is_finite());
    }

    #[test]
    fn test_departed_vehicle_is_counted_and_skipped() {
        let mut gone = RecordedVehicle::new("gone", 0.0, 1.0);
        gone.missing = true;
        let frame = RecordedFrame {
            time: 0.0,
            vehicles: vec![gone, RecordedVehicle::new("a", 100.0, 1.0)],
        };
        let mut monitor = monitor();
        let analyses = monitor.step_at(&frame, &start());
        assert_eq!(analyses.len(), 2);
        assert_eq!(monitor.summary().skipped_vehicles, 2);
    }

    struct Recording(Rc<RefCell<Vec<(String, Rgba)>>>);

    impl VehicleHighlighter for Recording {
        fn highlight(&mut self, vehicle_id: &str, color: Rgba) -> RiskResult<()> {
            if vehicle_id == "left_3" {
                return Err(RiskError::telemetry(vehicle_id, "removed"));
            }
            self.0.borrow_mut().push((vehicle_id.to_string(), color));
            Ok(())
        }
    }

    #[test]
    fn test_highlight_failure_does_not_block_logging() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut monitor = RiskMonitor::new(DetectorConfig::default())
            .unwrap()
            .with_strategy(run(EstimatorKind::ConstantVelocity))
            .with_highlighter(Box::new(Recording(seen.clone())));
        let summary = monitor.replay(&trace(), start());

        assert_eq!(summary.strategies[0].events, 1);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].0, "right_7");
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_counted() {
        let mut monitor = RiskMonitor::new(DetectorConfig::default())
            .unwrap()
            .with_strategy(StrategyRun::new(
                Box::new(ConstantVelocity),
                EventLog::new(BrokenWriter),
            ));
        let summary = monitor.replay(&trace(), start());
        assert_eq!(summary.strategies[0].events, 0);
        assert_eq!(summary.strategies[0].write_failures, 1);
    }

    #[test]
    fn test_frame_stamp_bounds() {
        assert_eq!(
            frame_stamp(start(), 1.5),
            Some(start() + TimeDelta::milliseconds(1500))
        );
        assert_eq!(frame_stamp(start(), -1.0), None);
        assert_eq!(frame_stamp(start(), f64::NAN), None);
        assert_eq!(frame_stamp(start(), 3e11), None);
        assert_eq!(frame_stamp(start(), 1e13), None);
        assert_eq!(frame_stamp(start(), 1e300), None);
    }

    #[test]
    fn test_out_of_range_frame_time_stamps_at_start() {
        let close_pair = |time: f64| RecordedFrame {
            time,
            vehicles: vec![
                RecordedVehicle::new("a", 0.0, 7.0),
                RecordedVehicle::new("b", 2.0, 7.0),
            ],
        };
        let trace = RecordedTrace {
            frames: vec![close_pair(1e13), close_pair(3e11)],
        };

        let mut monitor = RiskMonitor::new(DetectorConfig::default())
            .unwrap()
            .with_strategy(run(EstimatorKind::ConstantVelocity));
        let summary = monitor.replay(&trace, start());
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.strategies[0].events, 2);

        let (runs, _) = monitor.into_parts();
        let text = runs.into_iter().map(text).collect::<String>();
        assert!(text.lines().all(|l| l.starts_with("2024-04-14 17:20:30,000:")));

        let warnings = parse_warning_log(&text);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].victim_id, "a");
        assert_eq!(warnings[0].collider_id, "b");
    }
}
