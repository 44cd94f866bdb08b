use std::collections::{HashMap, HashSet};

use crate::config::{DetectorConfig, GapModel};
use crate::error::RiskResult;
use crate::filters::{Prediction, StateEstimator};
use crate::telemetry::TelemetrySource;
use crate::types::{KinematicSample, RiskEvent};

/// A vehicle that made it through sampling and prediction this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedVehicle {
    pub sample: KinematicSample,
    pub prediction: Prediction,
}

/// Everything the detector produced for one frame.
#[derive(Clone, Debug, Default)]
pub struct FrameAnalysis {
    pub frame: u64,
    pub events: Vec<RiskEvent>,
    pub tracked: Vec<TrackedVehicle>,
    /// Vehicles dropped from this frame because telemetry or prediction failed
    pub skipped: Vec<String>,
}

/// Threshold-based rear-end and side-swipe detector.
pub struct RiskDetector {
    config: DetectorConfig,
}

impl RiskDetector {
    pub fn new(config: DetectorConfig) -> RiskResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Gap the rear-end rule compares against `rear_end_gap`.
    pub fn predicted_gap(&self, subject_pred: f64, leader_pred: f64, measured_gap: f64) -> f64 {
        let closing = leader_pred - subject_pred;
        match self.config.gap_model {
            GapModel::Predicted => closing,
            GapModel::MeasuredCorrected => measured_gap - closing,
        }
    }

    pub fn is_rear_end(&self, predicted_gap: f64) -> bool {
        predicted_gap < self.config.rear_end_gap
    }

    /// Both the forecast and the current separation must be inside the threshold.
    pub fn is_side_swipe(&self, predicted_distance: f64, current_distance: f64) -> bool {
        predicted_distance < self.config.side_swipe_threshold
            && current_distance < self.config.side_swipe_threshold
    }

    /// Run both rules over one snapshot of the simulation.
    ///
    /// Per-vehicle failures are logged and the vehicle is skipped; the rest of
    /// the frame is still evaluated.
    pub fn process_frame(
        &self,
        source: &dyn TelemetrySource,
        estimator: &mut dyn StateEstimator,
        frame: u64,
    ) -> FrameAnalysis {
        let mut analysis = FrameAnalysis {
            frame,
            ..FrameAnalysis::default()
        };

        for vehicle_id in source.vehicle_ids() {
            match self.track(source, estimator, &vehicle_id, frame) {
                Ok(tracked) => analysis.tracked.push(tracked),
                Err(e) => {
                    log::warn!("Error processing vehicle {}: {}", vehicle_id, e);
                    analysis.skipped.push(vehicle_id);
                }
            }
        }

        let active: HashSet<String> = analysis
            .tracked
            .iter()
            .map(|t| t.sample.vehicle_id.clone())
            .collect();
        estimator.retain(&active);

        let index: HashMap<&str, usize> = analysis
            .tracked
            .iter()
            .enumerate()
            .map(|(i, t)| (t.sample.vehicle_id.as_str(), i))
            .collect();

        let mut events = Vec::new();
        for (i, subject) in analysis.tracked.iter().enumerate() {
            let rear_end =
                self.check_rear_end(source, estimator, subject, &index, &analysis.tracked, frame);
            if let Some(event) = rear_end {
                events.push(event);
            }

            for other in &analysis.tracked[i + 1..] {
                let predicted = (subject.prediction.predicted_position
                    - other.prediction.predicted_position)
                    .abs();
                let current = (subject.sample.position - other.sample.position).abs();
                if self.is_side_swipe(predicted, current) {
                    events.push(RiskEvent::side_swipe(
                        &subject.sample.vehicle_id,
                        &other.sample.vehicle_id,
                        frame,
                    ));
                }
            }
        }

        analysis.events = events;
        analysis
    }

    fn track(
        &self,
        source: &dyn TelemetrySource,
        estimator: &mut dyn StateEstimator,
        vehicle_id: &str,
        frame: u64,
    ) -> RiskResult<TrackedVehicle> {
        let sample = source.sample(vehicle_id, frame)?;
        let prediction = estimator.predict(&sample, self.config.horizon)?;
        Ok(TrackedVehicle { sample, prediction })
    }

    fn check_rear_end(
        &self,
        source: &dyn TelemetrySource,
        estimator: &mut dyn StateEstimator,
        subject: &TrackedVehicle,
        index: &HashMap<&str, usize>,
        tracked: &[TrackedVehicle],
        frame: u64,
    ) -> Option<RiskEvent> {
        let subject_id = subject.sample.vehicle_id.as_str();

        let (leader_id, measured_gap) = match source.leader(subject_id, self.config.leader_lookahead) {
            Ok(Some(leader)) => leader,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Leader query failed for vehicle {}: {}", subject_id, e);
                return None;
            }
        };
        if measured_gap > self.config.leader_lookahead {
            return None;
        }

        let leader_pred = match index.get(leader_id.as_str()) {
            Some(&i) => tracked[i].prediction.predicted_position,
            // Leader outside this frame's vehicle list; query it directly.
            None => match self.track(source, estimator, &leader_id, frame) {
                Ok(t) => t.prediction.predicted_position,
                Err(e) => {
                    log::warn!("Error processing leader {} of {}: {}", leader_id, subject_id, e);
                    return None;
                }
            },
        };

        let gap = self.predicted_gap(subject.prediction.predicted_position, leader_pred, measured_gap);
        if self.is_rear_end(gap) {
            log::debug!(
                "Rear-end risk frame={} follower={} leader={} predicted_gap={:.2}",
                frame,
                subject_id,
                leader_id,
                gap
            );
            Some(RiskEvent::rear_end(subject_id, &leader_id, frame))
        } else {
            None
        }
    }
}
