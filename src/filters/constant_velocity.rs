use super::{Prediction, StateEstimator};
use crate::config::EstimatorKind;
use crate::error::{RiskError, RiskResult};
use crate::types::{EstimatorState, KinematicSample};

/// Simple state update representing `x_new = x + v * dt`.
pub fn predict_position(position: f64, speed: f64, dt: f64) -> f64 {
    position + speed * dt
}

/// Constant-velocity extrapolation. Holds no state between calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConstantVelocity;

impl StateEstimator for ConstantVelocity {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::ConstantVelocity
    }

    fn predict(&mut self, sample: &KinematicSample, horizon: f64) -> RiskResult<Prediction> {
        if !sample.is_finite() {
            return Err(RiskError::NonFiniteSample {
                vehicle_id: sample.vehicle_id.clone(),
            });
        }

        let predicted_position = predict_position(sample.position, sample.speed, horizon);
        Ok(Prediction {
            predicted_position,
            state: EstimatorState {
                position: predicted_position,
                velocity: sample.speed,
                covariance: None,
            },
        })
    }
}
