//! State estimators that forecast a vehicle's longitudinal position.
//!
//! Both strategies sit behind [`StateEstimator`] so the detector can run
//! either one, and a comparison run can drive both over the same frames.

pub mod constant_velocity;
pub mod kalman_linear;

use std::collections::HashSet;

pub use constant_velocity::ConstantVelocity;
pub use kalman_linear::{KalmanEstimator, KalmanLinear};

use crate::config::{EstimatorKind, KalmanConfig};
use crate::error::RiskResult;
use crate::types::{EstimatorState, KinematicSample};

/// Forecast produced for one vehicle.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub predicted_position: f64,
    pub state: EstimatorState,
}

pub trait StateEstimator {
    fn kind(&self) -> EstimatorKind;

    /// Forecast `sample` forward by `horizon` seconds.
    ///
    /// Errors mean the position is unknown for this frame; callers skip the
    /// vehicle rather than abort the frame.
    fn predict(&mut self, sample: &KinematicSample, horizon: f64) -> RiskResult<Prediction>;

    /// Drop any per-vehicle state for vehicles no longer in the frame.
    fn retain(&mut self, _active: &HashSet<String>) {}
}

pub fn build_estimator(kind: EstimatorKind, kalman: &KalmanConfig) -> Box<dyn StateEstimator> {
    match kind {
        EstimatorKind::ConstantVelocity => Box::new(ConstantVelocity),
        EstimatorKind::Kalman => Box::new(KalmanEstimator::new(kalman.clone())),
    }
}
