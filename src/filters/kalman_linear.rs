//! Two-state (position, velocity) linear Kalman filter.
//!
//! ## Models
//! A = [[1, dt], [0, 1]]            constant-velocity transition
//! B = [0.5·dt², dt]ᵀ               control input against acceleration
//! H = [1, 0]                       position-only measurement
//! Q = q·I₂, R = r                  fixed noise from [`KalmanConfig`]
//!
//! The estimator supports predict-only and predict+update modes. By default it
//! rebuilds the prior from the latest sample every frame; `carry_state` keeps
//! the filtered estimate per vehicle instead.

use std::collections::{HashMap, HashSet};

use super::{Prediction, StateEstimator};
use crate::config::{EstimatorKind, KalmanConfig, KalmanMode};
use crate::error::{RiskError, RiskResult};
use crate::types::{
    ControlVec2, EstimatorState, KalmanGainPos, KinematicSample, MeasurementRow, StateMat2,
    StateVec2,
};

/// Matrix algebra for the 2-state filter. Holds only the noise terms.
#[derive(Clone, Debug)]
pub struct KalmanLinear {
    pub process_noise: f64,
    pub measurement_noise: f64,
}

impl KalmanLinear {
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            process_noise,
            measurement_noise,
        }
    }

    pub fn transition(dt: f64) -> StateMat2 {
        StateMat2::new(1.0, dt, 0.0, 1.0)
    }

    pub fn control(dt: f64) -> ControlVec2 {
        ControlVec2::new(0.5 * dt * dt, dt)
    }

    pub fn measurement_model() -> MeasurementRow {
        MeasurementRow::new(1.0, 0.0)
    }

    /// x' = A·x + B·a, P' = A·P·Aᵀ + Q
    pub fn predict(
        &self,
        state: &StateVec2,
        covariance: &StateMat2,
        dt: f64,
        acceleration: f64,
    ) -> (StateVec2, StateMat2) {
        let a = Self::transition(dt);
        let q = StateMat2::from_diagonal_element(self.process_noise);

        let predicted_state = a * state + Self::control(dt) * acceleration;
        let predicted_covariance = symmetrize(&(a * covariance * a.transpose() + q));
        (predicted_state, predicted_covariance)
    }

    /// Fuse a position measurement into a predicted state.
    ///
    /// Fails with `NumericDegenerate` when the innovation covariance cannot be
    /// inverted or the result is not finite.
    pub fn update(
        &self,
        state: &StateVec2,
        covariance: &StateMat2,
        measurement: f64,
    ) -> RiskResult<(StateVec2, StateMat2)> {
        let h = Self::measurement_model();

        let s = (h * covariance * h.transpose())[(0, 0)] + self.measurement_noise;
        if !s.is_finite() || s.abs() < f64::EPSILON {
            return Err(RiskError::NumericDegenerate(format!(
                "innovation covariance {} is not invertible",
                s
            )));
        }

        let gain: KalmanGainPos = covariance * h.transpose() / s;
        let innovation = measurement - (h * state)[(0, 0)];

        let updated_state = state + gain * innovation;
        let updated_covariance = symmetrize(&((StateMat2::identity() - gain * h) * covariance));

        if !updated_state.iter().all(|v| v.is_finite())
            || !updated_covariance.iter().all(|v| v.is_finite())
        {
            return Err(RiskError::NumericDegenerate(
                "update produced non-finite values".to_string(),
            ));
        }

        Ok((updated_state, updated_covariance))
    }
}

/// Force exact symmetry and a non-negative diagonal after rounding.
pub fn symmetrize(covariance: &StateMat2) -> StateMat2 {
    let mut sym = (covariance + covariance.transpose()) * 0.5;
    sym[(0, 0)] = sym[(0, 0)].max(0.0);
    sym[(1, 1)] = sym[(1, 1)].max(0.0);
    sym
}

/// [`StateEstimator`] adapter around [`KalmanLinear`].
pub struct KalmanEstimator {
    config: KalmanConfig,
    filter: KalmanLinear,
    tracks: HashMap<String, (StateVec2, StateMat2)>,
}

impl KalmanEstimator {
    pub fn new(config: KalmanConfig) -> Self {
        let filter = KalmanLinear::new(config.process_noise, config.measurement_noise);
        Self {
            config,
            filter,
            tracks: HashMap::new(),
        }
    }

    pub fn tracked_vehicles(&self) -> usize {
        self.tracks.len()
    }

    fn prior(&self, sample: &KinematicSample) -> (StateVec2, StateMat2) {
        if self.config.carry_state {
            if let Some(track) = self.tracks.get(&sample.vehicle_id) {
                return *track;
            }
        }
        (
            StateVec2::new(sample.position, sample.speed),
            StateMat2::from_diagonal_element(self.config.initial_covariance),
        )
    }
}

impl StateEstimator for KalmanEstimator {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Kalman
    }

    fn predict(&mut self, sample: &KinematicSample, horizon: f64) -> RiskResult<Prediction> {
        if !sample.is_finite() {
            return Err(RiskError::NonFiniteSample {
                vehicle_id: sample.vehicle_id.clone(),
            });
        }

        let (state, covariance) = self.prior(sample);
        let (predicted, predicted_cov) =
            self.filter
                .predict(&state, &covariance, horizon, self.config.acceleration);

        let (state, covariance) = match self.config.mode {
            KalmanMode::PredictOnly => (predicted, predicted_cov),
            KalmanMode::PredictUpdate => {
                match self.filter.update(&predicted, &predicted_cov, sample.position) {
                    Ok(updated) => updated,
                    Err(e) => {
                        log::warn!(
                            "Kalman update for {} skipped, using unfiltered prediction: {}",
                            sample.vehicle_id,
                            e
                        );
                        (predicted, predicted_cov)
                    }
                }
            }
        };

        if self.config.carry_state {
            self.tracks
                .insert(sample.vehicle_id.clone(), (state, covariance));
        }

        Ok(Prediction {
            predicted_position: state[0],
            state: EstimatorState {
                position: state[0],
                velocity: state[1],
                covariance: Some(covariance),
            },
        })
    }

    fn retain(&mut self, active: &HashSet<String>) {
        self.tracks.retain(|id, _| active.contains(id));
    }
}
