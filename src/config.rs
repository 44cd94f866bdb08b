// config.rs: Detector and estimator tuning
//
// Every threshold the detector and the Kalman estimator read lives here and is
// injected at construction. Defaults reproduce the values the detection scripts
// were run with.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{RiskError, RiskResult};

/// Which estimator produces the predicted positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EstimatorKind {
    ConstantVelocity,
    Kalman,
}

impl EstimatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            EstimatorKind::ConstantVelocity => "constant-velocity",
            EstimatorKind::Kalman => "kalman",
        }
    }
}

impl FromStr for EstimatorKind {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "constant-velocity" | "constant" | "cv" => Ok(EstimatorKind::ConstantVelocity),
            "kalman" | "kf" => Ok(EstimatorKind::Kalman),
            other => Err(RiskError::InvalidConfig(format!(
                "unknown estimator '{}'",
                other
            ))),
        }
    }
}

/// Kalman operating mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KalmanMode {
    /// Forecast from the prior alone, no measurement fusion
    PredictOnly,
    /// Forecast, then fuse the observed position
    PredictUpdate,
}

/// How the rear-end rule turns predictions into a gap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapModel {
    /// leader_pred - subject_pred
    Predicted,
    /// measured_gap - (leader_pred - subject_pred)
    MeasuredCorrected,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    pub process_noise: f64,      // diagonal of Q
    pub measurement_noise: f64,  // R
    pub initial_covariance: f64, // diagonal of P0
    pub acceleration: f64,       // control input, m/s²
    pub mode: KalmanMode,
    /// Carry the filtered estimate into the next frame instead of
    /// re-deriving it from the latest sample.
    pub carry_state: bool,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            process_noise: 1e-4,
            measurement_noise: 1e-2,
            initial_covariance: 1.0,
            acceleration: 0.0,
            mode: KalmanMode::PredictUpdate,
            carry_state: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    // ── Prediction ──
    pub horizon: f64, // seconds

    // ── Rear-end rule ──
    pub leader_lookahead: f64,
    pub rear_end_gap: f64,
    pub gap_model: GapModel,

    // ── Side-swipe rule ──
    pub side_swipe_threshold: f64,

    // ── Estimator ──
    pub kalman: KalmanConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            horizon: 1.0,
            leader_lookahead: 10.0,
            rear_end_gap: 5.0,
            gap_model: GapModel::Predicted,
            side_swipe_threshold: 3.0,
            kalman: KalmanConfig::default(),
        }
    }
}

impl DetectorConfig {
    /// Load a JSON config; fields left out keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> RiskResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| RiskError::io(path, e))?;
        let config: DetectorConfig = serde_json::from_str(&contents)
            .map_err(|e| RiskError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RiskResult<()> {
        if !(self.horizon.is_finite() && self.horizon > 0.0) {
            return Err(RiskError::InvalidConfig(format!(
                "horizon must be positive, got {}",
                self.horizon
            )));
        }

        let non_negative = [
            ("leader_lookahead", self.leader_lookahead),
            ("rear_end_gap", self.rear_end_gap),
            ("side_swipe_threshold", self.side_swipe_threshold),
            ("kalman.process_noise", self.kalman.process_noise),
            ("kalman.measurement_noise", self.kalman.measurement_noise),
            ("kalman.initial_covariance", self.kalman.initial_covariance),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(RiskError::InvalidConfig(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }

        if !self.kalman.acceleration.is_finite() {
            return Err(RiskError::InvalidConfig(
                "kalman.acceleration must be finite".to_string(),
            ));
        }

        Ok(())
    }
}
