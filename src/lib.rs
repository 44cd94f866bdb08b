//! Predictive collision-risk detection for simulated traffic, plus offline
//! scoring of the emitted warnings against the simulator's collision record.
//!
//! Online: [`telemetry`] → [`filters`] → [`detector`] → [`event_log`], driven by [`monitor`].
//! Offline: [`log_parser`] → [`evaluation`].

pub mod config;
pub mod detector;
pub mod error;
pub mod evaluation;
pub mod event_log;
pub mod filters;
pub mod highlight;
pub mod log_parser;
pub mod monitor;
pub mod telemetry;
pub mod types;

pub use config::{DetectorConfig, EstimatorKind, GapModel, KalmanConfig, KalmanMode};
pub use detector::{FrameAnalysis, RiskDetector};
pub use error::{RiskError, RiskResult};
pub use evaluation::{evaluate, EvaluationReport};
pub use event_log::EventLog;
pub use filters::{build_estimator, ConstantVelocity, KalmanEstimator, StateEstimator};
pub use monitor::{RiskMonitor, StrategyRun};
pub use telemetry::{RecordedTrace, TelemetrySource};
pub use types::{GroundTruthCollision, KinematicSample, ParsedWarning, RiskEvent, RiskKind};
