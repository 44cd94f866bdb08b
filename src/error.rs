use std::path::PathBuf;

use thiserror::Error;

/// Collision-risk error types
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Telemetry unavailable for vehicle {vehicle_id}: {reason}")]
    TelemetryUnavailable { vehicle_id: String, reason: String },

    #[error("Non-finite kinematic sample for vehicle {vehicle_id}")]
    NonFiniteSample { vehicle_id: String },

    #[error("Degenerate innovation covariance: {0}")]
    NumericDegenerate(String),

    #[error("Malformed log line {line}: {reason}")]
    MalformedLogLine { line: usize, reason: String },

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RiskError {
    pub fn telemetry(vehicle_id: &str, reason: impl Into<String>) -> Self {
        RiskError::TelemetryUnavailable {
            vehicle_id: vehicle_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RiskError::Io {
            path: path.into(),
            source,
        }
    }

    /// Line-level error with the line number filled in later by the caller.
    pub fn malformed_line(reason: impl Into<String>) -> Self {
        RiskError::MalformedLogLine {
            line: 0,
            reason: reason.into(),
        }
    }

    pub fn at_line(self, line: usize) -> Self {
        match self {
            RiskError::MalformedLogLine { reason, .. } => RiskError::MalformedLogLine { line, reason },
            other => other,
        }
    }
}

/// Result type for collision-risk operations
pub type RiskResult<T> = Result<T, RiskError>;
