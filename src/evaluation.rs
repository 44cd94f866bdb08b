//! Offline scoring of detector warnings against simulator ground truth.
//!
//! Matching is by participant identity only. A warning never needs to fall
//! near the collision time to count for it.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::types::{GroundTruthCollision, ParsedWarning, PredictionRecord, RiskKind};

/// A ground-truth collision claimed by a warning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CollisionMatch {
    pub collision_index: usize,
    pub warning_index: usize,
}

/// Score of one estimator strategy.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub strategy: String,
    /// Ground-truth collisions claimed by at least one warning
    pub detected: usize,
    pub total_collisions: usize,
    pub total_warnings: usize,
    pub precision: f64,
    pub matches: Vec<CollisionMatch>,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Detected Collisions: {}", self.detected)?;
        writeln!(f, "Total Collisions: {}", self.total_collisions)?;
        write!(f, "Precision: {:.2}", self.precision)
    }
}

fn contains_id(recorded: &str, warned: &str) -> bool {
    !warned.is_empty() && recorded.contains(warned)
}

/// Whether `warning` names the participants of `collision`.
///
/// Each warned identifier must be contained in the recorded identifier of the
/// same role. Side-swipe pairs carry no order, so either orientation counts.
pub fn warning_matches(collision: &GroundTruthCollision, warning: &ParsedWarning) -> bool {
    let same_roles = contains_id(&collision.victim_id, &warning.victim_id)
        && contains_id(&collision.collider_id, &warning.collider_id);
    if same_roles {
        return true;
    }
    warning.kind == RiskKind::SideSwipe
        && contains_id(&collision.victim_id, &warning.collider_id)
        && contains_id(&collision.collider_id, &warning.victim_id)
}

/// Score one strategy's warnings.
///
/// Each collision is claimed by the first matching warning in log order.
/// Precision is `detected / total_collisions`, or 0 with no collisions.
pub fn evaluate(
    strategy: &str,
    collisions: &[GroundTruthCollision],
    warnings: &[ParsedWarning],
) -> EvaluationReport {
    let matches: Vec<CollisionMatch> = collisions
        .iter()
        .enumerate()
        .filter_map(|(collision_index, collision)| {
            warnings
                .iter()
                .position(|w| warning_matches(collision, w))
                .map(|warning_index| CollisionMatch {
                    collision_index,
                    warning_index,
                })
        })
        .collect();

    let detected = matches.len();
    let total_collisions = collisions.len();
    let precision = if total_collisions > 0 {
        detected as f64 / total_collisions as f64
    } else {
        0.0
    };

    log::debug!(
        "{}: {} of {} collisions matched by {} warnings",
        strategy,
        detected,
        total_collisions,
        warnings.len()
    );

    EvaluationReport {
        strategy: strategy.to_string(),
        detected,
        total_collisions,
        total_warnings: warnings.len(),
        precision,
        matches,
    }
}

/// Score several strategies against the same ground truth, preserving input order.
pub fn compare<S: AsRef<str>>(
    collisions: &[GroundTruthCollision],
    strategies: &[(S, Vec<ParsedWarning>)],
) -> Vec<EvaluationReport> {
    strategies
        .iter()
        .map(|(name, warnings)| evaluate(name.as_ref(), collisions, warnings))
        .collect()
}

/// How far the two estimators' predictions drift apart over a trace.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PredictionDivergence {
    pub samples: usize,
    pub vehicles: usize,
    pub mean_abs_diff: f64,
    pub max_abs_diff: f64,
    /// Vehicle at which the largest difference occurred
    pub max_vehicle: Option<String>,
}

impl fmt::Display for PredictionDivergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Prediction Samples: {}", self.samples)?;
        writeln!(f, "Vehicles: {}", self.vehicles)?;
        writeln!(f, "Mean |cs - kf|: {:.4}", self.mean_abs_diff)?;
        write!(f, "Max |cs - kf|: {:.4}", self.max_abs_diff)?;
        if let Some(id) = &self.max_vehicle {
            write!(f, " ({})", id)?;
        }
        Ok(())
    }
}

pub fn prediction_divergence(records: &[PredictionRecord]) -> PredictionDivergence {
    if records.is_empty() {
        return PredictionDivergence::default();
    }

    let mut sum = 0.0;
    let mut max_abs_diff = 0.0;
    let mut max_vehicle: Option<&str> = None;
    let mut vehicles = HashSet::new();

    for record in records {
        let diff = (record.cs_prediction - record.kf_prediction).abs();
        sum += diff;
        if max_vehicle.is_none() || diff > max_abs_diff {
            max_abs_diff = diff;
            max_vehicle = Some(&record.vehicle_id);
        }
        vehicles.insert(record.vehicle_id.as_str());
    }

    PredictionDivergence {
        samples: records.len(),
        vehicles: vehicles.len(),
        mean_abs_diff: sum / records.len() as f64,
        max_abs_diff,
        max_vehicle: max_vehicle.map(str::to_string),
    }
}
