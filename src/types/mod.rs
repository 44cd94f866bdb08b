pub mod linalg;

pub use linalg::*;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// One vehicle's longitudinal kinematics at one simulation frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KinematicSample {
    pub vehicle_id: String,
    pub position: f64, // longitudinal coordinate (m)
    pub speed: f64,    // m/s
    pub frame: u64,
}

impl KinematicSample {
    pub fn new(vehicle_id: impl Into<String>, position: f64, speed: f64, frame: u64) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            position,
            speed,
            frame,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.speed.is_finite()
    }
}

/// Output of one estimator invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct EstimatorState {
    pub position: f64,
    pub velocity: f64,
    /// Only the Kalman estimator carries a covariance.
    pub covariance: Option<StateMat2>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskKind {
    RearEnd,
    SideSwipe,
}

impl RiskKind {
    /// Prefix written in front of "collision warning".
    pub fn label(&self) -> &'static str {
        match self {
            RiskKind::RearEnd => "Rear-end",
            RiskKind::SideSwipe => "Side-swipe",
        }
    }

    /// Token separating the two participants in a warning line.
    pub fn connector(&self) -> &'static str {
        match self {
            RiskKind::RearEnd => "leading",
            RiskKind::SideSwipe => "and",
        }
    }

    pub fn from_connector(token: &str) -> Option<Self> {
        match token {
            "leading" => Some(RiskKind::RearEnd),
            "and" => Some(RiskKind::SideSwipe),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskEvent {
    pub kind: RiskKind,
    /// Following vehicle for rear-end, first vehicle of the pair for side-swipe
    pub subject_id: String,
    /// Leader for rear-end, second vehicle of the pair for side-swipe
    pub counterpart_id: String,
    pub frame: u64,
}

impl RiskEvent {
    pub fn rear_end(follower: &str, leader: &str, frame: u64) -> Self {
        Self {
            kind: RiskKind::RearEnd,
            subject_id: follower.to_string(),
            counterpart_id: leader.to_string(),
            frame,
        }
    }

    pub fn side_swipe(first: &str, second: &str, frame: u64) -> Self {
        Self {
            kind: RiskKind::SideSwipe,
            subject_id: first.to_string(),
            counterpart_id: second.to_string(),
            frame,
        }
    }

    /// Participants in the order they appear on a warning line: `(victim, collider)`.
    ///
    /// Rear-end lines name the leader first (`<leader> leading <follower>`), so the
    /// struck vehicle reads back as the victim.
    pub fn log_participants(&self) -> (&str, &str) {
        match self.kind {
            RiskKind::RearEnd => (&self.counterpart_id, &self.subject_id),
            RiskKind::SideSwipe => (&self.subject_id, &self.counterpart_id),
        }
    }

    pub fn message(&self) -> String {
        let (first, second) = self.log_participants();
        format!(
            "{} collision warning: {} {} {}",
            self.kind.label(),
            first,
            self.kind.connector(),
            second
        )
    }
}

/// A collision recorded by the simulator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthCollision {
    pub time: f64, // simulation seconds
    pub kind: String,
    pub lane: String,
    pub position: f64,
    pub collider_id: String,
    pub victim_id: String,
    pub collider_type: String,
    pub victim_type: String,
    pub collider_speed: f64,
    pub victim_speed: f64,
}

/// A warning line reconstructed from an event log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedWarning {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub sequence_number: u32,
    pub victim_id: String,
    pub collider_id: String,
    pub collision_type: String,
    pub kind: RiskKind,
}

/// Both estimators' predictions for one vehicle in one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub sequence_number: u32,
    pub vehicle_id: String,
    pub cs_prediction: f64,
    pub kf_prediction: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rear_end_message_names_leader_first() {
        let event = RiskEvent::rear_end("follower", "leader", 4);
        assert_eq!(
            event.message(),
            "Rear-end collision warning: leader leading follower"
        );
        assert_eq!(event.log_participants(), ("leader", "follower"));
    }

    #[test]
    fn test_side_swipe_message() {
        let event = RiskEvent::side_swipe("a", "b", 0);
        assert_eq!(event.message(), "Side-swipe collision warning: a and b");
    }

    #[test]
    fn test_connector_round_trip() {
        for kind in [RiskKind::RearEnd, RiskKind::SideSwipe] {
            assert_eq!(RiskKind::from_connector(kind.connector()), Some(kind));
        }
        assert_eq!(RiskKind::from_connector("beside"), None);
    }
}
