//! Telemetry query interface and a recorded-trace replay source.
//!
//! The live simulator is external; the detector only ever sees it through
//! [`TelemetrySource`]. [`RecordedTrace`] replays frames captured to JSON
//! (optionally gzip-compressed) so the detector can run offline.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};
use crate::types::KinematicSample;

/// Synchronous per-frame query interface onto the simulation.
pub trait TelemetrySource {
    fn vehicle_ids(&self) -> Vec<String>;

    fn position(&self, vehicle_id: &str) -> RiskResult<(f64, f64)>;

    fn speed(&self, vehicle_id: &str) -> RiskResult<f64>;

    /// Closest vehicle ahead on the same lane within `max_distance`, with the gap to it.
    fn leader(&self, vehicle_id: &str, max_distance: f64) -> RiskResult<Option<(String, f64)>>;

    /// Longitudinal sample built from the x coordinate and speed.
    fn sample(&self, vehicle_id: &str, frame: u64) -> RiskResult<KinematicSample> {
        let (x, _y) = self.position(vehicle_id)?;
        let speed = self.speed(vehicle_id)?;
        Ok(KinematicSample::new(vehicle_id, x, speed, frame))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedLeader {
    pub id: String,
    pub gap: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedVehicle {
    pub id: String,
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub speed: f64,
    #[serde(default)]
    pub leader: Option<RecordedLeader>,
    /// Listed in the frame but gone by the time it is queried.
    #[serde(default)]
    pub missing: bool,
}

impl RecordedVehicle {
    pub fn new(id: &str, x: f64, speed: f64) -> Self {
        Self {
            id: id.to_string(),
            x,
            y: 0.0,
            speed,
            leader: None,
            missing: false,
        }
    }

    pub fn with_leader(mut self, leader: &str, gap: f64) -> Self {
        self.leader = Some(RecordedLeader {
            id: leader.to_string(),
            gap,
        });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub time: f64,
    pub vehicles: Vec<RecordedVehicle>,
}

impl RecordedFrame {
    fn lookup(&self, vehicle_id: &str) -> RiskResult<&RecordedVehicle> {
        match self.vehicles.iter().find(|v| v.id == vehicle_id) {
            Some(v) if v.missing => Err(RiskError::telemetry(vehicle_id, "vehicle left the simulation")),
            Some(v) => Ok(v),
            None => Err(RiskError::telemetry(vehicle_id, "vehicle not in frame")),
        }
    }
}

impl TelemetrySource for RecordedFrame {
    fn vehicle_ids(&self) -> Vec<String> {
        self.vehicles.iter().map(|v| v.id.clone()).collect()
    }

    fn position(&self, vehicle_id: &str) -> RiskResult<(f64, f64)> {
        self.lookup(vehicle_id).map(|v| (v.x, v.y))
    }

    fn speed(&self, vehicle_id: &str) -> RiskResult<f64> {
        self.lookup(vehicle_id).map(|v| v.speed)
    }

    fn leader(&self, vehicle_id: &str, max_distance: f64) -> RiskResult<Option<(String, f64)>> {
        let vehicle = self.lookup(vehicle_id)?;
        Ok(vehicle
            .leader
            .as_ref()
            .filter(|l| l.gap <= max_distance)
            .map(|l| (l.id.clone(), l.gap)))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedTrace {
    pub frames: Vec<RecordedFrame>,
}

impl RecordedTrace {
    /// Load a trace from `.json` or `.json.gz`.
    pub fn load(path: impl AsRef<Path>) -> RiskResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RiskError::io(path, e))?;
        let reader: Box<dyn Read> = if path.extension().map(|e| e == "gz").unwrap_or(false) {
            Box::new(BufReader::new(GzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        serde_json::from_reader(reader)
            .map_err(|e| RiskError::MalformedDocument(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(json: &str) -> RiskResult<Self> {
        serde_json::from_str(json).map_err(|e| RiskError::MalformedDocument(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
