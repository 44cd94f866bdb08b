//! Presentation side channel for flagged vehicles.
//!
//! Detection never depends on highlighting succeeding; failures are logged
//! by the caller and dropped.

use crate::error::RiskResult;
use crate::types::{RiskEvent, RiskKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

pub const FOLLOWER_COLOR: Rgba = Rgba(255, 0, 0, 255); // red
pub const LEADER_COLOR: Rgba = Rgba(255, 255, 0, 255); // yellow
pub const SIDE_SWIPE_COLOR: Rgba = Rgba(0, 0, 255, 255); // blue

pub trait VehicleHighlighter {
    fn highlight(&mut self, vehicle_id: &str, color: Rgba) -> RiskResult<()>;
}

/// Highlighter for headless runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHighlighter;

impl VehicleHighlighter for NoopHighlighter {
    fn highlight(&mut self, _vehicle_id: &str, _color: Rgba) -> RiskResult<()> {
        Ok(())
    }
}

/// Colour assignments for one event.
pub fn highlights_for(event: &RiskEvent) -> Vec<(&str, Rgba)> {
    match event.kind {
        RiskKind::RearEnd => vec![
            (event.subject_id.as_str(), FOLLOWER_COLOR),
            (event.counterpart_id.as_str(), LEADER_COLOR),
        ],
        RiskKind::SideSwipe => vec![(event.subject_id.as_str(), SIDE_SWIPE_COLOR)],
    }
}

/// Apply highlights for every event, logging and ignoring failures.
pub fn apply_highlights(highlighter: &mut dyn VehicleHighlighter, events: &[RiskEvent]) -> usize {
    let mut applied = 0;
    for event in events {
        for (vehicle_id, color) in highlights_for(event) {
            match highlighter.highlight(vehicle_id, color) {
                Ok(()) => applied += 1,
                Err(e) => log::warn!("Could not highlight {}: {}", vehicle_id, e),
            }
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RiskError;

    struct Rejecting;

    impl VehicleHighlighter for Rejecting {
        fn highlight(&mut self, vehicle_id: &str, _color: Rgba) -> RiskResult<()> {
            Err(RiskError::telemetry(vehicle_id, "already removed"))
        }
    }

    #[test]
    fn test_rear_end_colours_both_vehicles() {
        let event = RiskEvent::rear_end("f", "l", 0);
        assert_eq!(
            highlights_for(&event),
            vec![("f", FOLLOWER_COLOR), ("l", LEADER_COLOR)]
        );
    }

    #[test]
    fn test_side_swipe_colours_subject() {
        let event = RiskEvent::side_swipe("a", "b", 0);
        assert_eq!(highlights_for(&event), vec![("a", SIDE_SWIPE_COLOR)]);
    }

    #[test]
    fn test_failures_are_swallowed() {
        let events = vec![RiskEvent::rear_end("f", "l", 0)];
        assert_eq!(apply_highlights(&mut Rejecting, &events), 0);
        assert_eq!(apply_highlights(&mut NoopHighlighter, &events), 2);
    }
}
