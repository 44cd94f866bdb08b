use std::fs;
use std::path::Path;

use roxmltree::{Document, Node};
use serde::Serialize;

use crate::error::{RiskError, RiskResult};
use crate::types::GroundTruthCollision;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroundTruthStatus {
    Loaded,
    Missing,
    Malformed,
}

/// Collisions loaded from a simulator artifact, plus whether the artifact was usable.
///
/// An empty `collisions` list with `Loaded` status means the run had no collisions;
/// with any other status it means there is nothing to score against.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroundTruth {
    pub collisions: Vec<GroundTruthCollision>,
    pub status: GroundTruthStatus,
}

impl GroundTruth {
    pub fn unavailable(status: GroundTruthStatus) -> Self {
        Self {
            collisions: Vec::new(),
            status,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == GroundTruthStatus::Loaded
    }

    pub fn len(&self) -> usize {
        self.collisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collisions.is_empty()
    }
}

fn text_attr(node: &Node, name: &str) -> RiskResult<String> {
    node.attribute(name).map(str::to_string).ok_or_else(|| {
        RiskError::MalformedDocument(format!(
            "collision at byte {} has no '{}' attribute",
            node.range().start,
            name
        ))
    })
}

fn float_attr(node: &Node, name: &str) -> RiskResult<f64> {
    let raw = text_attr(node, name)?;
    raw.trim().parse::<f64>().map_err(|e| {
        RiskError::MalformedDocument(format!("attribute {}='{}' is not numeric: {}", name, raw, e))
    })
}

fn parse_collision(node: &Node) -> RiskResult<GroundTruthCollision> {
    Ok(GroundTruthCollision {
        time: float_attr(node, "time")?,
        kind: text_attr(node, "type")?,
        lane: text_attr(node, "lane")?,
        position: float_attr(node, "pos")?,
        collider_id: text_attr(node, "collider")?,
        victim_id: text_attr(node, "victim")?,
        collider_type: text_attr(node, "colliderType")?,
        victim_type: text_attr(node, "victimType")?,
        collider_speed: float_attr(node, "colliderSpeed")?,
        victim_speed: float_attr(node, "victimSpeed")?,
    })
}

/// Parse every `<collision>` element anywhere in the document, in document order.
///
/// Any syntax error or bad attribute fails the whole document.
pub fn parse_collision_xml(text: &str) -> RiskResult<Vec<GroundTruthCollision>> {
    let doc = Document::parse(text).map_err(|e| RiskError::MalformedDocument(e.to_string()))?;

    doc.descendants()
        .filter(|n| n.has_tag_name("collision"))
        .map(|n| parse_collision(&n))
        .collect()
}

/// Load the simulator's collision output, logging instead of failing.
pub fn load_collision_log(path: impl AsRef<Path>) -> GroundTruth {
    let path = path.as_ref();

    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            log::error!("Error reading collision log {}: {}", path.display(), e);
            return GroundTruth::unavailable(GroundTruthStatus::Missing);
        }
    };

    match parse_collision_xml(&text) {
        Ok(collisions) => {
            log::info!("Loaded {} collisions from {}", collisions.len(), path.display());
            GroundTruth {
                collisions,
                status: GroundTruthStatus::Loaded,
            }
        }
        Err(e) => {
            log::error!("Error parsing the collision log file {}: {}", path.display(), e);
            GroundTruth::unavailable(GroundTruthStatus::Malformed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<collisions>
    <collision time="42.50" type="collision" lane="E1_0" pos="118.31"
               collider="right_7" victim="left_3" colliderType="DEFAULT_VEHTYPE"
               victimType="DEFAULT_VEHTYPE" colliderSpeed="13.89" victimSpeed="0.00"/>
    <step time="43.00">
        <collision time="43.00" type="collision" lane=":J1_2_0" pos="3.1"
                   collider="up_1" victim="down_2" colliderType="car"
                   victimType="truck" colliderSpeed="8" victimSpeed="7.5"/>
    </step>
</collisions>
"#;

    #[test]
    fn test_parse_collisions_in_document_order() {
        let collisions = parse_collision_xml(SAMPLE).unwrap();
        assert_eq!(collisions.len(), 2);

        let first = &collisions[0];
        assert_eq!(first.time, 42.5);
        assert_eq!(first.kind, "collision");
        assert_eq!(first.lane, "E1_0");
        assert_eq!(first.position, 118.31);
        assert_eq!(first.collider_id, "right_7");
        assert_eq!(first.victim_id, "left_3");
        assert_eq!(first.collider_speed, 13.89);
        assert_eq!(first.victim_speed, 0.0);

        assert_eq!(collisions[1].collider_id, "up_1");
        assert_eq!(collisions[1].victim_type, "truck");
    }

    #[test]
    fn test_empty_root_is_zero_collisions() {
        assert!(parse_collision_xml("<collisions/>").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_xml_is_document_error() {
        let err = parse_collision_xml("<collisions><collision time=\"1\"").unwrap_err();
        assert!(matches!(err, RiskError::MalformedDocument(_)));
        assert!(parse_collision_xml("").is_err());
    }

    #[test]
    fn test_bad_attribute_fails_whole_document() {
        let xml = SAMPLE.replace("colliderSpeed=\"8\"", "colliderSpeed=\"fast\"");
        assert!(matches!(
            parse_collision_xml(&xml),
            Err(RiskError::MalformedDocument(_))
        ));

        let xml = SAMPLE.replace("victim=\"left_3\" ", "");
        assert!(parse_collision_xml(&xml).is_err());
    }

    #[test]
    fn test_load_distinguishes_missing_malformed_and_empty() {
        let missing = load_collision_log("/nonexistent/collision_log.txt");
        assert_eq!(missing.status, GroundTruthStatus::Missing);
        assert!(!missing.is_available());

        let dir = std::env::temp_dir();
        let bad = dir.join(format!("collision_bad_{}.xml", std::process::id()));
        let empty = dir.join(format!("collision_empty_{}.xml", std::process::id()));
        fs::write(&bad, "<collisions><collision").unwrap();
        fs::write(&empty, "<collisions></collisions>").unwrap();

        let malformed = load_collision_log(&bad);
        let zero = load_collision_log(&empty);
        fs::remove_file(&bad).ok();
        fs::remove_file(&empty).ok();

        assert_eq!(malformed.status, GroundTruthStatus::Malformed);
        assert!(malformed.is_empty());
        assert!(zero.is_available());
        assert!(zero.is_empty());
    }
}
