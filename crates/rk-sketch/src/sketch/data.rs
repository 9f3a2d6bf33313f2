//! Replay view of a sketch
//!
//! A sketch is fully described by its straight edges and arcs as point
//! coordinates. Replaying them through `add_edge`/`add_arc` rebuilds the
//! same graph, so this view is what persistence layers serialize.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::kernel::Curve;
use crate::plane::SketchPlane;

/// Straight edge as `(start, end, dimension visible)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord(pub Vec2, pub Vec2, pub bool);

/// Arc as `[start, through, end]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArcRecord(pub [Vec2; 3]);

/// Serializable description of a sketch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SketchData {
    pub name: String,
    pub plane: SketchPlane,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
    #[serde(default)]
    pub arc_edges: Vec<ArcRecord>,
    /// Boundary of the face the sketch was started on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub originating_boundary: Vec<Curve>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SketchData {
        SketchData {
            name: "Sketch 1".into(),
            plane: SketchPlane::xz(),
            edges: vec![
                EdgeRecord(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), true),
                EdgeRecord(Vec2::new(10.0, 0.0), Vec2::new(0.0, 0.0), false),
            ],
            arc_edges: vec![ArcRecord([
                Vec2::new(0.0, 0.0),
                Vec2::new(5.0, 5.0),
                Vec2::new(10.0, 0.0),
            ])],
            originating_boundary: Vec::new(),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let data = sample();
        let json = serde_json::to_string(&data).unwrap();
        let back: SketchData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
        assert!(!json.contains("originating_boundary"));
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let json = serde_json::to_string(&SketchData {
            edges: Vec::new(),
            arc_edges: Vec::new(),
            ..sample()
        })
        .unwrap();
        let trimmed = json
            .replace(",\"edges\":[]", "")
            .replace(",\"arc_edges\":[]", "");
        let back: SketchData = serde_json::from_str(&trimmed).unwrap();
        assert!(back.edges.is_empty());
        assert!(back.arc_edges.is_empty());
        assert_eq!(back.name, "Sketch 1");
    }

    #[test]
    fn test_ron_round_trip() {
        let data = sample();
        let text = ron::to_string(&data).unwrap();
        let back: SketchData = ron::from_str(&text).unwrap();
        assert_eq!(back, data);
    }
}
