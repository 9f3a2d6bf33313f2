//! Snapping engine
//!
//! Resolves a candidate plane point against the sketch's nodes, the outside
//! reference points, and per-axis guides, in that order. Snapping never
//! creates nodes; it only relocates the candidate and reports which node, if
//! any, it landed on.

use glam::Vec2;
use tracing::warn;

use crate::config::SnapSettings;
use crate::plane::SketchPlane;
use crate::viewport::{ScreenCoords, Viewport};

use super::nodes::{EPS_POS, NodeStore};

/// Highlight box drawn around a snap target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapBox {
    pub center: Vec2,
    pub half_size: f32,
}

/// Guide line from the node that locked one coordinate to the snapped point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisGuide {
    pub from: Vec2,
    pub to: Vec2,
}

/// Transient snap annotations for the renderer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SnapIndicators {
    /// Box at a snapped node or outside point
    pub target: Option<SnapBox>,
    /// Guides for the x (index 0) and y (index 1) coordinates
    pub axes: [Option<AxisGuide>; 2],
}

impl SnapIndicators {
    /// Whether nothing is shown
    pub fn is_empty(&self) -> bool {
        self.target.is_none() && self.axes.iter().all(Option::is_none)
    }
}

/// What a candidate point was snapped to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnapKind {
    /// An existing node
    Node(usize),
    /// An outside reference point
    Outside,
    /// One or both coordinates locked to guides
    Axis,
    /// Nothing in range
    Free,
}

/// Resolved candidate point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    pub point: Vec2,
    pub kind: SnapKind,
}

impl SnapResult {
    /// Node index if the point snapped onto a node
    pub fn node(&self) -> Option<usize> {
        match self.kind {
            SnapKind::Node(idx) => Some(idx),
            _ => None,
        }
    }
}

/// Snapping state of one sketch
#[derive(Debug, Clone, Default)]
pub struct SnapEngine {
    settings: SnapSettings,
    outside: Vec<Vec2>,
    indicators: SnapIndicators,
}

impl SnapEngine {
    /// Create an engine with the given settings
    pub fn new(settings: SnapSettings) -> Self {
        Self {
            settings,
            outside: Vec::new(),
            indicators: SnapIndicators::default(),
        }
    }

    /// Replace the settings
    pub fn set_settings(&mut self, settings: SnapSettings) {
        self.settings = settings;
    }

    /// Current settings
    pub fn settings(&self) -> &SnapSettings {
        &self.settings
    }

    /// Snap radius in world units around `pt`
    ///
    /// Measured by offsetting the projected point by the pixel distance and
    /// projecting it back onto the plane.
    pub fn radius(&self, plane: &SketchPlane, viewport: &dyn Viewport, pt: Vec2) -> f32 {
        let px = self.settings.distance_px;
        if viewport.is_headless() {
            return px;
        }
        let measured = viewport
            .screen_coords(plane.to_3d(pt))
            .map(|s| ScreenCoords(s.0 + Vec2::new(px, 0.0)))
            .and_then(|s| viewport.pt_on_plane(s, plane))
            .map(|p| p.distance(pt));
        match measured {
            Some(d) => d,
            None => {
                warn!(
                    "Snap radius unavailable at {}, using {}",
                    pt, self.settings.fallback_distance
                );
                self.settings.fallback_distance
            }
        }
    }

    /// Resolve `pt` against nodes, outside points and axis guides
    ///
    /// # Arguments
    /// * `nodes` - The sketch's node store
    /// * `radius` - Snap radius in world units
    /// * `pt` - Candidate point
    /// * `exclude` - Node indices that must not be snapped to
    pub fn resolve(
        &mut self,
        nodes: &NodeStore,
        radius: f32,
        pt: Vec2,
        exclude: &[usize],
    ) -> SnapResult {
        let r_sq = radius * radius;

        let nearest_node = nodes
            .live()
            .filter(|(idx, _)| !exclude.contains(idx))
            .map(|(idx, n)| (idx, n.pos.distance_squared(pt)))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((idx, d_sq)) = nearest_node {
            if d_sq <= r_sq {
                let pos = nodes[idx].pos;
                self.show_target(pos, radius);
                return SnapResult {
                    point: pos,
                    kind: SnapKind::Node(idx),
                };
            }
        }

        let nearest_outside = self
            .outside
            .iter()
            .copied()
            .min_by(|a, b| a.distance_squared(pt).total_cmp(&b.distance_squared(pt)));
        if let Some(pos) = nearest_outside {
            if pos.distance_squared(pt) <= r_sq {
                self.show_target(pos, radius);
                return SnapResult {
                    point: pos,
                    kind: SnapKind::Outside,
                };
            }
        }

        self.indicators = SnapIndicators::default();
        let threshold = radius * self.settings.axis_ratio;
        let mut point = pt;
        let mut guides = [None, None];
        for (axis, guide) in guides.iter_mut().enumerate() {
            *guide = nodes
                .live()
                .map(|(_, n)| n.pos)
                .chain(self.outside.iter().copied())
                .filter(|p| (p[axis] - pt[axis]).abs() <= threshold)
                .min_by(|a, b| a.distance_squared(pt).total_cmp(&b.distance_squared(pt)));
            if let Some(g) = *guide {
                point[axis] = g[axis];
            }
        }

        if guides.iter().all(Option::is_none) {
            return SnapResult {
                point,
                kind: SnapKind::Free,
            };
        }
        for (axis, guide) in guides.into_iter().enumerate() {
            self.indicators.axes[axis] = guide.map(|from| AxisGuide { from, to: point });
        }
        SnapResult {
            point,
            kind: SnapKind::Axis,
        }
    }

    fn show_target(&mut self, center: Vec2, radius: f32) {
        self.indicators = SnapIndicators {
            target: Some(SnapBox {
                center,
                half_size: radius * 0.5,
            }),
            axes: [None, None],
        };
    }

    /// Clear all snap annotations
    pub fn hide(&mut self) {
        self.indicators = SnapIndicators::default();
    }

    /// Current snap annotations
    pub fn indicators(&self) -> &SnapIndicators {
        &self.indicators
    }

    /// Add an outside reference point; duplicates are ignored
    pub fn add_outside_point(&mut self, pos: Vec2) {
        let known = self
            .outside
            .iter()
            .any(|p| p.distance_squared(pos) <= EPS_POS * EPS_POS);
        if !known {
            self.outside.push(pos);
        }
    }

    /// Remove all outside reference points
    pub fn clear_outside(&mut self) {
        self.outside.clear();
    }

    /// Outside reference points
    pub fn outside_points(&self) -> &[Vec2] {
        &self.outside
    }
}
