//! Geometry kernel trait definitions
//!
//! The sketch graph only knows nodes and edges. Turning an edge into a curve,
//! evaluating it, and building a bounded region from a closed loop of curves
//! is delegated to an implementation of [`GeometryKernel`].

use std::f32::consts::TAU;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for geometry kernel operations
#[derive(Debug, Clone, Error)]
pub enum KernelError {
    #[error("Degenerate curve: {0}")]
    DegenerateCurve(String),

    #[error("Open wire: {0}")]
    OpenWire(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

/// Circular arc in plane coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleArc {
    /// Circle center
    pub center: Vec2,
    /// Circle radius
    pub radius: f32,
    /// Angle of the start point (radians)
    pub start_angle: f32,
    /// Signed angular extent; positive is counter-clockwise
    pub sweep: f32,
}

impl CircleArc {
    /// Arc starting at `start`, passing through `through` and ending at `end`
    ///
    /// Returns `None` for coincident or (nearly) collinear points.
    pub fn through(start: Vec2, through: Vec2, end: Vec2) -> Option<Self> {
        let b = through - start;
        let c = end - start;
        let scale = b.length_squared().max(c.length_squared());
        let d = 2.0 * b.perp_dot(c);
        if scale <= f32::EPSILON || d.abs() <= 1e-4 * scale {
            return None;
        }
        let b2 = b.length_squared();
        let c2 = c.length_squared();
        let center = start + Vec2::new(c.y * b2 - b.y * c2, b.x * c2 - c.x * b2) / d;
        let radius = (start - center).length();

        let start_angle = angle_of(start - center);
        let end_angle = angle_of(end - center);
        let sweep = if d > 0.0 {
            (end_angle - start_angle).rem_euclid(TAU)
        } else {
            -(start_angle - end_angle).rem_euclid(TAU)
        };
        Some(Self {
            center,
            radius,
            start_angle,
            sweep,
        })
    }

    /// Point at normalized parameter `t` in [0, 1]
    pub fn point_at(&self, t: f32) -> Vec2 {
        let angle = self.start_angle + self.sweep * t;
        self.center + Vec2::new(angle.cos(), angle.sin()) * self.radius
    }

    /// Start point
    pub fn start(&self) -> Vec2 {
        self.point_at(0.0)
    }

    /// End point
    pub fn end(&self) -> Vec2 {
        self.point_at(1.0)
    }

    /// Normalized parameter of the point on the circle closest to `p`
    ///
    /// Values above 1 lie outside the arc.
    pub fn param_of(&self, p: Vec2) -> f32 {
        if self.sweep == 0.0 {
            return 0.0;
        }
        let angle = angle_of(p - self.center);
        let delta = if self.sweep > 0.0 {
            (angle - self.start_angle).rem_euclid(TAU)
        } else {
            (self.start_angle - angle).rem_euclid(TAU)
        };
        delta / self.sweep.abs()
    }

    /// Same arc traversed from end to start
    pub fn reversed(&self) -> Self {
        Self {
            start_angle: self.start_angle + self.sweep,
            sweep: -self.sweep,
            ..*self
        }
    }

    /// Arc length
    pub fn length(&self) -> f32 {
        self.radius * self.sweep.abs()
    }

    /// Part of the arc between normalized parameters `t0` and `t1`
    pub fn sub_arc(&self, t0: f32, t1: f32) -> Self {
        Self {
            start_angle: self.start_angle + self.sweep * t0,
            sweep: self.sweep * (t1 - t0),
            ..*self
        }
    }
}

fn angle_of(v: Vec2) -> f32 {
    v.y.atan2(v.x)
}

/// Curve produced by the kernel for one sketch edge or merged arc
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Curve {
    /// Straight segment
    Line { a: Vec2, b: Vec2 },
    /// Circular arc
    Arc(CircleArc),
}

impl Curve {
    /// Start point
    pub fn start(&self) -> Vec2 {
        match self {
            Curve::Line { a, .. } => *a,
            Curve::Arc(arc) => arc.start(),
        }
    }

    /// End point
    pub fn end(&self) -> Vec2 {
        match self {
            Curve::Line { b, .. } => *b,
            Curve::Arc(arc) => arc.end(),
        }
    }

    /// Point at normalized parameter `t`
    pub fn point_at(&self, t: f32) -> Vec2 {
        match self {
            Curve::Line { a, b } => a.lerp(*b, t),
            Curve::Arc(arc) => arc.point_at(t),
        }
    }

    /// Same curve traversed backwards
    pub fn reversed(&self) -> Self {
        match self {
            Curve::Line { a, b } => Curve::Line { a: *b, b: *a },
            Curve::Arc(arc) => Curve::Arc(arc.reversed()),
        }
    }

    /// Curve length
    pub fn length(&self) -> f32 {
        match self {
            Curve::Line { a, b } => a.distance(*b),
            Curve::Arc(arc) => arc.length(),
        }
    }
}

/// Bounded planar region: one outer ring and any number of hole rings
///
/// Rings are closed polylines with the first point repeated at the end.
/// The outer ring winds counter-clockwise, holes wind clockwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Outer boundary
    pub outer: Vec<Vec2>,
    /// Inner boundaries
    pub holes: Vec<Vec<Vec2>>,
}

impl Region {
    /// Region without holes
    pub fn new(outer: Vec<Vec2>) -> Self {
        Self {
            outer,
            holes: Vec::new(),
        }
    }

    /// Copy of this region with the given hole rings
    pub fn with_holes(&self, holes: Vec<Vec<Vec2>>) -> Self {
        Self {
            outer: self.outer.clone(),
            holes,
        }
    }
}

/// The geometry kernel used by sketches
///
/// Implementations provide curve construction and evaluation, region
/// construction from a closed wire, and the area/containment queries used to
/// nest faces.
pub trait GeometryKernel: Send + Sync {
    /// Get the name of this kernel
    fn name(&self) -> &str;

    /// Build a straight curve between two points
    fn make_line(&self, a: Vec2, b: Vec2) -> KernelResult<Curve>;

    /// Build an arc from its start, a point on the arc, and its end
    ///
    /// # Arguments
    /// * `start` - First end of the arc
    /// * `through` - Any point strictly between the ends
    /// * `end` - Second end of the arc
    fn make_arc(&self, start: Vec2, through: Vec2, end: Vec2) -> KernelResult<Curve>;

    /// Evaluate a curve at normalized parameter `t`
    fn evaluate(&self, curve: &Curve, t: f32) -> Vec2;

    /// Approximate a curve by a polyline including both ends
    fn flatten(&self, curve: &Curve) -> Vec<Vec2>;

    /// Build a region from a closed, ordered loop of curves
    ///
    /// # Arguments
    /// * `wire` - Curves in traversal order; each must start where the previous ends
    fn make_region(&self, wire: &[Curve]) -> KernelResult<Region>;

    /// Area enclosed by the outer ring minus the holes
    fn area(&self, region: &Region) -> f32;

    /// Whether `inner` lies inside `outer`
    ///
    /// # Arguments
    /// * `outer` - Candidate container
    /// * `inner` - Candidate contained region
    /// * `tolerance` - Distance within which boundary points count as touching
    fn contains(&self, outer: &Region, inner: &Region, tolerance: f32) -> bool;
}
