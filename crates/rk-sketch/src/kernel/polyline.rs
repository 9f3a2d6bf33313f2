//! Polyline geometry kernel
//!
//! Pure Rust kernel that represents regions as flattened rings. Arcs are
//! sampled with a fixed angular step, which is plenty for picking, area and
//! containment on sketch-sized input.

use glam::Vec2;

use super::traits::{CircleArc, Curve, GeometryKernel, KernelError, KernelResult, Region};

/// Classification of a point against a closed ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointClass {
    Inside,
    Boundary,
    Outside,
}

/// Signed area of a ring (shoelace); positive for counter-clockwise winding
///
/// The ring may be open or closed.
pub fn signed_area(ring: &[Vec2]) -> f32 {
    ring.iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|(a, b)| a.perp_dot(*b))
        .sum::<f32>()
        * 0.5
}

/// Distance from `p` to the segment `a`-`b`
pub fn distance_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Classify `p` against `ring` with a boundary tolerance
pub fn classify_point(p: Vec2, ring: &[Vec2], tolerance: f32) -> PointClass {
    let segments = || ring.iter().zip(ring.iter().cycle().skip(1));

    if segments().any(|(a, b)| distance_to_segment(p, *a, *b) <= tolerance) {
        return PointClass::Boundary;
    }

    let mut inside = false;
    for (a, b) in segments() {
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    if inside {
        PointClass::Inside
    } else {
        PointClass::Outside
    }
}

/// Kernel working on flattened polylines
#[derive(Debug, Clone, Copy)]
pub struct PolylineKernel {
    /// Maximum angle covered by one arc segment (radians)
    arc_step: f32,
    /// Maximum gap between consecutive curves of a wire
    join_tolerance: f32,
}

impl Default for PolylineKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl PolylineKernel {
    /// Create a kernel with a 10 degree arc step
    pub fn new() -> Self {
        Self {
            arc_step: 10f32.to_radians(),
            join_tolerance: 1e-3,
        }
    }

    /// Set the arc flattening step in degrees
    pub fn with_arc_step_degrees(mut self, degrees: f32) -> Self {
        self.arc_step = degrees.clamp(0.5, 90.0).to_radians();
        self
    }

    /// Set the tolerance for joining consecutive curves
    pub fn with_join_tolerance(mut self, tolerance: f32) -> Self {
        self.join_tolerance = tolerance;
        self
    }

    fn segment_count(&self, arc: &CircleArc) -> usize {
        ((arc.sweep.abs() / self.arc_step).ceil() as usize).max(1)
    }
}

impl GeometryKernel for PolylineKernel {
    fn name(&self) -> &str {
        "Polyline"
    }

    fn make_line(&self, a: Vec2, b: Vec2) -> KernelResult<Curve> {
        if a.distance(b) <= f32::EPSILON {
            return Err(KernelError::DegenerateCurve(format!(
                "zero-length line at {a}"
            )));
        }
        Ok(Curve::Line { a, b })
    }

    fn make_arc(&self, start: Vec2, through: Vec2, end: Vec2) -> KernelResult<Curve> {
        CircleArc::through(start, through, end)
            .map(Curve::Arc)
            .ok_or_else(|| {
                KernelError::DegenerateCurve(format!(
                    "no arc through {start}, {through}, {end}"
                ))
            })
    }

    fn evaluate(&self, curve: &Curve, t: f32) -> Vec2 {
        curve.point_at(t)
    }

    fn flatten(&self, curve: &Curve) -> Vec<Vec2> {
        match curve {
            Curve::Line { a, b } => vec![*a, *b],
            Curve::Arc(arc) => {
                let n = self.segment_count(arc);
                (0..=n).map(|i| arc.point_at(i as f32 / n as f32)).collect()
            }
        }
    }

    fn make_region(&self, wire: &[Curve]) -> KernelResult<Region> {
        let Some(first) = wire.first() else {
            return Err(KernelError::InvalidRegion("empty wire".into()));
        };

        for (i, curve) in wire.iter().enumerate() {
            let next = &wire[(i + 1) % wire.len()];
            if curve.end().distance(next.start()) > self.join_tolerance {
                return Err(KernelError::OpenWire(format!(
                    "curve {i} ends at {} but the next starts at {}",
                    curve.end(),
                    next.start()
                )));
            }
        }

        let mut ring = vec![first.start()];
        for (i, curve) in wire.iter().enumerate() {
            let points = self.flatten(curve);
            let interior = &points[1..points.len() - 1];
            ring.extend(interior.iter().copied());
            let joint = wire[(i + 1) % wire.len()].start();
            if ring.last().is_some_and(|last| last.distance(joint) > f32::EPSILON) {
                ring.push(joint);
            }
        }
        if ring.last() != ring.first() {
            ring.push(first.start());
        }

        if ring.len() < 4 {
            return Err(KernelError::InvalidRegion(format!(
                "{} distinct points cannot bound a region",
                ring.len() - 1
            )));
        }
        Ok(Region::new(ring))
    }

    fn area(&self, region: &Region) -> f32 {
        let holes: f32 = region.holes.iter().map(|h| signed_area(h).abs()).sum();
        signed_area(&region.outer).abs() - holes
    }

    fn contains(&self, outer: &Region, inner: &Region, tolerance: f32) -> bool {
        let samples = inner
            .outer
            .windows(2)
            .flat_map(|w| [w[0], (w[0] + w[1]) * 0.5]);

        let mut strictly_inside = false;
        for p in samples {
            match classify_point(p, &outer.outer, tolerance) {
                PointClass::Outside => return false,
                PointClass::Boundary => {}
                PointClass::Inside => {
                    let in_hole = outer
                        .holes
                        .iter()
                        .any(|h| classify_point(p, h, tolerance) == PointClass::Inside);
                    if in_hole {
                        return false;
                    }
                    strictly_inside = true;
                }
            }
        }
        strictly_inside
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    fn square(min: f32, max: f32) -> Vec<Curve> {
        let p = [
            Vec2::new(min, min),
            Vec2::new(max, min),
            Vec2::new(max, max),
            Vec2::new(min, max),
        ];
        (0..4)
            .map(|i| Curve::Line {
                a: p[i],
                b: p[(i + 1) % 4],
            })
            .collect()
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ];
        assert_relative_eq!(signed_area(&ccw), 100.0);
        let cw: Vec<Vec2> = ccw.iter().rev().copied().collect();
        assert_relative_eq!(signed_area(&cw), -100.0);
    }

    #[test]
    fn test_square_region() {
        let kernel = PolylineKernel::new();
        let region = kernel.make_region(&square(0.0, 10.0)).unwrap();
        assert_eq!(region.outer.len(), 5);
        assert_eq!(region.outer.first(), region.outer.last());
        assert_relative_eq!(kernel.area(&region), 100.0);
    }

    #[test]
    fn test_open_wire_rejected() {
        let kernel = PolylineKernel::new();
        let mut wire = square(0.0, 10.0);
        wire.pop();
        assert!(matches!(
            kernel.make_region(&wire),
            Err(KernelError::OpenWire(_))
        ));
    }

    #[test]
    fn test_circle_area() {
        let kernel = PolylineKernel::new().with_arc_step_degrees(2.0);
        let top = kernel
            .make_arc(
                Vec2::new(10.0, 0.0),
                Vec2::new(0.0, 10.0),
                Vec2::new(-10.0, 0.0),
            )
            .unwrap();
        let bottom = kernel
            .make_arc(
                Vec2::new(-10.0, 0.0),
                Vec2::new(0.0, -10.0),
                Vec2::new(10.0, 0.0),
            )
            .unwrap();
        let region = kernel.make_region(&[top, bottom]).unwrap();
        assert_relative_eq!(kernel.area(&region), PI * 100.0, epsilon = 1.0);
        for p in &region.outer {
            assert_relative_eq!(p.length(), 10.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_containment() {
        let kernel = PolylineKernel::new();
        let outer = kernel.make_region(&square(0.0, 20.0)).unwrap();
        let inner = kernel.make_region(&square(5.0, 15.0)).unwrap();
        let shifted = kernel.make_region(&square(15.0, 25.0)).unwrap();

        assert!(kernel.contains(&outer, &inner, 1e-3));
        assert!(!kernel.contains(&inner, &outer, 1e-3));
        assert!(!kernel.contains(&outer, &shifted, 1e-3));
        assert!(!kernel.contains(&outer, &outer, 1e-3));

        let with_hole = outer.with_holes(vec![inner.outer.iter().rev().copied().collect()]);
        let tiny = kernel.make_region(&square(9.0, 11.0)).unwrap();
        assert!(!kernel.contains(&with_hole, &tiny, 1e-3));
        assert_relative_eq!(kernel.area(&with_hole), 300.0);
    }

    #[test]
    fn test_classify_point() {
        let ring = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
            Vec2::new(0.0, 0.0),
        ];
        assert_eq!(classify_point(Vec2::new(5.0, 5.0), &ring, 1e-3), PointClass::Inside);
        assert_eq!(classify_point(Vec2::new(10.0, 5.0), &ring, 1e-3), PointClass::Boundary);
        assert_eq!(classify_point(Vec2::new(15.0, 5.0), &ring, 1e-3), PointClass::Outside);
    }
}
