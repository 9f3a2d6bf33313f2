//! Construction helpers for compound shapes
//!
//! Each helper turns the points picked by the user into the corner and arc
//! points the shape is built from.

use glam::Vec2;

/// Corners of a square given its center and the midpoint of one side
pub fn square_corners(center: Vec2, side_mid: Vec2) -> [Vec2; 4] {
    let half = side_mid - center;
    let perp = half.perp();
    [
        center + half + perp,
        center - half + perp,
        center - half - perp,
        center + half - perp,
    ]
}

/// Corners of an axis-aligned rectangle given two opposite corners
pub fn rectangle_corners(a: Vec2, b: Vec2) -> [Vec2; 4] {
    [a, Vec2::new(b.x, a.y), b, Vec2::new(a.x, b.y)]
}

/// Points of a circle: `[left, right, bottom, top]` relative to the rim point
///
/// A circle is drawn as two arcs from `points[0]` to `points[1]`, one
/// through `points[2]` and one through `points[3]`.
pub fn circle_stencil(center: Vec2, rim: Vec2) -> [Vec2; 4] {
    let v = rim - center;
    let p = v.perp();
    [center - v, center + v, center - p, center + p]
}

/// Outline points of a slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotPoints {
    pub a_top: Vec2,
    pub a_mid: Vec2,
    pub a_bottom: Vec2,
    pub b_top: Vec2,
    pub b_mid: Vec2,
    pub b_bottom: Vec2,
}

/// Slot between centers `a` and `b`; the radius is the distance from `b` to `c`
///
/// Returns `None` when the centers coincide or the radius is zero.
pub fn slot_points(a: Vec2, b: Vec2, c: Vec2) -> Option<SlotPoints> {
    let radius = c.distance(b);
    let dir = (b - a).try_normalize()?;
    if radius <= f32::EPSILON {
        return None;
    }
    let perp = dir.perp();
    Some(SlotPoints {
        a_top: a + perp * radius,
        a_mid: a - dir * radius,
        a_bottom: a - perp * radius,
        b_top: b + perp * radius,
        b_mid: b + dir * radius,
        b_bottom: b - perp * radius,
    })
}

/// Reflect `point` about the line through `p1` and `p2`
///
/// Returns `None` when the line is degenerate.
pub fn mirror_point(p1: Vec2, p2: Vec2, point: Vec2) -> Option<Vec2> {
    let dir = (p2 - p1).try_normalize()?;
    let foot = p1 + dir * (point - p1).dot(dir);
    Some(foot * 2.0 - point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_square_corners() {
        let corners = square_corners(Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert_eq!(corners[0], Vec2::new(10.0, 10.0));
        assert_eq!(corners[1], Vec2::new(-10.0, 10.0));
        assert_eq!(corners[2], Vec2::new(-10.0, -10.0));
        assert_eq!(corners[3], Vec2::new(10.0, -10.0));
    }

    #[test]
    fn test_rotated_square_keeps_side_length() {
        let corners = square_corners(Vec2::new(1.0, 1.0), Vec2::new(4.0, 5.0));
        for i in 0..4 {
            let side = corners[i].distance(corners[(i + 1) % 4]);
            assert_relative_eq!(side, 10.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_circle_stencil() {
        let p = circle_stencil(Vec2::new(1.0, 1.0), Vec2::new(11.0, 1.0));
        assert_eq!(p[0], Vec2::new(-9.0, 1.0));
        assert_eq!(p[1], Vec2::new(11.0, 1.0));
        assert_eq!(p[2], Vec2::new(1.0, -9.0));
        assert_eq!(p[3], Vec2::new(1.0, 11.0));
    }

    #[test]
    fn test_slot_points() {
        let s = slot_points(Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(10.0, 2.0)).unwrap();
        assert_eq!(s.a_top, Vec2::new(0.0, 2.0));
        assert_eq!(s.a_mid, Vec2::new(-2.0, 0.0));
        assert_eq!(s.a_bottom, Vec2::new(0.0, -2.0));
        assert_eq!(s.b_bottom, Vec2::new(10.0, -2.0));
        assert_eq!(s.b_mid, Vec2::new(12.0, 0.0));
        assert_eq!(s.b_top, Vec2::new(10.0, 2.0));

        assert!(slot_points(Vec2::ZERO, Vec2::ZERO, Vec2::X).is_none());
        assert!(slot_points(Vec2::ZERO, Vec2::X, Vec2::X).is_none());
    }

    #[test]
    fn test_mirror_point() {
        let m = mirror_point(Vec2::ZERO, Vec2::new(0.0, 5.0), Vec2::new(3.0, 2.0)).unwrap();
        assert_relative_eq!(m.x, -3.0);
        assert_relative_eq!(m.y, 2.0);

        let m = mirror_point(Vec2::ZERO, Vec2::new(1.0, 1.0), Vec2::new(2.0, 0.0)).unwrap();
        assert_relative_eq!(m.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(m.y, 2.0, epsilon = 1e-6);

        assert!(mirror_point(Vec2::ONE, Vec2::ONE, Vec2::ZERO).is_none());
    }
}
