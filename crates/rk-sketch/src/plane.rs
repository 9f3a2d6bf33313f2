//! Working plane of a sketch

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Plane on which a sketch is drawn
///
/// Plane coordinates are measured along `x_axis` and `normal × x_axis`,
/// so the 2D frame is right-handed when viewed against the normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SketchPlane {
    /// Origin of the plane in world space
    pub origin: Vec3,
    /// Unit normal
    pub normal: Vec3,
    /// Unit direction of the plane's x axis
    pub x_axis: Vec3,
}

impl Default for SketchPlane {
    fn default() -> Self {
        Self::xy()
    }
}

impl SketchPlane {
    /// Create a plane, orthonormalizing the x axis against the normal
    pub fn new(origin: Vec3, normal: Vec3, x_axis: Vec3) -> Self {
        let normal = normal.normalize_or(Vec3::Z);
        let projected = x_axis - normal * x_axis.dot(normal);
        let x_axis = if projected.length_squared() > 1e-12 {
            projected.normalize()
        } else {
            normal.any_orthonormal_vector()
        };
        Self {
            origin,
            normal,
            x_axis,
        }
    }

    /// XY plane at the origin
    pub fn xy() -> Self {
        Self::new(Vec3::ZERO, Vec3::Z, Vec3::X)
    }

    /// XZ plane at the origin
    pub fn xz() -> Self {
        Self::new(Vec3::ZERO, Vec3::NEG_Y, Vec3::X)
    }

    /// YZ plane at the origin
    pub fn yz() -> Self {
        Self::new(Vec3::ZERO, Vec3::X, Vec3::Y)
    }

    /// Direction of the plane's y axis
    pub fn y_axis(&self) -> Vec3 {
        self.normal.cross(self.x_axis)
    }

    /// Convert plane coordinates to a world position
    pub fn to_3d(&self, point: Vec2) -> Vec3 {
        self.origin + self.x_axis * point.x + self.y_axis() * point.y
    }

    /// Project a world position onto the plane
    pub fn to_2d(&self, point: Vec3) -> Vec2 {
        let d = point - self.origin;
        Vec2::new(d.dot(self.x_axis), d.dot(self.y_axis()))
    }

    /// Intersect a ray (or its backward extension) with the plane
    ///
    /// Returns `None` when the ray is parallel to the plane.
    pub fn intersect_ray(&self, origin: Vec3, direction: Vec3) -> Option<Vec3> {
        let denom = direction.dot(self.normal);
        if denom.abs() < 1e-6 {
            return None;
        }
        let t = (self.origin - origin).dot(self.normal) / denom;
        Some(origin + direction * t)
    }
}
