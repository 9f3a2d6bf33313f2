//! Screen/plane projection seam
//!
//! The sketch never owns a view. Interactive calls receive a [`Viewport`]
//! that maps screen positions onto the working plane and back, which is all
//! the snapping engine needs to size its pixel tolerance.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::plane::SketchPlane;

/// Position in screen pixels (origin top-left, y down)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenCoords(pub Vec2);

impl ScreenCoords {
    /// Create screen coordinates
    pub fn new(x: f32, y: f32) -> Self {
        Self(Vec2::new(x, y))
    }
}

/// Projection between the screen and a sketch plane
pub trait Viewport {
    /// Resolve a screen position to plane coordinates
    ///
    /// Returns `None` when no point is available, e.g. the view direction is
    /// parallel to the plane.
    fn pt_on_plane(&self, screen: ScreenCoords, plane: &SketchPlane) -> Option<Vec2>;

    /// Project a world position to the screen
    fn screen_coords(&self, world: Vec3) -> Option<ScreenCoords>;

    /// Whether this view has no real screen
    ///
    /// Headless views take pixel tolerances as world distances.
    fn is_headless(&self) -> bool {
        false
    }
}

/// Viewport for scripted and test use
///
/// Screen coordinates are plane coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessViewport;

impl Viewport for HeadlessViewport {
    fn pt_on_plane(&self, screen: ScreenCoords, _plane: &SketchPlane) -> Option<Vec2> {
        Some(screen.0)
    }

    fn screen_coords(&self, world: Vec3) -> Option<ScreenCoords> {
        Some(ScreenCoords(world.truncate()))
    }

    fn is_headless(&self) -> bool {
        true
    }
}

/// Viewport backed by camera matrices
#[derive(Debug, Clone, Copy)]
pub struct CameraViewport {
    view: Mat4,
    projection: Mat4,
    size: Vec2,
}

impl CameraViewport {
    /// Create a viewport from view and projection matrices and its pixel size
    pub fn new(view: Mat4, projection: Mat4, width: f32, height: f32) -> Self {
        Self {
            view,
            projection,
            size: Vec2::new(width.max(1.0), height.max(1.0)),
        }
    }

    /// Update the pixel size after a resize
    pub fn set_size(&mut self, width: f32, height: f32) {
        self.size = Vec2::new(width.max(1.0), height.max(1.0));
    }

    /// Combined view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Convert screen coordinates to a world ray (origin, direction)
    pub fn screen_to_ray(&self, screen: ScreenCoords) -> (Vec3, Vec3) {
        let ndc_x = (2.0 * screen.0.x / self.size.x) - 1.0;
        let ndc_y = 1.0 - (2.0 * screen.0.y / self.size.y);

        let inv_view_proj = self.view_projection().inverse();

        // glam projections map depth to [0, 1]
        let near = inv_view_proj * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
        let far = inv_view_proj * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        let near = near.truncate() / near.w;
        let far = far.truncate() / far.w;

        (near, (far - near).normalize_or_zero())
    }
}

impl Viewport for CameraViewport {
    fn pt_on_plane(&self, screen: ScreenCoords, plane: &SketchPlane) -> Option<Vec2> {
        let (origin, direction) = self.screen_to_ray(screen);
        if direction == Vec3::ZERO {
            return None;
        }
        plane
            .intersect_ray(origin, direction)
            .map(|hit| plane.to_2d(hit))
    }

    fn screen_coords(&self, world: Vec3) -> Option<ScreenCoords> {
        let clip = self.view_projection() * world.extend(1.0);
        if clip.w.abs() < f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(ScreenCoords::new(
            (ndc.x + 1.0) * 0.5 * self.size.x,
            (1.0 - ndc.y) * 0.5 * self.size.y,
        ))
    }
}
