//! Geometry kernel abstraction

mod polyline;
mod traits;

pub use polyline::{PointClass, PolylineKernel, classify_point, distance_to_segment, signed_area};
pub use traits::{CircleArc, Curve, GeometryKernel, KernelError, KernelResult, Region};

use crate::config::SketchSettings;

/// Get the default geometry kernel for the given settings
pub fn default_kernel(settings: &SketchSettings) -> Box<dyn GeometryKernel> {
    Box::new(
        PolylineKernel::new()
            .with_arc_step_degrees(settings.arc_step_degrees)
            .with_join_tolerance(settings.containment_tolerance),
    )
}
