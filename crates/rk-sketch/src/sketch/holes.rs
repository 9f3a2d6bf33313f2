//! Hole and nesting resolution
//!
//! Every face whose outer boundary lies inside another face becomes a hole of
//! the smallest such face. Parents get the reversed hole rings as inner
//! boundaries and every face gets its nesting depth.

use tracing::debug;

use crate::kernel::GeometryKernel;

use super::faces::Face;

/// Sort faces by area (largest first) and assign parents, holes and depths
///
/// Parent and hole indices refer to the returned order.
pub fn resolve_nesting(
    mut faces: Vec<Face>,
    kernel: &dyn GeometryKernel,
    tolerance: f32,
) -> Vec<Face> {
    faces.sort_by(|a, b| b.area.total_cmp(&a.area));

    for j in 1..faces.len() {
        let mut parent: Option<usize> = None;
        for i in 0..j {
            if faces[i].area < faces[j].area {
                continue;
            }
            if !kernel.contains(&faces[i].region, &faces[j].region, tolerance) {
                continue;
            }
            let smaller = parent.is_none_or(|p| faces[i].area <= faces[p].area);
            if smaller {
                parent = Some(i);
            }
        }
        faces[j].parent = parent;
    }

    for j in 0..faces.len() {
        if let Some(p) = faces[j].parent {
            faces[p].holes.push(j);
            faces[j].depth = faces[p].depth + 1;
        }
    }

    for p in 0..faces.len() {
        if faces[p].holes.is_empty() {
            continue;
        }
        let rings = faces[p]
            .holes
            .iter()
            .map(|&h| faces[h].region.outer.iter().rev().copied().collect())
            .collect();
        faces[p].region = faces[p].region.with_holes(rings);
        faces[p].net_area = kernel.area(&faces[p].region);
    }

    debug!(
        "Resolved nesting: {} faces, {} nested",
        faces.len(),
        faces.iter().filter(|f| f.parent.is_some()).count()
    );
    faces
}
