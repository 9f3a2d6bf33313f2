//! Sketch editing
//!
//! A [`Sketch`] owns the node store, the topology store, the snapping state
//! and the faces derived from them for one working plane. Interactive calls
//! (`add_sketch_pt`, `sketch_pt_move`, `finalize_elm`, `cancel_elm`) never
//! fail: rejected input is logged and ignored. The programmatic API used for
//! replay and editing commands returns [`SketchResult`].

mod data;
mod edges;
mod faces;
mod holes;
mod nodes;
mod shapes;
mod snap;

use std::fmt;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SketchSettings;
use crate::error::{SketchError, SketchResult};
use crate::kernel::{
    Curve, GeometryKernel, PointClass, classify_point, default_kernel, distance_to_segment,
};
use crate::plane::SketchPlane;
use crate::viewport::{ScreenCoords, Viewport};

pub use data::{ArcRecord, EdgeRecord, SketchData};
pub use edges::{ArcRole, Edge, EdgeId, EdgeKind, EdgeStore};
pub use faces::{Face, FaceEdge, extract_faces};
pub use holes::resolve_nesting;
pub use nodes::{EPS_POS, Node, NodeStore};
pub use shapes::{
    SlotPoints, circle_stencil, mirror_point, rectangle_corners, slot_points, square_corners,
};
pub use snap::{AxisGuide, SnapBox, SnapEngine, SnapIndicators, SnapKind, SnapResult};

/// Tool that interprets placed points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SketchTool {
    /// No drawing
    #[default]
    Select,
    /// Single segment
    Line,
    /// Chain of segments, ended by clicking an existing node or finalizing
    MultiLine,
    /// Arc from start, end, then a point on the arc
    Arc,
    /// Square from its center and the midpoint of a side
    Square,
    /// Axis-aligned rectangle from two opposite corners
    Rectangle,
    /// Circle from its center and a rim point
    Circle,
    /// Slot from two centers and a radius point
    Slot,
    /// Two points defining the mirror axis
    OperationAxis,
}

/// How many segments a tool collects before it completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Linestring {
    Single,
    Two,
    Multiple,
}

impl SketchTool {
    fn linestring(self) -> Option<Linestring> {
        match self {
            SketchTool::Line
            | SketchTool::Square
            | SketchTool::Rectangle
            | SketchTool::Circle
            | SketchTool::OperationAxis => Some(Linestring::Single),
            SketchTool::Slot => Some(Linestring::Two),
            SketchTool::MultiLine => Some(Linestring::Multiple),
            SketchTool::Select | SketchTool::Arc => None,
        }
    }
}

/// Shape of the primitive being drawn, for display
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preview {
    /// Curves as they would be committed
    pub curves: Vec<Curve>,
    /// Length of the segment under construction, in dimension units
    pub length: Option<f32>,
}

/// A planar sketch
pub struct Sketch {
    name: String,
    plane: SketchPlane,
    visible: bool,
    settings: SketchSettings,
    kernel: Box<dyn GeometryKernel>,
    nodes: NodeStore,
    edges: EdgeStore,
    snap: SnapEngine,
    faces: Vec<Face>,
    tool: SketchTool,
    arc_pts: Vec<usize>,
    last_pt: Option<Vec2>,
    preview: Option<Preview>,
    operation_axis: Option<(Vec2, Vec2)>,
    originating_boundary: Vec<Curve>,
}

impl fmt::Debug for Sketch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sketch")
            .field("name", &self.name)
            .field("kernel", &self.kernel.name())
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("faces", &self.faces.len())
            .field("tool", &self.tool)
            .finish()
    }
}

impl Sketch {
    /// Create an empty sketch
    pub fn new(name: impl Into<String>, plane: SketchPlane, settings: SketchSettings) -> Self {
        Self {
            name: name.into(),
            plane,
            visible: true,
            settings,
            kernel: default_kernel(&settings),
            nodes: NodeStore::new(),
            edges: EdgeStore::new(),
            snap: SnapEngine::new(settings.snap),
            faces: Vec::new(),
            tool: SketchTool::default(),
            arc_pts: Vec::new(),
            last_pt: None,
            preview: None,
            operation_axis: None,
            originating_boundary: Vec::new(),
        }
    }

    /// Create a sketch started on an existing face
    ///
    /// The face boundary (in this sketch's plane coordinates) provides
    /// outside snap points.
    pub fn on_face(
        name: impl Into<String>,
        plane: SketchPlane,
        settings: SketchSettings,
        boundary: Vec<Curve>,
    ) -> Self {
        let mut sketch = Self::new(name, plane, settings);
        sketch.originating_boundary = boundary;
        sketch.add_boundary_snap_points();
        sketch
    }

    /// Use a different geometry kernel
    pub fn with_kernel(mut self, kernel: Box<dyn GeometryKernel>) -> Self {
        self.kernel = kernel;
        self.update_faces();
        self
    }

    // ============== Accessors ==============

    /// Sketch name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the sketch
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Working plane
    pub fn plane(&self) -> &SketchPlane {
        &self.plane
    }

    /// Whether the sketch is shown
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Show or hide the sketch
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Current settings
    pub fn settings(&self) -> &SketchSettings {
        &self.settings
    }

    /// Replace the settings; the kernel is kept
    pub fn set_settings(&mut self, settings: SketchSettings) {
        self.settings = settings;
        self.snap.set_settings(settings.snap);
    }

    /// Geometry kernel in use
    pub fn kernel(&self) -> &dyn GeometryKernel {
        self.kernel.as_ref()
    }

    /// Node store
    pub fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    /// Committed edges
    pub fn edges(&self) -> &[Edge] {
        self.edges.committed()
    }

    /// Edges of the primitive being drawn
    pub fn tmp_edges(&self) -> &[Edge] {
        self.edges.tmp()
    }

    /// Faces from the last rebuild, largest first
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Active tool
    pub fn tool(&self) -> SketchTool {
        self.tool
    }

    /// Current snap annotations
    pub fn snap_indicators(&self) -> &SnapIndicators {
        self.snap.indicators()
    }

    /// Outside reference points used for snapping
    pub fn outside_snap_points(&self) -> &[Vec2] {
        self.snap.outside_points()
    }

    /// Preview of the primitive being drawn
    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    /// Mirror axis, if defined
    pub fn operation_axis(&self) -> Option<(Vec2, Vec2)> {
        self.operation_axis
    }

    /// Forget the mirror axis
    pub fn clear_operation_axis(&mut self) {
        self.operation_axis = None;
    }

    /// Boundary of the face this sketch was started on
    pub fn originating_boundary(&self) -> &[Curve] {
        &self.originating_boundary
    }

    /// Curve of the committed edge at `idx`
    ///
    /// Arc sub-edges yield their part of the arc.
    pub fn edge_curve(&self, idx: usize) -> Option<Curve> {
        let edge = self.edges.committed().get(idx)?;
        let a = self.nodes.get(edge.node_a)?.pos;
        let b = self.nodes.get(edge.node_b?)?.pos;
        match edge.kind {
            EdgeKind::Straight => self.kernel.make_line(a, b).ok(),
            EdgeKind::Arc { role } => {
                let [s, m, e] = self.edges.arc_nodes(edge.id)?;
                let (s, m, e) = (self.nodes[s].pos, self.nodes[m].pos, self.nodes[e].pos);
                let Curve::Arc(full) = self.kernel.make_arc(s, m, e).ok()? else {
                    return None;
                };
                let t = full.param_of(m);
                let part = match role {
                    ArcRole::First => full.sub_arc(0.0, t),
                    ArcRole::Second => full.sub_arc(t, 1.0),
                };
                Some(Curve::Arc(part))
            }
        }
    }

    // ============== Interactive editing ==============

    /// Switch tool, abandoning any primitive in progress
    pub fn set_tool(&mut self, tool: SketchTool) {
        self.cancel_elm();
        self.tool = tool;
    }

    /// Place a point with the active tool
    pub fn add_sketch_pt(&mut self, viewport: &dyn Viewport, screen: ScreenCoords) {
        match (self.tool, self.tool.linestring()) {
            (SketchTool::Arc, _) => self.add_arc_pt(viewport, screen),
            (_, Some(kind)) => self.add_line_string_pt(viewport, screen, kind),
            (_, None) => {}
        }
    }

    /// Update the snap state and preview for a hovering cursor
    pub fn sketch_pt_move(&mut self, viewport: &dyn Viewport, screen: ScreenCoords) {
        let Some(snap) = self.resolve_point(viewport, screen) else {
            return;
        };
        self.last_pt = Some(snap.point);
        self.preview = self.build_preview(snap.point);
    }

    /// Complete the primitive in progress
    pub fn finalize_elm(&mut self) {
        self.preview = None;
        match self.tool {
            SketchTool::Line | SketchTool::MultiLine => self.finalize_edges(),
            SketchTool::Square => self.finalize_square(),
            SketchTool::Rectangle => self.finalize_rectangle(),
            SketchTool::Circle => self.finalize_circle(),
            SketchTool::Slot => self.finalize_slot(),
            SketchTool::OperationAxis => self.finalize_operation_axis(),
            SketchTool::Arc | SketchTool::Select => {}
        }
    }

    /// Abort the primitive in progress
    ///
    /// Returns whether anything was in progress.
    pub fn cancel_elm(&mut self) -> bool {
        let had_edges = self.edges.clear_tmp();
        let had_arc = !self.arc_pts.is_empty();
        self.arc_pts.clear();
        self.last_pt = None;
        self.preview = None;
        self.snap.hide();
        self.nodes.cancel();
        had_edges || had_arc
    }

    /// End the current segment at `length` along the previewed direction
    pub fn enter_edge_length(&mut self, length: f32) -> SketchResult<()> {
        if length.is_nan() || length <= EPS_POS {
            return Err(SketchError::InvalidLength(length));
        }
        let kind = self
            .tool
            .linestring()
            .ok_or(SketchError::NoSegmentInProgress)?;
        let start = self
            .pending_start()
            .ok_or(SketchError::NoSegmentInProgress)?;
        let a = self.nodes[start].pos;
        let dir = self
            .last_pt
            .and_then(|p| (p - a).try_normalize())
            .ok_or_else(|| SketchError::Degenerate("no direction for the segment".into()))?;
        let end = a + dir * length;
        if !self.accepts_end(a, end) {
            return Err(SketchError::Degenerate(format!(
                "{} cannot end at {}",
                self.tool_name(),
                end
            )));
        }

        self.last_pt = Some(end);
        let idx = self.nodes.get_node_exact(end);
        self.place_line_string_node(idx, kind, false);
        Ok(())
    }

    /// Toggle the length annotation of the straight edge under the cursor
    ///
    /// Returns whether an edge was found.
    pub fn toggle_edge_dim(&mut self, viewport: &dyn Viewport, screen: ScreenCoords) -> bool {
        let Some(pt) = viewport.pt_on_plane(screen, &self.plane) else {
            return false;
        };
        let radius = self.snap.radius(&self.plane, viewport, pt);
        match self.edge_near(pt, radius, true) {
            Some(id) => self.toggle_edge_dim_by_id(id).is_ok(),
            None => false,
        }
    }

    /// Toggle the length annotation of a straight edge
    ///
    /// Returns whether the annotation is now shown.
    pub fn toggle_edge_dim_by_id(&mut self, id: EdgeId) -> SketchResult<bool> {
        let idx = self
            .edges
            .committed()
            .iter()
            .position(|e| e.id == id && e.kind == EdgeKind::Straight)
            .ok_or(SketchError::EdgeNotFound(id))?;
        let edge = self.edges.committed()[idx];
        let b = edge.node_b.ok_or(SketchError::EdgeNotFound(id))?;
        let dim = match edge.dim {
            Some(_) => None,
            None => Some(self.edge_dimension(edge.node_a, b)),
        };
        if let Some(e) = self.edges.get_mut(idx) {
            e.dim = dim;
        }
        Ok(dim.is_some())
    }

    /// Edge under the cursor, straight or arc
    pub fn pick_edge(&self, viewport: &dyn Viewport, screen: ScreenCoords) -> Option<EdgeId> {
        let pt = viewport.pt_on_plane(screen, &self.plane)?;
        let radius = self.snap.radius(&self.plane, viewport, pt);
        self.edge_near(pt, radius, false)
    }

    /// Face under the cursor; nested faces win over their ancestors
    pub fn pick_face(&self, viewport: &dyn Viewport, screen: ScreenCoords) -> Option<usize> {
        let pt = viewport.pt_on_plane(screen, &self.plane)?;
        self.face_at(pt)
    }

    /// Face containing `pt`; nested faces win over their ancestors
    pub fn face_at(&self, pt: Vec2) -> Option<usize> {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| classify_point(pt, f.boundary(), 0.0) == PointClass::Inside)
            .max_by_key(|(_, f)| f.selection_priority())
            .map(|(idx, _)| idx)
    }

    // ============== Programmatic editing ==============

    /// Add a straight edge between two points and rebuild faces
    ///
    /// Any primitive in progress is abandoned.
    pub fn add_edge(&mut self, a: Vec2, b: Vec2, show_dim: bool) -> SketchResult<EdgeId> {
        self.cancel_elm();
        let id = self.insert_straight(a, b, show_dim)?;
        self.commit_ids(&[id]);
        Ok(id)
    }

    /// Add an arc from `start` through `through` to `end` and rebuild faces
    ///
    /// Any primitive in progress is abandoned.
    pub fn add_arc(&mut self, start: Vec2, through: Vec2, end: Vec2) -> SketchResult<EdgeId> {
        self.cancel_elm();
        let id = self.insert_arc(start, through, end)?;
        self.commit_ids(&[id]);
        Ok(id)
    }

    /// Remove an edge (both records of an arc) and rebuild faces
    pub fn remove_edge(&mut self, id: EdgeId) -> SketchResult<()> {
        let removed = self.edges.remove(id);
        if removed == 0 {
            return Err(SketchError::EdgeNotFound(id));
        }
        info!("Removed edge {} ({} records)", id, removed);
        self.update_faces();
        Ok(())
    }

    /// Add mirrored copies of the given edges about the operation axis
    ///
    /// Any primitive in progress is abandoned.
    pub fn mirror_edges(&mut self, ids: &[EdgeId]) -> SketchResult<Vec<EdgeId>> {
        let (p1, p2) = self.operation_axis.ok_or(SketchError::NoOperationAxis)?;
        if ids.is_empty() {
            return Err(SketchError::NothingSelected);
        }
        self.cancel_elm();

        let mut sources: Vec<(EdgeId, Vec<Vec2>)> = Vec::new();
        for &id in ids {
            if sources.iter().any(|(known, _)| *known == id) {
                continue;
            }
            let points = match self.edges.arc_nodes(id) {
                Some(arc) => arc.to_vec(),
                None => {
                    let edge = self
                        .edges
                        .by_id(id)
                        .next()
                        .ok_or(SketchError::EdgeNotFound(id))?;
                    let b = edge.node_b.ok_or(SketchError::EdgeNotFound(id))?;
                    vec![edge.node_a, b]
                }
            };
            let mirrored = points
                .iter()
                .map(|&n| mirror_point(p1, p2, self.nodes[n].pos))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| SketchError::Degenerate("operation axis has no length".into()))?;
            sources.push((id, mirrored));
        }

        let created = self.insert_all(|sketch, created| {
            for (_, pts) in &sources {
                let id = match pts.as_slice() {
                    [a, b] => sketch.insert_straight(*a, *b, false)?,
                    [s, m, e] => sketch.insert_arc(*s, *m, *e)?,
                    _ => continue,
                };
                created.push(id);
            }
            Ok(())
        })?;
        info!("Mirrored {} edges", created.len());
        self.commit_ids(&created);
        Ok(created)
    }

    /// Rebuild all faces from the committed edges
    ///
    /// A primitive in progress keeps its nodes and its rollback point.
    pub fn update_faces(&mut self) {
        let drawing = !self.edges.tmp().is_empty() || !self.arc_pts.is_empty();
        if !drawing {
            self.nodes.finalize();
        }
        let faces = extract_faces(&mut self.nodes, self.edges.committed(), self.kernel.as_ref());
        if drawing {
            self.keep_primitive_nodes();
        }
        self.faces = resolve_nesting(
            faces,
            self.kernel.as_ref(),
            self.settings.containment_tolerance,
        );
        debug!(
            "Sketch '{}': {} faces from {} edges",
            self.name,
            self.faces.len(),
            self.edges.len()
        );
    }

    /// Undo the deleted flag on nodes the primitive in progress refers to
    fn keep_primitive_nodes(&mut self) {
        let referenced: Vec<usize> = self
            .edges
            .tmp()
            .iter()
            .flat_map(|e| [Some(e.node_a), e.node_b, e.node_mid])
            .flatten()
            .chain(self.arc_pts.iter().copied())
            .collect();
        for idx in referenced {
            if let Some(node) = self.nodes.get_mut(idx) {
                node.deleted = false;
            }
        }
    }

    // ============== Cross-sketch snapping ==============

    /// Live node positions in world space, for other sketches to snap to
    pub fn snap_points(&self) -> Vec<Vec3> {
        self.nodes
            .live()
            .map(|(_, n)| self.plane.to_3d(n.pos))
            .collect()
    }

    /// Add one outside snap point given in world space
    pub fn add_outside_snap_point(&mut self, world: Vec3) {
        self.snap.add_outside_point(self.plane.to_2d(world));
    }

    /// Rebuild outside snap points from the originating face and other visible sketches
    pub fn refresh_outside_snap_points(&mut self, others: &[&Sketch]) {
        self.snap.clear_outside();
        self.add_boundary_snap_points();
        for other in others.iter().filter(|s| s.is_visible()) {
            for p in other.snap_points() {
                self.add_outside_snap_point(p);
            }
        }
    }

    fn add_boundary_snap_points(&mut self) {
        let Some(first) = self.originating_boundary.first().map(Curve::start) else {
            return;
        };
        for curve in &self.originating_boundary {
            self.snap.add_outside_point(curve.start());
            self.snap
                .add_outside_point(self.kernel.evaluate(curve, 0.5));
            if curve.end().distance(first) > EPS_POS {
                self.snap.add_outside_point(curve.end());
            }
        }
    }

    // ============== Replay ==============

    /// Serializable view of the committed geometry
    pub fn to_data(&self) -> SketchData {
        let edges = self
            .edges
            .committed()
            .iter()
            .filter(|e| e.kind == EdgeKind::Straight)
            .filter_map(|e| {
                let b = e.node_b?;
                Some(EdgeRecord(
                    self.nodes[e.node_a].pos,
                    self.nodes[b].pos,
                    e.dim.is_some(),
                ))
            })
            .collect();
        let arc_edges = self
            .edges
            .ids()
            .into_iter()
            .filter_map(|id| self.edges.arc_nodes(id))
            .map(|nodes| ArcRecord(nodes.map(|n| self.nodes[n].pos)))
            .collect();
        SketchData {
            name: self.name.clone(),
            plane: self.plane,
            edges,
            arc_edges,
            originating_boundary: self.originating_boundary.clone(),
        }
    }

    /// Rebuild a sketch by replaying its edges and arcs
    pub fn from_data(data: SketchData, settings: SketchSettings) -> SketchResult<Self> {
        let mut sketch = Self::on_face(data.name, data.plane, settings, data.originating_boundary);
        for EdgeRecord(a, b, show_dim) in data.edges {
            sketch.insert_straight(a, b, show_dim)?;
        }
        for ArcRecord([s, m, e]) in data.arc_edges {
            sketch.insert_arc(s, m, e)?;
        }
        sketch.update_faces();
        info!(
            "Loaded sketch '{}' with {} edges",
            sketch.name,
            sketch.edges.len()
        );
        Ok(sketch)
    }

    // ============== Internals ==============

    fn tool_name(&self) -> String {
        format!("{:?}", self.tool)
    }

    fn resolve_point(&mut self, viewport: &dyn Viewport, screen: ScreenCoords) -> Option<SnapResult> {
        let Some(pt) = viewport.pt_on_plane(screen, &self.plane) else {
            debug!("No point on plane '{}' at {:?}", self.name, screen);
            return None;
        };
        let radius = self.snap.radius(&self.plane, viewport, pt);
        Some(self.snap.resolve(&self.nodes, radius, pt, &[]))
    }

    /// Start node of the in-progress edge that still needs its end
    fn pending_start(&self) -> Option<usize> {
        self.edges
            .tmp()
            .last()
            .filter(|e| e.node_b.is_none())
            .map(|e| e.node_a)
    }

    fn accepts_end(&self, a: Vec2, b: Vec2) -> bool {
        if a.distance(b) <= EPS_POS {
            return false;
        }
        match self.tool {
            SketchTool::Rectangle => (a.x - b.x).abs() > EPS_POS && (a.y - b.y).abs() > EPS_POS,
            _ => true,
        }
    }

    fn edge_dimension(&self, a: usize, b: usize) -> f32 {
        self.nodes[a].pos.distance(self.nodes[b].pos) / self.settings.dimension_scale
    }

    fn add_line_string_pt(&mut self, viewport: &dyn Viewport, screen: ScreenCoords, kind: Linestring) {
        let Some(snap) = self.resolve_point(viewport, screen) else {
            return;
        };
        let pt = snap.point;
        if let Some(start) = self.pending_start() {
            if !self.accepts_end(self.nodes[start].pos, pt) {
                debug!("{} rejected point {}", self.tool_name(), pt);
                return;
            }
        }

        self.last_pt = Some(pt);
        let idx = match snap.node() {
            Some(idx) => idx,
            None => self.nodes.add_new_node(pt, false),
        };
        self.place_line_string_node(idx, kind, snap.node().is_some());
    }

    fn place_line_string_node(&mut self, idx: usize, kind: Linestring, on_existing: bool) {
        if self.pending_start().is_some() {
            self.set_tmp_end(idx);
            let done = match kind {
                Linestring::Single => true,
                Linestring::Two => self.edges.tmp().len() >= 2,
                Linestring::Multiple => on_existing,
            };
            if done {
                self.finalize_elm();
                return;
            }
        }
        self.edges.tmp_mut().push(Edge::open(idx));
    }

    fn set_tmp_end(&mut self, idx: usize) {
        let Some(edge) = self.edges.tmp_mut().last_mut() else {
            return;
        };
        let mid = (self.nodes[edge.node_a].pos + self.nodes[idx].pos) * 0.5;
        edge.node_b = Some(idx);
        edge.node_mid = Some(self.nodes.add_new_node(mid, true));
    }

    fn add_arc_pt(&mut self, viewport: &dyn Viewport, screen: ScreenCoords) {
        let Some(snap) = self.resolve_point(viewport, screen) else {
            return;
        };
        let pt = snap.point;
        let placed: Vec<Vec2> = self.arc_pts.iter().map(|&i| self.nodes[i].pos).collect();
        if placed.iter().any(|p| p.distance(pt) <= EPS_POS) {
            debug!("Arc point {} coincides with a placed point", pt);
            return;
        }
        if let [start, end] = placed.as_slice() {
            if let Err(e) = self.kernel.make_arc(*start, pt, *end) {
                debug!("Arc point {} rejected: {}", pt, e);
                return;
            }
        }

        self.last_pt = Some(pt);
        let idx = match snap.node() {
            Some(idx) => idx,
            None => self.nodes.add_new_node(pt, false),
        };
        self.arc_pts.push(idx);
        if self.arc_pts.len() == 3 {
            let (start, end, through) = (self.arc_pts[0], self.arc_pts[1], self.arc_pts[2]);
            match self.push_arc_nodes(start, through, end) {
                Ok(id) => {
                    info!("Added arc {}", id);
                    self.commit_ids(&[id]);
                }
                Err(e) => {
                    debug!("Arc rejected: {}", e);
                    self.cancel_elm();
                }
            }
        }
    }

    fn build_preview(&self, pt: Vec2) -> Option<Preview> {
        if self.tool == SketchTool::Arc {
            let placed: Vec<Vec2> = self.arc_pts.iter().map(|&i| self.nodes[i].pos).collect();
            let curve = match placed.as_slice() {
                [start] => self.kernel.make_line(*start, pt).ok()?,
                [start, end] => self.kernel.make_arc(*start, pt, *end).ok()?,
                _ => return None,
            };
            return Some(Preview {
                curves: vec![curve],
                length: None,
            });
        }

        let a = self.nodes[self.pending_start()?].pos;
        if a.distance(pt) <= EPS_POS {
            return None;
        }
        let line = || -> Vec<Curve> { self.kernel.make_line(a, pt).ok().into_iter().collect() };
        let curves = match self.tool {
            SketchTool::Square => self.polygon_curves(&square_corners(a, pt)),
            SketchTool::Rectangle if self.accepts_end(a, pt) => {
                self.polygon_curves(&rectangle_corners(a, pt))
            }
            SketchTool::Circle => {
                let p = circle_stencil(a, pt);
                [p[2], p[3]]
                    .iter()
                    .filter_map(|through| self.kernel.make_arc(p[0], *through, p[1]).ok())
                    .collect()
            }
            SketchTool::Slot if self.edges.tmp().len() == 2 => {
                let first = self.nodes[self.edges.tmp()[0].node_a].pos;
                match slot_points(first, a, pt) {
                    Some(s) => self.slot_curves(&s),
                    None => line(),
                }
            }
            _ => line(),
        };
        Some(Preview {
            curves,
            length: Some(a.distance(pt) / self.settings.dimension_scale),
        })
    }

    fn polygon_curves(&self, corners: &[Vec2]) -> Vec<Curve> {
        (0..corners.len())
            .filter_map(|i| {
                self.kernel
                    .make_line(corners[i], corners[(i + 1) % corners.len()])
                    .ok()
            })
            .collect()
    }

    fn slot_curves(&self, s: &SlotPoints) -> Vec<Curve> {
        [
            self.kernel.make_line(s.a_top, s.b_top),
            self.kernel.make_line(s.a_bottom, s.b_bottom),
            self.kernel.make_arc(s.a_bottom, s.a_mid, s.a_top),
            self.kernel.make_arc(s.b_bottom, s.b_mid, s.b_top),
        ]
        .into_iter()
        .filter_map(Result::ok)
        .collect()
    }

    /// Start and end of the single-segment primitive in progress
    fn shape_points(&self) -> Option<(Vec2, Vec2)> {
        let edge = self.edges.tmp().last()?;
        let a = self.nodes[edge.node_a].pos;
        let b = edge.node_b.map(|b| self.nodes[b].pos).or(self.last_pt)?;
        (a.distance(b) > EPS_POS).then_some((a, b))
    }

    fn finalize_edges(&mut self) {
        let range = self.edges.commit_tmp();
        if range.is_empty() {
            self.cancel_elm();
            return;
        }
        let ids: Vec<EdgeId> = self.edges.committed()[range].iter().map(|e| e.id).collect();
        info!("Added {} edges", ids.len());
        self.commit_ids(&ids);
    }

    fn finalize_square(&mut self) {
        let Some((center, side_mid)) = self.shape_points() else {
            self.cancel_elm();
            return;
        };
        self.commit_shape("square", |sketch, created| {
            sketch.insert_polygon(&square_corners(center, side_mid), created)
        });
    }

    fn finalize_rectangle(&mut self) {
        let Some((a, b)) = self.shape_points() else {
            self.cancel_elm();
            return;
        };
        if !self.accepts_end(a, b) {
            debug!("Rectangle corners {} and {} are not opposite", a, b);
            return;
        }
        self.commit_shape("rectangle", |sketch, created| {
            sketch.insert_polygon(&rectangle_corners(a, b), created)
        });
    }

    fn finalize_circle(&mut self) {
        let Some((center, rim)) = self.shape_points() else {
            self.cancel_elm();
            return;
        };
        let p = circle_stencil(center, rim);
        self.commit_shape("circle", |sketch, created| {
            created.push(sketch.insert_arc(p[0], p[2], p[1])?);
            created.push(sketch.insert_arc(p[0], p[3], p[1])?);
            Ok(())
        });
    }

    fn finalize_slot(&mut self) {
        let tmp = self.edges.tmp();
        if tmp.len() < 2 {
            self.cancel_elm();
            return;
        }
        let a = self.nodes[tmp[0].node_a].pos;
        let b = self.nodes[tmp[1].node_a].pos;
        let c = tmp[1].node_b.map(|c| self.nodes[c].pos).or(self.last_pt);
        let Some(s) = c.and_then(|c| slot_points(a, b, c)) else {
            debug!("Slot has no radius yet");
            return;
        };
        self.commit_shape("slot", |sketch, created| {
            created.push(sketch.insert_straight(s.a_top, s.b_top, false)?);
            created.push(sketch.insert_straight(s.a_bottom, s.b_bottom, false)?);
            created.push(sketch.insert_arc(s.a_bottom, s.a_mid, s.a_top)?);
            created.push(sketch.insert_arc(s.b_bottom, s.b_mid, s.b_top)?);
            Ok(())
        });
    }

    fn finalize_operation_axis(&mut self) {
        if let Some(axis) = self.shape_points() {
            info!("Operation axis set from {} to {}", axis.0, axis.1);
            self.operation_axis = Some(axis);
        }
        self.cancel_elm();
    }

    /// Replace the in-progress construction points with the shape's edges
    fn commit_shape(
        &mut self,
        shape: &str,
        build: impl FnOnce(&mut Self, &mut Vec<EdgeId>) -> SketchResult<()>,
    ) {
        self.edges.clear_tmp();
        self.nodes.cancel();
        match self.insert_all(build) {
            Ok(ids) => {
                info!("Added {} with {} edges", shape, ids.len());
                self.commit_ids(&ids);
            }
            Err(e) => {
                debug!("Rejected {}: {}", shape, e);
                self.cancel_elm();
            }
        }
    }

    /// Run `build`, removing everything it added if it fails
    fn insert_all(
        &mut self,
        build: impl FnOnce(&mut Self, &mut Vec<EdgeId>) -> SketchResult<()>,
    ) -> SketchResult<Vec<EdgeId>> {
        let mut created = Vec::new();
        if let Err(e) = build(self, &mut created) {
            for id in created {
                self.edges.remove(id);
            }
            self.nodes.cancel();
            return Err(e);
        }
        Ok(created)
    }

    fn insert_polygon(&mut self, corners: &[Vec2], created: &mut Vec<EdgeId>) -> SketchResult<()> {
        for i in 0..corners.len() {
            created.push(self.insert_straight(corners[i], corners[(i + 1) % corners.len()], false)?);
        }
        Ok(())
    }

    /// Add a straight edge without rebuilding faces
    ///
    /// An existing straight edge between the same nodes is reused.
    fn insert_straight(&mut self, a: Vec2, b: Vec2, show_dim: bool) -> SketchResult<EdgeId> {
        if a.distance(b) <= EPS_POS {
            return Err(SketchError::Degenerate(format!("zero-length edge at {a}")));
        }
        let ia = self.nodes.get_node_exact(a);
        let ib = self.nodes.get_node_exact(b);
        let existing = self.edges.committed().iter().find(|e| {
            e.kind == EdgeKind::Straight && e.touches(ia) && e.touches(ib)
        });
        if let Some(edge) = existing {
            return Ok(edge.id);
        }
        Ok(self.push_straight(ia, ib, show_dim))
    }

    fn push_straight(&mut self, a: usize, b: usize, show_dim: bool) -> EdgeId {
        let mid = (self.nodes[a].pos + self.nodes[b].pos) * 0.5;
        let mid = self.nodes.add_new_node(mid, true);
        let mut edge = Edge::straight(a, b, Some(mid));
        edge.dim = show_dim.then(|| self.edge_dimension(a, b));
        self.edges.push(edge);
        edge.id
    }

    /// Add an arc without rebuilding faces
    fn insert_arc(&mut self, start: Vec2, through: Vec2, end: Vec2) -> SketchResult<EdgeId> {
        self.kernel.make_arc(start, through, end)?;
        let s = self.nodes.get_node_exact(start);
        let m = self.nodes.get_node_exact(through);
        let e = self.nodes.get_node_exact(end);
        self.push_arc_nodes(s, m, e)
    }

    fn push_arc_nodes(&mut self, start: usize, through: usize, end: usize) -> SketchResult<EdgeId> {
        let (ps, pm, pe) = (
            self.nodes[start].pos,
            self.nodes[through].pos,
            self.nodes[end].pos,
        );
        let Curve::Arc(arc) = self.kernel.make_arc(ps, pm, pe)? else {
            return Err(SketchError::Degenerate(format!(
                "kernel returned no arc through {ps}, {pm}, {pe}"
            )));
        };
        let t = arc.param_of(pm);
        let mid_first = self.nodes.add_new_node(arc.point_at(t * 0.5), true);
        let mid_second = self.nodes.add_new_node(arc.point_at((1.0 + t) * 0.5), true);

        let id = EdgeId::new();
        self.edges.push(Edge::arc_part(
            id,
            ArcRole::First,
            start,
            through,
            Some(mid_first),
        ));
        self.edges.push(Edge::arc_part(
            id,
            ArcRole::Second,
            through,
            end,
            Some(mid_second),
        ));
        Ok(id)
    }

    /// Split edges at the new edges' endpoints, then rebuild faces
    fn commit_ids(&mut self, ids: &[EdgeId]) {
        let mut endpoints: Vec<usize> = Vec::new();
        for edge in self.edges.committed().iter().filter(|e| ids.contains(&e.id)) {
            for node in [Some(edge.node_a), edge.node_b].into_iter().flatten() {
                if !endpoints.contains(&node) {
                    endpoints.push(node);
                }
            }
        }
        self.split_at_midpoints(&endpoints);

        self.edges.clear_tmp();
        self.arc_pts.clear();
        self.last_pt = None;
        self.preview = None;
        self.snap.hide();
        self.update_faces();
    }

    /// Split every edge whose midpoint node became an endpoint
    fn split_at_midpoints(&mut self, endpoints: &[usize]) {
        for &node in endpoints {
            if !self.nodes.get(node).is_some_and(|n| n.is_midpoint) {
                continue;
            }
            if let Some(owner) = self.edges.owner_of_midpoint(node) {
                let edge = self.edges.committed()[owner];
                match edge.kind {
                    EdgeKind::Straight => self.split_straight(owner, node),
                    EdgeKind::Arc { .. } => self.split_arc(edge.id, node),
                }
                debug!("Split edge {} at node {}", edge.id, node);
            }
            if let Some(n) = self.nodes.get_mut(node) {
                n.is_midpoint = false;
            }
        }
    }

    fn split_straight(&mut self, idx: usize, at: usize) {
        let edge = self.edges.remove_at(idx);
        let Some(b) = edge.node_b else {
            return;
        };
        // Both halves keep a shown annotation
        let show_dim = edge.dim.is_some();
        self.push_straight(edge.node_a, at, show_dim);
        self.push_straight(at, b, show_dim);
    }

    /// Split an arc at a point on it, keeping its arc node
    fn split_arc(&mut self, id: EdgeId, at: usize) {
        let Some([s, m, e]) = self.edges.arc_nodes(id) else {
            return;
        };
        let (ps, pm, pe) = (self.nodes[s].pos, self.nodes[m].pos, self.nodes[e].pos);
        let Ok(Curve::Arc(full)) = self.kernel.make_arc(ps, pm, pe) else {
            return;
        };
        let t_mid = full.param_of(pm);
        let t_at = full.param_of(self.nodes[at].pos);
        let pieces = if t_at < t_mid {
            let through = self.nodes.add_new_node(full.point_at(t_at * 0.5), false);
            [(s, through, at), (at, m, e)]
        } else {
            let through = self
                .nodes
                .add_new_node(full.point_at((t_at + 1.0) * 0.5), false);
            [(s, m, at), (at, through, e)]
        };

        self.edges.remove(id);
        for (start, through, end) in pieces {
            if let Err(err) = self.push_arc_nodes(start, through, end) {
                debug!("Could not split arc {}: {}", id, err);
            }
        }
    }

    fn edge_near(&self, pt: Vec2, radius: f32, straight_only: bool) -> Option<EdgeId> {
        self.edges
            .committed()
            .iter()
            .enumerate()
            .filter(|(_, e)| !straight_only || e.kind == EdgeKind::Straight)
            .filter_map(|(idx, e)| {
                let curve = self.edge_curve(idx)?;
                let points = self.kernel.flatten(&curve);
                let d = points
                    .windows(2)
                    .map(|w| distance_to_segment(pt, w[0], w[1]))
                    .fold(f32::INFINITY, f32::min);
                (d <= radius).then_some((e.id, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}
