//! Planar Sketch Graph and Face Extraction
//!
//! This crate provides:
//! - A node store with rollback for interactive drawing
//! - Snapping to nodes, outside reference points and axis guides
//! - An edge store where arcs are split into two sub-edges at the arc node
//! - Face extraction by minimal loop tracing, with bridges left out
//! - Hole and nesting resolution across extracted faces
//! - An abstract geometry kernel with a polyline implementation

pub mod config;
pub mod error;
pub mod kernel;
pub mod plane;
pub mod sketch;
pub mod viewport;

// Re-exports for convenience
pub use config::{SketchSettings, SnapSettings};
pub use error::{ConfigError, SketchError, SketchResult};
pub use kernel::{
    CircleArc, Curve, GeometryKernel, KernelError, KernelResult, PolylineKernel, Region,
    default_kernel,
};
pub use plane::SketchPlane;
pub use sketch::{
    ArcRole, Edge, EdgeId, EdgeKind, Face, FaceEdge, Node, NodeStore, Preview, Sketch,
    SketchData, SketchTool, SnapIndicators, SnapKind, SnapResult,
};
pub use viewport::{CameraViewport, HeadlessViewport, ScreenCoords, Viewport};
