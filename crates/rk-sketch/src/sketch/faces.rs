//! Face extraction
//!
//! Faces are rebuilt from scratch on every commit. Each directed edge is
//! walked with the tightest-left-turn rule until the walk returns to its
//! start node; loops with positive signed area are bounded faces, the
//! complementary negative loops are discarded. Bridges and dangling trees
//! are left out of the walk but stay in the edge set.

use std::collections::{HashMap, HashSet};

use glam::Vec2;
use tracing::{debug, warn};

use crate::kernel::{Curve, GeometryKernel, KernelResult, Region, signed_area};

use super::edges::{ArcRole, Edge, EdgeId, EdgeKind};
use super::nodes::NodeStore;

/// Signed loop area below which a loop is not a face
const EPS_FACE_AREA: f32 = 1e-6;

/// One edge of a face loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceEdge {
    /// Index into the committed edges at the time the face was built
    pub edge: usize,
    /// Traversed from `node_b` to `node_a`
    pub reversed: bool,
}

/// Bounded region of the sketch
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// Loop edges in traversal order
    pub edges: Vec<FaceEdge>,
    /// Node at the start of each loop edge
    pub nodes: Vec<usize>,
    /// Outer boundary curves with arc halves merged
    pub wire: Vec<Curve>,
    /// Outer ring plus hole rings
    pub region: Region,
    /// Area enclosed by the outer boundary
    pub area: f32,
    /// Area with holes subtracted
    pub net_area: f32,
    /// Smallest face containing this one
    pub parent: Option<usize>,
    /// Faces nested directly inside this one
    pub holes: Vec<usize>,
    /// Number of ancestors
    pub depth: u32,
}

impl Face {
    /// Closed outer boundary, first point repeated
    pub fn boundary(&self) -> &[Vec2] {
        &self.region.outer
    }

    /// Whether the face is not nested in another
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Picking priority; nested faces win over their ancestors
    pub fn selection_priority(&self) -> u32 {
        self.depth + 1
    }

    /// Whether the loop runs along the committed edge at `idx`
    pub fn uses_edge(&self, idx: usize) -> bool {
        self.edges.iter().any(|fe| fe.edge == idx)
    }
}

#[derive(Debug, Clone, Copy)]
struct Adjacent {
    to: usize,
    edge: usize,
}

/// Adjacency lists keyed by node index, plus the nodes any edge references
fn build_adjacency(node_count: usize, edges: &[Edge]) -> (Vec<Vec<Adjacent>>, Vec<bool>) {
    let mut adjacency = vec![Vec::new(); node_count];
    let mut used = vec![false; node_count];
    let mut straight_pairs = HashSet::new();

    for (idx, edge) in edges.iter().enumerate() {
        let Some(b) = edge.node_b else {
            continue;
        };
        let a = edge.node_a;
        if a >= node_count || b >= node_count {
            warn!("Edge {} references a missing node", edge.id);
            continue;
        }
        used[a] = true;
        used[b] = true;
        if let Some(m) = edge.node_mid.filter(|m| *m < node_count) {
            used[m] = true;
        }
        if a == b {
            continue;
        }
        // Duplicate straight edges are the same physical edge
        if edge.kind == EdgeKind::Straight && !straight_pairs.insert((a.min(b), a.max(b))) {
            continue;
        }
        adjacency[a].push(Adjacent { to: b, edge: idx });
        adjacency[b].push(Adjacent { to: a, edge: idx });
    }
    (adjacency, used)
}

/// Flags edges whose removal disconnects the graph
fn find_bridges(adjacency: &[Vec<Adjacent>], edge_count: usize) -> Vec<bool> {
    const UNVISITED: usize = usize::MAX;
    let n = adjacency.len();
    let mut disc = vec![UNVISITED; n];
    let mut low = vec![0; n];
    let mut bridge = vec![false; edge_count];
    let mut timer = 0;

    for root in 0..n {
        if disc[root] != UNVISITED || adjacency[root].is_empty() {
            continue;
        }
        disc[root] = timer;
        low[root] = timer;
        timer += 1;
        // (node, edge used to reach it, next neighbour to visit)
        let mut stack: Vec<(usize, Option<usize>, usize)> = vec![(root, None, 0)];

        while let Some(top) = stack.last_mut() {
            let (node, via) = (top.0, top.1);
            if let Some(adj) = adjacency[node].get(top.2).copied() {
                top.2 += 1;
                if Some(adj.edge) == via {
                    continue;
                }
                if disc[adj.to] == UNVISITED {
                    disc[adj.to] = timer;
                    low[adj.to] = timer;
                    timer += 1;
                    stack.push((adj.to, Some(adj.edge), 0));
                } else {
                    low[node] = low[node].min(disc[adj.to]);
                }
            } else {
                stack.pop();
                if let Some(parent) = stack.last() {
                    let p = parent.0;
                    low[p] = low[p].min(low[node]);
                    if low[node] > disc[p] {
                        if let Some(e) = via {
                            bridge[e] = true;
                        }
                    }
                }
            }
        }
    }
    bridge
}

/// Signed rotation from `outgoing` to `incoming`; the minimum is the tightest left turn
fn turn_angle(outgoing: Vec2, incoming: Vec2) -> f32 {
    outgoing.perp_dot(incoming).atan2(outgoing.dot(incoming))
}

struct Tracer<'a> {
    nodes: &'a NodeStore,
    edges: &'a [Edge],
    adjacency: &'a [Vec<Adjacent>],
    bridge: &'a [bool],
    max_steps: usize,
}

impl Tracer<'_> {
    fn pos(&self, idx: usize) -> Vec2 {
        self.nodes[idx].pos
    }

    /// Walk from `start` along `first`; `None` on a dead end
    fn trace(&self, start: usize, first: Adjacent) -> Option<(Vec<FaceEdge>, Vec<usize>)> {
        let mut loop_edges = Vec::new();
        let mut loop_nodes = vec![start];
        let mut prev = start;
        let mut curr = first.to;
        let mut edge = first.edge;

        for _ in 0..self.max_steps {
            loop_edges.push(FaceEdge {
                edge,
                reversed: self.edges[edge].node_a != prev,
            });
            if curr == start {
                return Some((loop_edges, loop_nodes));
            }
            loop_nodes.push(curr);

            let incoming = (self.pos(curr) - self.pos(prev)).normalize_or_zero();
            let next = self.adjacency[curr]
                .iter()
                .filter(|adj| adj.edge != edge && !self.bridge[adj.edge])
                .map(|adj| {
                    let outgoing = (self.pos(adj.to) - self.pos(curr)).normalize_or_zero();
                    (adj, turn_angle(outgoing, incoming))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1));
            let (adj, _) = next?;

            prev = curr;
            curr = adj.to;
            edge = adj.edge;
        }
        warn!("Face trace from node {} did not close", start);
        None
    }

    fn loop_signed_area(&self, loop_nodes: &[usize]) -> f32 {
        let ring: Vec<Vec2> = loop_nodes.iter().map(|&n| self.pos(n)).collect();
        signed_area(&ring)
    }
}

/// Trace all bounded faces of the committed edge set
///
/// Nodes not referenced by any committed edge are flagged deleted. Faces are
/// returned in trace order, without nesting information.
pub fn extract_faces(
    nodes: &mut NodeStore,
    edges: &[Edge],
    kernel: &dyn GeometryKernel,
) -> Vec<Face> {
    let (adjacency, used) = build_adjacency(nodes.len(), edges);
    let bridge = find_bridges(&adjacency, edges.len());

    let mut faces = Vec::new();
    {
        let tracer = Tracer {
            nodes: &*nodes,
            edges,
            adjacency: &adjacency,
            bridge: &bridge,
            max_steps: edges.len() * 2 + 1,
        };
        let arcs = arc_definitions(edges);
        let mut traced: HashSet<FaceEdge> = HashSet::new();

        for (start, neighbours) in adjacency.iter().enumerate() {
            for &first in neighbours {
                if bridge[first.edge] {
                    continue;
                }
                let key = FaceEdge {
                    edge: first.edge,
                    reversed: edges[first.edge].node_a != start,
                };
                if traced.contains(&key) {
                    continue;
                }
                let Some((loop_edges, loop_nodes)) = tracer.trace(start, first) else {
                    continue;
                };
                if loop_edges.len() < 3 || loop_edges.iter().any(|fe| traced.contains(fe)) {
                    continue;
                }
                if tracer.loop_signed_area(&loop_nodes) <= EPS_FACE_AREA {
                    continue;
                }
                traced.extend(loop_edges.iter().copied());

                match build_face(&tracer, &arcs, kernel, loop_edges, loop_nodes) {
                    Ok(face) => faces.push(face),
                    Err(e) => warn!("Dropping face starting at node {}: {}", start, e),
                }
            }
        }
    }

    nodes.retain_used(&used);
    debug!(
        "Extracted {} faces from {} edges ({} bridges)",
        faces.len(),
        edges.len(),
        bridge.iter().filter(|b| **b).count()
    );
    faces
}

/// Start, arc node and end of every arc, keyed by curve identity
fn arc_definitions(edges: &[Edge]) -> HashMap<EdgeId, [Option<usize>; 3]> {
    let mut arcs: HashMap<EdgeId, [Option<usize>; 3]> = HashMap::new();
    for edge in edges {
        if let EdgeKind::Arc { role } = edge.kind {
            let def = arcs.entry(edge.id).or_default();
            match role {
                ArcRole::First => {
                    def[0] = Some(edge.node_a);
                    def[1] = edge.node_b;
                }
                ArcRole::Second => {
                    def[1] = Some(edge.node_a);
                    def[2] = edge.node_b;
                }
            }
        }
    }
    arcs
}

/// Curve of one loop edge in traversal direction
struct LoopPart {
    curve_id: Option<EdgeId>,
    start: usize,
    end: usize,
    curve: Curve,
}

fn build_face(
    tracer: &Tracer<'_>,
    arcs: &HashMap<EdgeId, [Option<usize>; 3]>,
    kernel: &dyn GeometryKernel,
    loop_edges: Vec<FaceEdge>,
    loop_nodes: Vec<usize>,
) -> KernelResult<Face> {
    let mut parts = Vec::with_capacity(loop_edges.len());
    for fe in &loop_edges {
        let edge = &tracer.edges[fe.edge];
        let (start, end) = match (fe.reversed, edge.node_b) {
            (false, Some(b)) => (edge.node_a, b),
            (true, Some(b)) => (b, edge.node_a),
            (_, None) => continue,
        };
        let curve = match edge.kind {
            EdgeKind::Straight => kernel.make_line(tracer.pos(start), tracer.pos(end))?,
            EdgeKind::Arc { role } => {
                arc_part_curve(tracer, arcs.get(&edge.id), role, fe.reversed, kernel)
                    .unwrap_or_else(|| Curve::Line {
                        a: tracer.pos(start),
                        b: tracer.pos(end),
                    })
            }
        };
        parts.push(LoopPart {
            curve_id: edge.curve_id(),
            start,
            end,
            curve,
        });
    }

    let wire = merge_arc_parts(tracer, kernel, parts)?;
    let region = kernel.make_region(&wire)?;
    let area = kernel.area(&region);
    Ok(Face {
        edges: loop_edges,
        nodes: loop_nodes,
        wire,
        region,
        area,
        net_area: area,
        parent: None,
        holes: Vec::new(),
        depth: 0,
    })
}

/// Sub-arc of a full arc for one half, in traversal direction
fn arc_part_curve(
    tracer: &Tracer<'_>,
    def: Option<&[Option<usize>; 3]>,
    role: ArcRole,
    reversed: bool,
    kernel: &dyn GeometryKernel,
) -> Option<Curve> {
    let [a, m, c] = *def?;
    let (a, m, c) = (tracer.pos(a?), tracer.pos(m?), tracer.pos(c?));
    let Curve::Arc(full) = kernel.make_arc(a, m, c).ok()? else {
        return None;
    };
    let t_mid = full.param_of(m);
    let half = match role {
        ArcRole::First => full.sub_arc(0.0, t_mid),
        ArcRole::Second => full.sub_arc(t_mid, 1.0),
    };
    Some(Curve::Arc(if reversed { half.reversed() } else { half }))
}

/// Join consecutive halves of the same arc back into one arc
fn merge_arc_parts(
    tracer: &Tracer<'_>,
    kernel: &dyn GeometryKernel,
    mut parts: Vec<LoopPart>,
) -> KernelResult<Vec<Curve>> {
    let wraps = match (parts.first(), parts.last()) {
        (Some(first), Some(last)) => {
            parts.len() > 2 && first.curve_id.is_some() && first.curve_id == last.curve_id
        }
        _ => false,
    };
    if wraps {
        parts.rotate_right(1);
    }

    let mut wire = Vec::with_capacity(parts.len());
    let mut i = 0;
    while i < parts.len() {
        let part = &parts[i];
        match parts.get(i + 1) {
            Some(next) if part.curve_id.is_some() && part.curve_id == next.curve_id => {
                wire.push(kernel.make_arc(
                    tracer.pos(part.start),
                    tracer.pos(part.end),
                    tracer.pos(next.end),
                )?);
                i += 2;
            }
            _ => {
                wire.push(part.curve);
                i += 1;
            }
        }
    }
    Ok(wire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::PolylineKernel;
    use approx::assert_relative_eq;

    fn graph(points: &[(f32, f32)], pairs: &[(usize, usize)]) -> (NodeStore, Vec<Edge>) {
        let mut nodes = NodeStore::new();
        for (x, y) in points {
            nodes.add_new_node(Vec2::new(*x, *y), false);
        }
        let edges = pairs
            .iter()
            .map(|(a, b)| Edge::straight(*a, *b, None))
            .collect();
        (nodes, edges)
    }

    #[test]
    fn test_square_gives_one_face() {
        let (mut nodes, edges) = graph(
            &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)],
            &[(0, 1), (1, 2), (2, 3), (3, 0)],
        );
        let faces = extract_faces(&mut nodes, &edges, &PolylineKernel::new());
        assert_eq!(faces.len(), 1);
        assert_relative_eq!(faces[0].area, 100.0);
        assert_eq!(faces[0].boundary().len(), 5);
        assert!(signed_area(faces[0].boundary()) > 0.0);
    }

    #[test]
    fn test_open_triangle_gives_no_face() {
        let (mut nodes, edges) = graph(
            &[(0.0, 0.0), (10.0, 0.0), (5.0, 8.0), (0.5, 0.5)],
            &[(0, 1), (1, 2), (2, 3)],
        );
        let faces = extract_faces(&mut nodes, &edges, &PolylineKernel::new());
        assert!(faces.is_empty());
    }

    #[test]
    fn test_diagonal_splits_square() {
        let (mut nodes, edges) = graph(
            &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)],
            &[(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)],
        );
        let faces = extract_faces(&mut nodes, &edges, &PolylineKernel::new());
        assert_eq!(faces.len(), 2);
        for face in &faces {
            assert_relative_eq!(face.area, 50.0);
            assert_eq!(face.edges.len(), 3);
        }
    }

    #[test]
    fn test_bridges_are_detected() {
        // Two triangles joined by one edge
        let (nodes, edges) = graph(
            &[
                (0.0, 0.0),
                (1.0, 0.0),
                (0.0, 1.0),
                (5.0, 0.0),
                (6.0, 0.0),
                (5.0, 1.0),
            ],
            &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3), (1, 3)],
        );
        let (adjacency, _) = build_adjacency(nodes.len(), &edges);
        let bridge = find_bridges(&adjacency, edges.len());
        assert_eq!(bridge, vec![false, false, false, false, false, false, true]);
    }

    #[test]
    fn test_unreferenced_nodes_are_deleted() {
        let (mut nodes, edges) = graph(
            &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (42.0, 42.0)],
            &[(0, 1), (1, 2)],
        );
        extract_faces(&mut nodes, &edges, &PolylineKernel::new());
        assert!(!nodes[0].deleted);
        assert!(!nodes[2].deleted);
        assert!(nodes[3].deleted);
    }

    #[test]
    fn test_duplicate_edge_is_one_physical_edge() {
        let (mut nodes, edges) = graph(
            &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)],
            &[(0, 1), (1, 2), (2, 0), (1, 0)],
        );
        let faces = extract_faces(&mut nodes, &edges, &PolylineKernel::new());
        assert_eq!(faces.len(), 1);
        assert_relative_eq!(faces[0].area, 50.0);
    }

    #[test]
    fn test_half_disc_from_arc_and_chord() {
        let mut nodes = NodeStore::new();
        let a = nodes.add_new_node(Vec2::new(10.0, 0.0), false);
        let m = nodes.add_new_node(Vec2::new(0.0, 10.0), false);
        let c = nodes.add_new_node(Vec2::new(-10.0, 0.0), false);
        let id = EdgeId::new();
        let edges = vec![
            Edge::arc_part(id, ArcRole::First, a, m, None),
            Edge::arc_part(id, ArcRole::Second, m, c, None),
            Edge::straight(c, a, None),
        ];
        let kernel = PolylineKernel::new().with_arc_step_degrees(1.0);
        let faces = extract_faces(&mut nodes, &edges, &kernel);
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].wire.len(), 2);
        assert!(faces[0].wire.iter().any(|c| matches!(c, Curve::Arc(_))));
        assert_relative_eq!(faces[0].area, std::f32::consts::PI * 50.0, epsilon = 0.5);
    }
}
