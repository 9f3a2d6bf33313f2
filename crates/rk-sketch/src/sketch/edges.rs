//! Topology store
//!
//! Edges connect node indices. An arc is stored as two sub-edges that share
//! one [`EdgeId`] (the curve identity) and meet at the arc node.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle of a user-visible edge
///
/// Both sub-edges of an arc carry the same handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(Uuid);

impl EdgeId {
    /// Create a fresh handle
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which half of an arc a sub-edge is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArcRole {
    /// From the arc start to the arc node
    First,
    /// From the arc node to the arc end
    Second,
}

/// Edge payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Straight,
    Arc { role: ArcRole },
}

/// Directed edge between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Handle shared by every record of the same user-visible edge
    pub id: EdgeId,
    pub node_a: usize,
    /// Unset while the edge is being drawn
    pub node_b: Option<usize>,
    /// Midpoint node used for snapping
    pub node_mid: Option<usize>,
    pub kind: EdgeKind,
    /// Length annotation shown for this edge
    pub dim: Option<f32>,
}

impl Edge {
    /// Straight edge whose end is not placed yet
    pub fn open(node_a: usize) -> Self {
        Self {
            id: EdgeId::new(),
            node_a,
            node_b: None,
            node_mid: None,
            kind: EdgeKind::Straight,
            dim: None,
        }
    }

    /// Straight edge between two nodes
    pub fn straight(node_a: usize, node_b: usize, node_mid: Option<usize>) -> Self {
        Self {
            node_b: Some(node_b),
            node_mid,
            ..Self::open(node_a)
        }
    }

    /// One half of an arc
    pub fn arc_part(
        id: EdgeId,
        role: ArcRole,
        node_a: usize,
        node_b: usize,
        node_mid: Option<usize>,
    ) -> Self {
        Self {
            id,
            node_a,
            node_b: Some(node_b),
            node_mid,
            kind: EdgeKind::Arc { role },
            dim: None,
        }
    }

    /// Whether this record is an arc sub-edge
    pub fn is_arc(&self) -> bool {
        matches!(self.kind, EdgeKind::Arc { .. })
    }

    /// Curve identity for arc sub-edges
    pub fn curve_id(&self) -> Option<EdgeId> {
        self.is_arc().then_some(self.id)
    }

    /// Whether both ends are placed
    pub fn is_complete(&self) -> bool {
        self.node_b.is_some()
    }

    /// Whether `node` is one of the ends
    pub fn touches(&self, node: usize) -> bool {
        self.node_a == node || self.node_b == Some(node)
    }
}

/// Committed and in-progress edges of a sketch
#[derive(Debug, Clone, Default)]
pub struct EdgeStore {
    committed: Vec<Edge>,
    tmp: Vec<Edge>,
}

impl EdgeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed edges
    pub fn committed(&self) -> &[Edge] {
        &self.committed
    }

    /// In-progress edges
    pub fn tmp(&self) -> &[Edge] {
        &self.tmp
    }

    pub(crate) fn tmp_mut(&mut self) -> &mut Vec<Edge> {
        &mut self.tmp
    }

    /// Add a committed edge
    pub fn push(&mut self, edge: Edge) {
        self.committed.push(edge);
    }

    /// Drop all in-progress edges; returns whether there were any
    pub fn clear_tmp(&mut self) -> bool {
        let had_any = !self.tmp.is_empty();
        self.tmp.clear();
        had_any
    }

    /// Move completed in-progress edges into the committed set
    ///
    /// A trailing edge without an end is discarded. Returns the committed
    /// indices of the moved edges.
    pub fn commit_tmp(&mut self) -> std::ops::Range<usize> {
        let start = self.committed.len();
        self.committed
            .extend(self.tmp.drain(..).filter(Edge::is_complete));
        start..self.committed.len()
    }

    /// Remove every record with the given handle; returns how many were removed
    pub fn remove(&mut self, id: EdgeId) -> usize {
        let before = self.committed.len();
        self.committed.retain(|e| e.id != id);
        before - self.committed.len()
    }

    /// Remove the record at `idx`
    pub(crate) fn remove_at(&mut self, idx: usize) -> Edge {
        self.committed.remove(idx)
    }

    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<&mut Edge> {
        self.committed.get_mut(idx)
    }

    /// Records with the given handle
    pub fn by_id(&self, id: EdgeId) -> impl Iterator<Item = &Edge> {
        self.committed.iter().filter(move |e| e.id == id)
    }

    /// Start, arc node and end of the arc with the given handle
    pub fn arc_nodes(&self, id: EdgeId) -> Option<[usize; 3]> {
        let mut first = None;
        let mut second = None;
        for edge in self.by_id(id) {
            match edge.kind {
                EdgeKind::Arc {
                    role: ArcRole::First,
                } => first = Some(edge),
                EdgeKind::Arc {
                    role: ArcRole::Second,
                } => second = Some(edge),
                EdgeKind::Straight => {}
            }
        }
        let (first, second) = (first?, second?);
        Some([first.node_a, first.node_b?, second.node_b?])
    }

    /// Index of the committed edge owning `node` as its midpoint
    pub fn owner_of_midpoint(&self, node: usize) -> Option<usize> {
        self.committed
            .iter()
            .position(|e| e.node_mid == Some(node) && !e.touches(node))
    }

    /// Handles in first-appearance order, each once
    pub fn ids(&self) -> Vec<EdgeId> {
        let mut ids: Vec<EdgeId> = Vec::new();
        for edge in &self.committed {
            if !ids.contains(&edge.id) {
                ids.push(edge.id);
            }
        }
        ids
    }

    /// Number of committed records
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    /// Whether there are no committed records
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_drops_unfinished_tail() {
        let mut store = EdgeStore::new();
        store.tmp_mut().push(Edge::straight(0, 1, Some(2)));
        store.tmp_mut().push(Edge::open(1));
        let range = store.commit_tmp();
        assert_eq!(range, 0..1);
        assert_eq!(store.len(), 1);
        assert!(store.tmp().is_empty());
    }

    #[test]
    fn test_remove_arc_removes_both_parts() {
        let mut store = EdgeStore::new();
        let line = Edge::straight(0, 1, None);
        store.push(line);
        let id = EdgeId::new();
        store.push(Edge::arc_part(id, ArcRole::First, 1, 2, None));
        store.push(Edge::arc_part(id, ArcRole::Second, 2, 0, None));
        assert_eq!(store.arc_nodes(id), Some([1, 2, 0]));
        assert_eq!(store.ids().len(), 2);

        assert_eq!(store.remove(id), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.remove(id), 0);
        assert_eq!(store.committed()[0].id, line.id);
    }

    #[test]
    fn test_clear_tmp_reports_content() {
        let mut store = EdgeStore::new();
        assert!(!store.clear_tmp());
        store.tmp_mut().push(Edge::open(0));
        assert!(store.clear_tmp());
    }

    #[test]
    fn test_owner_of_midpoint() {
        let mut store = EdgeStore::new();
        store.push(Edge::straight(0, 1, Some(2)));
        assert_eq!(store.owner_of_midpoint(2), Some(0));
        assert_eq!(store.owner_of_midpoint(1), None);
    }
}
