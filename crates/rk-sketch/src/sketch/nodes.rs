//! Node store
//!
//! Nodes live in an append-only arena. Indices stay valid for the lifetime of
//! the sketch; unused nodes are flagged `deleted` instead of being removed.
//! A watermark taken by [`NodeStore::finalize`] lets an aborted interaction
//! drop the nodes it created.

use std::ops::Index;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Distance under which two positions are the same node
pub const EPS_POS: f32 = 1e-4;

/// A point of the sketch graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Position in plane coordinates
    pub pos: Vec2,
    /// Created as the midpoint of an edge; used for snapping only
    pub is_midpoint: bool,
    /// No longer referenced by any committed edge
    pub deleted: bool,
}

impl Node {
    /// Create a live node
    pub fn new(pos: Vec2, is_midpoint: bool) -> Self {
        Self {
            pos,
            is_midpoint,
            deleted: false,
        }
    }
}

/// Arena of sketch nodes with a rollback watermark
#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    nodes: Vec<Node>,
    watermark: usize,
}

impl NodeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node without looking for duplicates
    pub fn add_new_node(&mut self, pos: Vec2, is_midpoint: bool) -> usize {
        self.nodes.push(Node::new(pos, is_midpoint));
        self.nodes.len() - 1
    }

    /// Index of a node at exactly `pos`, if any
    ///
    /// A live node wins over deleted ones at the same position.
    pub fn find_exact(&self, pos: Vec2) -> Option<usize> {
        let mut deleted = None;
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.pos.distance_squared(pos) > EPS_POS * EPS_POS {
                continue;
            }
            if !node.deleted {
                return Some(idx);
            }
            deleted.get_or_insert(idx);
        }
        deleted
    }

    /// Return the node at `pos`, creating it if needed
    ///
    /// A deleted node found at `pos` is revived.
    pub fn get_node_exact(&mut self, pos: Vec2) -> usize {
        match self.find_exact(pos) {
            Some(idx) => {
                self.nodes[idx].deleted = false;
                idx
            }
            None => self.add_new_node(pos, false),
        }
    }

    /// Take the current size as the rollback point
    pub fn finalize(&mut self) {
        self.watermark = self.nodes.len();
    }

    /// Drop every node created since the last [`finalize`](Self::finalize)
    pub fn cancel(&mut self) {
        self.nodes.truncate(self.watermark);
    }

    /// Get a node by index
    pub fn get(&self, idx: usize) -> Option<&Node> {
        self.nodes.get(idx)
    }

    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<&mut Node> {
        self.nodes.get_mut(idx)
    }

    /// Number of nodes, deleted ones included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all nodes
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Iterate over nodes that are not deleted, with their indices
    pub fn live(&self) -> impl Iterator<Item = (usize, &Node)> {
        self.nodes.iter().enumerate().filter(|(_, n)| !n.deleted)
    }

    /// Flag every node not marked in `used` as deleted
    pub(crate) fn retain_used(&mut self, used: &[bool]) {
        for (idx, node) in self.nodes.iter_mut().enumerate() {
            node.deleted = !used.get(idx).copied().unwrap_or(false);
        }
    }
}

impl Index<usize> for NodeStore {
    type Output = Node;

    fn index(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_new_node_never_dedups() {
        let mut nodes = NodeStore::new();
        let a = nodes.add_new_node(Vec2::new(1.0, 2.0), false);
        let b = nodes.add_new_node(Vec2::new(1.0, 2.0), true);
        assert_ne!(a, b);
        assert_eq!(nodes.len(), 2);
        assert!(nodes[b].is_midpoint);
    }

    #[test]
    fn test_get_node_exact_reuses() {
        let mut nodes = NodeStore::new();
        let a = nodes.get_node_exact(Vec2::new(3.0, 4.0));
        let b = nodes.get_node_exact(Vec2::new(3.0, 4.0));
        let c = nodes.get_node_exact(Vec2::new(3.0, 4.1));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cancel_rolls_back_to_watermark() {
        let mut nodes = NodeStore::new();
        nodes.add_new_node(Vec2::ZERO, false);
        nodes.finalize();
        nodes.add_new_node(Vec2::X, false);
        nodes.add_new_node(Vec2::Y, true);
        assert_eq!(nodes.len(), 3);
        nodes.cancel();
        assert_eq!(nodes.len(), 1);
        // Cancelling twice is harmless
        nodes.cancel();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_retain_used_and_revive() {
        let mut nodes = NodeStore::new();
        let a = nodes.add_new_node(Vec2::ZERO, false);
        let b = nodes.add_new_node(Vec2::X, false);
        nodes.retain_used(&[true, false]);
        assert!(!nodes[a].deleted);
        assert!(nodes[b].deleted);
        assert_eq!(nodes.live().count(), 1);

        assert_eq!(nodes.get_node_exact(Vec2::X), b);
        assert!(!nodes[b].deleted);
    }

    #[test]
    fn test_live_node_wins_over_deleted() {
        let mut nodes = NodeStore::new();
        let old = nodes.add_new_node(Vec2::X, false);
        nodes.retain_used(&[false]);
        let fresh = nodes.add_new_node(Vec2::X, false);
        assert_eq!(nodes.find_exact(Vec2::X), Some(fresh));
        assert_eq!(nodes.get_node_exact(Vec2::X), fresh);
        assert!(nodes[old].deleted);
    }
}
