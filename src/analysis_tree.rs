// Analysis tree over bughouse positions: a flat id-keyed node arena rather than an
// object graph, so the whole tree stays trivially cloneable and variation promotion
// or truncation can never create reference cycles.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::position::BughousePositionSnapshot;
use crate::rules::BughouseHalfMove;


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(u32);

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AnalysisNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    // `None` only at the root.
    pub half_move: Option<BughouseHalfMove>,
    // Snapshot *after* applying `half_move` (the initial snapshot at the root).
    pub position: BughousePositionSnapshot,
    // Insertion order, stable for display.
    pub children: Vec<NodeId>,
    // Must be an element of `children` when set. Defines "the line" vs. variations.
    pub main_child: Option<NodeId>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TreeError {
    UnknownNode,
    RootForbidden,
}

/// One cursor step forward. More than one child means the caller has to present a
/// branch choice instead of silently following the mainline.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ForwardStep {
    Next(NodeId),
    Branch(Vec<NodeId>),
    End,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AnalysisTree {
    root: NodeId,
    nodes: HashMap<NodeId, AnalysisNode>,
    next_id: u32,
}

impl AnalysisTree {
    pub fn new(position: BughousePositionSnapshot) -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, AnalysisNode {
            id: root,
            parent: None,
            half_move: None,
            position,
            children: Vec::new(),
            main_child: None,
        });
        AnalysisTree { root, nodes, next_id: 1 }
    }

    pub fn root(&self) -> NodeId { self.root }
    pub fn get(&self, id: NodeId) -> Option<&AnalysisNode> { self.nodes.get(&id) }
    pub fn len(&self) -> usize { self.nodes.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    // Node ids handed out by this tree stay valid until truncated; a miss is a bug in
    // the caller's bookkeeping, not recoverable input.
    fn node(&self, id: NodeId) -> &AnalysisNode {
        self.nodes.get(&id).expect("node id not present in tree")
    }

    /// Attaches `half_move` as a child of `cursor`. Idempotent by move key: re-entering
    /// a move that already exists at this cursor returns the existing child instead of
    /// duplicating it. The first child ever added becomes the node's `main_child`.
    pub fn insert(
        &mut self, cursor: NodeId, half_move: BughouseHalfMove,
        position: BughousePositionSnapshot,
    ) -> Result<NodeId, TreeError> {
        let parent = self.nodes.get(&cursor).ok_or(TreeError::UnknownNode)?;
        let existing = parent.children.iter().copied().find(|&child| {
            self.node(child)
                .half_move
                .as_ref()
                .is_some_and(|m| m.key == half_move.key)
        });
        if let Some(child) = existing {
            return Ok(child);
        }

        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, AnalysisNode {
            id,
            parent: Some(cursor),
            half_move: Some(half_move),
            position,
            children: Vec::new(),
            main_child: None,
        });
        let parent = self.nodes.get_mut(&cursor).unwrap();
        parent.children.push(id);
        if parent.main_child.is_none() {
            parent.main_child = Some(id);
        }
        Ok(id)
    }

    /// Promotes the variation containing `id` by one level: the nearest ancestor that is
    /// not its own parent's main child becomes the main child, demoting the previous
    /// mainline continuation to a sibling variation. Only `main_child` pointers change.
    /// A node already on the global mainline is left untouched.
    pub fn promote_variation_one_level(&mut self, id: NodeId) -> Result<(), TreeError> {
        if !self.nodes.contains_key(&id) {
            return Err(TreeError::UnknownNode);
        }
        if let Some(head) = self.variation_head_of(id) {
            let parent = self.node(head).parent.unwrap();
            self.nodes.get_mut(&parent).unwrap().main_child = Some(head);
        }
        Ok(())
    }

    /// Deletes all descendants of `id`, keeping the node itself. Truncating after the
    /// root is guarded as a no-op: the root has no incoming move to preserve a prefix of.
    pub fn truncate_after(&mut self, id: NodeId) -> Result<(), TreeError> {
        if !self.nodes.contains_key(&id) {
            return Err(TreeError::UnknownNode);
        }
        if id == self.root {
            return Ok(());
        }
        for child in self.node(id).children.clone() {
            self.remove_subtree(child);
        }
        let node = self.nodes.get_mut(&id).unwrap();
        node.children.clear();
        node.main_child = None;
        Ok(())
    }

    /// Deletes `id` and all its descendants and unlinks it from its parent. The root
    /// cannot be removed.
    pub fn truncate_from_inclusive(&mut self, id: NodeId) -> Result<(), TreeError> {
        if !self.nodes.contains_key(&id) {
            return Err(TreeError::UnknownNode);
        }
        if id == self.root {
            return Err(TreeError::RootForbidden);
        }
        let parent_id = self.node(id).parent.unwrap();
        let parent = self.nodes.get_mut(&parent_id).unwrap();
        parent.children.retain(|&child| child != id);
        if parent.main_child == Some(id) {
            parent.main_child = None;
        }
        self.remove_subtree(id);
        Ok(())
    }

    fn remove_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.nodes.remove(&current).expect("subtree node must exist");
            stack.extend(node.children);
        }
    }

    /// The nearest ancestor-or-self of `id` that is not its own parent's main child.
    /// `None` iff `id` lies entirely on the global mainline.
    pub fn variation_head_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            if self.node(parent).main_child != Some(current) {
                return Some(current);
            }
            current = parent;
        }
        None
    }

    pub fn is_mainline(&self, id: NodeId) -> bool {
        self.variation_head_of(id).is_none()
    }

    /// Mainline nodes in order, starting at the root.
    pub fn mainline(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut next = Some(self.root);
        std::iter::from_fn(move || {
            let current = next?;
            next = self.node(current).main_child;
            Some(current)
        })
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> { self.node(id).parent }

    pub fn forward_of(&self, id: NodeId) -> ForwardStep {
        let node = self.node(id);
        match node.children.len() {
            0 => ForwardStep::End,
            1 => ForwardStep::Next(node.children[0]),
            _ => ForwardStep::Branch(node.children.clone()),
        }
    }

    /// Follows `main_child` links from `id` to the end of that line.
    pub fn end_of_line(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(next) = self.node(current).main_child {
            current = next;
        }
        current
    }
}
