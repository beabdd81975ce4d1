//! Lifetime tree of pipeline buffers.
//!
//! Each node stands for the output buffers of one stage; its children are the
//! stages consuming them. Nodes live in an arena and refer to each other by
//! [`NodeId`]. The execution order is an explicit sequence of ids owned by the
//! tree, defaulting to insertion order.

use crate::{Error, Result};
use std::collections::HashSet;

/// Index of a node in its [`LifetimeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One buffer collection in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Offset assigned by the allocator.
    pub address: Option<usize>,
    /// Footprint in bytes. Zero-sized nodes take no memory.
    pub size: usize,
    /// Identity of the underlying buffer; unique tree-wide.
    pub item: usize,
    /// Result buffer kept until the end of the run.
    pub retained: bool,
    /// Shown in graph dumps.
    pub label: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(size: usize, item: usize, parent: Option<NodeId>) -> Self {
        Self {
            address: None,
            size,
            item,
            retained: false,
            label: None,
            parent,
            children: Vec::new(),
        }
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// `[address, address + size)`, if placed.
    pub fn range(&self) -> Option<(usize, usize)> {
        let start = self.address?;
        Some((start, start.checked_add(self.size)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifetimeTree {
    nodes: Vec<Node>,
    order: Vec<NodeId>,
}

impl LifetimeTree {
    /// Tree with a single root node.
    pub fn new(root_size: usize, root_item: usize) -> Self {
        Self {
            nodes: vec![Node::new(root_size, root_item, None)],
            order: vec![NodeId(0)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a child of `parent`; it is also appended to the order.
    pub fn add_child(&mut self, parent: NodeId, size: usize, item: usize) -> Result<NodeId> {
        if parent.0 >= self.nodes.len() {
            return Err(Error::UnknownNode(parent.0));
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(size, item, Some(parent)));
        self.nodes[parent.0].children.push(id);
        self.order.push(id);
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id).ok_or(Error::UnknownNode(id.0))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(Error::UnknownNode(id.0))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    /// Execution order.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Replace the execution order. Not checked here; see
    /// [`BuffersAllocator::validate`](super::BuffersAllocator::validate).
    pub fn set_order(&mut self, order: Vec<NodeId>) {
        self.order = order;
    }

    /// Clear every assigned address.
    pub fn reset_addresses(&mut self) {
        for node in &mut self.nodes {
            node.address = None;
        }
    }
}

/// Live interval of every node over the execution order.
///
/// A node is live from its own position to the position of its last child,
/// or to the end of the run if it is a leaf or retained. Two nodes conflict
/// (may not share memory) if they are parent and child, siblings, or their
/// live intervals intersect.
#[derive(Debug, Clone)]
pub struct Liveness {
    /// Inclusive `(first, last)` order positions, indexed by node.
    intervals: Vec<(usize, usize)>,
}

impl Liveness {
    /// Fails if the order does not start at the root, misses or repeats a
    /// node, or schedules a node before its parent.
    pub fn analyze(tree: &LifetimeTree) -> std::result::Result<Self, &'static str> {
        let len = tree.nodes.len();
        if tree.order.first() != Some(&tree.root()) {
            return Err("order does not start at the root");
        }
        if tree.order.len() != len {
            return Err("order does not visit every node exactly once");
        }

        let mut position = vec![usize::MAX; len];
        for (pos, id) in tree.order.iter().enumerate() {
            let slot = position
                .get_mut(id.0)
                .ok_or("order refers to a missing node")?;
            if *slot != usize::MAX {
                return Err("order visits a node twice");
            }
            *slot = pos;
        }

        let end = len - 1;
        let mut intervals = Vec::with_capacity(len);
        for (index, node) in tree.nodes.iter().enumerate() {
            let first = position[index];
            if let Some(parent) = node.parent {
                if position[parent.0] >= first {
                    return Err("order schedules a node before its parent");
                }
            }
            let last = if node.retained || node.children.is_empty() {
                end
            } else {
                node.children
                    .iter()
                    .map(|child| position[child.0])
                    .max()
                    .unwrap_or(end)
            };
            intervals.push((first, last));
        }

        Ok(Self { intervals })
    }

    pub fn interval(&self, id: NodeId) -> (usize, usize) {
        self.intervals[id.0]
    }

    pub fn conflicts(&self, tree: &LifetimeTree, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return false;
        }
        let (na, nb) = (&tree.nodes[a.0], &tree.nodes[b.0]);
        if na.parent == Some(b) || nb.parent == Some(a) {
            return true;
        }
        if na.parent.is_some() && na.parent == nb.parent {
            return true;
        }
        let (a_first, a_last) = self.intervals[a.0];
        let (b_first, b_last) = self.intervals[b.0];
        a_first <= b_last && b_first <= a_last
    }
}

/// Items must identify buffers uniquely.
pub(crate) fn items_unique(tree: &LifetimeTree) -> bool {
    let mut seen = HashSet::with_capacity(tree.nodes.len());
    tree.nodes.iter().all(|node| seen.insert(node.item))
}
