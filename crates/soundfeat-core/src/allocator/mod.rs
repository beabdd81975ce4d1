//! Buffer memory allocator.
//!
//! Assigns an offset to every buffer of a pipeline so that buffers which are
//! live at the same time never alias, while buffers with disjoint lifetimes
//! share space. The layout is computed once, before execution, by a pluggable
//! [`PlacementStrategy`], and is always checked by [`BuffersAllocator::validate`]
//! before it is accepted.

mod dump;
mod strategy;
mod tree;

pub use dump::to_dot;
pub use strategy::{FirstFit, PlacementStrategy, Sequential};
pub use tree::{LifetimeTree, Liveness, Node, NodeId};

use crate::{Error, Result};
use std::path::Path;
use tree::items_unique;

/// Outcome of [`BuffersAllocator::solve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    /// Bytes needed to hold every buffer at its assigned offset.
    pub footprint: usize,
    /// Bytes needed without any sharing.
    pub unshared: usize,
    pub strategy: &'static str,
}

impl MemoryLayout {
    /// Bytes saved by sharing.
    pub fn saved(&self) -> usize {
        self.unshared.saturating_sub(self.footprint)
    }
}

#[derive(Debug)]
pub struct BuffersAllocator {
    strategy: Box<dyn PlacementStrategy>,
    limit: Option<usize>,
}

impl Default for BuffersAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BuffersAllocator {
    /// First-fit allocator without a memory limit.
    pub fn new() -> Self {
        Self {
            strategy: Box::new(FirstFit),
            limit: None,
        }
    }

    pub fn with_strategy(mut self, strategy: impl PlacementStrategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn strategy(&self) -> &dyn PlacementStrategy {
        self.strategy.as_ref()
    }

    /// Assign an address to every node of `tree`.
    ///
    /// On failure the tree is left without addresses.
    pub fn solve(&self, tree: &mut LifetimeTree) -> Result<MemoryLayout> {
        let name = self.strategy.name();
        let liveness = Liveness::analyze(tree).map_err(Error::MalformedTree)?;
        if !items_unique(tree) {
            return Err(Error::MalformedTree("two nodes share an item"));
        }

        let addresses = self.strategy.place(tree, &liveness);
        if addresses.len() != tree.len() {
            return Err(Error::InvalidLayout(name));
        }
        let ids: Vec<NodeId> = tree.ids().collect();
        for (id, address) in ids.into_iter().zip(addresses) {
            tree.node_mut(id)?.address = Some(address);
        }

        if !Self::validate(tree) {
            tree.reset_addresses();
            return Err(Error::InvalidLayout(name));
        }

        let footprint = tree
            .iter()
            .filter(|(_, node)| node.size > 0)
            .filter_map(|(_, node)| node.range())
            .map(|(_, end)| end)
            .max()
            .unwrap_or(0);
        let unshared = tree.iter().map(|(_, node)| node.size).sum();

        if let Some(limit) = self.limit {
            if footprint > limit {
                tree.reset_addresses();
                return Err(Error::AllocationExhausted {
                    required: footprint,
                    limit,
                });
            }
        }

        tracing::info!(
            strategy = name,
            nodes = tree.len(),
            footprint,
            unshared,
            "Solved buffer layout"
        );
        Ok(MemoryLayout {
            footprint,
            unshared,
            strategy: name,
        })
    }

    /// Whether the addresses of `tree` form a valid layout.
    ///
    /// True iff the order starts at the root and visits every node once
    /// (parents first), items are unique, every non-empty node has an
    /// address, and no two conflicting non-empty nodes overlap. Never panics.
    pub fn validate(tree: &LifetimeTree) -> bool {
        match check(tree) {
            Ok(()) => true,
            Err(reason) => {
                tracing::debug!(reason, "Buffer layout rejected");
                false
            }
        }
    }

    pub fn nodes_count(tree: &LifetimeTree) -> usize {
        tree.len()
    }

    /// Write `tree` to `path` as a Graphviz DOT file.
    pub fn dump(tree: &LifetimeTree, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, to_dot(tree))?;
        tracing::debug!(path = %path.display(), "Dumped buffer tree");
        Ok(())
    }
}

fn check(tree: &LifetimeTree) -> std::result::Result<(), &'static str> {
    let liveness = Liveness::analyze(tree)?;
    if !items_unique(tree) {
        return Err("two nodes share an item");
    }

    let mut ranges = Vec::with_capacity(tree.len());
    for (id, node) in tree.iter() {
        if node.size == 0 {
            continue;
        }
        let start = node.address.ok_or("node without an address")?;
        let end = start
            .checked_add(node.size)
            .ok_or("node range overflows")?;
        ranges.push((id, start, end));
    }

    for (i, &(a, a_start, a_end)) in ranges.iter().enumerate() {
        for &(b, b_start, b_end) in &ranges[i + 1..] {
            if a_start < b_end && b_start < a_end && liveness.conflicts(tree, a, b) {
                return Err("live buffers overlap");
            }
        }
    }
    Ok(())
}
