//! Placement strategies.

use super::tree::{LifetimeTree, Liveness, NodeId};
use std::fmt;

/// Assigns an offset to every node of a tree.
///
/// Implementations only need to produce a layout; the allocator validates it
/// afterwards and rejects it if any two conflicting nodes overlap.
pub trait PlacementStrategy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Offsets indexed by node, one per node of `tree`.
    fn place(&self, tree: &LifetimeTree, liveness: &Liveness) -> Vec<usize>;
}

/// Chain-ordered first fit.
///
/// Walks the execution order and puts each node at the lowest offset that
/// does not overlap any already placed node it conflicts with.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstFit;

impl PlacementStrategy for FirstFit {
    fn name(&self) -> &'static str {
        "first-fit"
    }

    fn place(&self, tree: &LifetimeTree, liveness: &Liveness) -> Vec<usize> {
        let mut addresses = vec![0; tree.len()];
        let mut placed: Vec<(NodeId, usize, usize)> = Vec::with_capacity(tree.len());

        for &id in tree.order() {
            let size = tree.get(id).map_or(0, |node| node.size);
            if size == 0 {
                continue;
            }

            let busy: Vec<(usize, usize)> = placed
                .iter()
                .filter(|(other, _, _)| liveness.conflicts(tree, id, *other))
                .map(|&(_, start, end)| (start, end))
                .collect();

            let mut candidates: Vec<usize> = busy.iter().map(|&(_, end)| end).collect();
            candidates.push(0);
            candidates.sort_unstable();
            candidates.dedup();

            let address = candidates
                .into_iter()
                .find(|&start| {
                    let end = start + size;
                    busy.iter().all(|&(s, e)| end <= s || e <= start)
                })
                // The end of the highest busy range always fits.
                .unwrap_or_else(|| busy.iter().map(|&(_, e)| e).max().unwrap_or(0));

            tracing::trace!(node = id.index(), size, address, "Placed buffer");
            addresses[id.index()] = address;
            placed.push((id, address, address + size));
        }

        addresses
    }
}

/// No reuse: every node gets its own range, in execution order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl PlacementStrategy for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn place(&self, tree: &LifetimeTree, _liveness: &Liveness) -> Vec<usize> {
        let mut addresses = vec![0; tree.len()];
        let mut next = 0;
        for &id in tree.order() {
            let size = tree.get(id).map_or(0, |node| node.size);
            if size > 0 {
                addresses[id.index()] = next;
                next += size;
            }
        }
        addresses
    }
}
