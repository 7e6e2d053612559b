//! Cross-encoder fence dependencies and their transitive reduction.

use fxhash::FxHashMap;
use smallvec::SmallVec;

/// A single "encoder A must wait for encoder B to reach this point" edge.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FenceDependency {
    pub signal_encoder: u32,
    pub wait_encoder: u32,
}

/// The full set of cross-encoder dependencies collected while walking usage history, prior to
/// transitive reduction and fence assignment.
#[derive(Default)]
pub struct DependencyTable {
    edges: FxHashMap<u32, SmallVec<[u32; 4]>>,
}

impl DependencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers that `wait_encoder` must wait for `signal_encoder`. A no-op if `signal_encoder`
    /// and `wait_encoder` are the same (intra-encoder ordering needs no fence).
    pub fn add(&mut self, dependency: FenceDependency) {
        if dependency.signal_encoder == dependency.wait_encoder {
            return;
        }
        let waiters = self.edges.entry(dependency.signal_encoder).or_default();
        if !waiters.contains(&dependency.wait_encoder) {
            waiters.push(dependency.wait_encoder);
        }
    }

    pub fn waiters_of(&self, signal_encoder: u32) -> &[u32] {
        self.edges.get(&signal_encoder).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Whether `wait_encoder` is reachable from `signal_encoder` through some other encoder,
    /// i.e. whether a direct `signal_encoder -> wait_encoder` edge would be redundant.
    fn reachable_through_other(&self, signal_encoder: u32, wait_encoder: u32) -> bool {
        let mut stack: Vec<u32> = self
            .waiters_of(signal_encoder)
            .iter()
            .copied()
            .filter(|&w| w != wait_encoder)
            .collect();
        let mut visited = std::collections::HashSet::new();
        while let Some(node) = stack.pop() {
            if node == wait_encoder {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            stack.extend(self.waiters_of(node).iter().copied());
        }
        false
    }

    /// Drops every direct edge that is implied by a longer chain of other edges, so that only the
    /// minimal set of fences needed to preserve the full ordering is kept.
    pub fn transitive_reduce(&self) -> Vec<FenceDependency> {
        let mut reduced = Vec::new();
        for (&signal_encoder, waiters) in &self.edges {
            for &wait_encoder in waiters {
                if !self.reachable_through_other(signal_encoder, wait_encoder) {
                    reduced.push(FenceDependency { signal_encoder, wait_encoder });
                }
            }
        }
        reduced
    }
}

/// A single "wait_encoder on wait_queue must wait for signal_encoder on signal_queue" edge that
/// crosses queues and so cannot be satisfied by a same-queue fence alone; it needs an explicit
/// signal/wait event pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct CrossQueueDependency {
    pub signal_encoder: u32,
    pub wait_encoder: u32,
    pub signal_queue: u32,
    pub wait_queue: u32,
}

/// Collects cross-queue dependencies as they are discovered, deduplicating repeat edges between
/// the same pair of encoders (multiple resources can share one edge).
#[derive(Default)]
pub struct CrossQueueTable {
    edges: Vec<CrossQueueDependency>,
    seen: std::collections::HashSet<(u32, u32)>,
}

impl CrossQueueTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, dependency: CrossQueueDependency) {
        let key = (dependency.signal_encoder, dependency.wait_encoder);
        if self.seen.insert(key) {
            self.edges.push(dependency);
        }
    }

    pub fn edges(&self) -> &[CrossQueueDependency] {
        &self.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_queue_edges_between_the_same_encoder_pair_are_deduplicated() {
        let mut table = CrossQueueTable::new();
        table.add(CrossQueueDependency { signal_encoder: 0, wait_encoder: 1, signal_queue: 0, wait_queue: 1 });
        table.add(CrossQueueDependency { signal_encoder: 0, wait_encoder: 1, signal_queue: 0, wait_queue: 1 });
        assert_eq!(table.edges().len(), 1);
    }

    #[test]
    fn a_self_dependency_is_dropped() {
        let mut table = DependencyTable::new();
        table.add(FenceDependency { signal_encoder: 1, wait_encoder: 1 });
        assert!(table.waiters_of(1).is_empty());
    }

    #[test]
    fn a_direct_edge_implied_by_a_chain_is_removed_by_reduction() {
        let mut table = DependencyTable::new();
        // 0 -> 1 -> 2, plus a redundant direct 0 -> 2.
        table.add(FenceDependency { signal_encoder: 0, wait_encoder: 1 });
        table.add(FenceDependency { signal_encoder: 1, wait_encoder: 2 });
        table.add(FenceDependency { signal_encoder: 0, wait_encoder: 2 });

        let reduced = table.transitive_reduce();
        assert_eq!(reduced.len(), 2);
        assert!(!reduced.contains(&FenceDependency { signal_encoder: 0, wait_encoder: 2 }));
        assert!(reduced.contains(&FenceDependency { signal_encoder: 0, wait_encoder: 1 }));
        assert!(reduced.contains(&FenceDependency { signal_encoder: 1, wait_encoder: 2 }));
    }

    #[test]
    fn independent_edges_are_both_kept() {
        let mut table = DependencyTable::new();
        table.add(FenceDependency { signal_encoder: 0, wait_encoder: 2 });
        table.add(FenceDependency { signal_encoder: 1, wait_encoder: 2 });
        let reduced = table.transitive_reduce();
        assert_eq!(reduced.len(), 2);
    }
}
