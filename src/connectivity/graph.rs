//! Chamber adjacency graph

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::features::{FeatureId, FeatureRegistry};

/// Main chambers as nodes; passages joining two main chambers as edges.
///
/// Derived from the registry on demand and never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectivityGraph {
    adjacency: BTreeMap<FeatureId, BTreeSet<FeatureId>>,
}

impl ConnectivityGraph {
    pub fn build(registry: &FeatureRegistry) -> Self {
        let mut graph = Self::default();
        for chamber in registry.main_chambers() {
            graph.adjacency.entry(chamber.id).or_default();
        }
        for passage in registry.passages() {
            if let (Some(a), Some(b)) = (passage.from, passage.to) {
                if graph.contains(a) && graph.contains(b) {
                    graph.add_edge(a, b);
                }
            }
        }
        graph
    }

    pub fn contains(&self, node: FeatureId) -> bool {
        self.adjacency.contains_key(&node)
    }

    /// Add an undirected edge. Self-loops and unknown nodes are ignored.
    pub fn add_edge(&mut self, a: FeatureId, b: FeatureId) {
        if a == b || !self.contains(a) || !self.contains(b) {
            return;
        }
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(|n| n.len()).sum::<usize>() / 2
    }

    pub fn neighbors(&self, node: FeatureId) -> impl Iterator<Item = FeatureId> + '_ {
        self.adjacency.get(&node).into_iter().flatten().copied()
    }

    /// Connected components by flood fill, seeded from unvisited nodes in
    /// ascending ID order. Components come back in discovery order with
    /// their members sorted.
    pub fn components(&self) -> Vec<Vec<FeatureId>> {
        let mut visited = BTreeSet::new();
        let mut components = Vec::new();
        for &start in self.adjacency.keys() {
            if !visited.insert(start) {
                continue;
            }
            let mut members = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(node) = queue.pop_front() {
                for next in self.neighbors(node) {
                    if visited.insert(next) {
                        members.push(next);
                        queue.push_back(next);
                    }
                }
            }
            members.sort();
            components.push(members);
        }
        components
    }
}
