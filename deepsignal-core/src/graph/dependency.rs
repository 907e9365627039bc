//! Dependency Edges
//!
//! The graph stores, for every tracked `(node, key)` pair, the set of
//! computations that read it, and the reverse index from each computation
//! to the pairs it holds.
//!
//! # Algorithm
//!
//! 1. A tracked read inside a running computation records an edge.
//! 2. When the computation finishes successfully, its freshly collected
//!    read-set replaces the previous one. Stale edges are pruned here, so
//!    edges never accumulate across reruns.
//! 3. A write looks up the dependents of the written pair and queues them.
//!    Their edges stay in place until the rerun succeeds and installs a new
//!    read-set, so a failing rerun keeps the edges of its last good run.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;

use super::node::EdgeKey;
use crate::reactive::SubscriberId;

/// Bidirectional edge store between tracked pairs and subscribers.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Subscribers of each pair, in subscription order.
    dependents: HashMap<EdgeKey, IndexSet<SubscriberId>>,

    /// Pairs held by each subscriber.
    dependencies: HashMap<SubscriberId, HashSet<EdgeKey>>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency edge: `subscriber` read `edge`.
    pub fn add_edge(&mut self, edge: EdgeKey, subscriber: SubscriberId) {
        self.dependencies
            .entry(subscriber)
            .or_default()
            .insert(edge.clone());
        self.dependents.entry(edge).or_default().insert(subscriber);
    }

    /// Remove a single dependency edge.
    pub fn remove_edge(&mut self, edge: &EdgeKey, subscriber: SubscriberId) {
        if let Some(subs) = self.dependents.get_mut(edge) {
            subs.shift_remove(&subscriber);
            if subs.is_empty() {
                self.dependents.remove(edge);
            }
        }
        if let Some(deps) = self.dependencies.get_mut(&subscriber) {
            deps.remove(edge);
        }
    }

    /// Remove every edge owned by a subscriber and return the pairs it held.
    pub fn remove_subscriber(&mut self, subscriber: SubscriberId) -> HashSet<EdgeKey> {
        let deps = self.dependencies.remove(&subscriber).unwrap_or_default();
        for edge in &deps {
            if let Some(subs) = self.dependents.get_mut(edge) {
                subs.shift_remove(&subscriber);
                if subs.is_empty() {
                    self.dependents.remove(edge);
                }
            }
        }
        deps
    }

    /// Replace the read-set of a subscriber with the one collected by its
    /// latest run.
    pub fn replace_dependencies<I>(&mut self, subscriber: SubscriberId, edges: I)
    where
        I: IntoIterator<Item = EdgeKey>,
    {
        self.remove_subscriber(subscriber);
        for edge in edges {
            self.add_edge(edge, subscriber);
        }
    }

    /// Subscribers of a written pair, in subscription order.
    pub fn dependents(&self, edge: &EdgeKey) -> Vec<SubscriberId> {
        self.dependents
            .get(edge)
            .map(|subs| subs.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `subscriber` currently holds `edge`.
    pub fn has_edge(&self, edge: &EdgeKey, subscriber: SubscriberId) -> bool {
        self.dependents
            .get(edge)
            .is_some_and(|subs| subs.contains(&subscriber))
    }

    /// Number of edges held by a subscriber.
    pub fn dependency_count(&self, subscriber: SubscriberId) -> usize {
        self.dependencies
            .get(&subscriber)
            .map_or(0, HashSet::len)
    }

    /// Number of subscribers of a pair.
    pub fn dependent_count(&self, edge: &EdgeKey) -> usize {
        self.dependents.get(edge).map_or(0, IndexSet::len)
    }

    /// Total number of tracked pairs with at least one subscriber.
    pub fn edge_count(&self) -> usize {
        self.dependents.len()
    }
}
