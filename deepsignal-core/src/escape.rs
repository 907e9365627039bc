//! Escape Hatches
//!
//! Two ways to step outside normal tracking: [`peek`] reads without
//! recording a dependency, and [`traverse`] records dependencies on a whole
//! subtree down to a fixed depth.

use std::collections::HashMap;

use crate::deep::{DeepNode, DeepObject, DeepValue};
use crate::graph::NodeId;
use crate::reactive::untracked;

/// Read `key` on `target` without making the running effect depend on it.
pub fn peek(target: &DeepObject, key: &str) -> DeepValue {
    untracked(|| target.get(key))
}

/// Read every field, slot and entry reachable from `value`, `depth` levels
/// down, so the running effect depends on all of them.
///
/// Depth 0 reads nothing. Depth 1 reads the members of `value` itself.
/// A container reachable along several paths is walked again only when a
/// later path reaches it with more depth left.
pub fn traverse(value: impl Into<DeepValue>, depth: usize) {
    if let DeepValue::Node(node) = value.into() {
        walk(&node, depth, &mut HashMap::new());
    }
}

/// `seen` maps each visited container to the most depth it was walked with.
fn walk(node: &DeepNode, depth: usize, seen: &mut HashMap<NodeId, usize>) {
    if depth == 0 || seen.get(&node.id()).is_some_and(|&walked| walked >= depth) {
        return;
    }
    seen.insert(node.id(), depth);
    let children: Vec<DeepValue> = match node {
        DeepNode::Object(object) => object
            .entries()
            .into_iter()
            .map(|(_, value)| value)
            .collect(),
        DeepNode::Array(array) => array.to_vec(),
        DeepNode::Set(set) => set.values(),
        DeepNode::Map(map) => map.values(),
    };
    for child in children {
        if let DeepValue::Node(child) = child {
            walk(&child, depth - 1, seen);
        }
    }
}
