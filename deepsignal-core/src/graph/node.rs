//! Graph Nodes
//!
//! This module defines the identities that live in the dependency graph:
//! the node a tracked read happened on, and the key that was read.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a container in the dependency graph.
///
/// Every object, array, set and map gets one when it is constructed. The id
/// is never reused, so edges keyed by it cannot alias a later container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Hashable identity of a set element.
///
/// Primitives are keyed by value, containers by their node id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Null,
    Bool(bool),
    /// Normalized bit pattern of the number (`-0` folds into `0`, all NaNs fold together).
    Number(u64),
    String(Arc<str>),
    Node(NodeId),
}

/// What was read on a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackKey {
    /// A named object field.
    Prop(Arc<str>),
    /// An array slot.
    Index(usize),
    /// Synthetic key for the length of an array.
    Length,
    /// Synthetic key for key enumeration and set iteration.
    Iterate,
    /// Membership of one element in a set, or one key of a map.
    Entry(EntryKey),
    /// Synthetic key for the cached value of a memo.
    Value,
}

impl TrackKey {
    pub fn prop(name: &str) -> Self {
        Self::Prop(Arc::from(name))
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prop(name) => write!(f, ".{name}"),
            Self::Index(i) => write!(f, "[{i}]"),
            Self::Length => f.write_str(".length"),
            Self::Iterate => f.write_str("<iterate>"),
            Self::Entry(key) => write!(f, "<entry {key:?}>"),
            Self::Value => f.write_str("<value>"),
        }
    }
}

/// A `(node, key)` pair. Dependency edges hang off these.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub node: NodeId,
    pub key: TrackKey,
}

impl EdgeKey {
    pub fn new(node: NodeId, key: TrackKey) -> Self {
        Self { node, key }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.node, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let id1 = NodeId::new();
        let id2 = NodeId::new();
        assert_ne!(id1, id2);
        assert!(id2.raw() > id1.raw());
    }

    #[test]
    fn edge_keys_compare_by_node_and_key() {
        let node = NodeId::new();
        let a = EdgeKey::new(node, TrackKey::prop("a"));
        let b = EdgeKey::new(node, TrackKey::prop("a"));
        let c = EdgeKey::new(node, TrackKey::Length);
        let d = EdgeKey::new(NodeId::new(), TrackKey::prop("a"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn edge_key_display() {
        let node = NodeId::new();
        let key = EdgeKey::new(node, TrackKey::Index(3));
        assert_eq!(key.to_string(), format!("n{}[3]", node.raw()));
    }
}
