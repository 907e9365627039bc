//! Dependency Graph
//!
//! This module implements the edge arena that relates tracked reads to the
//! computations that performed them.
//!
//! # Overview
//!
//! The graph is bipartite:
//!
//! - Sources are `(node, key)` pairs: a container id plus what was read on
//!   it (a field, an index, the length, iteration, set membership)
//! - Sinks are subscribers (effects)
//!
//! When a pair is written, the runtime looks up its subscribers and reruns
//! them. A successful rerun replaces the subscriber's read-set; a failed one
//! leaves the previous read-set in place.
//!
//! # Design Decisions
//!
//! 1. Sources are keyed by the container's `NodeId` rather than by any
//!    wrapper object. Wrappers are cheap, rebuildable handles; the graph
//!    outlives them.
//!
//! 2. We maintain both directions (pair to subscribers and subscriber to
//!    pairs) so that pruning a subscriber's stale edges is proportional to
//!    its own read-set.

mod dependency;
mod node;

pub use dependency::DependencyGraph;
pub use node::{EdgeKey, EntryKey, NodeId, TrackKey};
