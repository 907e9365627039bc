//! Reactive roots.
//!
//! A root owns everything that is scoped to one wrapped tree: its identity,
//! its options, the parent links used to rebuild patch paths, and the patch
//! batcher its watchers share.
//!
//! Parent links live in an arena keyed by container id. A container gets a
//! link the first time it is read through the root, and whenever it is
//! written into the tree. Overwriting or removing a container drops its
//! link; writes under a container without a path to the root still rerun
//! effects but emit no patches.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::options::{DeepSignalOptions, PropGenContext};
use crate::graph::NodeId;
use crate::value::Value;
use crate::watch::{Batcher, DeepPatch, Path, PatchKind, PathSegment};

/// Identity of a reactive root.
///
/// Stable for the lifetime of the root and never shared between two roots,
/// even when their contents are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RootId(u64);

impl RootId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root:{}", self.0)
    }
}

fn next_blank_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("_b{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

thread_local! {
    static ROOTS: RefCell<HashMap<RootId, Weak<RootState>>> = RefCell::new(HashMap::new());
    static ROOT_CONTAINERS: RefCell<HashMap<NodeId, Weak<RootState>>> =
        RefCell::new(HashMap::new());
}

/// Where a container sits under its parent.
#[derive(Debug, Clone)]
struct ParentLink {
    parent: NodeId,
    segment: PathSegment,
}

pub(crate) struct RootState {
    id: RootId,
    node: NodeId,
    value: Value,
    options: DeepSignalOptions,
    links: RefCell<HashMap<NodeId, ParentLink>>,
    pub(crate) batcher: Batcher,
}

impl RootState {
    /// Create and register a root for `value`, or return the live root that
    /// already wraps it. Primitives have no root.
    pub(crate) fn open(value: Value, options: DeepSignalOptions) -> Option<Rc<Self>> {
        let node = value.node_id()?;
        if let Some(existing) = Self::find_by_container(node) {
            return Some(existing);
        }

        let root = Rc::new(Self {
            id: RootId::new(),
            node,
            value,
            options,
            links: RefCell::new(HashMap::new()),
            batcher: Batcher::default(),
        });
        ROOTS.with(|roots| roots.borrow_mut().insert(root.id, Rc::downgrade(&root)));
        ROOT_CONTAINERS.with(|roots| roots.borrow_mut().insert(node, Rc::downgrade(&root)));
        tracing::debug!(root = %root.id, node = %node, "opened reactive root");
        Some(root)
    }

    pub(crate) fn find(id: RootId) -> Option<Rc<Self>> {
        ROOTS.with(|roots| roots.borrow().get(&id).and_then(Weak::upgrade))
    }

    fn find_by_container(node: NodeId) -> Option<Rc<Self>> {
        ROOT_CONTAINERS.with(|roots| roots.borrow().get(&node).and_then(Weak::upgrade))
    }

    pub(crate) fn id(&self) -> RootId {
        self.id
    }

    pub(crate) fn value(&self) -> &Value {
        &self.value
    }

    pub(crate) fn options(&self) -> &DeepSignalOptions {
        &self.options
    }

    /// Link a container read through `parent`, unless it is linked already.
    pub(crate) fn adopt(&self, child: NodeId, parent: NodeId, segment: PathSegment) {
        if child == self.node {
            return;
        }
        self.links
            .borrow_mut()
            .entry(child)
            .or_insert(ParentLink { parent, segment });
    }

    /// Link a container written under `parent`, replacing any older link.
    pub(crate) fn attach(&self, child: &Value, parent: NodeId, segment: PathSegment) {
        if !child.is_observable() {
            return;
        }
        if let Some(node) = child.node_id().filter(|node| *node != self.node) {
            self.links
                .borrow_mut()
                .insert(node, ParentLink { parent, segment });
        }
    }

    /// Drop the link of a container removed from `parent`.
    pub(crate) fn detach(&self, child: &Value, parent: NodeId) {
        let Some(node) = child.node_id() else { return };
        let mut links = self.links.borrow_mut();
        if links.get(&node).is_some_and(|link| link.parent == parent) {
            links.remove(&node);
            tracing::trace!(node = %node, "detached container");
        }
    }

    /// Point the links of an array's children at their current slots.
    pub(crate) fn reindex(&self, parent: NodeId, items: &[Value]) {
        let mut links = self.links.borrow_mut();
        for (index, item) in items.iter().enumerate() {
            let Some(node) = item.node_id() else { continue };
            if let Some(link) = links.get_mut(&node) {
                if link.parent == parent {
                    link.segment = PathSegment::Index(index);
                }
            }
        }
    }

    /// Path from the root to `node`, or `None` if it is not linked in.
    pub(crate) fn path_of(&self, node: NodeId) -> Option<Path> {
        let links = self.links.borrow();
        let mut segments = Vec::new();
        let mut current = node;
        while current != self.node {
            // A chain longer than the arena can only be a stale loop.
            if segments.len() > links.len() {
                return None;
            }
            let link = links.get(&current)?;
            segments.push(link.segment.clone());
            current = link.parent;
        }
        Some(segments.into_iter().rev().collect())
    }

    /// Path to a member of `node`.
    pub(crate) fn path_to(&self, node: NodeId, member: PathSegment) -> Option<Path> {
        let mut path = self.path_of(node)?;
        path.push(member);
        Some(path)
    }

    /// Whether anything watches this root. Patches are only built if so.
    pub(crate) fn is_observed(&self) -> bool {
        self.batcher.has_listeners()
    }

    /// Hand a record to the batcher.
    pub(crate) fn emit(self: &Rc<Self>, patch: DeepPatch) {
        tracing::trace!(root = %self.id, %patch, "record");
        crate::watch::record(self, patch);
    }

    /// Emit the record built by `build` for a write at `path`, if the
    /// written node is linked in and anything is watching.
    pub(crate) fn emit_at(
        self: &Rc<Self>,
        path: Option<Path>,
        build: impl FnOnce(Path) -> DeepPatch,
    ) {
        if !self.is_observed() {
            return;
        }
        match path {
            Some(path) => self.emit(build(path)),
            None => tracing::warn!(root = %self.id, "write to a detached node; no patch emitted"),
        }
    }

    /// Run the prop generator for a freshly attached plain object.
    ///
    /// Extra props and the synthetic id property are added to the object if
    /// it does not have them. Returns the generated synthetic id.
    pub(crate) fn generate_props(
        &self,
        value: &Value,
        path: &[PathSegment],
        in_set: bool,
    ) -> Option<String> {
        let Value::Object(object) = value else {
            return None;
        };
        let generator = self.options.prop_generator.as_ref()?;
        let result = generator(&PropGenContext { path, in_set, object });

        {
            let mut fields = object.write();
            for (key, extra) in result.extra_props {
                fields.entry(key).or_insert(extra);
            }
            let id_property = self.options.synthetic_id_property();
            if let (Some(id), Some(prop)) = (&result.synthetic_id, id_property) {
                fields
                    .entry(prop.to_string())
                    .or_insert_with(|| Value::from(id.as_str()));
            }
        }
        if let Some(id) = &result.synthetic_id {
            object.set_synthetic_id(id.clone());
        }
        result.synthetic_id
    }

    /// Resolve the id a container entry of a set is addressed by.
    ///
    /// Resolution order: an id assigned before (explicitly or by the prop
    /// generator on add), the configured id property, a fresh blank id. The
    /// result is remembered on the container. Primitives have no id.
    pub(crate) fn entry_id(&self, entry: &Value) -> Option<String> {
        entry.node_id()?;
        if let Some(id) = entry.synthetic_id() {
            return Some(id);
        }

        if let (Some(prop), Value::Object(object)) = (self.options.synthetic_id_property(), entry) {
            let own = object.read().get(prop).cloned();
            if let Some(id @ (Value::String(_) | Value::Number(_))) = own {
                let id = id.key_string();
                entry.set_synthetic_id(id.clone());
                return Some(id);
            }
        }

        let blank = next_blank_id();
        entry.set_synthetic_id(blank.clone());
        Some(blank)
    }

    /// Give `entry` a fresh blank id if another entry of `items` already
    /// uses `id`.
    pub(crate) fn dedupe_entry_id(
        &self,
        entry: &Value,
        id: String,
        items: &IndexSet<Value>,
    ) -> String {
        let taken = items
            .iter()
            .any(|other| other != entry && other.synthetic_id().as_deref() == Some(id.as_str()));
        if !taken {
            return id;
        }
        let blank = next_blank_id();
        tracing::debug!(root = %self.id, %id, %blank, "synthetic id collision");
        entry.set_synthetic_id(blank.clone());
        blank
    }
}

impl Drop for RootState {
    fn drop(&mut self) {
        let (id, node) = (self.id, self.node);
        let _ = ROOTS.try_with(|roots| roots.borrow_mut().remove(&id));
        let _ = ROOT_CONTAINERS.try_with(|roots| roots.borrow_mut().remove(&node));
    }
}

/// Container type of `value`, for the `type` field of patches.
pub(crate) fn patch_kind(value: &Value) -> Option<PatchKind> {
    match value {
        Value::Object(_) | Value::Map(_) => Some(PatchKind::Object),
        Value::Array(_) => Some(PatchKind::Array),
        Value::Set(_) => Some(PatchKind::Set),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open(json: serde_json::Value) -> Rc<RootState> {
        RootState::open(Value::from(json), DeepSignalOptions::default()).unwrap()
    }

    #[test]
    fn reopening_a_container_returns_the_same_root() {
        let value = Value::from(json!({ "a": 1 }));
        let first = RootState::open(value.clone(), DeepSignalOptions::default()).unwrap();
        let second = RootState::open(value, DeepSignalOptions::default()).unwrap();
        assert!(RootState::open(Value::from(1), DeepSignalOptions::default()).is_none());
        assert_eq!(first.id(), second.id());
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn dropped_roots_leave_the_registry() {
        let root = open(json!({}));
        let id = root.id();
        assert!(RootState::find(id).is_some());
        drop(root);
        assert!(RootState::find(id).is_none());
    }

    #[test]
    fn paths_follow_links() {
        let root = open(json!({ "a": { "b": [{ "c": 1 }] } }));
        let a = Value::object();
        let b = Value::array();
        let c = Value::object();
        let (a_id, b_id, c_id) = (a.node_id().unwrap(), b.node_id().unwrap(), c.node_id().unwrap());

        root.attach(&a, root.node, PathSegment::field("a"));
        root.attach(&b, a_id, PathSegment::field("b"));
        root.adopt(c_id, b_id, PathSegment::Index(0));

        let path = root.path_to(c_id, PathSegment::field("c")).unwrap();
        let rendered: Vec<String> = path.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["a", "b", "0", "c"]);

        root.detach(&b, a_id);
        assert!(root.path_of(c_id).is_none());
    }

    #[test]
    fn adopt_keeps_the_first_link() {
        let root = open(json!({}));
        let child = NodeId::new();
        root.adopt(child, root.node, PathSegment::field("x"));
        root.adopt(child, root.node, PathSegment::field("y"));
        assert_eq!(root.path_of(child).unwrap()[0], PathSegment::field("x"));
    }

    #[test]
    fn entry_ids_prefer_the_id_property_then_blank() {
        let root = RootState::open(
            Value::object(),
            DeepSignalOptions::new().with_synthetic_id_property("@id"),
        )
        .unwrap();
        let with_id = Value::from(json!({ "@id": "urn:1" }));
        let without = Value::from(json!({ "x": 1 }));

        assert_eq!(root.entry_id(&with_id).as_deref(), Some("urn:1"));
        let blank = root.entry_id(&without).unwrap();
        assert!(blank.starts_with("_b"));
        // Remembered.
        assert_eq!(root.entry_id(&without), Some(blank));
        assert_eq!(root.entry_id(&Value::from(3)), None);
    }
}
