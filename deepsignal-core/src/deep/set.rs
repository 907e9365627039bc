//! Wrapped sets.
//!
//! Membership checks track `Entry(element)`; size and iteration track
//! `Iterate`. Adding or removing an element triggers both, so a reader that
//! only asks "is X in the set" is not rerun by unrelated changes.
//!
//! Container entries are addressed in patch paths by a synthetic id rather
//! than a position. The id is assigned when the entry is added or first
//! read.

use std::fmt;
use std::rc::Rc;

use super::handle::{wrap, DeepValue};
use super::root::{patch_kind, RootId, RootState};
use crate::error::Result;
use crate::graph::{EdgeKey, NodeId, TrackKey};
use crate::reactive::Runtime;
use crate::value::{Set, Value};
use crate::watch::{DeepPatch, PatchKind, PatchOp, PathSegment};

/// A wrapped set.
#[derive(Clone)]
pub struct DeepSet {
    raw: Set,
    root: Rc<RootState>,
}

impl DeepSet {
    pub(crate) fn new(raw: Set, root: Rc<RootState>) -> Self {
        Self { raw, root }
    }

    pub fn id(&self) -> NodeId {
        self.raw.id()
    }

    pub fn root_id(&self) -> RootId {
        self.root.id()
    }

    /// The underlying plain set. Access through it is untracked.
    pub fn raw(&self) -> &Set {
        &self.raw
    }

    /// Untracked JSON snapshot.
    pub fn to_json(&self) -> serde_json::Value {
        Value::Set(self.raw.clone()).to_json()
    }

    fn set_path(&self) -> Vec<PathSegment> {
        self.root
            .path_of(self.raw.id())
            .map(|path| path.into_vec())
            .unwrap_or_default()
    }

    /// Wrap an entry, linking containers under their synthetic id.
    fn wrap_entry(&self, entry: Value) -> DeepValue {
        match self.root.entry_id(&entry) {
            Some(id) => wrap(&self.root, self.raw.id(), PathSegment::entry_id(id), entry),
            None => DeepValue::Plain(entry),
        }
    }

    pub fn has(&self, value: impl Into<Value>) -> bool {
        let value = value.into();
        Runtime::track(self.raw.id(), TrackKey::Entry(value.entry_key()));
        self.raw.read().contains(&value)
    }

    pub fn size(&self) -> usize {
        Runtime::track(self.raw.id(), TrackKey::Iterate);
        self.raw.read().len()
    }

    pub fn len(&self) -> usize {
        self.size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Every entry in insertion order. Container entries come back wrapped,
    /// so writes through them are tracked like any other nested write.
    pub fn values(&self) -> Vec<DeepValue> {
        Runtime::track(self.raw.id(), TrackKey::Iterate);
        let entries: Vec<Value> = self.raw.read().iter().cloned().collect();
        entries.into_iter().map(|entry| self.wrap_entry(entry)).collect()
    }

    pub fn iter(&self) -> std::vec::IntoIter<DeepValue> {
        self.values().into_iter()
    }

    pub fn first(&self) -> Option<DeepValue> {
        self.values().into_iter().next()
    }

    pub fn for_each(&self, mut f: impl FnMut(DeepValue)) {
        for entry in self.values() {
            f(entry);
        }
    }

    /// Find a container entry by its synthetic id.
    pub fn get_by_id(&self, id: &str) -> Option<DeepValue> {
        Runtime::track(self.raw.id(), TrackKey::Iterate);
        let entries: Vec<Value> = self
            .raw
            .read()
            .iter()
            .filter(|entry| entry.is_container())
            .cloned()
            .collect();
        entries
            .into_iter()
            .find(|entry| self.root.entry_id(entry).as_deref() == Some(id))
            .map(|entry| self.wrap_entry(entry))
    }

    /// Add an entry. Returns `false` if it was already present.
    pub fn add(&self, value: impl Into<Value>) -> Result<bool> {
        self.insert(value.into(), None)
    }

    /// Add a container entry under an explicit synthetic id.
    pub fn add_with_id(&self, value: impl Into<Value>, id: impl Into<String>) -> Result<bool> {
        self.insert(value.into(), Some(id.into()))
    }

    fn insert(&self, value: Value, id: Option<String>) -> Result<bool> {
        if self.raw.read().contains(&value) {
            return Ok(false);
        }
        let node = self.raw.id();
        let set_path = self.set_path();

        let entry_id = if value.is_container() {
            if let Some(id) = id {
                value.set_synthetic_id(id);
            } else if value.synthetic_id().is_none() {
                self.root.generate_props(&value, &set_path, true);
            }
            let resolved = self.root.entry_id(&value);
            resolved.map(|id| self.root.dedupe_entry_id(&value, id, &self.raw.read()))
        } else {
            None
        };

        self.raw.write().insert(value.clone());
        if let Some(id) = &entry_id {
            self.root.attach(&value, node, PathSegment::entry_id(id.clone()));
        }

        match &entry_id {
            Some(id) => self
                .root
                .emit_at(self.root.path_to(node, PathSegment::entry_id(id.clone())), |path| {
                    DeepPatch::new(path, PatchOp::Add)
                        .with_kind(patch_kind(&value))
                        .with_value(value.to_json())
                }),
            None => self.root.emit_at(self.root.path_of(node), |path| {
                DeepPatch::new(path, PatchOp::Add)
                    .with_value(serde_json::Value::Array(vec![value.to_json()]))
            }),
        }

        Runtime::trigger_all([
            EdgeKey::new(node, TrackKey::Iterate),
            EdgeKey::new(node, TrackKey::Entry(value.entry_key())),
        ])?;
        Ok(true)
    }

    /// Remove an entry. Returns whether it was present.
    pub fn remove(&self, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        if !self.raw.write().shift_remove(&value) {
            return Ok(false);
        }
        let node = self.raw.id();
        self.root.detach(&value, node);

        match value.synthetic_id().filter(|_| value.is_container()) {
            Some(id) => self
                .root
                .emit_at(self.root.path_to(node, PathSegment::entry_id(id)), |path| {
                    DeepPatch::new(path, PatchOp::Delete)
                }),
            None => self.root.emit_at(self.root.path_of(node), |path| {
                DeepPatch::new(path, PatchOp::Delete).with_value(value.to_json())
            }),
        }

        Runtime::trigger_all([
            EdgeKey::new(node, TrackKey::Iterate),
            EdgeKey::new(node, TrackKey::Entry(value.entry_key())),
        ])?;
        Ok(true)
    }

    /// Remove every entry.
    ///
    /// Buffered records for entries of this set are dropped from the
    /// current burst and replaced by a single `Clear` record.
    pub fn clear(&self) -> Result<()> {
        let entries: Vec<Value> = std::mem::take(&mut *self.raw.write()).into_iter().collect();
        if entries.is_empty() {
            return Ok(());
        }
        let node = self.raw.id();
        for entry in &entries {
            self.root.detach(entry, node);
        }

        self.root.emit_at(self.root.path_of(node), |path| {
            DeepPatch::new(path, PatchOp::Clear).with_kind(Some(PatchKind::Set))
        });

        let mut edges = vec![EdgeKey::new(node, TrackKey::Iterate)];
        edges.extend(
            entries
                .iter()
                .map(|entry| EdgeKey::new(node, TrackKey::Entry(entry.entry_key()))),
        );
        Runtime::trigger_all(edges)
    }
}

impl PartialEq for DeepSet {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl fmt::Debug for DeepSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepSet")
            .field("id", &self.raw.id())
            .field("root", &self.root.id())
            .finish()
    }
}

impl From<DeepSet> for Value {
    fn from(set: DeepSet) -> Self {
        Value::Set(set.raw)
    }
}

impl From<&DeepSet> for Value {
    fn from(set: &DeepSet) -> Self {
        Value::Set(set.raw.clone())
    }
}
