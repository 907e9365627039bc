//! Wrapped arrays.
//!
//! Each slot is tracked on its own (`Index(i)`) and the length on the
//! synthetic `Length` key, so a reader of the length alone only reruns when
//! the length changes. Every mutation goes through [`DeepArray::splice`],
//! which diffs the old and new slots to decide what to trigger and record.

use std::fmt;
use std::rc::Rc;

use super::handle::{wrap, DeepValue};
use super::root::{patch_kind, RootId, RootState};
use crate::error::{DeepSignalError, Result};
use crate::graph::{EdgeKey, NodeId, TrackKey};
use crate::reactive::Runtime;
use crate::value::{Array, Value};
use crate::watch::{DeepPatch, PatchOp, PathSegment};

const LENGTH: &str = "length";

/// A wrapped array.
#[derive(Clone)]
pub struct DeepArray {
    raw: Array,
    root: Rc<RootState>,
}

impl DeepArray {
    pub(crate) fn new(raw: Array, root: Rc<RootState>) -> Self {
        Self { raw, root }
    }

    pub fn id(&self) -> NodeId {
        self.raw.id()
    }

    pub fn root_id(&self) -> RootId {
        self.root.id()
    }

    /// The underlying plain array. Access through it is untracked.
    pub fn raw(&self) -> &Array {
        &self.raw
    }

    /// Untracked JSON snapshot.
    pub fn to_json(&self) -> serde_json::Value {
        Value::Array(self.raw.clone()).to_json()
    }

    /// Read a slot.
    pub fn get(&self, index: usize) -> Option<DeepValue> {
        Runtime::track(self.raw.id(), TrackKey::Index(index));
        let value = self.raw.read().get(index).cloned()?;
        Some(wrap(&self.root, self.raw.id(), PathSegment::Index(index), value))
    }

    pub fn len(&self) -> usize {
        Runtime::track(self.raw.id(), TrackKey::Length);
        self.raw.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every slot, wrapped. Tracks the length and each slot.
    pub fn to_vec(&self) -> Vec<DeepValue> {
        (0..self.len()).filter_map(|index| self.get(index)).collect()
    }

    pub fn iter(&self) -> std::vec::IntoIter<DeepValue> {
        self.to_vec().into_iter()
    }

    /// Overwrite a slot. Writing at `len` appends.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let len = self.raw.read().len();
        if index > len {
            return Err(DeepSignalError::IndexOutOfBounds { index, len });
        }
        let delete = usize::from(index < len);
        self.splice(index, delete, [value.into()]).map(drop)
    }

    /// Append and return the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        let len = self.raw.read().len();
        self.splice(len, 0, [value.into()])?;
        Ok(len + 1)
    }

    pub fn pop(&self) -> Result<Option<Value>> {
        let len = self.raw.read().len();
        if len == 0 {
            return Ok(None);
        }
        Ok(self.splice(len - 1, 1, Vec::<Value>::new())?.pop())
    }

    /// Insert before `index`, shifting later slots up.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let len = self.raw.read().len();
        if index > len {
            return Err(DeepSignalError::IndexOutOfBounds { index, len });
        }
        self.splice(index, 0, [value.into()]).map(drop)
    }

    /// Remove the slot at `index`, shifting later slots down.
    pub fn remove(&self, index: usize) -> Result<Value> {
        let len = self.raw.read().len();
        if index >= len {
            return Err(DeepSignalError::IndexOutOfBounds { index, len });
        }
        let mut removed = self.splice(index, 1, Vec::<Value>::new())?;
        removed.pop().ok_or(DeepSignalError::IndexOutOfBounds { index, len })
    }

    pub fn clear(&self) -> Result<()> {
        let len = self.raw.read().len();
        self.splice(0, len, Vec::<Value>::new()).map(drop)
    }

    /// Remove `delete_count` slots starting at `start` and insert `items`
    /// in their place. Returns the removed values.
    ///
    /// `start` and `delete_count` are clamped to the array like
    /// `Vec::splice` ranges would be if they were in bounds.
    pub fn splice<I>(&self, start: usize, delete_count: usize, items: I) -> Result<Vec<Value>>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        let node = self.raw.id();

        let (before, after, removed) = {
            let mut data = self.raw.write();
            let before = data.clone();
            let start = start.min(data.len());
            let end = start.saturating_add(delete_count).min(data.len());
            let removed: Vec<Value> = data.splice(start..end, items.iter().cloned()).collect();
            (before, data.clone(), removed)
        };

        for value in &removed {
            if !after.contains(value) {
                self.root.detach(value, node);
            }
        }
        let array_path = self.root.path_of(node);
        for (index, item) in after.iter().enumerate() {
            if before.get(index) != Some(item) && item.is_observable() {
                let path = array_path.clone().map(|mut path| {
                    path.push(PathSegment::Index(index));
                    path
                });
                self.root
                    .generate_props(item, path.as_deref().unwrap_or_default(), false);
            }
        }
        self.root.reindex(node, &after);
        for (index, item) in after.iter().enumerate() {
            if before.get(index) != Some(item) {
                self.root.attach(item, node, PathSegment::Index(index));
            }
        }

        let mut edges = Vec::new();
        let slots = before.len().max(after.len());
        for index in 0..slots {
            let (old, new) = (before.get(index), after.get(index));
            if old == new {
                continue;
            }
            edges.push(EdgeKey::new(node, TrackKey::Index(index)));
            self.root.emit_at(self.root.path_to(node, PathSegment::Index(index)), |path| match new {
                Some(new) => {
                    let patch = match old {
                        Some(old) => {
                            DeepPatch::new(path, PatchOp::Set).with_old_value(old.to_json())
                        }
                        None => DeepPatch::new(path, PatchOp::Add),
                    };
                    patch.with_kind(patch_kind(new)).with_value(new.to_json())
                }
                None => {
                    let mut patch = DeepPatch::new(path, PatchOp::Delete);
                    if let Some(old) = old {
                        patch = patch.with_kind(patch_kind(old)).with_old_value(old.to_json());
                    }
                    patch
                }
            });
        }

        if before.len() != after.len() {
            edges.push(EdgeKey::new(node, TrackKey::Length));
            self.root
                .emit_at(self.root.path_to(node, PathSegment::field(LENGTH)), |path| {
                    DeepPatch::new(path, PatchOp::Set)
                        .with_value(after.len().into())
                        .with_old_value(before.len().into())
                });
        }

        if !edges.is_empty() {
            Runtime::trigger_all(edges)?;
        }
        Ok(removed)
    }
}

impl PartialEq for DeepArray {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl fmt::Debug for DeepArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepArray")
            .field("id", &self.raw.id())
            .field("root", &self.root.id())
            .finish()
    }
}

impl From<DeepArray> for Value {
    fn from(array: DeepArray) -> Self {
        Value::Array(array.raw)
    }
}

impl From<&DeepArray> for Value {
    fn from(array: &DeepArray) -> Self {
        Value::Array(array.raw.clone())
    }
}
