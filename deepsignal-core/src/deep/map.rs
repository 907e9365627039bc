//! Wrapped key/value maps.
//!
//! Maps are tracked for effects like sets are: a lookup tracks
//! `Entry(key)`, iteration and size track `Iterate`. Writes through a map
//! emit no patches, so watchers do not see them. Containers stored in a
//! map are still wrapped, and writes below them are reported under the
//! display form of their key.

use std::fmt;
use std::rc::Rc;

use super::handle::{wrap, DeepValue};
use super::root::{RootId, RootState};
use crate::error::Result;
use crate::graph::{EdgeKey, NodeId, TrackKey};
use crate::reactive::Runtime;
use crate::value::{Map, Value};
use crate::watch::PathSegment;

/// A wrapped key/value map.
#[derive(Clone)]
pub struct DeepMap {
    raw: Map,
    root: Rc<RootState>,
}

impl DeepMap {
    pub(crate) fn new(raw: Map, root: Rc<RootState>) -> Self {
        Self { raw, root }
    }

    pub fn id(&self) -> NodeId {
        self.raw.id()
    }

    pub fn root_id(&self) -> RootId {
        self.root.id()
    }

    pub fn raw(&self) -> &Map {
        &self.raw
    }

    pub fn to_json(&self) -> serde_json::Value {
        Value::Map(self.raw.clone()).to_json()
    }

    fn wrap_value(&self, key: &Value, value: Value) -> DeepValue {
        wrap(&self.root, self.raw.id(), PathSegment::field(&key.key_string()), value)
    }

    pub fn get(&self, key: impl Into<Value>) -> Option<DeepValue> {
        let key = key.into();
        Runtime::track(self.raw.id(), TrackKey::Entry(key.entry_key()));
        let value = self.raw.read().get(&key).cloned()?;
        Some(self.wrap_value(&key, value))
    }

    pub fn has(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        Runtime::track(self.raw.id(), TrackKey::Entry(key.entry_key()));
        self.raw.read().contains_key(&key)
    }

    pub fn len(&self) -> usize {
        Runtime::track(self.raw.id(), TrackKey::Iterate);
        self.raw.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<Value> {
        Runtime::track(self.raw.id(), TrackKey::Iterate);
        self.raw.read().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<DeepValue> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    /// Every entry in insertion order, values wrapped.
    pub fn entries(&self) -> Vec<(Value, DeepValue)> {
        Runtime::track(self.raw.id(), TrackKey::Iterate);
        let entries: Vec<(Value, Value)> = self
            .raw
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries
            .into_iter()
            .map(|(key, value)| {
                let wrapped = self.wrap_value(&key, value);
                (key, wrapped)
            })
            .collect()
    }

    /// Store `value` under `key`. Storing an equal value does nothing.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<()> {
        let (key, value) = (key.into(), value.into());
        let node = self.raw.id();
        let old = self.raw.write().insert(key.clone(), value.clone());
        if old.as_ref() == Some(&value) {
            return Ok(());
        }
        if let Some(old) = &old {
            self.root.detach(old, node);
        }
        self.root
            .attach(&value, node, PathSegment::field(&key.key_string()));
        tracing::trace!(node = %node, key = %key.key_string(), "map write");

        Runtime::trigger_all([
            EdgeKey::new(node, TrackKey::Entry(key.entry_key())),
            EdgeKey::new(node, TrackKey::Iterate),
        ])
    }

    /// Remove `key`. Returns whether it was present.
    pub fn delete(&self, key: impl Into<Value>) -> Result<bool> {
        let key = key.into();
        let node = self.raw.id();
        let Some(old) = self.raw.write().shift_remove(&key) else {
            return Ok(false);
        };
        self.root.detach(&old, node);

        Runtime::trigger_all([
            EdgeKey::new(node, TrackKey::Entry(key.entry_key())),
            EdgeKey::new(node, TrackKey::Iterate),
        ])?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<()> {
        let entries = std::mem::take(&mut *self.raw.write());
        if entries.is_empty() {
            return Ok(());
        }
        let node = self.raw.id();
        let mut edges = vec![EdgeKey::new(node, TrackKey::Iterate)];
        for (key, value) in &entries {
            self.root.detach(value, node);
            edges.push(EdgeKey::new(node, TrackKey::Entry(key.entry_key())));
        }
        Runtime::trigger_all(edges)
    }
}

impl PartialEq for DeepMap {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl fmt::Debug for DeepMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepMap")
            .field("id", &self.raw.id())
            .field("root", &self.root.id())
            .finish()
    }
}

impl From<DeepMap> for Value {
    fn from(map: DeepMap) -> Self {
        Value::Map(map.raw)
    }
}

impl From<&DeepMap> for Value {
    fn from(map: &DeepMap) -> Self {
        Value::Map(map.raw.clone())
    }
}
