//! Wrapped objects.
//!
//! Reads track `Prop(key)`; enumerating keys tracks `Iterate`. Writes
//! trigger the written key, and also `Iterate` when a key appears or
//! disappears.

use std::fmt;
use std::rc::Rc;

use super::handle::{wrap, DeepValue};
use super::root::{patch_kind, RootId, RootState};
use super::{DeepArray, DeepMap, DeepSet};
use crate::error::{DeepSignalError, Result};
use crate::graph::{EdgeKey, NodeId, TrackKey};
use crate::reactive::Runtime;
use crate::value::{Object, Value};
use crate::watch::{DeepPatch, PatchOp, PathSegment};

/// A wrapped plain object.
#[derive(Clone)]
pub struct DeepObject {
    raw: Object,
    root: Rc<RootState>,
}

impl DeepObject {
    pub(crate) fn new(raw: Object, root: Rc<RootState>) -> Self {
        Self { raw, root }
    }

    pub fn id(&self) -> NodeId {
        self.raw.id()
    }

    pub fn root_id(&self) -> RootId {
        self.root.id()
    }

    /// The underlying plain object. Access through it is untracked.
    pub fn raw(&self) -> &Object {
        &self.raw
    }

    /// Untracked JSON snapshot.
    pub fn to_json(&self) -> serde_json::Value {
        Value::Object(self.raw.clone()).to_json()
    }

    fn track(&self, key: TrackKey) {
        Runtime::track(self.raw.id(), key);
    }

    fn field(&self, key: &str) -> Option<Value> {
        self.raw.read().get(key).cloned()
    }

    /// Read a field. Missing fields read as `null`.
    pub fn get(&self, key: &str) -> DeepValue {
        self.track(TrackKey::prop(key));
        match self.field(key) {
            Some(value) => wrap(&self.root, self.raw.id(), PathSegment::field(key), value),
            None => DeepValue::Plain(Value::Null),
        }
    }

    /// Read a field that holds an object.
    pub fn get_object(&self, key: &str) -> Option<DeepObject> {
        self.get(key).into_object()
    }

    /// Read a field that holds an array.
    pub fn get_array(&self, key: &str) -> Option<DeepArray> {
        self.get(key).into_array()
    }

    /// Read a field that holds a set.
    pub fn get_set(&self, key: &str) -> Option<DeepSet> {
        self.get(key).into_set()
    }

    pub fn get_map(&self, key: &str) -> Option<DeepMap> {
        self.get(key).into_map()
    }

    pub fn has(&self, key: &str) -> bool {
        self.track(TrackKey::prop(key));
        self.raw.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.track(TrackKey::Iterate);
        self.raw.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.track(TrackKey::Iterate);
        self.raw.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every field, wrapped. Tracks the key set and each field.
    pub fn entries(&self) -> Vec<(String, DeepValue)> {
        self.keys()
            .into_iter()
            .map(|key| {
                let value = self.get(&key);
                (key, value)
            })
            .collect()
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        let options = self.root.options();
        let id_property =
            options.synthetic_id_property() == Some(key) && self.raw.read().contains_key(key);
        if options.is_read_only(key) || id_property {
            return Err(DeepSignalError::ReadOnlyProperty { key: key.to_string() });
        }
        Ok(())
    }

    /// Write a field.
    ///
    /// Writing a value equal to the current one does nothing. Wrapped
    /// values may be written back; the underlying container is stored.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.check_writable(key)?;
        let value = value.into();
        let old = self.field(key);
        if old.as_ref() == Some(&value) {
            return Ok(());
        }

        let segment = PathSegment::field(key);
        let path = self.root.path_to(self.raw.id(), segment.clone());
        if value.is_observable() {
            self.root
                .generate_props(&value, path.as_deref().unwrap_or_default(), false);
        }

        self.raw.write().insert(key.to_string(), value.clone());
        if let Some(old) = &old {
            self.root.detach(old, self.raw.id());
        }
        self.root.attach(&value, self.raw.id(), segment);

        self.root.emit_at(path, |path| {
            let patch = match &old {
                Some(old) => DeepPatch::new(path, PatchOp::Set).with_old_value(old.to_json()),
                None => DeepPatch::new(path, PatchOp::Add),
            };
            patch.with_kind(patch_kind(&value)).with_value(value.to_json())
        });

        let mut edges = vec![EdgeKey::new(self.raw.id(), TrackKey::prop(key))];
        if old.is_none() {
            edges.push(EdgeKey::new(self.raw.id(), TrackKey::Iterate));
        }
        Runtime::trigger_all(edges)
    }

    /// Remove a field. Returns whether it existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.check_writable(key)?;
        let Some(old) = self.raw.write().shift_remove(key) else {
            return Ok(false);
        };
        let path = self.root.path_to(self.raw.id(), PathSegment::field(key));
        self.root.detach(&old, self.raw.id());

        self.root.emit_at(path, |path| {
            DeepPatch::new(path, PatchOp::Delete)
                .with_kind(patch_kind(&old))
                .with_old_value(old.to_json())
        });

        Runtime::trigger_all([
            EdgeKey::new(self.raw.id(), TrackKey::prop(key)),
            EdgeKey::new(self.raw.id(), TrackKey::Iterate),
        ])?;
        Ok(true)
    }
}

impl PartialEq for DeepObject {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl fmt::Debug for DeepObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepObject")
            .field("id", &self.raw.id())
            .field("root", &self.root.id())
            .finish()
    }
}

impl From<DeepObject> for Value {
    fn from(object: DeepObject) -> Self {
        Value::Object(object.raw)
    }
}

impl From<&DeepObject> for Value {
    fn from(object: &DeepObject) -> Self {
        Value::Object(object.raw.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deep::deep_signal;
    use crate::reactive::Effect;
    use serde_json::json;
    use std::cell::Cell;

    fn object(json: serde_json::Value) -> DeepObject {
        deep_signal(json).unwrap().into_object().unwrap()
    }

    #[test]
    fn reads_wrap_nested_containers() {
        let state = object(json!({ "a": { "b": 1 }, "list": [1], "n": 2 }));

        assert!(state.get("a").as_object().is_some());
        assert!(state.get("list").as_array().is_some());
        assert_eq!(state.get("n").as_f64(), Some(2.0));
        assert!(state.get("missing").is_null());
    }

    #[test]
    fn repeated_reads_yield_the_same_node() {
        let state = object(json!({ "a": { "b": 1 } }));
        assert_eq!(state.get_object("a"), state.get_object("a"));
    }

    #[test]
    fn writes_rerun_readers_of_that_key_only() {
        let state = object(json!({ "a": 1, "b": 1 }));
        let runs = Rc::new(Cell::new(0));

        let effect = Effect::new({
            let state = state.clone();
            let runs = runs.clone();
            move || {
                state.get("a");
                runs.set(runs.get() + 1);
            }
        })
        .unwrap();

        state.set("b", 2).unwrap();
        assert_eq!(runs.get(), 1);

        state.set("a", 2).unwrap();
        assert_eq!(runs.get(), 2);

        state.set("a", 2).unwrap();
        assert_eq!(runs.get(), 2);
        effect.stop();
    }

    #[test]
    fn adding_and_deleting_keys_reruns_enumerators() {
        let state = object(json!({ "a": 1 }));
        let seen = Rc::new(Cell::new(0));

        let _effect = Effect::new({
            let state = state.clone();
            let seen = seen.clone();
            move || seen.set(state.keys().len())
        })
        .unwrap();
        assert_eq!(seen.get(), 1);

        state.set("b", 1).unwrap();
        assert_eq!(seen.get(), 2);

        // Overwriting an existing key leaves the key set alone.
        state.set("b", 5).unwrap();
        assert_eq!(seen.get(), 2);

        assert!(state.delete("a").unwrap());
        assert_eq!(seen.get(), 1);
        assert!(!state.delete("a").unwrap());
    }

    #[test]
    fn read_only_props_reject_writes() {
        let state = crate::deep::deep_signal_with(
            json!({ "@graph": "g" }),
            crate::deep::DeepSignalOptions::new().with_read_only_props(["@graph"]),
        )
        .unwrap()
        .into_object()
        .unwrap();

        let err = state.set("@graph", "other").unwrap_err();
        assert!(matches!(err, DeepSignalError::ReadOnlyProperty { ref key } if key == "@graph"));
        assert!(state.delete("@graph").is_err());
        assert_eq!(state.get("@graph").as_str(), Some("g"));
    }

    #[test]
    fn wrapped_values_write_back_as_the_same_container() {
        let state = object(json!({ "a": { "v": 1 } }));
        let a = state.get_object("a").unwrap();
        state.set("b", &a).unwrap();
        assert_eq!(state.get_object("b"), Some(a));
    }
}
