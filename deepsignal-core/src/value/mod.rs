//! Plain Nested Data
//!
//! `Value` is the canonical, unwrapped state. Wrapped nodes never copy it:
//! every read and write goes straight to these containers.
//!
//! Containers are shared handles. A value can be reachable from several
//! paths, and may even contain itself; equality on containers is identity.

mod container;

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use indexmap::{IndexMap, IndexSet};
use serde::{Serialize, Serializer};

pub use container::Container;

use crate::graph::{EntryKey, NodeId};

/// Fields of an object, in insertion order.
pub type ObjectData = IndexMap<String, Value>;

/// A plain object.
pub type Object = Container<ObjectData>;
/// An ordered sequence.
pub type Array = Container<Vec<Value>>;
/// A unique-element collection, in insertion order.
pub type Set = Container<IndexSet<Value>>;
/// A key/value collection. Tracked when wrapped, but never patched.
pub type Map = Container<IndexMap<Value, Value>>;

/// A plain nested value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(Object),
    Array(Array),
    Set(Set),
    Map(Map),
}

/// Bit pattern used for number equality: `-0` equals `0`, NaN equals NaN.
fn number_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0
    } else {
        n.to_bits()
    }
}

impl Value {
    /// A fresh empty object.
    pub fn object() -> Self {
        Self::Object(Object::default())
    }

    /// A fresh empty array.
    pub fn array() -> Self {
        Self::Array(Array::default())
    }

    /// A fresh set holding `items`.
    pub fn set<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Set(items.into_iter().collect())
    }

    /// Human-readable name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
        }
    }

    /// Identity of the container, or `None` for primitives.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Self::Object(c) => Some(c.id()),
            Self::Array(c) => Some(c.id()),
            Self::Set(c) => Some(c.id()),
            Self::Map(c) => Some(c.id()),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        self.node_id().is_some()
    }

    /// Whether this is a container that may be wrapped.
    pub fn is_observable(&self) -> bool {
        match self {
            Self::Object(c) => !c.is_shallow(),
            Self::Array(c) => !c.is_shallow(),
            Self::Set(c) => !c.is_shallow(),
            Self::Map(c) => !c.is_shallow(),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&Set> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Synthetic id assigned to this container as a set entry.
    pub fn synthetic_id(&self) -> Option<String> {
        match self {
            Self::Object(c) => c.synthetic_id(),
            Self::Array(c) => c.synthetic_id(),
            Self::Set(c) => c.synthetic_id(),
            Self::Map(c) => c.synthetic_id(),
            _ => None,
        }
    }

    pub(crate) fn set_synthetic_id(&self, id: impl Into<String>) {
        match self {
            Self::Object(c) => c.set_synthetic_id(id),
            Self::Array(c) => c.set_synthetic_id(id),
            Self::Set(c) => c.set_synthetic_id(id),
            Self::Map(c) => c.set_synthetic_id(id),
            _ => {}
        }
    }

    /// Membership key for this value inside a set.
    pub fn entry_key(&self) -> EntryKey {
        match self {
            Self::Null => EntryKey::Null,
            Self::Bool(b) => EntryKey::Bool(*b),
            Self::Number(n) => EntryKey::Number(number_bits(*n)),
            Self::String(s) => EntryKey::String(s.as_str().into()),
            other => match other.node_id() {
                Some(id) => EntryKey::Node(id),
                None => EntryKey::Null,
            },
        }
    }

    /// Snapshot the value as JSON.
    ///
    /// Sets become arrays and maps become objects keyed by the display form
    /// of their keys. Integral numbers become JSON integers, non-finite
    /// numbers become `null`. A container nested inside itself is cut off
    /// with `null`.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_inner(&mut HashSet::new())
    }

    fn to_json_inner(&self, ancestors: &mut HashSet<NodeId>) -> serde_json::Value {
        use serde_json::Value as Json;

        if let Some(id) = self.node_id() {
            if !ancestors.insert(id) {
                return Json::Null;
            }
        }

        let json = match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => Json::String(s.clone()),
            Self::Object(o) => {
                let fields = o.snapshot();
                Json::Object(
                    fields
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_json_inner(ancestors)))
                        .collect(),
                )
            }
            Self::Array(a) => {
                let items = a.snapshot();
                Json::Array(items.iter().map(|v| v.to_json_inner(ancestors)).collect())
            }
            Self::Set(s) => {
                let items = s.snapshot();
                Json::Array(items.iter().map(|v| v.to_json_inner(ancestors)).collect())
            }
            Self::Map(m) => {
                let entries = m.snapshot();
                Json::Object(
                    entries
                        .iter()
                        .map(|(k, v)| (k.key_string(), v.to_json_inner(ancestors)))
                        .collect(),
                )
            }
        };

        if let Some(id) = self.node_id() {
            ancestors.remove(&id);
        }
        json
    }

    /// The string form of a primitive, as used for map keys and ids.
    pub fn key_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Number(n) => match number_to_json(*n) {
                serde_json::Value::Null => n.to_string(),
                json => json.to_string(),
            },
            Self::Bool(b) => b.to_string(),
            Self::Null => "null".to_string(),
            other => other.to_json().to_string(),
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => number_bits(*a) == number_bits(*b),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Number(n) => number_bits(*n).hash(state),
            Self::String(s) => s.hash(state),
            Self::Object(c) => c.hash(state),
            Self::Array(c) => c.hash(state),
            Self::Set(c) => c.hash(state),
            Self::Map(c) => c.hash(state),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::Array(items.into_iter().collect()),
            Json::Object(fields) => Self::Object(fields.into_iter().collect()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Self::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(o)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Self::Array(a)
    }
}

impl From<Set> for Value {
    fn from(s: Set) -> Self {
        Self::Set(s)
    }
}

impl From<Map> for Value {
    fn from(m: Map) -> Self {
        Self::Map(m)
    }
}

impl<K, V> FromIterator<(K, V)> for Object
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>> FromIterator<V> for Set {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

impl FromIterator<(Value, Value)> for Map {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives_compare_by_value() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_eq!(Value::from(0.0), Value::from(-0.0));
        assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_ne!(Value::from("1"), Value::from(1));
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Value::from(json!({ "x": 1 }));
        let b = Value::from(json!({ "x": 1 }));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn set_membership_uses_value_equality() {
        let set = Value::set([Value::from(1), Value::from(1.0), Value::from("a")]);
        assert_eq!(set.as_set().unwrap().read().len(), 2);
    }

    #[test]
    fn json_round_trip_keeps_shape_and_integers() {
        let json = json!({ "a": { "b": [1, 2.5, "x", null, true] } });
        assert_eq!(Value::from(json.clone()).to_json(), json);
    }

    #[test]
    fn sets_and_maps_snapshot_as_json() {
        let set = Value::set(["a", "b"]);
        assert_eq!(set.to_json(), json!(["a", "b"]));

        let map: Map = [(Value::from(1), Value::from("one"))].into_iter().collect();
        assert_eq!(Value::from(map).to_json(), json!({ "1": "one" }));
    }

    #[test]
    fn cycles_are_cut_in_snapshots() {
        let obj = Object::default();
        obj.write().insert("me".into(), Value::Object(obj.clone()));
        obj.write().insert("n".into(), Value::from(1));

        assert_eq!(Value::Object(obj.clone()).to_json(), json!({ "me": null, "n": 1 }));
        // Break the cycle so the test does not leak.
        obj.write().clear();
    }

    #[test]
    fn shared_child_is_not_a_cycle() {
        let child = Value::from(json!({ "v": 1 }));
        let parent: Object = [("a", child.clone()), ("b", child)].into_iter().collect();
        assert_eq!(
            Value::Object(parent).to_json(),
            json!({ "a": { "v": 1 }, "b": { "v": 1 } })
        );
    }

    #[test]
    fn kinds_and_observability() {
        assert_eq!(Value::from(1).kind(), "number");
        assert!(Value::object().is_observable());
        assert!(Value::Map(Map::default()).is_observable());
        assert!(!Value::from("s").is_observable());

        let shallow = Object::default();
        shallow.mark_shallow();
        assert!(!Value::Object(shallow).is_observable());
    }
}
