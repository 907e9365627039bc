//! Wrapped node handles.

use std::fmt;
use std::rc::Rc;

use super::array::DeepArray;
use super::map::DeepMap;
use super::object::DeepObject;
use super::root::{RootId, RootState};
use super::set::DeepSet;
use crate::graph::NodeId;
use crate::value::Value;
use crate::watch::PathSegment;

/// A wrapped object, array, set or map.
///
/// Handles are cheap to clone. Two handles are equal when they wrap the same
/// container.
#[derive(Clone, PartialEq)]
pub enum DeepNode {
    Object(DeepObject),
    Array(DeepArray),
    Set(DeepSet),
    Map(DeepMap),
}

impl DeepNode {
    /// Handle for the root container of `root`.
    pub(crate) fn from_root(root: &Rc<RootState>) -> Option<Self> {
        Self::from_value(root, root.value().clone())
    }

    /// Handle for an observable container under `root`. No parent link is
    /// recorded.
    pub(crate) fn from_value(root: &Rc<RootState>, value: Value) -> Option<Self> {
        match value {
            Value::Object(raw) if !raw.is_shallow() => {
                Some(Self::Object(DeepObject::new(raw, Rc::clone(root))))
            }
            Value::Array(raw) if !raw.is_shallow() => {
                Some(Self::Array(DeepArray::new(raw, Rc::clone(root))))
            }
            Value::Set(raw) if !raw.is_shallow() => {
                Some(Self::Set(DeepSet::new(raw, Rc::clone(root))))
            }
            Value::Map(raw) if !raw.is_shallow() => {
                Some(Self::Map(DeepMap::new(raw, Rc::clone(root))))
            }
            _ => None,
        }
    }

    /// Identity of the wrapped container.
    pub fn id(&self) -> NodeId {
        match self {
            Self::Object(o) => o.id(),
            Self::Array(a) => a.id(),
            Self::Set(s) => s.id(),
            Self::Map(m) => m.id(),
        }
    }

    /// Identity of the root this node was reached through.
    pub fn root_id(&self) -> RootId {
        match self {
            Self::Object(o) => o.root_id(),
            Self::Array(a) => a.root_id(),
            Self::Set(s) => s.root_id(),
            Self::Map(m) => m.root_id(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
        }
    }

    /// The underlying plain container.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Object(o) => Value::Object(o.raw().clone()),
            Self::Array(a) => Value::Array(a.raw().clone()),
            Self::Set(s) => Value::Set(s.raw().clone()),
            Self::Map(m) => Value::Map(m.raw().clone()),
        }
    }

    /// Untracked JSON snapshot.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_value().to_json()
    }

    pub fn as_object(&self) -> Option<&DeepObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&DeepArray> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&DeepSet> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&DeepMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<DeepObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<DeepArray> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_set(self) -> Option<DeepSet> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_map(self) -> Option<DeepMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Debug for DeepNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(o) => fmt::Debug::fmt(o, f),
            Self::Array(a) => fmt::Debug::fmt(a, f),
            Self::Set(s) => fmt::Debug::fmt(s, f),
            Self::Map(m) => fmt::Debug::fmt(m, f),
        }
    }
}

impl From<DeepObject> for DeepNode {
    fn from(o: DeepObject) -> Self {
        Self::Object(o)
    }
}

impl From<DeepArray> for DeepNode {
    fn from(a: DeepArray) -> Self {
        Self::Array(a)
    }
}

impl From<DeepSet> for DeepNode {
    fn from(s: DeepSet) -> Self {
        Self::Set(s)
    }
}

impl From<DeepMap> for DeepNode {
    fn from(m: DeepMap) -> Self {
        Self::Map(m)
    }
}

impl From<DeepNode> for Value {
    fn from(node: DeepNode) -> Self {
        node.to_value()
    }
}

impl From<&DeepNode> for Value {
    fn from(node: &DeepNode) -> Self {
        node.to_value()
    }
}

/// Result of reading through a wrapped node.
///
/// Containers come back wrapped. Primitives and shallow containers come
/// back as plain values.
#[derive(Debug, Clone, PartialEq)]
pub enum DeepValue {
    Plain(Value),
    Node(DeepNode),
}

impl DeepValue {
    pub fn as_node(&self) -> Option<&DeepNode> {
        match self {
            Self::Node(node) => Some(node),
            Self::Plain(_) => None,
        }
    }

    pub fn into_node(self) -> Option<DeepNode> {
        match self {
            Self::Node(node) => Some(node),
            Self::Plain(_) => None,
        }
    }

    pub fn as_plain(&self) -> Option<&Value> {
        match self {
            Self::Plain(value) => Some(value),
            Self::Node(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&DeepObject> {
        self.as_node().and_then(DeepNode::as_object)
    }

    pub fn as_array(&self) -> Option<&DeepArray> {
        self.as_node().and_then(DeepNode::as_array)
    }

    pub fn as_set(&self) -> Option<&DeepSet> {
        self.as_node().and_then(DeepNode::as_set)
    }

    pub fn as_map(&self) -> Option<&DeepMap> {
        self.as_node().and_then(DeepNode::as_map)
    }

    pub fn into_object(self) -> Option<DeepObject> {
        self.into_node().and_then(DeepNode::into_object)
    }

    pub fn into_array(self) -> Option<DeepArray> {
        self.into_node().and_then(DeepNode::into_array)
    }

    pub fn into_set(self) -> Option<DeepSet> {
        self.into_node().and_then(DeepNode::into_set)
    }

    pub fn into_map(self) -> Option<DeepMap> {
        self.into_node().and_then(DeepNode::into_map)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_plain().and_then(Value::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_plain().and_then(Value::as_str)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_plain().and_then(Value::as_bool)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Plain(Value::Null))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Plain(value) => value.kind(),
            Self::Node(node) => node.kind(),
        }
    }

    /// The underlying plain value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Plain(value) => value.clone(),
            Self::Node(node) => node.to_value(),
        }
    }

    /// Untracked JSON snapshot.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_value().to_json()
    }
}

impl Default for DeepValue {
    fn default() -> Self {
        Self::Plain(Value::Null)
    }
}

impl From<DeepValue> for Value {
    fn from(value: DeepValue) -> Self {
        match value {
            DeepValue::Plain(value) => value,
            DeepValue::Node(node) => node.to_value(),
        }
    }
}

impl From<&DeepValue> for Value {
    fn from(value: &DeepValue) -> Self {
        value.to_value()
    }
}

impl From<DeepNode> for DeepValue {
    fn from(node: DeepNode) -> Self {
        Self::Node(node)
    }
}

impl From<&DeepNode> for DeepValue {
    fn from(node: &DeepNode) -> Self {
        Self::Node(node.clone())
    }
}

impl From<&DeepValue> for DeepValue {
    fn from(value: &DeepValue) -> Self {
        value.clone()
    }
}

impl From<&DeepObject> for DeepValue {
    fn from(object: &DeepObject) -> Self {
        Self::Node(DeepNode::Object(object.clone()))
    }
}

impl From<&DeepArray> for DeepValue {
    fn from(array: &DeepArray) -> Self {
        Self::Node(DeepNode::Array(array.clone()))
    }
}

impl From<&DeepSet> for DeepValue {
    fn from(set: &DeepSet) -> Self {
        Self::Node(DeepNode::Set(set.clone()))
    }
}

impl From<&DeepMap> for DeepValue {
    fn from(map: &DeepMap) -> Self {
        Self::Node(DeepNode::Map(map.clone()))
    }
}

/// Wrap a value read from `parent` under `segment`.
///
/// Containers get linked to `parent` the first time they are read this way.
pub(crate) fn wrap(
    root: &Rc<RootState>,
    parent: NodeId,
    segment: PathSegment,
    value: Value,
) -> DeepValue {
    if !value.is_observable() {
        return DeepValue::Plain(value);
    }
    if let Some(child) = value.node_id() {
        root.adopt(child, parent, segment);
    }
    match DeepNode::from_value(root, value.clone()) {
        Some(node) => DeepValue::Node(node),
        None => DeepValue::Plain(value),
    }
}

/// Anything that may name a reactive root.
pub trait AsDeepSignal {
    /// The root this refers to, if it is reactive at all.
    fn deep_signal_root(&self) -> Option<RootId>;

    /// Short description for error messages.
    fn describe(&self) -> &'static str;
}

impl AsDeepSignal for DeepNode {
    fn deep_signal_root(&self) -> Option<RootId> {
        Some(self.root_id())
    }

    fn describe(&self) -> &'static str {
        self.kind()
    }
}

impl AsDeepSignal for DeepObject {
    fn deep_signal_root(&self) -> Option<RootId> {
        Some(self.root_id())
    }

    fn describe(&self) -> &'static str {
        "object"
    }
}

impl AsDeepSignal for DeepArray {
    fn deep_signal_root(&self) -> Option<RootId> {
        Some(self.root_id())
    }

    fn describe(&self) -> &'static str {
        "array"
    }
}

impl AsDeepSignal for DeepSet {
    fn deep_signal_root(&self) -> Option<RootId> {
        Some(self.root_id())
    }

    fn describe(&self) -> &'static str {
        "set"
    }
}

impl AsDeepSignal for DeepMap {
    fn deep_signal_root(&self) -> Option<RootId> {
        Some(self.root_id())
    }

    fn describe(&self) -> &'static str {
        "map"
    }
}

impl AsDeepSignal for DeepValue {
    fn deep_signal_root(&self) -> Option<RootId> {
        self.as_node().map(DeepNode::root_id)
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::Plain(value) => value.describe(),
            Self::Node(node) => node.kind(),
        }
    }
}

impl AsDeepSignal for RootId {
    fn deep_signal_root(&self) -> Option<RootId> {
        Some(*self)
    }

    fn describe(&self) -> &'static str {
        "released root"
    }
}

impl AsDeepSignal for Value {
    fn deep_signal_root(&self) -> Option<RootId> {
        None
    }

    fn describe(&self) -> &'static str {
        match self {
            Value::Object(_) => "plain object",
            Value::Array(_) => "plain array",
            Value::Set(_) => "plain set",
            Value::Map(_) => "plain map",
            other => other.kind(),
        }
    }
}

impl AsDeepSignal for serde_json::Value {
    fn deep_signal_root(&self) -> Option<RootId> {
        None
    }

    fn describe(&self) -> &'static str {
        match self {
            serde_json::Value::Object(_) => "plain object",
            serde_json::Value::Array(_) => "plain array",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::Bool(_) => "boolean",
            serde_json::Value::Null => "null",
        }
    }
}
