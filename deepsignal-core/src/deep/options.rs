//! Per-root configuration.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::value::{Object, Value};
use crate::watch::PathSegment;

/// What a prop generator is told about a freshly attached object.
pub struct PropGenContext<'a> {
    /// Where the object was attached. For set entries, the path of the set.
    pub path: &'a [PathSegment],
    /// Whether the object was added to a set.
    pub in_set: bool,
    /// The object itself.
    pub object: &'a Object,
}

/// What a prop generator hands back.
#[derive(Debug, Clone, Default)]
pub struct PropGenResult {
    /// Identifier to address a set entry by in patch paths.
    pub synthetic_id: Option<String>,
    /// Fields added to the object when it does not have them yet.
    pub extra_props: Vec<(String, Value)>,
}

impl PropGenResult {
    pub fn with_synthetic_id(mut self, id: impl Into<String>) -> Self {
        self.synthetic_id = Some(id.into());
        self
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_props.push((key.into(), value.into()));
        self
    }
}

/// Callback run whenever a plain object is attached under a root.
pub type PropGenerator = Rc<dyn Fn(&PropGenContext<'_>) -> PropGenResult>;

/// Options for [`deep_signal_with`](super::deep_signal_with).
#[derive(Clone, Default)]
pub struct DeepSignalOptions {
    pub(crate) prop_generator: Option<PropGenerator>,
    pub(crate) synthetic_id_property: Option<String>,
    pub(crate) read_only_props: HashSet<String>,
}

impl DeepSignalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `generator` for every plain object attached under the root.
    pub fn with_prop_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&PropGenContext<'_>) -> PropGenResult + 'static,
    {
        self.prop_generator = Some(Rc::new(generator));
        self
    }

    /// Expose synthetic ids on objects under this field name, and read ids
    /// of set entries from it.
    pub fn with_synthetic_id_property(mut self, name: impl Into<String>) -> Self {
        self.synthetic_id_property = Some(name.into());
        self
    }

    /// Fields that may not be written or deleted once present.
    pub fn with_read_only_props<I, S>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read_only_props.extend(props.into_iter().map(Into::into));
        self
    }

    pub fn synthetic_id_property(&self) -> Option<&str> {
        self.synthetic_id_property.as_deref()
    }

    pub fn is_read_only(&self, key: &str) -> bool {
        self.read_only_props.contains(key)
    }
}

impl fmt::Debug for DeepSignalOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepSignalOptions")
            .field("prop_generator", &self.prop_generator.is_some())
            .field("synthetic_id_property", &self.synthetic_id_property)
            .field("read_only_props", &self.read_only_props)
            .finish()
    }
}
