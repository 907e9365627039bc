//! Deep Reactive Wrapping
//!
//! [`deep_signal`] turns a plain nested value into a reactive root. Reading
//! through the root returns wrapped handles for nested objects, arrays and
//! sets, created on first read; reads record dependencies on the running
//! effect and writes rerun the effects that read what was written.
//!
//! # Handles
//!
//! A handle is the pair (container, root). It holds no state of its own, so
//! reading the same nested container twice yields two equal handles, and
//! dropping a handle loses nothing. The plain value stays canonical.
//!
//! # Limitations
//!
//! Key/value maps are wrapped and tracked for effects, but writes through a
//! [`DeepMap`] produce no patches. Watchers only learn about a map when the
//! field holding it is replaced.

mod array;
mod handle;
mod map;
mod object;
mod options;
mod root;
mod set;

pub use array::DeepArray;
pub use handle::{AsDeepSignal, DeepNode, DeepValue};
pub use map::DeepMap;
pub use object::DeepObject;
pub use options::{DeepSignalOptions, PropGenContext, PropGenResult, PropGenerator};
pub use root::RootId;
pub use set::DeepSet;
pub(crate) use root::RootState;

use crate::error::{DeepSignalError, Result};
use crate::value::{Object, Value};

/// Wrap `value` in a reactive root with default options.
///
/// Wrapping a container that already is a live root returns that root.
pub fn deep_signal(value: impl Into<Value>) -> Result<DeepNode> {
    deep_signal_with(value, DeepSignalOptions::default())
}

/// Wrap `value` in a reactive root.
///
/// Fails with [`DeepSignalError::NotObservable`] for primitives and
/// shallow containers.
pub fn deep_signal_with(value: impl Into<Value>, options: DeepSignalOptions) -> Result<DeepNode> {
    let value = value.into();
    if !value.is_observable() {
        let kind = if value.is_container() {
            "shallow container"
        } else {
            value.kind()
        };
        return Err(DeepSignalError::NotObservable { kind });
    }
    let not_observable = DeepSignalError::NotObservable { kind: value.kind() };
    RootState::open(value, options)
        .and_then(|root| DeepNode::from_root(&root))
        .ok_or(not_observable)
}

/// Mark a container so it is never wrapped.
///
/// Reads of a shallow container return it as a plain value; only
/// replacing the field that holds it is tracked.
pub fn shallow(value: impl Into<Value>) -> Value {
    let value = value.into();
    match &value {
        Value::Object(c) => c.mark_shallow(),
        Value::Array(c) => c.mark_shallow(),
        Value::Set(c) => c.mark_shallow(),
        Value::Map(c) => c.mark_shallow(),
        _ => {}
    }
    value
}

/// Whether `target` is a handle into a live reactive root.
pub fn is_deep_signal<T>(target: &T) -> bool
where
    T: AsDeepSignal + ?Sized,
{
    target
        .deep_signal_root()
        .is_some_and(|id| RootState::find(id).is_some())
}

/// Identity of the root `target` belongs to.
///
/// Equal for every handle of one root; distinct across roots, even roots
/// with equal contents.
pub fn root_id<T>(target: &T) -> Option<RootId>
where
    T: AsDeepSignal + ?Sized,
{
    target.deep_signal_root()
}

/// Assign the id `object` is addressed by once it is added to a set.
///
/// Takes precedence over the prop generator and the id property.
pub fn set_entry_synthetic_id(object: &Object, id: impl Into<String>) {
    object.set_synthetic_id(id);
}
