//! DeepSignal Core
//!
//! This crate provides a deep, fine-grained reactive state engine. It
//! implements:
//!
//! - A dependency-tracking kernel with synchronously rerunning effects
//!   and lazily cached memos
//! - Deep wrapping of nested objects, arrays, sets and maps
//! - Batched, path-addressed patch delivery to watchers
//! - Escape hatches (`peek`, `traverse`) that control what gets tracked
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Dependency edges between `(node, key)` pairs and effects
//! - `reactive`: Context stack, runtime, effects, memos and the microtask queue
//! - `value`: Plain nested data (`Value`) and JSON conversion
//! - `deep`: Reactive roots and the wrapped node handles
//! - `watch`: Patches, the per-root batcher and `watch`
//! - `escape`: `peek` and `traverse`
//!
//! Everything reactive is bound to the thread that created it.
//!
//! # Example
//!
//! ```rust,ignore
//! use deepsignal_core::{deep_signal, watch, Effect, WatchOptions};
//! use serde_json::json;
//!
//! let state = deep_signal(json!({ "a": { "b": { "c": 1 } } }))?;
//! let root = state.as_object().unwrap().clone();
//!
//! // Reruns whenever a.b.c changes.
//! let effect = Effect::new({
//!     let root = root.clone();
//!     move || {
//!         let b = root.get_object("a").unwrap().get_object("b").unwrap();
//!         println!("c = {:?}", b.get("c"));
//!     }
//! })?;
//!
//! // Receives one batch per burst of writes.
//! let handle = watch(
//!     &state,
//!     |event| println!("{:?}", event.patches),
//!     WatchOptions::default(),
//! )?;
//!
//! root.get_object("a").unwrap().get_object("b").unwrap().set("c", 2)?;
//! deepsignal_core::run_microtasks(); // delivers the batch
//!
//! handle.stop_listening();
//! effect.stop();
//! ```

pub mod deep;
pub mod error;
pub mod escape;
pub mod graph;
pub mod reactive;
pub mod value;
pub mod watch;

pub use deep::{
    deep_signal, deep_signal_with, is_deep_signal, root_id, set_entry_synthetic_id, shallow,
    AsDeepSignal, DeepArray, DeepMap, DeepNode, DeepObject, DeepSet, DeepSignalOptions, DeepValue,
    PropGenContext, PropGenResult, RootId,
};
pub use error::{DeepSignalError, Result};
pub use escape::{peek, traverse};
pub use reactive::{
    batch, on_cleanup, queue_microtask, run_microtasks, set_scheduler, tick, untracked, Effect,
    Memo, MemoState, Scheduler, Task,
};
pub use value::Value;
pub use watch::{
    watch, DeepPatch, PatchKind, PatchOp, PathSegment, WatchEvent, WatchHandle, WatchOptions,
};

/// Create an effect. Shorthand for [`Effect::new`].
pub fn effect<F, O>(run: F) -> Result<Effect>
where
    F: Fn() -> O + 'static,
    O: reactive::EffectOutput,
{
    Effect::new(run)
}

/// Create a memo. Shorthand for [`Memo::new`].
pub fn memo<T, F>(compute: F) -> Memo<T>
where
    T: Clone + PartialEq + 'static,
    F: Fn() -> T + 'static,
{
    Memo::new(compute)
}
