//! Reactive Primitives
//!
//! This module implements the dependency-tracking kernel: the context stack,
//! the runtime that links tracked reads to computations, effects, memos,
//! and the deferred task queue that watch deliveries run on.
//!
//! # Concepts
//!
//! ## Tracking
//!
//! While an effect runs, every read of a wrapped node records a
//! `(node, key)` pair. The pairs an effect read during its latest
//! successful run are its read-set.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that reruns whenever a pair in
//! its read-set is written. Reruns are synchronous: the effect has run again
//! by the time the write returns, unless the write happened inside a
//! [`batch`] or inside another effect, in which case it reruns once at the
//! end of that outer frame.
//!
//! ## Memos
//!
//! A Memo caches a derived value. It recomputes lazily when read after one
//! of its reads changed, or eagerly when something is reading it, and its
//! readers rerun only when the result actually differs.
//!
//! ## Ownership
//!
//! Effects and memos created while another computation runs belong to it:
//! they are stopped when that computation reruns or is stopped.
//!
//! ## Microtasks
//!
//! Watchers are not effects. Their deliveries go through a [`Scheduler`]
//! and run after the current burst of writes.
//!
//! # Implementation Notes
//!
//! All state is thread-local. The context stack is a push/pop discipline
//! with drop guards, so a panicking effect body does not leave stale frames.

mod context;
mod effect;
mod memo;
mod microtask;
mod runtime;
mod subscriber;

pub use context::ReactiveContext;
pub use effect::{on_cleanup, Effect, EffectOutput};
pub use memo::{Memo, MemoState};
pub use microtask::{
    queue_microtask, run_microtasks, set_scheduler, tick, MicrotaskQueue, Scheduler, Task,
};
pub use runtime::{Reactive, Runtime};
pub use subscriber::SubscriberId;

use crate::error::Result;

/// Run `f` with effect reruns deferred to the end of the outermost batch.
///
/// Each dirtied effect reruns once, after `f` returns.
pub fn batch<R>(f: impl FnOnce() -> R) -> Result<R> {
    Runtime::batch(f)
}

/// Run `f` without recording any reads against the running effect.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::untracked();
    f()
}
