//! Reactive Runtime
//!
//! The runtime is the dependency-tracking kernel. It connects tracked reads
//! on wrapped nodes to the effects that performed them and reruns those
//! effects when a tracked pair is written.
//!
//! # How It Works
//!
//! 1. When an effect is created, it registers with the runtime.
//!
//! 2. While an effect runs, every tracked read records a `(node, key)`
//!    pair on the context stack. When the run succeeds, that read-set
//!    replaces the effect's previous edges in the graph.
//!
//! 3. When a tracked pair is written, the runtime:
//!    a. Looks up the subscribers of the pair
//!    b. Marks them dirty and queues them (deduplicated)
//!    c. Reruns the queue synchronously, unless a batch or another flush
//!       is in progress, in which case the outer frame drains it
//!
//! # Thread Model
//!
//! All state lives in thread-local storage. A reactive root, its effects
//! and its watchers are bound to the thread that created them; there is
//! no cross-thread propagation.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexSet;

use super::context::ReactiveContext;
use super::subscriber::SubscriberId;
use crate::error::{DeepSignalError, Result};
use crate::graph::{DependencyGraph, EdgeKey, NodeId, TrackKey};

/// A trait for computations that can be rerun when dependencies change.
pub trait Reactive {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Mark this computation as needing a rerun.
    fn mark_dirty(&self);

    /// Rerun the computation (called by the runtime when dirty).
    fn rerun(&self) -> Result<()>;

    /// Attach a cleanup to run before the next rerun or on disposal.
    fn add_cleanup(&self, cleanup: Box<dyn FnOnce()>);
}

#[derive(Default)]
struct RuntimeState {
    graph: DependencyGraph,
    /// Live computations. The runtime owns them until they are stopped.
    reactives: HashMap<SubscriberId, Rc<dyn Reactive>>,
    /// Dirty computations waiting for a rerun, in trigger order.
    pending: IndexSet<SubscriberId>,
    batch_depth: usize,
    flushing: bool,
}

thread_local! {
    static STATE: RefCell<RuntimeState> = RefCell::new(RuntimeState::default());
}

fn with_state<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

/// The per-thread reactive runtime.
///
/// This is a namespace over thread-local state; it has no instances.
pub struct Runtime;

impl Runtime {
    /// Register a computation with the runtime.
    ///
    /// The runtime keeps it alive until [`Runtime::unregister`] is called.
    pub fn register(reactive: Rc<dyn Reactive>) {
        let id = reactive.subscriber_id();
        with_state(|state| state.reactives.insert(id, reactive));
    }

    /// Unregister a computation and drop every edge it holds.
    pub fn unregister(id: SubscriberId) {
        let removed = with_state(|state| {
            state.graph.remove_subscriber(id);
            state.pending.shift_remove(&id);
            state.reactives.remove(&id)
        });
        // Dropped outside the borrow: the computation's captures may touch
        // the runtime when they go away.
        drop(removed);
    }

    /// Whether a computation is still registered.
    pub fn is_registered(id: SubscriberId) -> bool {
        with_state(|state| state.reactives.contains_key(&id))
    }

    /// Record a read of `(node, key)` against the running computation.
    ///
    /// No-op when nothing is being tracked.
    pub fn track(node: NodeId, key: TrackKey) {
        let edge = EdgeKey::new(node, key);
        if let Some(subscriber) = ReactiveContext::track_dependency(edge.clone()) {
            tracing::trace!(%edge, %subscriber, "track");
        }
    }

    /// Invalidate the dependents of `(node, key)` and rerun them.
    pub fn trigger(node: NodeId, key: TrackKey) -> Result<()> {
        Self::trigger_all([EdgeKey::new(node, key)])
    }

    /// Invalidate the dependents of several pairs written by one operation.
    ///
    /// Each dependent is queued once, then the queue is flushed unless a
    /// batch or flush is already in progress.
    pub fn trigger_all<I>(edges: I) -> Result<()>
    where
        I: IntoIterator<Item = EdgeKey>,
    {
        Self::invalidate(edges);
        Self::flush_if_idle()
    }

    /// Mark and queue the dependents of `edges` without draining the queue.
    ///
    /// The enclosing batch, computation or flush reruns them.
    pub(crate) fn invalidate<I>(edges: I)
    where
        I: IntoIterator<Item = EdgeKey>,
    {
        let dirty: Vec<Rc<dyn Reactive>> = with_state(|state| {
            let mut dirty = Vec::new();
            for edge in edges {
                for subscriber in state.graph.dependents(&edge) {
                    tracing::trace!(%edge, %subscriber, "trigger");
                    if state.pending.insert(subscriber) {
                        if let Some(reactive) = state.reactives.get(&subscriber) {
                            dirty.push(Rc::clone(reactive));
                        }
                    }
                }
            }
            dirty
        });

        for reactive in &dirty {
            reactive.mark_dirty();
        }
    }

    /// Run `f` with writes deferred: effects dirtied inside rerun once when
    /// the outermost batch ends.
    pub fn batch<R>(f: impl FnOnce() -> R) -> Result<R> {
        let value = {
            let _guard = BatchGuard::enter();
            f()
        };
        Self::flush_if_idle().map(|()| value)
    }

    /// Whether a batch is open on this thread.
    pub fn is_batching() -> bool {
        with_state(|state| state.batch_depth > 0)
    }

    /// Run `f` as the body of computation `id`, rebuilding its read-set.
    ///
    /// The previous edges are cleared before `f` runs. On success the
    /// freshly collected edges are installed; on failure the previous ones
    /// are restored.
    pub fn run_tracked(id: SubscriberId, f: impl FnOnce() -> Result<()>) -> Result<()> {
        let previous = with_state(|state| state.graph.remove_subscriber(id));
        let restore = RestoreEdges::new(id, previous);

        let result = {
            let _batch = BatchGuard::enter();
            let ctx = ReactiveContext::enter(id);
            let result = f();
            let dependencies = ctx.finish();
            if result.is_ok() && Self::is_registered(id) {
                tracing::debug!(subscriber = %id, edges = dependencies.len(), "installed read-set");
                restore.disarm();
                with_state(|state| {
                    state.graph.replace_dependencies(id, dependencies);
                });
            }
            result
        };

        let flushed = Self::flush_if_idle();
        result.and(flushed)
    }

    /// Run the infallible body `f` of derived computation `id` and install
    /// the pairs it read as the new read-set.
    ///
    /// Nothing is flushed afterwards: derived bodies only read.
    pub(crate) fn derive<T>(id: SubscriberId, f: impl FnOnce() -> T) -> T {
        let _batch = BatchGuard::enter();
        let ctx = ReactiveContext::enter(id);
        let value = f();
        let dependencies = ctx.finish();
        if Self::is_registered(id) {
            tracing::debug!(
                subscriber = %id,
                edges = dependencies.len(),
                "installed derived read-set"
            );
            with_state(|state| state.graph.replace_dependencies(id, dependencies));
        }
        value
    }

    /// Number of edges a computation currently holds.
    pub fn dependency_count(id: SubscriberId) -> usize {
        with_state(|state| state.graph.dependency_count(id))
    }

    /// Number of computations subscribed to `(node, key)`.
    pub fn dependent_count(node: NodeId, key: TrackKey) -> usize {
        with_state(|state| state.graph.dependent_count(&EdgeKey::new(node, key)))
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a tracking context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// Attach a cleanup to the running computation.
    ///
    /// Returns `false` (and drops the cleanup) when nothing is running.
    pub fn on_cleanup(cleanup: Box<dyn FnOnce()>) -> bool {
        let running = Self::current_subscriber()
            .and_then(|id| with_state(|state| state.reactives.get(&id).cloned()));
        match running {
            Some(reactive) => {
                reactive.add_cleanup(cleanup);
                true
            }
            None => false,
        }
    }

    fn flush_if_idle() -> Result<()> {
        let idle = with_state(|state| state.batch_depth == 0 && !state.flushing);
        if idle {
            Self::flush()
        } else {
            Ok(())
        }
    }

    /// Drain the dirty queue. Computations dirtied while draining are
    /// appended and drained by the same loop.
    fn flush() -> Result<()> {
        let _guard = FlushGuard::enter();
        let mut failures = Vec::new();

        loop {
            let next = with_state(|state| {
                let id = state.pending.shift_remove_index(0)?;
                Some(state.reactives.get(&id).cloned())
            });
            let Some(next) = next else { break };
            let Some(reactive) = next else { continue };

            if let Err(err) = reactive.rerun() {
                tracing::debug!(
                    subscriber = %reactive.subscriber_id(),
                    error = %err,
                    "effect failed during flush"
                );
                failures.push(err);
            }
        }

        DeepSignalError::from_failures(failures)
    }
}

struct BatchGuard;

impl BatchGuard {
    fn enter() -> Self {
        with_state(|state| state.batch_depth += 1);
        Self
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        with_state(|state| state.batch_depth -= 1);
    }
}

struct FlushGuard;

impl FlushGuard {
    fn enter() -> Self {
        with_state(|state| state.flushing = true);
        Self
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        with_state(|state| state.flushing = false);
    }
}

/// Puts a computation's previous edges back unless its run succeeded.
struct RestoreEdges {
    id: SubscriberId,
    previous: RefCell<Option<HashSet<EdgeKey>>>,
}

impl RestoreEdges {
    fn new(id: SubscriberId, previous: HashSet<EdgeKey>) -> Self {
        Self {
            id,
            previous: RefCell::new(Some(previous)),
        }
    }

    fn disarm(&self) {
        self.previous.borrow_mut().take();
    }
}

impl Drop for RestoreEdges {
    fn drop(&mut self) {
        let Some(previous) = self.previous.get_mut().take() else {
            return;
        };
        let id = self.id;
        with_state(|state| {
            if state.reactives.contains_key(&id) {
                for edge in previous {
                    state.graph.add_edge(edge, id);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct MockReactive {
        id: SubscriberId,
        node: NodeId,
        dirty: Cell<bool>,
        runs: Cell<usize>,
        fail: Cell<bool>,
    }

    impl MockReactive {
        fn new(node: NodeId) -> Rc<Self> {
            Rc::new(Self {
                id: SubscriberId::new(),
                node,
                dirty: Cell::new(false),
                runs: Cell::new(0),
                fail: Cell::new(false),
            })
        }

        fn body(&self) -> Result<()> {
            self.runs.set(self.runs.get() + 1);
            Runtime::track(self.node, TrackKey::prop("a"));
            if self.fail.get() {
                return Err(DeepSignalError::effect("mock failure"));
            }
            Ok(())
        }
    }

    impl Reactive for MockReactive {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn mark_dirty(&self) {
            self.dirty.set(true);
        }

        fn rerun(&self) -> Result<()> {
            self.dirty.set(false);
            Runtime::run_tracked(self.id, || self.body())
        }

        fn add_cleanup(&self, _cleanup: Box<dyn FnOnce()>) {}
    }

    fn register(node: NodeId) -> Rc<MockReactive> {
        let mock = MockReactive::new(node);
        Runtime::register(mock.clone());
        mock.rerun().unwrap();
        mock
    }

    #[test]
    fn runtime_registers_and_unregisters() {
        let node = NodeId::new();
        let mock = register(node);

        assert!(Runtime::is_registered(mock.id));
        assert_eq!(Runtime::dependency_count(mock.id), 1);

        Runtime::unregister(mock.id);
        assert!(!Runtime::is_registered(mock.id));
        assert_eq!(Runtime::dependency_count(mock.id), 0);
    }

    #[test]
    fn trigger_reruns_dependents() {
        let node = NodeId::new();
        let mock = register(node);
        assert_eq!(mock.runs.get(), 1);

        Runtime::trigger(node, TrackKey::prop("a")).unwrap();
        assert_eq!(mock.runs.get(), 2);

        Runtime::trigger(node, TrackKey::prop("unrelated")).unwrap();
        assert_eq!(mock.runs.get(), 2);
    }

    #[test]
    fn batch_defers_and_dedupes_reruns() {
        let node = NodeId::new();
        let mock = register(node);

        Runtime::batch(|| {
            Runtime::trigger(node, TrackKey::prop("a")).unwrap();
            Runtime::trigger(node, TrackKey::prop("a")).unwrap();
            assert!(mock.dirty.get());
            assert_eq!(mock.runs.get(), 1);
        })
        .unwrap();

        assert_eq!(mock.runs.get(), 2);
        assert!(!mock.dirty.get());
    }

    #[test]
    fn failed_run_keeps_previous_edges() {
        let node = NodeId::new();
        let mock = register(node);

        mock.fail.set(true);
        let err = Runtime::trigger(node, TrackKey::prop("a")).unwrap_err();
        assert!(matches!(err, DeepSignalError::Effect(_)));

        // The edge from the last successful run is still there.
        assert_eq!(Runtime::dependent_count(node, TrackKey::prop("a")), 1);

        mock.fail.set(false);
        Runtime::trigger(node, TrackKey::prop("a")).unwrap();
        assert_eq!(mock.runs.get(), 3);
    }

    #[test]
    fn every_failure_in_a_flush_is_returned() {
        let node = NodeId::new();
        let first = register(node);
        let second = register(node);
        let healthy = register(node);
        first.fail.set(true);
        second.fail.set(true);

        let err = Runtime::trigger(node, TrackKey::prop("a")).unwrap_err();
        assert!(matches!(&err, DeepSignalError::Effects(errors) if errors.len() == 2));
        assert_eq!(err.failures().len(), 2);
        assert_eq!(healthy.runs.get(), 2);
    }

    #[test]
    fn tracking_outside_a_computation_is_a_noop() {
        let node = NodeId::new();
        Runtime::track(node, TrackKey::Length);
        assert_eq!(Runtime::dependent_count(node, TrackKey::Length), 0);
        assert!(!Runtime::is_tracking());
    }
}
