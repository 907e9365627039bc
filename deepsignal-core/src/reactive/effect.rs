//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever a tracked
//! read it performed is written.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    its initial read-set.
//!
//! 2. When any `(node, key)` pair in that read-set is written, the runtime
//!    reruns the effect synchronously (or at the end of the enclosing batch).
//!
//! 3. Before rerunning, the effect runs its cleanups and drops its old
//!    edges; the rerun tracks a fresh read-set. If the rerun fails, the
//!    edges from the last successful run are kept and the error is returned
//!    to whoever caused the rerun.
//!
//! # Cleanup
//!
//! Inside an effect body, [`on_cleanup`] registers a function that runs
//! before the next rerun and when the effect is stopped.
//!
//! # Ownership
//!
//! An effect created while another effect runs is owned by it. The child
//! is stopped by the parent's next rerun, or when the parent is stopped,
//! so rerunning a parent never piles up stale children.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::runtime::{Reactive, Runtime};
use super::subscriber::SubscriberId;
use crate::error::{BoxError, DeepSignalError, Result};

/// Counter for generating unique effect IDs.
static EFFECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_effect_id() -> u64 {
    EFFECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// What an effect body may return.
///
/// Bodies either return `()` or a `Result` whose error is surfaced as
/// [`DeepSignalError::Effect`].
pub trait EffectOutput {
    fn into_result(self) -> Result<()>;
}

impl EffectOutput for () {
    fn into_result(self) -> Result<()> {
        Ok(())
    }
}

impl<E> EffectOutput for std::result::Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_result(self) -> Result<()> {
        self.map_err(DeepSignalError::effect)
    }
}

struct EffectInner {
    id: u64,
    subscriber_id: SubscriberId,
    run: Box<dyn Fn() -> Result<()>>,
    dirty: Cell<bool>,
    stopped: Cell<bool>,
    run_count: Cell<usize>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl EffectInner {
    fn run_cleanups(&self) {
        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_dirty(&self) {
        self.dirty.set(true);
    }

    fn rerun(&self) -> Result<()> {
        if self.stopped.get() {
            return Ok(());
        }
        self.dirty.set(false);
        self.run_cleanups();
        self.run_count.set(self.run_count.get() + 1);
        tracing::trace!(effect = self.id, run = self.run_count.get(), "effect run");
        Runtime::run_tracked(self.subscriber_id, || (self.run)())
    }

    fn add_cleanup(&self, cleanup: Box<dyn FnOnce()>) {
        self.cleanups.borrow_mut().push(cleanup);
    }
}

/// A side-effecting computation that reruns when its reads change.
///
/// Cloning an `Effect` yields another handle to the same computation. The
/// computation stays alive until [`Effect::stop`] is called, even if every
/// handle is dropped.
///
/// # Example
///
/// ```rust,ignore
/// let state = deep_signal(json!({ "count": 0 }))?.into_object()?;
///
/// let effect = Effect::new({
///     let state = state.clone();
///     move || println!("count is {:?}", state.get("count"))
/// })?;
///
/// state.set("count", 5)?; // prints: count is 5
/// effect.stop();
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create a new effect and run it immediately.
    ///
    /// If the first run fails, the effect is stopped and the error returned.
    pub fn new<F, O>(run: F) -> Result<Self>
    where
        F: Fn() -> O + 'static,
        O: EffectOutput,
    {
        let effect = Self::new_lazy(run);
        if let Err(err) = effect.execute() {
            effect.stop();
            return Err(err);
        }
        Ok(effect)
    }

    /// Create a new effect without running it.
    ///
    /// The effect holds no edges until [`Effect::execute`] is called. When
    /// created inside a running effect, it is owned by that effect.
    pub fn new_lazy<F, O>(run: F) -> Self
    where
        F: Fn() -> O + 'static,
        O: EffectOutput,
    {
        let inner = Rc::new(EffectInner {
            id: next_effect_id(),
            subscriber_id: SubscriberId::new(),
            run: Box::new(move || run().into_result()),
            dirty: Cell::new(false),
            stopped: Cell::new(false),
            run_count: Cell::new(0),
            cleanups: RefCell::new(Vec::new()),
        });
        Runtime::register(inner.clone());

        let effect = Self { inner };
        if Runtime::current_subscriber().is_some() {
            let owned = effect.clone();
            Runtime::on_cleanup(Box::new(move || owned.stop()));
        }
        effect
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Run the effect now, rebuilding its read-set.
    ///
    /// Does nothing once the effect is stopped.
    pub fn execute(&self) -> Result<()> {
        self.inner.rerun()
    }

    /// Stop the effect: run its cleanups and drop every edge it holds.
    ///
    /// Safe to call more than once, and from inside the effect body.
    pub fn stop(&self) {
        if self.inner.stopped.replace(true) {
            return;
        }
        self.inner.run_cleanups();
        Runtime::unregister(self.inner.subscriber_id);
        tracing::debug!(effect = self.inner.id, "effect stopped");
    }

    /// Check if the effect has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.get()
    }

    /// Whether a rerun is queued but has not happened yet.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of `(node, key)` pairs the effect currently depends on.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependency_count(self.inner.subscriber_id)
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Register a cleanup on the effect that is currently running.
///
/// Outside an effect body the cleanup is dropped without running.
pub fn on_cleanup<F>(cleanup: F)
where
    F: FnOnce() + 'static,
{
    if !Runtime::on_cleanup(Box::new(cleanup)) {
        tracing::warn!("on_cleanup called outside of an effect; ignoring");
    }
}
