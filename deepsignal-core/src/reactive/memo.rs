//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when the reads
//! it performed are written.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if nothing it read has changed, it returns the
//!    cached value.
//!
//! 3. When a read is written, the memo is marked dirty. If something is
//!    reading the memo, it recomputes right away and notifies its readers
//!    only if the result differs from the cached one.
//!
//! 4. A dirty memo nobody reads stays dirty until the next access.
//!
//! Reading a memo tracks the `(memo, Value)` pair, so memos feed effects
//! and other memos like any wrapped node does.
//!
//! Computations must only read. Writes from inside a computation are
//! queued but not flushed by it.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::runtime::{Reactive, Runtime};
use super::subscriber::SubscriberId;
use crate::error::Result;
use crate::graph::{EdgeKey, NodeId, TrackKey};

/// Counter for generating unique memo IDs.
static MEMO_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_memo_id() -> u64 {
    MEMO_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// A read changed, or the memo never ran.
    Dirty,
}

struct MemoInner<T> {
    id: u64,
    subscriber_id: SubscriberId,
    node: NodeId,
    compute: Box<dyn Fn() -> T>,
    value: RefCell<Option<T>>,
    state: Cell<MemoState>,
    disposed: Cell<bool>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl<T> MemoInner<T>
where
    T: Clone + PartialEq + 'static,
{
    fn run_cleanups(&self) {
        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }
    }

    /// Recompute, cache, and queue the readers when the value changed.
    fn recompute(&self) -> T {
        self.run_cleanups();
        let new_value = Runtime::derive(self.subscriber_id, || (self.compute)());

        let changed = self.value.borrow().as_ref() != Some(&new_value);
        *self.value.borrow_mut() = Some(new_value.clone());
        self.state.set(MemoState::Clean);
        tracing::trace!(memo = self.id, changed, "memo recomputed");

        if changed {
            Runtime::invalidate([EdgeKey::new(self.node, TrackKey::Value)]);
        }
        new_value
    }

    fn cached(&self) -> Option<T> {
        match self.state.get() {
            MemoState::Clean => self.value.borrow().clone(),
            MemoState::Dirty => None,
        }
    }
}

impl<T> Reactive for MemoInner<T>
where
    T: Clone + PartialEq + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_dirty(&self) {
        self.state.set(MemoState::Dirty);
    }

    fn rerun(&self) -> Result<()> {
        // A reader may already have refreshed it earlier in this flush.
        if self.disposed.get() || self.state.get() == MemoState::Clean {
            return Ok(());
        }
        if Runtime::dependent_count(self.node, TrackKey::Value) > 0 {
            self.recompute();
        }
        Ok(())
    }

    fn add_cleanup(&self, cleanup: Box<dyn FnOnce()>) {
        self.cleanups.borrow_mut().push(cleanup);
    }
}

/// A cached derived value that recomputes only when its reads change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. Must be Clone + PartialEq.
///
/// The PartialEq bound is needed to detect when the computed value actually
/// changed (some memos return the same value even if inputs changed), in
/// which case readers of the memo are not rerun.
///
/// Like an effect, a memo stays registered until [`Memo::dispose`] is
/// called or the effect that created it reruns.
pub struct Memo<T>
where
    T: Clone + PartialEq + 'static,
{
    inner: Rc<MemoInner<T>>,
}

impl<T> Memo<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new(MemoInner {
            id: next_memo_id(),
            subscriber_id: SubscriberId::new(),
            node: NodeId::new(),
            compute: Box::new(compute),
            value: RefCell::new(None),
            state: Cell::new(MemoState::Dirty),
            disposed: Cell::new(false),
            cleanups: RefCell::new(Vec::new()),
        });
        Runtime::register(inner.clone());

        let memo = Self { inner };
        if Runtime::current_subscriber().is_some() {
            let owned = memo.clone();
            Runtime::on_cleanup(Box::new(move || owned.dispose()));
        }
        memo
    }

    /// Get the memo's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the subscriber ID for this memo.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// The node readers of this memo depend on.
    pub fn node_id(&self) -> NodeId {
        self.inner.node
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// Inside an effect or another memo, this makes the caller depend on
    /// the memo's value.
    pub fn get(&self) -> T {
        Runtime::track(self.inner.node, TrackKey::Value);
        self.get_untracked()
    }

    /// Get the current value without making the caller depend on it.
    pub fn get_untracked(&self) -> T {
        match self.inner.cached() {
            Some(value) => value,
            None => self.inner.recompute(),
        }
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        self.inner.state.get()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Get the number of computations reading this memo.
    pub fn dependent_count(&self) -> usize {
        Runtime::dependent_count(self.inner.node, TrackKey::Value)
    }

    /// Get the number of `(node, key)` pairs the computation depends on.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependency_count(self.inner.subscriber_id)
    }

    /// Drop every edge the memo holds. The last cached value stays
    /// readable but is never refreshed by writes again.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.run_cleanups();
        Runtime::unregister(self.inner.subscriber_id);
        tracing::debug!(memo = self.inner.id, "memo disposed");
    }

    /// Check if the memo has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
