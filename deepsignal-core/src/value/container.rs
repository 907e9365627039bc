//! Shared container handles.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::graph::NodeId;

struct Inner<T> {
    id: NodeId,
    shallow: AtomicBool,
    synthetic_id: Mutex<Option<String>>,
    data: RwLock<T>,
}

/// A reference-counted, identity-carrying container.
///
/// Cloning a `Container` clones the handle: both clones see the same data
/// and share one [`NodeId`]. Two containers are equal only if they are the
/// same container.
pub struct Container<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Container<T> {
    /// Wrap `data` in a fresh container with a new identity.
    pub fn new(data: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NodeId::new(),
                shallow: AtomicBool::new(false),
                synthetic_id: Mutex::new(None),
                data: RwLock::new(data),
            }),
        }
    }

    /// The identity dependency edges are keyed by.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Lock the data for reading.
    ///
    /// Guards must not be held across writes to any wrapped node.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.data.read()
    }

    /// Lock the data for writing. Writes through the guard are untracked.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.data.write()
    }

    /// Whether both handles point at the same container.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether this container is excluded from deep wrapping.
    pub fn is_shallow(&self) -> bool {
        self.inner.shallow.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_shallow(&self) {
        self.inner.shallow.store(true, Ordering::Relaxed);
    }

    /// The id this container is addressed by when it is a set entry.
    pub fn synthetic_id(&self) -> Option<String> {
        self.inner.synthetic_id.lock().clone()
    }

    pub(crate) fn set_synthetic_id(&self, id: impl Into<String>) {
        *self.inner.synthetic_id.lock() = Some(id.into());
    }
}

impl<T: Clone> Container<T> {
    /// Copy the data out.
    pub fn snapshot(&self) -> T {
        self.read().clone()
    }
}

impl<T: Default> Default for Container<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Clone for Container<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Container<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for Container<T> {}

impl<T> std::hash::Hash for Container<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl<T> fmt::Debug for Container<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Data is not printed: containers may be cyclic.
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("shallow", &self.is_shallow())
            .finish()
    }
}
