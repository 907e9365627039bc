//! Patch Batcher
//!
//! Each root has one batcher shared by all of its watchers. Records are
//! buffered as writes happen; the first record after a flush schedules the
//! next flush on the microtask queue. A flush hands the whole buffer to
//! every batched watcher, in registration order, as one versioned batch.
//!
//! Just-in-time watchers bypass the buffer and see each record as it is
//! produced.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use super::patch::{DeepPatch, PatchOp, PathSegment};
use super::WatchEvent;
use crate::deep::{DeepNode, RootState};
use crate::reactive::queue_microtask;

pub(crate) type Callback = Box<dyn Fn(&WatchEvent<'_>)>;

pub(crate) struct Listener {
    pub(crate) id: u64,
    callback: Callback,
    once: bool,
    instant: bool,
    active: Cell<bool>,
}

impl Listener {
    pub(crate) fn new(callback: Callback, once: bool, instant: bool) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            callback,
            once,
            instant,
            active: Cell::new(true),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn call(&self, event: &WatchEvent<'_>) {
        (self.callback)(event);
    }
}

#[derive(Default)]
pub(crate) struct Batcher {
    pending: RefCell<Vec<DeepPatch>>,
    version: Cell<u64>,
    flush_scheduled: Cell<bool>,
    listeners: RefCell<Vec<Rc<Listener>>>,
}

impl Batcher {
    pub(crate) fn add_listener(&self, listener: Rc<Listener>) {
        self.listeners.borrow_mut().push(listener);
    }

    /// Deactivate and drop a listener. Returns whether it was registered.
    pub(crate) fn remove_listener(&self, id: u64) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(index) = listeners.iter().position(|l| l.id == id) else {
            return false;
        };
        let listener = listeners.remove(index);
        listener.active.set(false);
        true
    }

    pub(crate) fn has_listeners(&self) -> bool {
        !self.listeners.borrow().is_empty()
    }

    pub(crate) fn is_registered(&self, id: u64) -> bool {
        self.listeners.borrow().iter().any(|l| l.id == id)
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Version of the last delivered batch, 0 before the first.
    pub(crate) fn version(&self) -> u64 {
        self.version.get()
    }

    fn snapshot(&self, instant: bool) -> Vec<Rc<Listener>> {
        self.listeners
            .borrow()
            .iter()
            .filter(|l| l.instant == instant && l.is_active())
            .cloned()
            .collect()
    }

    fn has_batched_listeners(&self) -> bool {
        self.listeners.borrow().iter().any(|l| !l.instant)
    }

    /// Drop buffered entry-level records of the set at `set_path`.
    ///
    /// Those are records below the set, and primitive adds and deletes at
    /// the set path itself (the ones without a container `kind`).
    fn prune_entries(&self, set_path: &[PathSegment]) {
        self.pending.borrow_mut().retain(|patch| {
            if !patch.is_under(set_path) {
                return true;
            }
            let below = patch.path.len() > set_path.len();
            let primitive_entry =
                matches!(patch.op, PatchOp::Add | PatchOp::Delete) && patch.kind.is_none();
            !(below || primitive_entry)
        });
    }

    /// Buffer a record. Returns `true` if a flush needs to be scheduled.
    fn push(&self, patch: DeepPatch) -> bool {
        self.pending.borrow_mut().push(patch);
        !self.flush_scheduled.replace(true)
    }

    fn take(&self) -> Vec<DeepPatch> {
        self.flush_scheduled.set(false);
        std::mem::take(&mut *self.pending.borrow_mut())
    }
}

/// Route one record to the watchers of `root`.
pub(crate) fn record(root: &Rc<RootState>, patch: DeepPatch) {
    let instant = root.batcher.snapshot(true);
    if !instant.is_empty() {
        let patches = std::slice::from_ref(&patch);
        deliver(root, &instant, patches, None);
    }

    if !root.batcher.has_batched_listeners() {
        return;
    }
    if patch.op == PatchOp::Clear {
        root.batcher.prune_entries(&patch.path);
    }
    if root.batcher.push(patch) {
        let weak: Weak<RootState> = Rc::downgrade(root);
        tracing::debug!(root = %root.id(), "scheduled patch flush");
        queue_microtask(Box::new(move || {
            if let Some(root) = weak.upgrade() {
                flush(&root);
            }
        }));
    }
}

/// Deliver everything buffered for `root` as one batch.
pub(crate) fn flush(root: &Rc<RootState>) {
    let patches = root.batcher.take();
    if patches.is_empty() {
        return;
    }
    let version = root.batcher.version.get() + 1;
    root.batcher.version.set(version);

    let listeners = root.batcher.snapshot(false);
    tracing::debug!(
        root = %root.id(),
        version,
        patches = patches.len(),
        listeners = listeners.len(),
        "flushing patch batch"
    );
    deliver(root, &listeners, &patches, Some(version));
}

fn deliver(
    root: &Rc<RootState>,
    listeners: &[Rc<Listener>],
    patches: &[DeepPatch],
    version: Option<u64>,
) {
    let Some(new_value) = DeepNode::from_root(root) else {
        return;
    };
    let event = WatchEvent {
        patches,
        version,
        new_value,
    };
    for listener in listeners {
        // Stopped by an earlier callback of this delivery.
        if !listener.is_active() {
            continue;
        }
        listener.call(&event);
        if listener.once {
            root.batcher.remove_listener(listener.id);
        }
    }
}
