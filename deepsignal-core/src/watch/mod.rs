//! Watch Subsystem
//!
//! Watchers observe a reactive root through patches instead of reruns.
//! Every tracked write under the root produces a [`DeepPatch`]; the patches
//! of one synchronous burst are delivered together, after the burst, as a
//! single versioned batch.
//!
//! # Delivery
//!
//! - Batches go to watchers in registration order. Each watcher runs its
//!   own `once`/`immediate` state machine.
//! - Writes performed inside a callback land in the next batch.
//! - `stop_listening` may be called at any time, including from inside the
//!   watcher's own callback.

mod batcher;
mod patch;

use std::fmt;
use std::rc::{Rc, Weak};

pub(crate) use batcher::{record, Batcher};
pub use patch::{escape_segment, DeepPatch, Path, PatchKind, PatchOp, PathSegment};

use batcher::Listener;
use crate::deep::{AsDeepSignal, DeepNode, RootState};
use crate::error::{DeepSignalError, Result};

/// Options for [`watch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Stop after the first non-empty batch.
    pub once: bool,
    /// Call the callback once, synchronously, at registration.
    pub immediate: bool,
    /// Deliver each record as it happens instead of batching.
    pub trigger_instantly: bool,
}

impl WatchOptions {
    pub fn once() -> Self {
        Self {
            once: true,
            ..Self::default()
        }
    }

    pub fn immediate() -> Self {
        Self {
            immediate: true,
            ..Self::default()
        }
    }

    pub fn instant() -> Self {
        Self {
            trigger_instantly: true,
            ..Self::default()
        }
    }
}

/// What a watcher callback receives.
pub struct WatchEvent<'a> {
    /// Records of this delivery, in write order. Empty for the immediate call.
    pub patches: &'a [DeepPatch],
    /// Batch version. `None` for the immediate call and instant deliveries.
    pub version: Option<u64>,
    /// The watched root, after the writes.
    pub new_value: DeepNode,
}

impl fmt::Debug for WatchEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchEvent")
            .field("patches", &self.patches)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Registration returned by [`watch`].
pub struct WatchHandle {
    root: Weak<RootState>,
    listener: u64,
}

impl WatchHandle {
    /// Unsubscribe. Safe to call repeatedly and from inside the callback.
    pub fn stop_listening(&self) {
        if let Some(root) = self.root.upgrade() {
            if root.batcher.remove_listener(self.listener) {
                tracing::debug!(root = %root.id(), listener = self.listener, "watcher stopped");
            }
        }
    }

    /// Whether the watcher still receives batches.
    pub fn is_listening(&self) -> bool {
        self.root
            .upgrade()
            .is_some_and(|root| root.batcher.is_registered(self.listener))
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("listener", &self.listener)
            .field("listening", &self.is_listening())
            .finish()
    }
}

/// Watch a reactive root for patches.
///
/// `target` may be any handle into the root or its [`RootId`](crate::deep::RootId);
/// patches are always addressed from the root. Anything else fails with
/// [`DeepSignalError::NotADeepSignal`].
pub fn watch<T, F>(target: &T, callback: F, options: WatchOptions) -> Result<WatchHandle>
where
    T: AsDeepSignal + ?Sized,
    F: Fn(&WatchEvent<'_>) + 'static,
{
    let root = target
        .deep_signal_root()
        .and_then(RootState::find)
        .ok_or(DeepSignalError::NotADeepSignal {
            kind: target.describe(),
        })?;

    if options.immediate {
        if let Some(new_value) = DeepNode::from_root(&root) {
            callback(&WatchEvent {
                patches: &[],
                version: None,
                new_value,
            });
        }
    }

    let listener = Rc::new(Listener::new(
        Box::new(callback),
        options.once,
        options.trigger_instantly,
    ));
    let id = listener.id;
    root.batcher.add_listener(listener);
    tracing::debug!(
        root = %root.id(),
        listener = id,
        once = options.once,
        instant = options.trigger_instantly,
        "watcher registered"
    );

    Ok(WatchHandle {
        root: Rc::downgrade(&root),
        listener: id,
    })
}

/// Deliver the pending batch of `target`'s root right away.
///
/// Returns whether the target is a live root. Deferred delivery normally
/// happens on the microtask queue; this forces it for hosts that flush by
/// hand.
pub fn flush_now<T>(target: &T) -> bool
where
    T: AsDeepSignal + ?Sized,
{
    match target.deep_signal_root().and_then(RootState::find) {
        Some(root) => {
            batcher::flush(&root);
            true
        }
        None => false,
    }
}

/// Number of watchers registered on `target`'s root.
pub fn watcher_count<T>(target: &T) -> usize
where
    T: AsDeepSignal + ?Sized,
{
    target
        .deep_signal_root()
        .and_then(RootState::find)
        .map_or(0, |root| root.batcher.listener_count())
}

/// Version of the last batch delivered for `target`'s root.
pub fn patch_version<T>(target: &T) -> u64
where
    T: AsDeepSignal + ?Sized,
{
    target
        .deep_signal_root()
        .and_then(RootState::find)
        .map_or(0, |root| root.batcher.version())
}
