//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a wrapped node is read,
//! we can record the `(node, key)` pair against the current computation.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (running an effect), we push the
//! subscriber onto the stack. When the computation completes, we pop it and
//! hand the collected read-set back to the caller.
//!
//! An untracked frame (pushed by `peek`/`untracked`) has no subscriber.
//! Reads under it are not recorded, even when an effect is running below.

use std::cell::RefCell;

use indexmap::IndexSet;

use super::SubscriberId;
use crate::graph::EdgeKey;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The computation being run, or `None` for an untracked frame.
    subscriber_id: Option<SubscriberId>,
    /// Pairs read during this computation, in first-read order.
    dependencies: IndexSet<EdgeKey>,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
    popped: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, tracked reads register the subscriber
    /// as a dependent.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    /// Enter a frame in which reads are not tracked.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(subscriber_id: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                dependencies: IndexSet::new(),
            });
        });

        Self {
            subscriber_id,
            popped: false,
        }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the current subscriber ID, if reads are being tracked.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber_id))
    }

    /// Whether `subscriber_id` is anywhere on the stack.
    pub fn is_running(subscriber_id: SubscriberId) -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|entry| entry.subscriber_id == Some(subscriber_id))
        })
    }

    /// Record a dependency on the given pair.
    ///
    /// Returns the subscriber it was recorded for, if any.
    pub fn track_dependency(edge: EdgeKey) -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let entry = stack.last_mut()?;
            let subscriber = entry.subscriber_id?;
            entry.dependencies.insert(edge);
            Some(subscriber)
        })
    }

    /// Get the dependencies collected in the current context.
    pub fn get_dependencies() -> Vec<EdgeKey> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.iter().cloned().collect())
                .unwrap_or_default()
        })
    }

    /// Pop this context and return the pairs it collected.
    pub fn finish(mut self) -> IndexSet<EdgeKey> {
        self.popped = true;
        self.pop().map(|entry| entry.dependencies).unwrap_or_default()
    }

    fn pop(&self) -> Option<ContextEntry> {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = &popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
            popped
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.popped {
            self.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeId, TrackKey};

    fn edge(key: &str) -> EdgeKey {
        EdgeKey::new(NodeId::new(), TrackKey::prop(key))
    }

    #[test]
    fn context_tracks_subscriber() {
        let id = SubscriberId::new();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(id);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
            assert!(ReactiveContext::is_running(id));
        }

        assert!(!ReactiveContext::is_active());
        assert!(!ReactiveContext::is_running(id));
    }

    #[test]
    fn context_collects_dependencies_once() {
        let id = SubscriberId::new();
        let ctx = ReactiveContext::enter(id);

        let a = edge("a");
        let b = edge("b");
        ReactiveContext::track_dependency(a.clone());
        ReactiveContext::track_dependency(b.clone());
        ReactiveContext::track_dependency(a.clone());

        assert_eq!(ReactiveContext::get_dependencies(), vec![a.clone(), b.clone()]);

        let deps = ctx.finish();
        assert_eq!(deps.len(), 2);
        assert!(!ReactiveContext::is_active());
    }

    #[test]
    fn untracked_frame_masks_outer_subscriber() {
        let id = SubscriberId::new();
        let _ctx = ReactiveContext::enter(id);

        {
            let _quiet = ReactiveContext::untracked();
            assert!(!ReactiveContext::is_active());
            assert_eq!(ReactiveContext::track_dependency(edge("hidden")), None);
            assert!(ReactiveContext::is_running(id));
        }

        assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        assert!(ReactiveContext::get_dependencies().is_empty());
    }

    #[test]
    fn nested_contexts() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();

        {
            let _ctx1 = ReactiveContext::enter(id1);
            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(id2);
                assert_eq!(ReactiveContext::current_subscriber(), Some(id2));
            }

            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }
}
