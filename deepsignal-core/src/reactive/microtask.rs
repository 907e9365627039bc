//! Deferred task scheduling.
//!
//! Watch deliveries are not synchronous: the first mutation of a burst
//! schedules a flush task, and the task runs once the burst is over. What
//! "once the burst is over" means is up to the host, so scheduling goes
//! through the [`Scheduler`] trait.
//!
//! The default scheduler is a per-thread FIFO queue. It is drained by
//! [`run_microtasks`], or by awaiting [`tick`] from async code.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce()>;

/// Host hook for deferred work.
pub trait Scheduler {
    /// Queue `task` to run after the current synchronous burst.
    fn schedule(&self, task: Task);
}

/// The default scheduler: a per-thread queue drained by [`run_microtasks`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MicrotaskQueue;

impl Scheduler for MicrotaskQueue {
    fn schedule(&self, task: Task) {
        QUEUE.with(|queue| queue.borrow_mut().push_back(task));
    }
}

thread_local! {
    static QUEUE: RefCell<VecDeque<Task>> = const { RefCell::new(VecDeque::new()) };
    static SCHEDULER: RefCell<Rc<dyn Scheduler>> = RefCell::new(Rc::new(MicrotaskQueue));
}

/// Replace the scheduler for this thread, returning the previous one.
pub fn set_scheduler(scheduler: Rc<dyn Scheduler>) -> Rc<dyn Scheduler> {
    SCHEDULER.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), scheduler))
}

/// Hand `task` to this thread's scheduler.
pub fn queue_microtask(task: Task) {
    let scheduler = SCHEDULER.with(|slot| Rc::clone(&slot.borrow()));
    scheduler.schedule(task);
}

/// Run queued tasks until the default queue is empty.
///
/// Tasks queued while draining run in the same call. Returns how many
/// tasks ran.
pub fn run_microtasks() -> usize {
    let mut ran = 0;
    loop {
        let next = QUEUE.with(|queue| queue.borrow_mut().pop_front());
        let Some(task) = next else { break };
        task();
        ran += 1;
    }
    if ran > 0 {
        tracing::trace!(tasks = ran, "drained microtasks");
    }
    ran
}

/// Let the current burst settle: drain pending tasks, then yield to the
/// async runtime.
pub async fn tick() {
    run_microtasks();
    tokio::task::yield_now().await;
}
