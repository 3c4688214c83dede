//! Effect Scheduling
//!
//! Effect-mode trackers are not re-run at the instant they go dirty: a
//! trigger wave first finishes raising dirty levels everywhere, then the
//! queued effects run. This module is that buffer — a FIFO queue plus a
//! pause counter.
//!
//! Every `trigger` call wraps itself in one pause/resume pair, so nested
//! triggers (a re-running effect writing to another cell) batch naturally:
//! the queue only drains once the outermost resume brings the counter back
//! to zero. [`defer_effects`] exposes the same mechanism for bulk-mutation
//! sections.
//!
//! The drain makes no dedup promise. An effect enqueued twice is invoked
//! twice; consumers that re-check their own dirty level (the `effect()`
//! façade does) turn the second invocation into a no-op.
//!
//! State is thread-local, like the tracking context.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::Arc;

use tracing::trace;

use crate::tracker::{Tracker, TrackerInner};

thread_local! {
    /// Nesting depth of pause scopes. Effects run only at depth zero.
    static PAUSE_DEPTH: Cell<usize> = Cell::new(0);

    /// Effect trackers awaiting re-run, in enqueue order.
    static PENDING_EFFECTS: RefCell<VecDeque<Arc<TrackerInner>>> = RefCell::new(VecDeque::new());
}

/// Queue an effect tracker for re-run at the next full resume.
pub(crate) fn enqueue(tracker: Arc<TrackerInner>) {
    PENDING_EFFECTS.with(|queue| queue.borrow_mut().push_back(tracker));
}

/// Increment the pause counter.
pub(crate) fn pause() {
    PAUSE_DEPTH.with(|depth| depth.set(depth.get() + 1));
}

/// Decrement the pause counter; at zero, drain the queue.
///
/// The depth is re-checked before every dequeue because a re-running effect
/// may itself trigger (briefly pausing again) or enqueue more effects; new
/// arrivals are drained in the same loop, FIFO.
pub(crate) fn resume() {
    PAUSE_DEPTH.with(|depth| depth.set(depth.get() - 1));
    loop {
        if PAUSE_DEPTH.with(|depth| depth.get()) != 0 {
            break;
        }
        let next = PENDING_EFFECTS.with(|queue| queue.borrow_mut().pop_front());
        let Some(tracker) = next else { break };
        if tracker.is_disposed() {
            continue;
        }
        trace!(tracker = tracker.id().raw(), "re-running effect");
        let handle = Tracker::from_inner(Arc::clone(&tracker));
        if let Some(rerun) = &tracker.rerun {
            rerun(&handle);
        }
    }
}

/// Guard pairing one `pause` with one `resume`.
///
/// If the thread is unwinding, the resume only decrements — queued effects
/// are left for the next healthy flush rather than run mid-panic.
pub(crate) struct PauseScope;

impl PauseScope {
    pub(crate) fn enter() -> Self {
        pause();
        PauseScope
    }
}

impl Drop for PauseScope {
    fn drop(&mut self) {
        if std::thread::panicking() {
            PAUSE_DEPTH.with(|depth| depth.set(depth.get() - 1));
        } else {
            resume();
        }
    }
}

/// Run `f` with effect re-runs deferred.
///
/// Mutations inside `f` raise dirty levels and queue effects as usual, but
/// nothing re-runs until `f` returns. An effect fed by several of the
/// mutated cells runs once, not once per mutation.
///
/// # Example
///
/// ```rust,ignore
/// defer_effects(|| {
///     first.set(1);
///     second.set(2);
///     third.set(3);
/// });
/// // dependent effects have each run exactly once
/// ```
pub fn defer_effects<R>(f: impl FnOnce() -> R) -> R {
    let _scope = PauseScope::enter();
    f()
}
