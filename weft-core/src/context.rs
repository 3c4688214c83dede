//! Tracking Context
//!
//! The context is the per-thread stack of currently executing trackers.
//! When a cell is read, the innermost entry (if any) is the tracker that
//! gets linked to the cell.
//!
//! # Implementation
//!
//! Two thread-local stacks: the active stack itself, and a stack of saved
//! stacks used by `pause_tracking`/`resume_tracking`. Pausing hides the
//! *entire* active stack — not just the top entry — so that cleanup or
//! refresh work running inside a tracked function is not attributed to any
//! tracker. While paused, `track` sees an empty stack and no-ops.
//!
//! All state here is thread-local; the engine is a single-logical-thread
//! system and each thread gets an independent tracking world. The stack is
//! empty whenever no tracker is running.

use std::cell::RefCell;
use std::sync::Arc;

use crate::tracker::TrackerInner;

thread_local! {
    /// Currently executing trackers, innermost last.
    static ACTIVE_TRACKERS: RefCell<Vec<Arc<TrackerInner>>> = RefCell::new(Vec::new());

    /// Stacks hidden by `pause_tracking`, most recent last.
    static SUSPENDED_STACKS: RefCell<Vec<Vec<Arc<TrackerInner>>>> = RefCell::new(Vec::new());
}

/// Push a tracker onto the active stack. Paired with [`pop`] by the run
/// guard in `tracker.rs`.
pub(crate) fn push(tracker: Arc<TrackerInner>) {
    ACTIVE_TRACKERS.with(|stack| stack.borrow_mut().push(tracker));
}

/// Pop the innermost tracker.
pub(crate) fn pop() {
    let popped = ACTIVE_TRACKERS.with(|stack| stack.borrow_mut().pop());
    debug_assert!(popped.is_some(), "tracker stack underflow");
}

/// The innermost active tracker, if any.
pub(crate) fn current() -> Option<Arc<TrackerInner>> {
    ACTIVE_TRACKERS.with(|stack| stack.borrow().last().cloned())
}

/// Check if any tracker is currently active on this thread.
pub fn is_tracking() -> bool {
    ACTIVE_TRACKERS.with(|stack| !stack.borrow().is_empty())
}

/// Hide the entire active stack. Reads made until the matching
/// [`resume_tracking`] link to no tracker.
pub(crate) fn pause_tracking() {
    let saved = ACTIVE_TRACKERS.with(|stack| std::mem::take(&mut *stack.borrow_mut()));
    SUSPENDED_STACKS.with(|stacks| stacks.borrow_mut().push(saved));
}

/// Restore the stack hidden by the matching [`pause_tracking`].
pub(crate) fn resume_tracking() {
    let restored = SUSPENDED_STACKS.with(|stacks| stacks.borrow_mut().pop());
    debug_assert!(restored.is_some(), "resume_tracking without pause_tracking");
    if let Some(restored) = restored {
        ACTIVE_TRACKERS.with(|stack| *stack.borrow_mut() = restored);
    }
}

/// Guard that resumes tracking when dropped.
struct PauseGuard;

impl Drop for PauseGuard {
    fn drop(&mut self) {
        resume_tracking();
    }
}

/// Run `f` with tracking paused.
///
/// Cell reads inside `f` do not register dependencies, no matter how deep
/// the surrounding tracker nesting is. Nests freely; panics inside `f`
/// still restore the stack.
///
/// # Example
///
/// ```rust,ignore
/// let snapshot = untracked(|| config_dep_read());
/// ```
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    pause_tracking();
    let _guard = PauseGuard;
    f()
}
