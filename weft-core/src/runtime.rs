//! Propagation Engine
//!
//! The two entry points every reactive cell funnels through:
//!
//! - [`track`] on read: link the cell's [`Dep`] to the innermost running
//!   tracker.
//! - [`trigger`] on write: raise the dirty level of every tracker linked to
//!   the cell, spreading invalidation and scheduling effects.
//!
//! # The self-trimming link list
//!
//! A tracker's dependency links are rebuilt *in place* on every run. The
//! run bumps the tracker's generation and resets a cursor; each read
//! either confirms the slot the cursor points at (same cell as last run,
//! common case) or evicts the old occupant and writes the cell actually
//! read. Slots past the final cursor are unlinked when the run ends. The
//! result: after any run, the link list is exactly the cells read, in read
//! order, and every abandoned cell has forgotten the tracker.
//!
//! # Trigger waves
//!
//! A trigger wave never re-runs effects inline — it wraps itself in a
//! scheduler pause so effects queued anywhere in the wave (including by
//! nested triggers) run only after the outermost trigger finishes raising
//! levels. Lock discipline is collect-then-release: the observer list is
//! snapshotted up front and no lock is held while invalidation hooks run.

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::trace;

use crate::context;
use crate::dep::Dep;
use crate::dirty::DirtyLevel;
use crate::registry;
use crate::scheduler;
use crate::tracker::{TrackerId, TrackerInner};

/// Register `dep` as a dependency of the innermost running tracker.
///
/// No-op when no tracker is running (a plain read) or when tracking is
/// paused. Reading the same cell twice within one run is also a no-op: the
/// generation recorded in the set already matches the run's.
pub fn track(dep: &Dep) {
    let Some(tracker) = context::current() else {
        return;
    };
    let id = tracker.id();

    // First tracked read ever: allocate the identity token. Effect-mode
    // trackers pin themselves alive until disposal; plain-mode trackers
    // stay collectible and rely on the registry purge at drop.
    if registry::ensure(id) && tracker.is_effect() && !tracker.is_disposed() {
        TrackerInner::install_self_ref(&tracker);
    }

    let generation = tracker.generation();
    if dep.generation_of(id) == Some(generation) {
        return;
    }

    dep.link(id, Arc::downgrade(&tracker), generation);

    let cursor = tracker.link_cursor();
    let evicted = registry::with_links(id, |links| {
        let slot_unchanged = links.get(cursor).map_or(false, |slot| slot.same_as(dep));
        if slot_unchanged {
            None
        } else if cursor < links.len() {
            Some(std::mem::replace(&mut links[cursor], dep.clone()))
        } else {
            links.push(dep.clone());
            None
        }
    })
    .flatten();

    if let Some(old) = evicted {
        cleanup_stale_link(&old, &tracker);
    }
    tracker.advance_link_cursor();
}

/// Remove `tracker` from `dep` unless the link was re-confirmed this run.
pub(crate) fn cleanup_stale_link(dep: &Dep, tracker: &TrackerInner) {
    dep.unlink_if_stale(tracker.id(), tracker.generation());
}

/// Raise every observer of `dep` to at least `level`.
///
/// Observers already at or above `level` are skipped, as is a mid-run
/// tracker asked for exactly [`DirtyLevel::DerivedDirty`] — a derived
/// computation must not invalidate itself through its own reads. A tracker
/// making the clean-to-dirty transition gets its invalidation hook called
/// and, in effect mode, a queued re-run; the queue flushes when the
/// outermost trigger on this thread completes.
pub fn trigger(dep: &Dep, level: DirtyLevel) {
    let _wave = scheduler::PauseScope::enter();

    let observers = dep.snapshot();
    trace!(observers = observers.len(), ?level, "trigger wave");

    let mut dead: SmallVec<[TrackerId; 4]> = SmallVec::new();
    for (id, weak) in observers {
        let Some(tracker) = weak.upgrade() else {
            dead.push(id);
            continue;
        };
        if tracker.is_running() && level == DirtyLevel::DerivedDirty {
            continue;
        }
        let Some(previous) = tracker.raise_dirty(level) else {
            continue;
        };
        if previous == DirtyLevel::Clean
            && !(tracker.is_querying() && level == DirtyLevel::DerivedDirty)
        {
            tracker.invalidate();
            if tracker.is_effect() {
                scheduler::enqueue(Arc::clone(&tracker));
            }
        }
    }

    if !dead.is_empty() {
        dep.sweep(&dead);
    }
}
