//! Dependency Sets
//!
//! A [`Dep`] is the reverse index attached to one reactive cell: it maps
//! each tracker that read the cell to the generation at which the tracker
//! last confirmed the dependency. Reading the cell calls [`Dep::track`];
//! writing it calls [`Dep::trigger`].
//!
//! The map is keyed by [`TrackerId`] and stores weak references to the
//! tracker state, so a dependency set never keeps a tracker alive: a dead
//! entry simply fails to resolve during a trigger wave and is swept.
//!
//! Two optional hooks exist for derived-value layers:
//!
//! - a *refresh* hook, invoked by the dirty query to re-evaluate the
//!   derived source that owns this set;
//! - an *observed* hook, fired whenever the set gains its first tracker
//!   (lazy activation of a source). Neither is used by the engine itself.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::dirty::DirtyLevel;
use crate::runtime;
use crate::tracker::{Tracker, TrackerId, TrackerInner};

/// One observer entry: who is linked, and at which of their generations.
pub(crate) struct DepEntry {
    tracker: Weak<TrackerInner>,
    generation: u64,
}

pub(crate) struct DepInner {
    /// Observers in insertion order. Key uniqueness gives the "at most one
    /// entry per tracker" guarantee structurally.
    observers: RwLock<IndexMap<TrackerId, DepEntry>>,

    /// Re-evaluates the derived source owning this set.
    refresh: Option<Box<dyn Fn() + Send + Sync>>,

    /// Fired on each empty-to-observed transition.
    observed: RwLock<Option<Arc<dyn Fn() + Send + Sync>>>,
}

/// The dependency set of one reactive cell. Cloning shares the set.
#[derive(Clone)]
pub struct Dep {
    inner: Arc<DepInner>,
}

impl Dep {
    /// Create an empty dependency set.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a dependency set owned by a derived source.
    ///
    /// `refresh` re-evaluates that source; the dirty query invokes it to
    /// find out whether a `MaybeDirty` suspicion is real.
    pub fn with_refresh<F>(refresh: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(Some(Box::new(refresh)))
    }

    fn build(refresh: Option<Box<dyn Fn() + Send + Sync>>) -> Self {
        Self {
            inner: Arc::new(DepInner {
                observers: RwLock::new(IndexMap::new()),
                refresh,
                observed: RwLock::new(None),
            }),
        }
    }

    /// Install the hook fired whenever this set gains its first tracker.
    pub fn on_observed<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.inner.observed.write() = Some(Arc::new(hook));
    }

    /// Register the currently running tracker (if any) as an observer.
    ///
    /// Call on every read of the cell this set belongs to.
    pub fn track(&self) {
        runtime::track(self);
    }

    /// Notify observers that the cell this set belongs to was mutated.
    ///
    /// Call on every write, with [`DirtyLevel::Dirty`] for a plain value
    /// cell. Derived layers use the lower levels for chaining.
    pub fn trigger(&self, level: DirtyLevel) {
        runtime::trigger(self, level);
    }

    /// Number of trackers currently linked to this set.
    pub fn tracker_count(&self) -> usize {
        self.inner.observers.read().len()
    }

    /// Whether `tracker` is currently linked to this set.
    pub fn is_tracked_by(&self, tracker: &Tracker) -> bool {
        self.inner.observers.read().contains_key(&tracker.id())
    }

    /// The generation recorded for `id`, if linked.
    pub(crate) fn generation_of(&self, id: TrackerId) -> Option<u64> {
        self.inner.observers.read().get(&id).map(|e| e.generation)
    }

    /// Insert or update the entry for `id`. Fires the observed hook on the
    /// empty-to-observed transition, outside the lock.
    pub(crate) fn link(&self, id: TrackerId, tracker: Weak<TrackerInner>, generation: u64) {
        let first = {
            let mut observers = self.inner.observers.write();
            let first = observers.is_empty();
            observers.insert(id, DepEntry { tracker, generation });
            first
        };
        if first {
            let hook = self.inner.observed.read().clone();
            if let Some(hook) = hook {
                hook();
            }
        }
    }

    /// Remove the entry for `id`, preserving the order of the rest.
    pub(crate) fn unlink(&self, id: TrackerId) {
        self.inner.observers.write().shift_remove(&id);
    }

    /// Remove the entry for `id` only if its recorded generation no longer
    /// matches `current_generation` — i.e. the tracker has moved on to a
    /// newer run without revisiting this set.
    pub(crate) fn unlink_if_stale(&self, id: TrackerId, current_generation: u64) {
        let mut observers = self.inner.observers.write();
        if let Some(entry) = observers.get(&id) {
            if entry.generation != current_generation {
                observers.shift_remove(&id);
            }
        }
    }

    /// Copy out the observer list so a trigger wave can iterate without
    /// holding the lock.
    pub(crate) fn snapshot(&self) -> Vec<(TrackerId, Weak<TrackerInner>)> {
        self.inner
            .observers
            .read()
            .iter()
            .map(|(id, entry)| (*id, entry.tracker.clone()))
            .collect()
    }

    /// Drop entries whose trackers failed to resolve during a wave.
    pub(crate) fn sweep(&self, dead: &[TrackerId]) {
        let mut observers = self.inner.observers.write();
        for id in dead {
            observers.shift_remove(id);
        }
    }

    /// Invoke the refresh hook, if one exists. Returns whether it ran.
    pub(crate) fn refresh(&self) -> bool {
        match &self.inner.refresh {
            Some(hook) => {
                hook();
                true
            }
            None => false,
        }
    }

    /// Identity comparison: two handles to the same underlying set.
    pub(crate) fn same_as(&self, other: &Dep) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Dep {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Dep {}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("tracker_count", &self.tracker_count())
            .field("has_refresh", &self.inner.refresh.is_some())
            .finish()
    }
}
