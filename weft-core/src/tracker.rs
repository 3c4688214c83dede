//! Trackers
//!
//! A Tracker is a re-runnable unit of computation. While its wrapped
//! function executes inside [`Tracker::run`], every reactive cell it reads
//! links the cell's [`Dep`](crate::dep::Dep) back to the tracker. When one
//! of those cells is later written, the tracker's dirty level is raised and
//! — for effect-mode trackers — a re-run is scheduled.
//!
//! # Modes
//!
//! - **Plain** trackers only get marked dirty; a consumer polls them (this
//!   is what a computed-value layer builds on).
//! - **Effect** trackers additionally carry a re-run callback that the
//!   scheduler invokes once the current trigger wave completes.
//!
//! # Lifetime
//!
//! A plain tracker is reclaimed as soon as every [`Tracker`] handle is
//! dropped: the dependency sets only hold weak references to it, and the
//! drop of the shared state purges its registry entry so no cell keeps a
//! dead key. An effect tracker installs a strong self-reference when it
//! first links a dependency and therefore lives until [`Tracker::dispose`].

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use crate::context;
use crate::dep::Dep;
use crate::dirty::DirtyLevel;
use crate::registry;

/// Counter for generating unique tracker IDs.
static TRACKER_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a tracker.
///
/// Every structure that refers to a tracker (dependency sets, the lifetime
/// registry) keys on this ID rather than on the tracker itself, so a dead
/// tracker never has to be dereferenced to be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackerId(u64);

impl TrackerId {
    /// Generate a new unique tracker ID.
    pub fn new() -> Self {
        Self(TRACKER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TrackerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared tracker state.
///
/// Reached from three places: `Tracker` handles (strong), dependency-set
/// entries (weak), and — for effect mode — its own `self_ref` cycle.
pub(crate) struct TrackerInner {
    id: TrackerId,

    /// Effect-mode trackers are auto-scheduled for re-run on invalidation.
    is_effect: bool,

    /// How stale the last run might be. Raised by trigger waves, reset to
    /// `Clean` when the outermost run completes.
    dirty: RwLock<DirtyLevel>,

    /// Bumped once per run; the value stored into each dependency set as
    /// "last seen", making duplicate reads within one run no-ops.
    generation: AtomicU64,

    /// Cursor into the registry link list for the run in progress.
    link_cursor: AtomicUsize,

    /// Reentrancy depth of `run` (guards against self-triggering).
    runnings: AtomicU32,

    /// Reentrancy depth of the dirty query (guards against invalidation
    /// storms while the chain is being refreshed).
    queryings: AtomicU32,

    /// Whether `dispose` has been called.
    disposed: AtomicBool,

    /// Strong self-reference for effect-mode trackers. Installed when the
    /// tracker first links a dependency, cleared by `dispose`.
    self_ref: Mutex<Option<Arc<TrackerInner>>>,

    /// Invoked the first time the tracker goes dirty within a wave. A
    /// derived-value layer uses this to spread dirtiness to its own
    /// dependents.
    on_invalidate: Box<dyn Fn() + Send + Sync>,

    /// Invoked by the scheduler flush; present only in effect mode.
    pub(crate) rerun: Option<Box<dyn Fn(&Tracker) + Send + Sync>>,
}

impl TrackerInner {
    pub(crate) fn id(&self) -> TrackerId {
        self.id
    }

    pub(crate) fn is_effect(&self) -> bool {
        self.is_effect
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn dirty_level(&self) -> DirtyLevel {
        *self.dirty.read()
    }

    pub(crate) fn set_dirty(&self, level: DirtyLevel) {
        *self.dirty.write() = level;
    }

    /// Raise the dirty level, returning the previous level, or `None` if the
    /// current level is already at or above `level`. Never lowers.
    pub(crate) fn raise_dirty(&self, level: DirtyLevel) -> Option<DirtyLevel> {
        let mut current = self.dirty.write();
        if *current >= level {
            return None;
        }
        let previous = *current;
        *current = level;
        Some(previous)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    pub(crate) fn link_cursor(&self) -> usize {
        self.link_cursor.load(Ordering::Relaxed)
    }

    pub(crate) fn advance_link_cursor(&self) {
        self.link_cursor.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.runnings.load(Ordering::Relaxed) > 0
    }

    pub(crate) fn is_querying(&self) -> bool {
        self.queryings.load(Ordering::Relaxed) > 0
    }

    /// Call the invalidation hook.
    pub(crate) fn invalidate(&self) {
        (self.on_invalidate)();
    }

    /// Install the strong self-reference that keeps an effect-mode tracker
    /// alive until disposal.
    pub(crate) fn install_self_ref(this: &Arc<TrackerInner>) {
        *this.self_ref.lock() = Some(Arc::clone(this));
    }

    /// Start-of-run bookkeeping: new generation, link cursor back to zero.
    fn begin_run(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
        self.link_cursor.store(0, Ordering::Relaxed);
    }

    /// End-of-run bookkeeping: every link slot past the final cursor
    /// belongs to a previous run and was not revisited; unlink them and
    /// truncate the list.
    fn finish_run(&self) {
        let cursor = self.link_cursor();
        let stale: SmallVec<[Dep; 4]> = registry::with_links(self.id, |links| {
            if links.len() > cursor {
                links.drain(cursor..).collect()
            } else {
                SmallVec::new()
            }
        })
        .unwrap_or_default();

        for dep in &stale {
            dep.unlink_if_stale(self.id, self.generation());
        }
    }
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        // Last strong reference is gone; no dependency set may keep this
        // tracker's key alive.
        registry::purge(self.id);
    }
}

/// Guard that restores run bookkeeping when a run exits, including by panic.
struct RunGuard<'a> {
    inner: &'a Arc<TrackerInner>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.inner.finish_run();
        let depth_before = self.inner.runnings.fetch_sub(1, Ordering::Relaxed);
        context::pop();
        if depth_before == 1 {
            self.inner.set_dirty(DirtyLevel::Clean);
        }
    }
}

/// Guard for the dirty query's reentrancy counter and tracking pause.
struct QueryGuard<'a> {
    inner: &'a TrackerInner,
}

impl Drop for QueryGuard<'_> {
    fn drop(&mut self) {
        context::resume_tracking();
        self.inner.queryings.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Handle to a tracker. Cloning shares the underlying state.
///
/// # Example
///
/// ```rust,ignore
/// let tracker = Tracker::new(|| {});
/// let value = tracker.run(|| {
///     cell_dep.track();
///     compute_something()
/// });
/// ```
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

impl Tracker {
    /// Create a plain-mode tracker.
    ///
    /// `on_invalidate` runs the first time the tracker goes dirty within a
    /// trigger wave; a derived-value layer uses it to trigger its own
    /// dependency set.
    pub fn new<F>(on_invalidate: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(Box::new(on_invalidate), None)
    }

    /// Create an effect-mode tracker.
    ///
    /// In addition to `on_invalidate`, effect trackers carry `rerun`, which
    /// the scheduler invokes (with a handle to this tracker) once the
    /// trigger wave that dirtied them completes.
    pub fn new_effect<F, R>(on_invalidate: F, rerun: R) -> Self
    where
        F: Fn() + Send + Sync + 'static,
        R: Fn(&Tracker) + Send + Sync + 'static,
    {
        Self::build(Box::new(on_invalidate), Some(Box::new(rerun)))
    }

    fn build(
        on_invalidate: Box<dyn Fn() + Send + Sync>,
        rerun: Option<Box<dyn Fn(&Tracker) + Send + Sync>>,
    ) -> Self {
        let is_effect = rerun.is_some();
        Self {
            inner: Arc::new(TrackerInner {
                id: TrackerId::new(),
                is_effect,
                // A fresh tracker has never run, so it starts fully dirty.
                dirty: RwLock::new(DirtyLevel::Dirty),
                generation: AtomicU64::new(0),
                link_cursor: AtomicUsize::new(0),
                runnings: AtomicU32::new(0),
                queryings: AtomicU32::new(0),
                disposed: AtomicBool::new(false),
                self_ref: Mutex::new(None),
                on_invalidate,
                rerun,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<TrackerInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<TrackerInner> {
        &self.inner
    }

    /// Get the tracker's unique ID.
    pub fn id(&self) -> TrackerId {
        self.inner.id
    }

    /// Whether this tracker is auto-scheduled on invalidation.
    pub fn is_effect(&self) -> bool {
        self.inner.is_effect
    }

    /// The current dirty level, without resolving `MaybeDirty`.
    pub fn dirty_level(&self) -> DirtyLevel {
        self.inner.dirty_level()
    }

    /// Whether `dispose` has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Execute `f` with this tracker as the active reader.
    ///
    /// Every cell read inside `f` links back to this tracker, in read
    /// order. Link slots left over from the previous run that `f` does not
    /// revisit are unlinked when the run ends. A panic inside `f`
    /// propagates unmodified; bookkeeping (stack pop, link trimming, dirty
    /// reset) still happens.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        context::push(Arc::clone(&self.inner));
        self.inner.runnings.fetch_add(1, Ordering::Relaxed);
        self.inner.begin_run();
        let _guard = RunGuard { inner: &self.inner };
        f()
    }

    /// Whether the tracker needs a re-run, resolving `MaybeDirty` first.
    ///
    /// Resolution walks the tracker's dependency links in order and invokes
    /// each set's refresh hook (re-evaluating the derived source that owns
    /// it). If a refreshed source actually changed, it triggers its set
    /// with `DerivedDirty`, which raises this tracker; the walk stops as
    /// soon as that happens. Tracking is paused for the duration so the
    /// refresh work is not attributed to any tracker.
    pub fn is_dirty(&self) -> bool {
        let maybe = {
            let mut current = self.inner.dirty.write();
            if *current == DirtyLevel::MaybeDirty {
                *current = DirtyLevel::Clean;
                true
            } else {
                false
            }
        };

        if maybe {
            self.inner.queryings.fetch_add(1, Ordering::Relaxed);
            context::pause_tracking();
            let _guard = QueryGuard { inner: &self.inner };

            let links: SmallVec<[Dep; 4]> =
                registry::with_links(self.inner.id, |links| links.clone()).unwrap_or_default();
            for dep in &links {
                if dep.refresh() && self.inner.dirty_level() >= DirtyLevel::DerivedDirty {
                    break;
                }
            }
        }

        self.inner.dirty_level() >= DirtyLevel::DerivedDirty
    }

    /// Sever the tracker from every dependency set and drop the strong
    /// self-reference that keeps an effect-mode tracker alive.
    ///
    /// Idempotent: the second call is a no-op. A re-run already queued for
    /// this tracker is skipped at flush.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        registry::purge(self.inner.id);
        *self.inner.self_ref.lock() = None;
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("id", &self.inner.id)
            .field("is_effect", &self.inner.is_effect)
            .field("dirty_level", &self.dirty_level())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_ids_are_unique() {
        let id1 = TrackerId::new();
        let id2 = TrackerId::new();
        let id3 = TrackerId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn new_tracker_starts_dirty() {
        let tracker = Tracker::new(|| {});
        assert_eq!(tracker.dirty_level(), DirtyLevel::Dirty);
        assert!(!tracker.is_effect());
    }

    #[test]
    fn run_returns_value_and_resets_dirty() {
        let tracker = Tracker::new(|| {});

        let result = tracker.run(|| 6 * 7);
        assert_eq!(result, 42);
        assert_eq!(tracker.dirty_level(), DirtyLevel::Clean);
    }

    #[test]
    fn run_bumps_generation() {
        let tracker = Tracker::new(|| {});
        let before = tracker.inner.generation();

        tracker.run(|| {});
        tracker.run(|| {});

        assert_eq!(tracker.inner.generation(), before + 2);
    }

    #[test]
    fn nested_runs_reset_dirty_only_at_outermost_exit() {
        let tracker = Tracker::new(|| {});
        let clone = tracker.clone();

        tracker.run(|| {
            tracker.inner.set_dirty(DirtyLevel::Dirty);
            clone.run(|| {});
            // Inner exit must not have reset the level.
            assert_eq!(tracker.dirty_level(), DirtyLevel::Dirty);
        });

        assert_eq!(tracker.dirty_level(), DirtyLevel::Clean);
    }

    #[test]
    fn raise_dirty_never_lowers() {
        let tracker = Tracker::new(|| {});
        tracker.inner.set_dirty(DirtyLevel::Dirty);

        assert!(tracker.inner.raise_dirty(DirtyLevel::MaybeDirty).is_none());
        assert_eq!(tracker.dirty_level(), DirtyLevel::Dirty);
    }

    #[test]
    fn raise_dirty_reports_previous_level() {
        let tracker = Tracker::new(|| {});
        tracker.inner.set_dirty(DirtyLevel::Clean);

        assert_eq!(
            tracker.inner.raise_dirty(DirtyLevel::MaybeDirty),
            Some(DirtyLevel::Clean)
        );
        assert_eq!(
            tracker.inner.raise_dirty(DirtyLevel::Dirty),
            Some(DirtyLevel::MaybeDirty)
        );
    }

    #[test]
    fn panic_inside_run_restores_bookkeeping() {
        let tracker = Tracker::new(|| {});

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tracker.run(|| panic!("boom"));
        }));
        assert!(result.is_err());

        // The call stack must be back to empty and a fresh run must work.
        assert!(!crate::context::is_tracking());
        assert_eq!(tracker.run(|| 1), 1);
    }

    #[test]
    fn dispose_is_idempotent() {
        let tracker = Tracker::new_effect(|| {}, |_| {});
        tracker.dispose();
        assert!(tracker.is_disposed());
        tracker.dispose();
        assert!(tracker.is_disposed());
    }

    #[test]
    fn is_dirty_resolves_maybe_dirty_without_links() {
        let tracker = Tracker::new(|| {});
        tracker.run(|| {});
        tracker.inner.set_dirty(DirtyLevel::MaybeDirty);

        // No links, so nothing can re-dirty it: the query resolves clean.
        assert!(!tracker.is_dirty());
        assert_eq!(tracker.dirty_level(), DirtyLevel::Clean);
    }
}
