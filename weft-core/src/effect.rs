//! Effects
//!
//! [`effect`] is the thin convenience wrapper over the engine: wrap a
//! closure in an effect-mode tracker, run it once to establish its links,
//! and let the scheduler re-run it whenever a dependency changes.
//!
//! Effects keep themselves alive (strong self-reference) once they have
//! linked a dependency, so dropping the returned handle does not stop
//! them; call [`Tracker::dispose`] to tear one down.

use std::sync::Arc;

use crate::tracker::Tracker;

/// Subscribe `f` to every cell it reads.
///
/// `f` runs once immediately. Afterwards, whenever a cell it read is
/// triggered, `f` re-runs (once per trigger wave, after the wave finishes
/// raising dirty levels). Each re-run re-reads and therefore re-links, so
/// conditional reads narrow or widen the subscription naturally.
///
/// The re-run checks the tracker's own dirty level first, so a duplicate
/// queue entry is a no-op.
///
/// # Example
///
/// ```rust,ignore
/// let running = effect(move || {
///     println!("count is {}", count.get());
/// });
/// // ...
/// running.dispose();
/// ```
pub fn effect<F>(f: F) -> Tracker
where
    F: Fn() + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let rerun_f = Arc::clone(&f);

    let tracker = Tracker::new_effect(
        || {},
        move |tracker| {
            if tracker.is_dirty() {
                tracker.run(|| rerun_f());
            }
        },
    );
    tracker.run(|| f());

    tracker
}
