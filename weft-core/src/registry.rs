//! Lifetime Registry
//!
//! The registry is the process-wide table from a tracker's ID to the
//! ordered list of dependency sets the tracker is currently linked into.
//! It exists for one reason: when a tracker dies, every one of those sets
//! must forget it, and only the registry knows which sets those are.
//!
//! # Cleanup
//!
//! Purging happens on three paths, all funneling into [`purge`]:
//!
//! - the drop of a plain-mode tracker's shared state (automatic),
//! - explicit [`dispose`](crate::tracker::Tracker::dispose),
//! - nothing else — triggers never purge, they only skip dead entries.
//!
//! A purge can interleave with a trigger wave over the same dependency set:
//! the wave resolves entries through weak references and skips the ones
//! that fail, and the purge's removals are idempotent, so the pair is safe
//! without extra coordination.

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::trace;

use crate::dep::Dep;
use crate::tracker::TrackerId;

/// Ordered dependency links of one tracker. Most trackers read only a
/// handful of cells, so the list lives inline.
pub(crate) type DepLinks = SmallVec<[Dep; 4]>;

static REGISTRY: OnceLock<RwLock<HashMap<TrackerId, DepLinks>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<TrackerId, DepLinks>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Make sure `id` has a (possibly empty) link list. Returns `true` when the
/// entry was newly created — i.e. this is the tracker's token allocation.
pub(crate) fn ensure(id: TrackerId) -> bool {
    let mut map = registry().write();
    match map.entry(id) {
        std::collections::hash_map::Entry::Occupied(_) => false,
        std::collections::hash_map::Entry::Vacant(slot) => {
            slot.insert(DepLinks::new());
            true
        }
    }
}

/// Run `f` with mutable access to `id`'s link list. Returns `None` if the
/// tracker was never registered or has been purged.
pub(crate) fn with_links<R>(id: TrackerId, f: impl FnOnce(&mut DepLinks) -> R) -> Option<R> {
    let mut map = registry().write();
    map.get_mut(&id).map(f)
}

/// Remove `id`'s entry and delete `id` from every dependency set it was
/// linked into. Idempotent: purging an unknown ID is a no-op.
pub(crate) fn purge(id: TrackerId) {
    let links = registry().write().remove(&id);
    if let Some(links) = links {
        trace!(tracker = id.raw(), links = links.len(), "purging tracker links");
        for dep in &links {
            dep.unlink(id);
        }
    }
}
