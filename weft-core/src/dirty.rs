//! Dirty Levels
//!
//! A tracker's dirty level records how stale its last run might be. Four
//! levels are needed because a tracker can depend on derived sources
//! (computed chains) whose staleness is only *suspected* until the chain is
//! re-evaluated:
//!
//! - `Clean`: nothing changed since the last run.
//! - `MaybeDirty`: a derived dependency *might* have changed. Resolving this
//!   requires refreshing the dependency chain (see `Tracker::is_dirty`).
//! - `DerivedDirty`: a derived dependency definitely produced a new value.
//! - `Dirty`: a directly-read value changed.
//!
//! Levels are totally ordered. Within a trigger wave a level only ever goes
//! up; it is reset to `Clean` by a completed run.

/// How stale a tracker's last run might be.
///
/// The derived `Ord` follows declaration order: `Clean < MaybeDirty <
/// DerivedDirty < Dirty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DirtyLevel {
    /// The last run is up-to-date.
    Clean,

    /// A derived dependency might have changed; the chain must be refreshed
    /// to find out.
    MaybeDirty,

    /// A derived dependency definitely changed.
    DerivedDirty,

    /// A directly-read value changed.
    Dirty,
}

impl DirtyLevel {
    /// Whether this level requires a re-run without further querying.
    pub fn is_definitely_dirty(self) -> bool {
        self >= DirtyLevel::DerivedDirty
    }
}
