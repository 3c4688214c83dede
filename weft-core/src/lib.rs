//! Weft Core
//!
//! This crate provides the dependency-tracking engine at the heart of the
//! Weft reactive state library. It implements:
//!
//! - Automatic dependency registration (reads link, writes notify)
//! - A four-level dirty state machine with synchronous propagation
//! - Effect scheduling with pause/resume batching
//! - Automatic cleanup of trackers that are no longer reachable
//!
//! The engine knows nothing about values, rendering, or any particular
//! reactive primitive. A cell is anything that owns a [`Dep`] and calls
//! [`Dep::track`] on read and [`Dep::trigger`] on write; a computation is
//! anything wrapped in a [`Tracker`]. Signal, computed-value, and
//! subscription layers are consumers of this crate, not part of it.
//!
//! # Concepts
//!
//! ## Trackers
//!
//! A [`Tracker`] runs a function and records, in read order, every cell
//! the function touched. Re-running rebuilds the record in place: cells no
//! longer read are unlinked. Plain trackers are passive — a write only
//! raises their dirty level, for a consumer to poll. Effect trackers are
//! re-run automatically.
//!
//! ## Dirty levels
//!
//! Writes raise a tracker's [`DirtyLevel`]. The levels between `Clean` and
//! `Dirty` exist for derived-value chains, where "an input of my input
//! changed" only *might* mean new data; [`Tracker::is_dirty`] resolves the
//! suspicion by refreshing the chain.
//!
//! ## Scheduling
//!
//! Propagation is synchronous, but effect re-runs are deferred to the end
//! of the outermost trigger wave, so a wave that dirties an effect through
//! several cells re-runs it once. [`defer_effects`] widens that window to
//! an arbitrary scope; [`untracked`] hides reads from the running tracker.
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::{effect, Dep, DirtyLevel};
//!
//! let dep = Dep::new();
//! let running = effect(move || {
//!     dep.track();
//!     println!("cell changed");
//! });
//!
//! dep.trigger(DirtyLevel::Dirty); // effect re-runs
//! running.dispose();
//! ```
//!
//! # Threading
//!
//! The engine is a single-logical-thread system: the tracker call stack
//! and the effect queue are thread-local, and all propagation happens
//! synchronously inside the triggering call. Shared bookkeeping is
//! lock-protected, so handles may be moved across threads, but each thread
//! tracks and flushes independently.

mod context;
mod dep;
mod dirty;
mod effect;
mod registry;
mod runtime;
mod scheduler;
mod tracker;

pub use context::{is_tracking, untracked};
pub use dep::Dep;
pub use dirty::DirtyLevel;
pub use effect::effect;
pub use runtime::{track, trigger};
pub use scheduler::defer_effects;
pub use tracker::{Tracker, TrackerId};
