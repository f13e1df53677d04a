//! CreditLens Cache
//!
//! In-memory caches for dashboard data. Every entry is keyed by the resolved
//! parameter tuple that produced it and carries that tuple's fingerprint, so
//! a selection change can discard exactly the entries it supersedes.
//!
//! Neither cache spawns or awaits anything: lookups return a
//! [`PendingFetch`] for the caller to drive, and the completion is applied
//! with `settle`, which drops responses that arrive after the selection
//! moved on.

pub mod entry;
pub mod key;
pub mod narrative;
pub mod resource;
pub mod stats;

pub use entry::{
    CacheEntry, DiscardReason, EntryStatus, FetchFuture, FetchTicket, PendingFetch,
    SettleOutcome, Settled,
};
pub use key::{ChartKey, NarrativeKey, NarrativeKind, TupleScoped};
pub use narrative::{NarrativeCache, NarrativeLookup, NarrativeState};
pub use resource::{Lookup, ResourceCache};
pub use stats::CacheStats;
