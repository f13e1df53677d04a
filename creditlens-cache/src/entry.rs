//! Cache entries and the tickets that settle them.

use chrono::{DateTime, Utc};
use creditlens_core::{FetchError, FetchResult, Fingerprint};
use futures_util::future::BoxFuture;
use uuid::Uuid;

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    Pending,
    Ready,
    Failed,
}

/// A cached fetch result.
///
/// Exactly one request is in flight per entry, identified by `request_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub status: EntryStatus,
    pub value: Option<T>,
    pub error: Option<FetchError>,
    pub requested_at: DateTime<Utc>,
    pub tuple_fingerprint: Fingerprint,
    pub request_id: Uuid,
}

impl<T> CacheEntry<T> {
    pub(crate) fn pending(tuple_fingerprint: Fingerprint) -> Self {
        Self {
            status: EntryStatus::Pending,
            value: None,
            error: None,
            requested_at: Utc::now(),
            tuple_fingerprint,
            request_id: Uuid::now_v7(),
        }
    }

    pub(crate) fn resolve(&mut self, result: FetchResult<T>) {
        match result {
            Ok(value) => {
                self.status = EntryStatus::Ready;
                self.value = Some(value);
                self.error = None;
            }
            Err(error) => {
                self.status = EntryStatus::Failed;
                self.value = None;
                self.error = Some(error);
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == EntryStatus::Pending
    }

    pub fn is_ready(&self) -> bool {
        self.status == EntryStatus::Ready
    }

    pub fn is_failed(&self) -> bool {
        self.status == EntryStatus::Failed
    }

    /// Message to display for a failed entry.
    pub fn user_message(&self) -> Option<String> {
        self.error.as_ref().map(FetchError::user_message)
    }

    pub(crate) fn ticket<K>(&self, key: K) -> FetchTicket<K> {
        FetchTicket {
            key,
            request_id: self.request_id,
            fingerprint: self.tuple_fingerprint,
        }
    }
}

/// Identifies the request a completion belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTicket<K> {
    pub key: K,
    pub request_id: Uuid,
    /// Fingerprint captured when the request was issued.
    pub fingerprint: Fingerprint,
}

/// Boxed backend call producing one cache value.
pub type FetchFuture<T> = BoxFuture<'static, FetchResult<T>>;

/// A fetch the cache wants run. The caller drives the future and hands the
/// [`Settled`] result back to the cache.
pub struct PendingFetch<K, T> {
    pub ticket: FetchTicket<K>,
    pub future: FetchFuture<T>,
}

impl<K, T> PendingFetch<K, T> {
    pub async fn run(self) -> Settled<K, T> {
        let result = self.future.await;
        Settled {
            ticket: self.ticket,
            result,
        }
    }
}

impl<K: std::fmt::Debug, T> std::fmt::Debug for PendingFetch<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingFetch")
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}

/// A completed fetch waiting to be applied.
#[derive(Debug)]
pub struct Settled<K, T> {
    pub ticket: FetchTicket<K>,
    pub result: FetchResult<T>,
}

impl<K, T> Settled<K, T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Settled<K, U> {
        Settled {
            ticket: self.ticket,
            result: self.result.map(f),
        }
    }
}

/// Why a completion was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The selection moved on after the request was issued.
    Superseded,
    /// The entry was removed or replaced by a newer request.
    Orphaned,
}

/// Result of applying a [`Settled`] completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Applied(EntryStatus),
    Discarded(DiscardReason),
}

impl SettleOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SettleOutcome::Applied(_))
    }
}
