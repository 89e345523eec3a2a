//! Per-group read-path counters (feature = "metrics").
//!
//! ## Key Components
//!
//! - `GroupCounters`: atomic counters recorded from the read path.
//! - [`GroupMetrics`]: plain snapshot returned by
//!   [`Group::metrics`](crate::group::Group::metrics).
//!
//! All increments use `Ordering::Relaxed`; the counters are monotone and a
//! snapshot is not required to be a consistent cut across them.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters recorded by the coordinator.
#[derive(Debug, Default)]
pub(crate) struct GroupCounters {
    /// Lookups answered from the local cache.
    hits: AtomicU64,
    /// Lookups that entered the slow path.
    misses: AtomicU64,
    /// Values produced by the local loader.
    local_loads: AtomicU64,
    /// Local loader invocations that returned an error.
    loader_errors: AtomicU64,
    /// Values fetched from a peer.
    peer_fetches: AtomicU64,
    /// Peer fetches that failed and fell through to the local loader.
    peer_failures: AtomicU64,
}

impl GroupCounters {
    pub(crate) fn snapshot(&self) -> GroupMetrics {
        GroupMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            local_loads: self.local_loads.load(Ordering::Relaxed),
            loader_errors: self.loader_errors.load(Ordering::Relaxed),
            peer_fetches: self.peer_fetches.load(Ordering::Relaxed),
            peer_failures: self.peer_failures.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn inc_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_loader_error(&self) {
        self.loader_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_peer_fetch(&self) {
        self.peer_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_peer_failure(&self) {
        self.peer_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time snapshot of a group's read-path counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupMetrics {
    /// Lookups answered from the local cache.
    pub hits: u64,
    /// Lookups that entered the slow path.
    pub misses: u64,
    /// Values produced by the local loader.
    pub local_loads: u64,
    /// Local loader invocations that returned an error.
    pub loader_errors: u64,
    /// Values fetched from a peer.
    pub peer_fetches: u64,
    /// Peer fetches that failed and fell through to the local loader.
    pub peer_failures: u64,
}
