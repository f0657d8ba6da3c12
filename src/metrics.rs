//! Cache observability counters.
//!
//! Counters sit on decision points the cache already takes; the fast path
//! pays exactly one relaxed atomic increment.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Internal counters, updated by the cache.
#[derive(Debug, Default)]
pub(crate) struct CacheMetrics {
    hits: AtomicU64,
    renewals: AtomicU64,
    rotations: AtomicU64,
    load_attempts: AtomicU64,
    loads: AtomicU64,
    generation_failures: AtomicU64,
}

impl CacheMetrics {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_renewal(&self) {
        self.renewals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load_attempt(&self) {
        self.load_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_generation_failure(&self) {
        self.generation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            renewals: self.renewals.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            load_attempts: self.load_attempts.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            generation_failures: self.generation_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a cache's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetricsSnapshot {
    /// Reads served from the already-published pair.
    pub hits: u64,
    /// Renewals triggered by an empty or expired slot (first fill included).
    pub renewals: u64,
    /// Explicit installs via `store` or `rotate`.
    pub rotations: u64,
    /// Attempts to read the persisted pair from disk (at most one).
    pub load_attempts: u64,
    /// Persisted pairs actually installed.
    pub loads: u64,
    /// Generations that returned an error.
    pub generation_failures: u64,
}
