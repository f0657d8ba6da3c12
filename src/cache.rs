//! The concurrency-safe, self-renewing certificate cache.
//!
//! Readers of a still-valid pair take one lock-free atomic load of the
//! published reference. Renewal — first fill, expiry, or explicit rotation —
//! funnels through a mutex so exactly one of the racing callers generates
//! while the rest pick up the winner's pair on re-check. Publication is a
//! single atomic reference swap: a concurrent reader observes the old pair
//! or the new pair in full, never a mixture, and a read issued after a
//! completed install observes that install or a later one.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{GenerationError, LoadError};
use crate::generator;
use crate::loader;
use crate::metrics::{CacheMetrics, CacheMetricsSnapshot};
use crate::pair::CertifiedPair;

/// Wall-clock source. Injectable so tests can cross expiry boundaries
/// deterministically.
type Clock = dyn Fn() -> OffsetDateTime + Send + Sync;

/// Write-side state; only touched with the renew mutex held.
struct RenewState {
    /// The persisted-pair files are consulted at most once per cache, on
    /// the first miss. An explicit `store` also burns the attempt: rotation
    /// supersedes whatever is on disk.
    disk_checked: bool,
}

/// Self-renewing cache around a single published certificate pair.
///
/// Construction is free of I/O and cannot fail; the pair is produced
/// lazily by the first [`get`](CertCache::get). Share the cache as an
/// `Arc<CertCache>` and hand it to whatever serves handshakes (see
/// [`crate::resolver`]); multiple independent caches per process are fine.
pub struct CertCache {
    current: ArcSwapOption<CertifiedPair>,
    renew: Mutex<RenewState>,
    cert_path: Option<PathBuf>,
    key_path: Option<PathBuf>,
    config: CacheConfig,
    clock: Box<Clock>,
    metrics: CacheMetrics,
}

impl CertCache {
    /// Cache backed by optional persisted PEM files.
    ///
    /// The paths may point at nonexistent files; that is the supported way
    /// of saying "always generate in memory". Nothing is read here — the
    /// first `get` does the one-time load attempt.
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self::builder()
            .cert_path(cert_path)
            .key_path(key_path)
            .build()
    }

    /// Builder for configuring identity, window policy and the clock.
    pub fn builder() -> CertCacheBuilder {
        CertCacheBuilder::new()
    }

    /// The current valid pair, renewing first if the slot is empty or the
    /// held pair has expired.
    ///
    /// Calls that find a valid pair return the identical `Arc` (pointer
    /// equality) until the next rotation. On generation failure the error
    /// is returned and the slot is left untouched — even an expired
    /// previous pair stays installed for the next attempt.
    pub fn get(&self) -> Result<Arc<CertifiedPair>, GenerationError> {
        let now = (self.clock)();
        {
            let snapshot = self.current.load();
            if let Some(pair) = snapshot.as_ref() {
                if pair.is_valid_at(now) {
                    self.metrics.record_hit();
                    return Ok(Arc::clone(pair));
                }
            }
        }
        self.renew(now)
    }

    /// Force-generate a pair for `[not_before, not_after]` and install it,
    /// regardless of whether the current pair is still valid.
    ///
    /// The window is the caller's to choose; degenerate windows are
    /// accepted (useful for drills and tests) and simply produce a pair
    /// that the next `get` will consider expired. A failed `store` leaves
    /// the previously installed pair current.
    pub fn store(
        &self,
        not_before: OffsetDateTime,
        not_after: OffsetDateTime,
    ) -> Result<Arc<CertifiedPair>, GenerationError> {
        let mut state = self.renew.lock();
        state.disk_checked = true;
        let pair = match generator::generate(&self.config, not_before, not_after) {
            Ok(pair) => Arc::new(pair),
            Err(err) => {
                self.metrics.record_generation_failure();
                warn!(error = %err, "rotation failed; previous pair stays installed");
                return Err(err);
            }
        };
        self.metrics.record_rotation();
        info!(
            fingerprint = %&pair.fingerprint_hex()[..16],
            %not_before,
            %not_after,
            "rotated certificate"
        );
        self.current.store(Some(Arc::clone(&pair)));
        Ok(pair)
    }

    /// [`store`](CertCache::store) with the configured window anchored at
    /// the present: `[now - skew_backdate, now + validity]`.
    pub fn rotate(&self) -> Result<Arc<CertifiedPair>, GenerationError> {
        let now = (self.clock)();
        self.store(now - self.config.skew_backdate, now + self.config.validity)
    }

    /// Lock-free peek at the published pair. Never loads or generates.
    pub fn current(&self) -> Option<Arc<CertifiedPair>> {
        self.current.load_full()
    }

    /// Point-in-time counters.
    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The identity and window policy renewals are cut with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Slow path: single-winner fill/renewal.
    fn renew(&self, now: OffsetDateTime) -> Result<Arc<CertifiedPair>, GenerationError> {
        let mut state = self.renew.lock();

        // A racing caller may have renewed while this one waited for the
        // lock; serve its pair instead of generating again.
        if let Some(pair) = self.current.load_full() {
            if pair.is_valid_at(now) {
                self.metrics.record_hit();
                return Ok(pair);
            }
        }

        if !state.disk_checked {
            state.disk_checked = true;
            if let Some(pair) = self.try_load(now) {
                let pair = Arc::new(pair);
                self.current.store(Some(Arc::clone(&pair)));
                return Ok(pair);
            }
        }

        let not_before = now - self.config.skew_backdate;
        let not_after = now + self.config.validity;
        let pair = match generator::generate(&self.config, not_before, not_after) {
            Ok(pair) => Arc::new(pair),
            Err(err) => {
                self.metrics.record_generation_failure();
                warn!(error = %err, "renewal failed; slot left as it was");
                return Err(err);
            }
        };
        self.metrics.record_renewal();
        info!(
            fingerprint = %&pair.fingerprint_hex()[..16],
            %not_after,
            "renewed self-signed certificate"
        );
        self.current.store(Some(Arc::clone(&pair)));
        Ok(pair)
    }

    /// One-time persisted-pair attempt. Any failure downgrades to "generate
    /// in memory".
    fn try_load(&self, now: OffsetDateTime) -> Option<CertifiedPair> {
        let (cert_path, key_path) = match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) => (cert, key),
            _ => return None,
        };
        self.metrics.record_load_attempt();
        match loader::load_pair(cert_path, key_path, now) {
            Ok(pair) => {
                self.metrics.record_load();
                info!(
                    path = %cert_path.display(),
                    fingerprint = %&pair.fingerprint_hex()[..16],
                    "installed persisted certificate"
                );
                Some(pair)
            }
            Err(err) => {
                // Absent or lapsed files are the normal "not provisioned"
                // case; a file that exists but cannot be used is worth a
                // louder line.
                match err {
                    LoadError::Read { .. } | LoadError::OutsideValidity => debug!(
                        path = %cert_path.display(),
                        error = %err,
                        "no usable persisted pair; generating in memory"
                    ),
                    _ => warn!(
                        path = %cert_path.display(),
                        error = %err,
                        "persisted pair unusable; generating in memory"
                    ),
                }
                None
            }
        }
    }
}

impl std::fmt::Debug for CertCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertCache")
            .field("cert_path", &self.cert_path)
            .field("key_path", &self.key_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CertCache`]. The plain two-path constructor is
/// [`CertCache::new`]; the builder adds config and clock injection.
pub struct CertCacheBuilder {
    config: CacheConfig,
    cert_path: Option<PathBuf>,
    key_path: Option<PathBuf>,
    clock: Option<Box<Clock>>,
}

impl CertCacheBuilder {
    /// Builder with default config, no persisted files and the system
    /// clock.
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
            cert_path: None,
            key_path: None,
            clock: None,
        }
    }

    /// Path to a persisted PEM certificate chain.
    pub fn cert_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cert_path = Some(path.into());
        self
    }

    /// Path to the persisted PEM private key.
    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Subject identity and renewal window policy.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the wall-clock source (test seam).
    pub fn clock(mut self, clock: impl Fn() -> OffsetDateTime + Send + Sync + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Assemble the cache. Performs no I/O.
    pub fn build(self) -> CertCache {
        CertCache {
            current: ArcSwapOption::new(None),
            renew: Mutex::new(RenewState {
                disk_checked: false,
            }),
            cert_path: self.cert_path,
            key_path: self.key_path,
            config: self.config,
            clock: self
                .clock
                .unwrap_or_else(|| Box::new(OffsetDateTime::now_utc)),
            metrics: CacheMetrics::default(),
        }
    }
}

impl Default for CertCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration as StdDuration;
    use time::Duration;

    const T0: i64 = 1_735_689_600; // 2025-01-01T00:00:00Z

    /// Cache on a settable clock so tests cross expiry boundaries at will.
    fn clocked_cache(config: CacheConfig) -> (CertCache, Arc<AtomicI64>) {
        let epoch = Arc::new(AtomicI64::new(T0));
        let handle = Arc::clone(&epoch);
        let cache = CertCache::builder()
            .config(config)
            .clock(move || {
                OffsetDateTime::from_unix_timestamp(handle.load(Ordering::SeqCst)).unwrap()
            })
            .build();
        (cache, epoch)
    }

    fn short_lived() -> CacheConfig {
        CacheConfig {
            validity: StdDuration::from_secs(300),
            skew_backdate: StdDuration::from_secs(10),
            ..CacheConfig::default()
        }
    }

    #[test]
    fn first_get_fills_then_reuses() {
        let (cache, _) = clocked_cache(short_lived());
        assert!(cache.current().is_none());

        let first = cache.get().unwrap();
        let second = cache.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let t0 = OffsetDateTime::from_unix_timestamp(T0).unwrap();
        assert_eq!(first.not_before(), t0 - Duration::seconds(10));
        assert_eq!(first.not_after(), t0 + Duration::seconds(300));

        let metrics = cache.metrics();
        assert_eq!(metrics.renewals, 1);
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.rotations, 0);
        assert_eq!(metrics.load_attempts, 0);
    }

    #[test]
    fn expiry_renews_and_replaces_the_reference() {
        let (cache, epoch) = clocked_cache(short_lived());
        let first = cache.get().unwrap();

        // One second past not_after.
        epoch.store(T0 + 301, Ordering::SeqCst);
        let second = cache.get().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.is_valid_at(OffsetDateTime::from_unix_timestamp(T0 + 301).unwrap()));
        assert_eq!(cache.metrics().renewals, 2);

        // The old pair is untouched, merely superseded.
        assert!(first.is_expired_at(OffsetDateTime::from_unix_timestamp(T0 + 301).unwrap()));
    }

    #[test]
    fn validity_end_is_inclusive() {
        let (cache, epoch) = clocked_cache(short_lived());
        let first = cache.get().unwrap();

        // Exactly at not_after the pair is still served.
        epoch.store(T0 + 300, Ordering::SeqCst);
        let at_boundary = cache.get().unwrap();
        assert!(Arc::ptr_eq(&first, &at_boundary));
    }

    #[test]
    fn store_installs_exactly_the_requested_window() {
        let (cache, _) = clocked_cache(short_lived());
        let t1 = OffsetDateTime::from_unix_timestamp(T0 - 50).unwrap();
        let t2 = OffsetDateTime::from_unix_timestamp(T0 + 50).unwrap();

        let stored = cache.store(t1, t2).unwrap();
        assert_eq!(stored.not_before(), t1);
        assert_eq!(stored.not_after(), t2);

        // The clock (T0) is inside the stored window, so get serves it.
        let got = cache.get().unwrap();
        assert!(Arc::ptr_eq(&stored, &got));
        assert_eq!(cache.metrics().rotations, 1);
    }

    #[test]
    fn store_replaces_a_still_valid_pair() {
        let (cache, _) = clocked_cache(short_lived());
        let first = cache.get().unwrap();

        let rotated = cache.rotate().unwrap();
        assert!(!Arc::ptr_eq(&first, &rotated));

        let got = cache.get().unwrap();
        assert!(Arc::ptr_eq(&rotated, &got));
    }

    #[test]
    fn degenerate_store_window_forces_regeneration_on_next_get() {
        let (cache, _) = clocked_cache(short_lived());
        let epoch_pair = cache
            .store(OffsetDateTime::UNIX_EPOCH, OffsetDateTime::UNIX_EPOCH)
            .unwrap();

        let got = cache.get().unwrap();
        assert!(!Arc::ptr_eq(&epoch_pair, &got));
        assert!(got.is_valid_at(OffsetDateTime::from_unix_timestamp(T0).unwrap()));
    }

    #[test]
    fn generation_failure_surfaces_and_leaves_the_slot_alone() {
        // A non-ASCII SAN cannot be IA5-encoded, so every generation fails.
        let config = CacheConfig {
            subject_alt_names: vec!["bücher.invalid".to_string()],
            ..short_lived()
        };
        let (cache, _) = clocked_cache(config);

        let err = cache.get().unwrap_err();
        assert!(matches!(err, GenerationError::SubjectAltName(_)));
        assert!(cache.current().is_none());

        let err = cache
            .store(
                OffsetDateTime::UNIX_EPOCH,
                OffsetDateTime::UNIX_EPOCH + Duration::hours(1),
            )
            .unwrap_err();
        assert!(matches!(err, GenerationError::SubjectAltName(_)));
        assert!(cache.current().is_none());
        assert_eq!(cache.metrics().generation_failures, 2);
    }

    #[test]
    fn builder_without_paths_never_touches_disk() {
        let (cache, _) = clocked_cache(short_lived());
        cache.get().unwrap();
        assert_eq!(cache.metrics().load_attempts, 0);
    }
}
