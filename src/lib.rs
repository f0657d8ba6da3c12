//! EverCert - self-renewing TLS certificate cache
//!
//! This crate provides a concurrency-safe cache around a single self-signed
//! key/certificate pair. The pair is cut lazily on first use, served to
//! arbitrarily many concurrent TLS handshakes through one lock-free atomic
//! load, and renewed when its validity window lapses or rotation is forced.
//!
//! Readers of a valid pair never contend with each other or with an
//! in-flight renewal; renewal itself is single-winner, so racing callers
//! that hit an expired slot pay for exactly one generation between them.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use evercert::CertCache;
//!
//! // The paths may not exist; the cache then generates in memory.
//! let cache = Arc::new(CertCache::new("node-cert.pem", "node-key.pem"));
//! let pair = cache.get()?;
//! println!("serving {}", pair.fingerprint_hex());
//!
//! // Hand the same cache to a TLS server:
//! let tls_config = evercert::server_config(Arc::clone(&cache));
//! # let _ = tls_config;
//! # Ok::<(), evercert::GenerationError>(())
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod generator;
pub mod loader;
pub mod metrics;
pub mod pair;
pub mod resolver;

use std::time::Duration;

// Re-export the working surface at the crate root.
pub use cache::{CertCache, CertCacheBuilder};
pub use config::CacheConfig;
pub use error::{GenerationError, LoadError};
pub use generator::{generate, random_serial, serial_from_rng, SERIAL_LEN};
pub use loader::load_pair;
pub use metrics::CacheMetricsSnapshot;
pub use pair::{window_contains, CertifiedPair};
pub use resolver::{server_config, CacheCertResolver};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default lifetime of a self-renewed pair.
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

/// Default backdate applied to `not_before` so peers with slightly trailing
/// clocks accept a freshly cut pair.
pub const DEFAULT_SKEW_BACKDATE: Duration = Duration::from_secs(5 * 60);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn default_windows_are_sane() {
        assert_eq!(DEFAULT_VALIDITY, Duration::from_secs(86_400));
        assert!(DEFAULT_SKEW_BACKDATE < DEFAULT_VALIDITY);
    }

    #[test]
    fn builder_starts_empty() {
        let cache = CertCache::builder().build();
        assert!(cache.current().is_none());
        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 0);
        assert_eq!(metrics.renewals, 0);
    }

    #[test]
    fn cache_fills_on_first_get() {
        let cache = Arc::new(CertCache::new("/no/such/cert.pem", "/no/such/key.pem"));
        let pair = cache.get().unwrap();
        assert!(pair.is_valid_at(time::OffsetDateTime::now_utc()));
        assert!(cache.current().is_some());
    }
}
