//! TLS handshake boundary: serve the cache through rustls.

use std::fmt;
use std::sync::Arc;

use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use tracing::error;

use crate::cache::CertCache;

/// Per-handshake certificate source backed by a shared [`CertCache`].
///
/// Each incoming handshake costs one [`CertCache::get`]: a lock-free load
/// while the published pair is valid, a renewal exactly when it is not.
/// A failed renewal fails only the handshake that needed it.
pub struct CacheCertResolver {
    cache: Arc<CertCache>,
}

impl CacheCertResolver {
    /// Wrap a shared cache as a rustls certificate resolver.
    pub fn new(cache: Arc<CertCache>) -> Self {
        Self { cache }
    }
}

impl ResolvesServerCert for CacheCertResolver {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        match self.cache.get() {
            Ok(pair) => Some(pair.certified_key()),
            Err(err) => {
                error!(error = %err, "no certificate for incoming handshake");
                None
            }
        }
    }
}

impl fmt::Debug for CacheCertResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheCertResolver").finish_non_exhaustive()
    }
}

/// A server config that resolves its certificate from `cache` on every
/// handshake: no client auth, everything else left at rustls defaults.
/// Callers tune ALPN and the rest on the returned value.
pub fn server_config(cache: Arc<CertCache>) -> ServerConfig {
    ServerConfig::builder()
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(CacheCertResolver::new(cache)))
}
