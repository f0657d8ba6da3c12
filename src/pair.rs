//! The immutable key/certificate pair the cache publishes.

use std::fmt;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// Whether `at` falls inside the `[not_before, not_after]` window.
///
/// Both bounds are inclusive: a zero-width window is valid at exactly its
/// instant, and an inverted window (`not_after < not_before`) is never
/// valid. This is the single validity convention used across the crate.
pub fn window_contains(
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
    at: OffsetDateTime,
) -> bool {
    not_before <= at && at <= not_after
}

pub(crate) fn sha256_fingerprint(leaf_der: &[u8]) -> [u8; 32] {
    Sha256::digest(leaf_der).into()
}

/// A fully-formed key/certificate pair, ready for TLS handshakes.
///
/// Immutable once constructed: rotation replaces the `Arc<CertifiedPair>`
/// the cache publishes, it never mutates a pair in place. A caller may keep
/// a pair across rotations; it simply stops being the one handed to new
/// handshakes.
pub struct CertifiedPair {
    /// Leaf first; never empty.
    chain: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
    certified: Arc<CertifiedKey>,
    cert_pem: String,
    key_pem: String,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
    serial: Vec<u8>,
    fingerprint: [u8; 32],
}

impl CertifiedPair {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        chain: Vec<CertificateDer<'static>>,
        private_key: PrivateKeyDer<'static>,
        certified: Arc<CertifiedKey>,
        cert_pem: String,
        key_pem: String,
        not_before: OffsetDateTime,
        not_after: OffsetDateTime,
        serial: Vec<u8>,
        fingerprint: [u8; 32],
    ) -> Self {
        Self {
            chain,
            private_key,
            certified,
            cert_pem,
            key_pem,
            not_before,
            not_after,
            serial,
            fingerprint,
        }
    }

    /// Certificate chain in DER form, leaf first.
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    /// The leaf certificate in DER form.
    pub fn leaf(&self) -> &CertificateDer<'static> {
        &self.chain[0]
    }

    /// The private key in DER form. Never reused across pairs.
    pub fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.private_key
    }

    /// Handshake-ready form for rustls certificate resolution.
    pub fn certified_key(&self) -> Arc<CertifiedKey> {
        Arc::clone(&self.certified)
    }

    /// Certificate chain as PEM, suitable for persisting.
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// Private key as PEM, suitable for persisting.
    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    /// Start of the validity window (inclusive).
    pub fn not_before(&self) -> OffsetDateTime {
        self.not_before
    }

    /// End of the validity window (inclusive).
    pub fn not_after(&self) -> OffsetDateTime {
        self.not_after
    }

    /// Serial number bytes, big-endian.
    pub fn serial(&self) -> &[u8] {
        &self.serial
    }

    /// SHA-256 over the leaf DER.
    pub fn fingerprint(&self) -> [u8; 32] {
        self.fingerprint
    }

    /// Hex-encoded SHA-256 fingerprint of the leaf.
    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.fingerprint)
    }

    /// Whether the pair is valid at `at` (see [`window_contains`]).
    pub fn is_valid_at(&self, at: OffsetDateTime) -> bool {
        window_contains(self.not_before, self.not_after, at)
    }

    /// Whether the pair is past the end of its window at `at`.
    pub fn is_expired_at(&self, at: OffsetDateTime) -> bool {
        at > self.not_after
    }
}

impl fmt::Debug for CertifiedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertifiedPair")
            .field("fingerprint", &self.fingerprint_hex())
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn window_bounds_are_inclusive() {
        let start = OffsetDateTime::UNIX_EPOCH;
        let end = start + Duration::hours(1);
        assert!(window_contains(start, end, start));
        assert!(window_contains(start, end, end));
        assert!(window_contains(start, end, start + Duration::minutes(30)));
        assert!(!window_contains(start, end, start - Duration::nanoseconds(1)));
        assert!(!window_contains(start, end, end + Duration::nanoseconds(1)));
    }

    #[test]
    fn zero_width_window_is_valid_only_at_its_instant() {
        let instant = OffsetDateTime::UNIX_EPOCH;
        assert!(window_contains(instant, instant, instant));
        assert!(!window_contains(instant, instant, instant + Duration::seconds(1)));
        assert!(!window_contains(instant, instant, instant - Duration::seconds(1)));
    }

    #[test]
    fn inverted_window_is_never_valid() {
        let start = OffsetDateTime::UNIX_EPOCH + Duration::hours(1);
        let end = OffsetDateTime::UNIX_EPOCH;
        assert!(!window_contains(start, end, start));
        assert!(!window_contains(start, end, end));
        assert!(!window_contains(start, end, OffsetDateTime::UNIX_EPOCH + Duration::minutes(30)));
    }
}
