//! One-shot load of a persisted pair from PEM files.
//!
//! The cache consults this at most once, on the first `get` miss. Every
//! failure mode maps to a [`LoadError`] that the cache downgrades to "no
//! usable persisted pair" before falling back to in-memory generation.

use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use rustls::sign::CertifiedKey;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::LoadError;
use crate::pair::{sha256_fingerprint, window_contains, CertifiedPair};

/// Load a persisted pair, rejecting it unless `now` falls inside the leaf
/// certificate's validity window.
///
/// Accepts a PEM certificate chain (leaf first) and a PKCS#8, SEC1 or
/// PKCS#1 PEM private key. No chain validation or deep parsing happens
/// here; the leaf is parsed only as far as its validity window requires.
pub fn load_pair(
    cert_path: &Path,
    key_path: &Path,
    now: OffsetDateTime,
) -> Result<CertifiedPair, LoadError> {
    let cert_pem = std::fs::read_to_string(cert_path).map_err(|source| LoadError::Read {
        path: cert_path.to_path_buf(),
        source,
    })?;
    let key_pem = std::fs::read_to_string(key_path).map_err(|source| LoadError::Read {
        path: key_path.to_path_buf(),
        source,
    })?;

    let mut cert_reader = cert_pem.as_bytes();
    let chain: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|source| LoadError::Pem {
            path: cert_path.to_path_buf(),
            source,
        })?;
    let leaf = chain
        .first()
        .ok_or_else(|| LoadError::NoCertificate(cert_path.to_path_buf()))?;

    let mut key_reader = key_pem.as_bytes();
    let key_der = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|source| LoadError::Pem {
            path: key_path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| LoadError::NoPrivateKey(key_path.to_path_buf()))?;

    let (_, parsed) =
        x509_parser::parse_x509_certificate(leaf.as_ref()).map_err(|err| LoadError::Parse {
            path: cert_path.to_path_buf(),
            reason: err.to_string(),
        })?;
    let validity = &parsed.tbs_certificate.validity;
    let not_before = OffsetDateTime::from_unix_timestamp(validity.not_before.timestamp())
        .map_err(|err| LoadError::Parse {
            path: cert_path.to_path_buf(),
            reason: err.to_string(),
        })?;
    let not_after = OffsetDateTime::from_unix_timestamp(validity.not_after.timestamp()).map_err(
        |err| LoadError::Parse {
            path: cert_path.to_path_buf(),
            reason: err.to_string(),
        },
    )?;
    if !window_contains(not_before, not_after, now) {
        return Err(LoadError::OutsideValidity);
    }

    let serial = parsed.tbs_certificate.raw_serial().to_vec();
    let fingerprint = sha256_fingerprint(leaf.as_ref());

    let signing_key = rustls::crypto::ring::sign::any_supported_type(&key_der)
        .map_err(LoadError::ProviderKey)?;
    let certified = Arc::new(CertifiedKey::new(chain.clone(), signing_key));

    debug!(
        path = %cert_path.display(),
        fingerprint = %hex::encode(&fingerprint[..8]),
        "loaded persisted certificate"
    );

    Ok(CertifiedPair::new(
        chain,
        key_der,
        certified,
        cert_pem,
        key_pem,
        not_before,
        not_after,
        serial,
        fingerprint,
    ))
}
