//! Fresh self-signed pair generation.
//!
//! Pure function of the requested window, the configured subject identity
//! and the OS random source. No shared state, no filesystem access; the
//! cache decides when to call it and what to do with the result.

use std::net::IpAddr;
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use rcgen::{
    CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, KeyPair,
    KeyUsagePurpose, SanType, SerialNumber,
};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::sign::CertifiedKey;
use time::OffsetDateTime;
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::GenerationError;
use crate::pair::{sha256_fingerprint, CertifiedPair};

/// Serial length in bytes. 128 random bits keep collisions out of reach
/// even under sustained rapid regeneration.
pub const SERIAL_LEN: usize = 16;

/// Draw a certificate serial from a caller-supplied random source.
pub fn serial_from_rng(rng: &mut impl RngCore) -> Result<[u8; SERIAL_LEN], GenerationError> {
    let mut serial = [0u8; SERIAL_LEN];
    rng.try_fill_bytes(&mut serial)
        .map_err(GenerationError::Randomness)?;
    Ok(serial)
}

/// Draw a fresh certificate serial from the OS random source.
pub fn random_serial() -> Result<[u8; SERIAL_LEN], GenerationError> {
    serial_from_rng(&mut OsRng)
}

/// Generate a fresh self-signed pair valid for `[not_before, not_after]`.
///
/// The window is taken as given: ordering is not validated, and degenerate
/// windows (zero-width, inverted) still produce a well-formed pair — one
/// that simply never, or only momentarily, passes validity checks. Each
/// call cuts a new ECDSA P-256 key and a new random serial; nothing is
/// reused across calls.
pub fn generate(
    config: &CacheConfig,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
) -> Result<CertifiedPair, GenerationError> {
    let key_pair = KeyPair::generate().map_err(GenerationError::KeyPair)?;

    let mut params =
        CertificateParams::new(Vec::<String>::new()).map_err(GenerationError::Parameters)?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, config.common_name.as_str());
    params.distinguished_name = dn;
    params.not_before = not_before;
    params.not_after = not_after;
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

    let serial = random_serial()?;
    params.serial_number = Some(SerialNumber::from(serial.to_vec()));

    for name in &config.subject_alt_names {
        let san = match name.parse::<IpAddr>() {
            Ok(ip) => SanType::IpAddress(ip),
            Err(_) => SanType::DnsName(
                name.as_str()
                    .try_into()
                    .map_err(GenerationError::SubjectAltName)?,
            ),
        };
        params.subject_alt_names.push(san);
    }

    let cert = params
        .self_signed(&key_pair)
        .map_err(GenerationError::Signing)?;
    let cert_der = cert.der().clone();
    let cert_pem = cert.pem();
    let key_pem = key_pair.serialize_pem();
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let signing_key = rustls::crypto::ring::sign::any_supported_type(&key_der)
        .map_err(GenerationError::ProviderKey)?;
    let certified = Arc::new(CertifiedKey::new(vec![cert_der.clone()], signing_key));

    let fingerprint = sha256_fingerprint(cert_der.as_ref());
    debug!(
        serial = %hex::encode(serial),
        %not_before,
        %not_after,
        "generated self-signed certificate"
    );

    Ok(CertifiedPair::new(
        vec![cert_der],
        key_der,
        certified,
        cert_pem,
        key_pem,
        not_before,
        not_after,
        serial.to_vec(),
        fingerprint,
    ))
}
