//! Error taxonomy: generation failures surface, load failures fall back.

use std::io;
use std::path::PathBuf;

/// Failure while generating a fresh self-signed pair.
///
/// Generation is never retried internally: `get` and `store` surface the
/// error to the caller and leave the previously installed pair untouched,
/// so the next call simply attempts again.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The OS random source failed to produce serial bytes.
    #[error("random source failed: {0}")]
    Randomness(#[source] rand::Error),

    /// Key-pair generation failed.
    #[error("key pair generation failed: {0}")]
    KeyPair(#[source] rcgen::Error),

    /// Certificate parameter construction was rejected.
    #[error("certificate parameters rejected: {0}")]
    Parameters(#[source] rcgen::Error),

    /// A configured subject alternative name could not be encoded.
    #[error("invalid subject alternative name: {0}")]
    SubjectAltName(#[source] rcgen::Error),

    /// Self-signing the certificate failed.
    #[error("self-signing failed: {0}")]
    Signing(#[source] rcgen::Error),

    /// The freshly generated key was rejected by the TLS crypto provider.
    #[error("generated key rejected by TLS provider: {0}")]
    ProviderKey(#[source] rustls::Error),
}

/// Failure while loading a persisted pair from its PEM files.
///
/// Never a hard failure of the cache: any of these downgrades the persisted
/// pair to "unusable" and the cache generates in memory instead.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Reading a file from disk failed (missing, unreadable).
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// PEM scanning failed (truncated or malformed file).
    #[error("malformed PEM in {}: {source}", path.display())]
    Pem {
        /// File containing the malformed PEM.
        path: PathBuf,
        /// Underlying scan error.
        #[source]
        source: io::Error,
    },

    /// The certificate file contained no certificate block.
    #[error("no certificate found in {}", .0.display())]
    NoCertificate(PathBuf),

    /// The key file contained no usable private key block.
    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),

    /// The leaf certificate could not be parsed as X.509.
    #[error("unparsable certificate in {}: {reason}", path.display())]
    Parse {
        /// File containing the unparsable certificate.
        path: PathBuf,
        /// Parser diagnostic.
        reason: String,
    },

    /// The persisted pair's validity window does not contain the present.
    #[error("persisted certificate outside its validity window")]
    OutsideValidity,

    /// The persisted key was rejected by the TLS crypto provider.
    #[error("persisted key rejected by TLS provider: {0}")]
    ProviderKey(#[source] rustls::Error),
}
