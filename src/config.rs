//! Subject identity and renewal window policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_SKEW_BACKDATE, DEFAULT_VALIDITY};

/// Policy for self-renewed pairs: who the certificate claims to be and how
/// long each renewal stays valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Common name placed in the subject DN.
    pub common_name: String,

    /// Subject alternative names. Entries that parse as IP addresses become
    /// IP SANs, everything else becomes a DNS SAN.
    pub subject_alt_names: Vec<String>,

    /// Lifetime of a self-renewed pair, measured from the renewal instant.
    pub validity: Duration,

    /// Backdate applied to `not_before` on self-renewal so peers with
    /// slightly trailing clocks accept a freshly cut pair.
    pub skew_backdate: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            common_name: "localhost".to_string(),
            subject_alt_names: vec!["localhost".to_string()],
            validity: DEFAULT_VALIDITY,
            skew_backdate: DEFAULT_SKEW_BACKDATE,
        }
    }
}
