//! Recognizing certificates issued by the managed certificate authority

use tracing::{debug, trace};

use super::certificate::CertificateInfo;
use super::error::StorageError;

const KEYID_PREFIX: &str = "keyid:";

/// Normalize an authority key identifier for comparison.
///
/// Strips an optional `keyid:` prefix and surrounding whitespace. Case is
/// preserved.
pub fn normalize_key_id(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix(KEYID_PREFIX).unwrap_or(trimmed).trim()
}

/// Decides whether a certificate came from the expected CA
#[derive(Debug, Clone)]
pub struct CaIdentityChecker {
    fingerprint: String,
}

impl CaIdentityChecker {
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
        }
    }

    /// Expected authority key identifier
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether `info` was issued by the expected CA.
    ///
    /// A missing authority key identifier is a plain `false`.
    pub fn matches(&self, info: &CertificateInfo) -> bool {
        let Some(ref authority) = info.authority_key_id else {
            trace!("Certificate has no authority key identifier");
            return false;
        };

        let matched = normalize_key_id(authority) == normalize_key_id(&self.fingerprint);
        debug!(authority = %authority, matched, "Compared certificate authority");
        matched
    }

    /// Parse `pem` and check its issuer
    pub fn is_ca(&self, pem: &str) -> Result<bool, StorageError> {
        Ok(self.matches(&CertificateInfo::from_pem(pem)?))
    }
}
