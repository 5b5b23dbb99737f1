//! Type-safe identifier newtypes for certkeep.
//!
//! Site identifiers name the per-site storage directories and are passed to
//! the external ACME client as certificate names, so they are kept distinct
//! from plain hostnames at the type level.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved identifier for the host's own system-wide certificate.
pub const SYSTEM_SITE: &str = "__system__";

/// Site identifier.
///
/// Identifies a hosted site (an account on the control panel). One issued
/// certificate exists per site at most.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteId(String);

impl SiteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The reserved identifier used for the system certificate
    pub fn system() -> Self {
        Self(SYSTEM_SITE.to_string())
    }

    /// Whether this is the reserved system identifier
    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_SITE
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to owned String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SiteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SiteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SiteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
