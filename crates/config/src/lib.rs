//! Configuration for the certkeep certificate manager.
//!
//! Configuration is written in KDL:
//!
//! ```kdl
//! acme {
//!     staging #false
//!     client "php" "/usr/local/share/acme-client/bin/acme"
//!     storage "/var/lib/certkeep"
//!     default-email "hostmaster@example.net"
//!     renew-before-days 30
//! }
//! server {
//!     name "panel.example.net"
//!     public-ip "203.0.113.10"
//!     additional-names "mail.example.net" "ftp.example.net"
//!     admin-email "root@example.net"
//! }
//! site "site12" {
//!     domain "example.com"
//!     alias "example.org"
//!     admin-email "owner@example.com"
//! }
//! ```

pub mod acme;
mod kdl;
pub mod server;
pub mod validate;

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

pub use acme::{directories, AcmeSettings, LETS_ENCRYPT_KEY_ID, MIN_PLATFORM_VERSION};
pub use server::{ServerSettings, SiteConfig};
pub use validate::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};

/// Complete certkeep configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub acme: AcmeSettings,
    pub server: ServerSettings,
    pub sites: Vec<SiteConfig>,
}

impl Config {
    /// Load configuration from a KDL file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let config = Self::from_kdl_str(&text)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;

        info!(
            path = %path.display(),
            sites = config.sites.len(),
            staging = config.acme.staging,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from KDL text
    pub fn from_kdl_str(text: &str) -> Result<Self> {
        kdl::parse_document(text)
    }

    /// Run all validators, failing on the first batch of errors.
    ///
    /// Warnings are logged and do not fail validation.
    pub fn validate(&self) -> Result<ValidationResult> {
        let result = validate::validate_config(self);

        for warning in &result.warnings {
            warn!("{}", warning.message);
        }

        if !result.is_ok() {
            let messages: Vec<String> = result.errors.iter().map(ToString::to_string).collect();
            bail!(
                "Configuration has {} error(s):\n  {}",
                messages.len(),
                messages.join("\n  ")
            );
        }

        debug!(warnings = result.warnings.len(), "Configuration validated");
        Ok(result)
    }

    /// Look up a site by identifier
    pub fn site(&self, id: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.id == id)
    }
}
