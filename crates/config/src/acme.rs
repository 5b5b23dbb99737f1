//! ACME client settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use certkeep_common::DEFAULT_MAX_ATTEMPTS;

/// ACME directory URLs for the supported certificate authority
pub mod directories {
    /// Let's Encrypt production directory
    pub const LETS_ENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";

    /// Let's Encrypt staging directory (for testing)
    pub const LETS_ENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";
}

/// Authority key identifier of the Let's Encrypt R3 intermediate
pub const LETS_ENCRYPT_KEY_ID: &str =
    "14:2E:B3:17:B7:58:56:CB:AE:50:09:40:E6:1F:AF:9D:8B:14:C2:C6";

/// Oldest platform version with ACME support
pub const MIN_PLATFORM_VERSION: &str = "5";

/// Settings for the external ACME client and certificate storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcmeSettings {
    /// Use the staging directory instead of production
    pub staging: bool,

    /// Program and leading arguments used to launch the ACME client
    pub client: Vec<String>,

    /// Root of account and certificate storage
    pub storage: PathBuf,

    /// Web root where HTTP-01 challenge files are placed
    pub challenge_path: PathBuf,

    /// Root directory where active certificates are installed
    pub install_root: PathBuf,

    /// Fallback registration email when a site has none
    pub default_email: Option<String>,

    /// Expected authority key identifier of the issuing CA
    pub fingerprint: String,

    /// Also request the www/non-www variant of every hostname
    pub alt_form: bool,

    /// Verify that hostnames resolve to this server before issuing
    pub verify_ip: bool,

    /// Renew certificates expiring within this many days
    pub renew_before_days: u32,

    /// Version of the hosting platform this manager runs on
    pub platform_version: String,

    /// Kill the ACME client after this many seconds (0 disables)
    pub client_timeout_secs: u64,

    /// Executions allowed per logical client invocation
    pub max_attempts: u32,
}

impl AcmeSettings {
    /// ACME directory URL currently in effect
    pub fn active_server(&self) -> &'static str {
        if self.staging {
            directories::LETS_ENCRYPT_STAGING
        } else {
            directories::LETS_ENCRYPT_PRODUCTION
        }
    }
}

impl Default for AcmeSettings {
    fn default() -> Self {
        Self {
            staging: false,
            client: vec![
                "php".to_string(),
                "/usr/local/share/acme-client/bin/acme".to_string(),
            ],
            storage: PathBuf::from("/var/lib/certkeep"),
            challenge_path: PathBuf::from("/var/www/html"),
            install_root: PathBuf::from("/etc/certkeep/installed"),
            default_email: None,
            fingerprint: LETS_ENCRYPT_KEY_ID.to_string(),
            alt_form: true,
            verify_ip: true,
            renew_before_days: 30,
            platform_version: "8".to_string(),
            client_timeout_secs: 300,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}
