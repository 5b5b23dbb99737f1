//! Host platform collaborators
//!
//! The certificate lifecycle talks to the rest of the hosting platform only
//! through the traits in this module. Default implementations back them with
//! the configuration file, the system resolver, the filesystem and the log.
//!
//! Every trait is synchronous; operations block the calling thread.

mod dns;
mod install;
mod notify;
mod process;
mod sites;

use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use certkeep_common::SiteId;

use crate::acme::error::{InstallError, StorageError};

pub use dns::HickoryNetworkResolver;
pub use install::FileInstaller;
pub use notify::LogNotifier;
pub use process::SystemProcessExecutor;
pub use sites::ConfiguredSites;

/// A hostname split at the registered domain boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostParts {
    pub domain: String,
    pub subdomain: String,
}

impl HostParts {
    pub fn new(domain: impl Into<String>, subdomain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            subdomain: subdomain.into(),
        }
    }

    /// `subdomain.domain`, without a leading dot when the subdomain is empty
    pub fn host(&self) -> String {
        format!("{}.{}", self.subdomain, self.domain)
            .trim_start_matches('.')
            .to_string()
    }
}

/// Domains registered to each site
pub trait DomainRegistry: Send + Sync {
    /// Whether `domain` is a recognized domain of `site`
    fn domain_exists(&self, site: &SiteId, domain: &str) -> bool;

    /// Split `host` into one of the site's domains and the remaining label(s)
    fn split_host(&self, site: &SiteId, host: &str) -> Option<HostParts>;
}

/// DNS lookups and this server's public address
pub trait NetworkResolver: Send + Sync {
    /// Resolve `host` to an address, giving up after `timeout`
    fn lookup(&self, host: &str, timeout: Duration) -> Option<IpAddr>;

    /// The address hostnames must resolve to
    fn public_ip(&self) -> Option<IpAddr>;
}

/// Captured result of a finished subprocess
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Runs external programs
pub trait ProcessExecutor: Send + Sync {
    /// Run `program` with discrete `args`; no shell is involved
    fn run(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput>;
}

/// Paths of an issued key, certificate and chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateComponents {
    pub key_path: PathBuf,
    pub crt_path: PathBuf,
    pub chain_path: PathBuf,
}

/// Layout of ACME account and issued-certificate storage
pub trait CertificateStore: Send + Sync {
    /// Directory passed to the ACME client as `--storage`
    fn account_storage_dir(&self) -> PathBuf;

    /// Directory holding the artifacts issued for `site`
    fn site_storage_dir(&self, site: &SiteId) -> PathBuf;

    /// Where the ACME client leaves the key, certificate and chain for `site`
    fn certificate_components(&self, site: &SiteId) -> CertificateComponents;

    /// Whether a certificate has been issued for `site`
    fn certificate_issued(&self, site: &SiteId) -> bool {
        self.certificate_components(site).crt_path.is_file()
    }

    /// Remove every stored artifact of `site`
    fn delete_site(&self, site: &SiteId) -> Result<(), StorageError>;
}

/// Wires certificates into the live web server
pub trait Installer: Send + Sync {
    /// Install the issued artifacts as the active certificate of `site`
    fn install(&self, site: &SiteId, components: &CertificateComponents)
        -> Result<(), InstallError>;

    /// PEM of the certificate currently installed for `site`
    fn installed_certificate(&self, site: &SiteId) -> Result<Option<String>, InstallError>;
}

/// Administrative notification channel
pub trait Notifier: Send + Sync {
    /// Send a message to the server administrator; returns whether it was accepted
    fn send_admin(&self, subject: &str, body: &str) -> bool;
}

/// Decides which sites have certificates due for renewal
pub trait ExpiryTracker: Send + Sync {
    fn sites_due(&self, within: chrono::Duration) -> Result<Vec<SiteId>, StorageError>;
}

/// What the lifecycle needs to know about a hosted site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub id: SiteId,
    pub admin_email: Option<String>,
    pub active: bool,
    pub ssl: bool,
}

/// Lookup of hosted sites
pub trait SiteDirectory: Send + Sync {
    fn site(&self, id: &SiteId) -> Option<SiteProfile>;

    /// Every configured site, ordered by id
    fn sites(&self) -> Vec<SiteProfile>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_parts() {
        assert_eq!(HostParts::new("example.com", "www").host(), "www.example.com");
        assert_eq!(HostParts::new("example.com", "").host(), "example.com");
        assert_eq!(
            HostParts::new("example.com", "a.b").host(),
            "a.b.example.com"
        );
    }
}
