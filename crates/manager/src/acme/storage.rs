//! Filesystem layout of ACME account and certificate storage
//!
//! The external client owns the contents; this module only locates, inspects
//! and removes them.
//!
//! # Directory Structure
//!
//! ```text
//! storage/
//! ├── accounts/
//! │   ├── acme-v02.api.letsencrypt.org.directory.pem    # account key (client)
//! │   └── acme-v02.api.letsencrypt.org.directory.json   # registration record
//! └── certs/
//!     └── acme-v02.api.letsencrypt.org.directory/
//!         └── site12/
//!             ├── key.pem
//!             ├── cert.pem
//!             ├── chain.pem
//!             └── fullchain.pem
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use certkeep_common::SiteId;
use tracing::{debug, info, trace, warn};

use super::account::canonicalize_server;
use super::certificate::CertificateInfo;
use super::error::StorageError;
use crate::platform::{CertificateComponents, CertificateStore, ExpiryTracker};

/// Certificate storage rooted at the directory handed to the ACME client
#[derive(Debug, Clone)]
pub struct FsCertificateStore {
    base_path: PathBuf,
    server_dir: String,
}

impl FsCertificateStore {
    /// Storage for certificates issued by `server_url`.
    ///
    /// Nothing is created on disk; the ACME client lays out the tree.
    pub fn new(base_path: impl Into<PathBuf>, server_url: &str) -> Self {
        Self {
            base_path: base_path.into(),
            server_dir: canonicalize_server(server_url),
        }
    }

    /// Get the storage base path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn certs_dir(&self) -> PathBuf {
        self.base_path.join("certs").join(&self.server_dir)
    }

    /// Parse the issued certificate of `site`
    pub fn load_certificate(&self, site: &SiteId) -> Result<Option<CertificateInfo>, StorageError> {
        let cert_path = self.certificate_components(site).crt_path;
        if !cert_path.is_file() {
            trace!(site = %site, "No stored certificate found");
            return Ok(None);
        }

        let pem = fs::read_to_string(&cert_path)?;
        let info = CertificateInfo::from_pem(&pem)?;
        debug!(site = %site, expires = %info.not_after, "Loaded stored certificate");
        Ok(Some(info))
    }

    /// Check if a certificate needs renewal
    ///
    /// Returns `true` if:
    /// - No certificate exists for the site
    /// - Certificate expires within `within`
    pub fn needs_renewal(&self, site: &SiteId, within: chrono::Duration) -> Result<bool, StorageError> {
        let Some(info) = self.load_certificate(site)? else {
            debug!(site = %site, "No certificate exists, needs issuance");
            return Ok(true);
        };

        let due = info.expires_within(within);
        if due {
            debug!(site = %site, expires = %info.not_after, "Certificate needs renewal");
        } else {
            trace!(site = %site, expires = %info.not_after, "Certificate is still valid");
        }
        Ok(due)
    }

    /// List all sites with a storage directory, sorted
    pub fn list_sites(&self) -> Result<Vec<SiteId>, StorageError> {
        let certs_dir = self.certs_dir();
        if !certs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut sites = Vec::new();
        for entry in fs::read_dir(&certs_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    sites.push(SiteId::new(name));
                }
            }
        }
        sites.sort();
        Ok(sites)
    }
}

impl CertificateStore for FsCertificateStore {
    fn account_storage_dir(&self) -> PathBuf {
        self.base_path.clone()
    }

    fn site_storage_dir(&self, site: &SiteId) -> PathBuf {
        self.certs_dir().join(site.as_str())
    }

    fn certificate_components(&self, site: &SiteId) -> CertificateComponents {
        let dir = self.site_storage_dir(site);
        CertificateComponents {
            key_path: dir.join("key.pem"),
            crt_path: dir.join("cert.pem"),
            chain_path: dir.join("chain.pem"),
        }
    }

    fn delete_site(&self, site: &SiteId) -> Result<(), StorageError> {
        let dir = self.site_storage_dir(site);

        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            info!(site = %site, "Deleted stored certificate");
        } else {
            warn!(site = %site, "Certificate to delete not found");
        }

        Ok(())
    }
}

impl ExpiryTracker for FsCertificateStore {
    fn sites_due(&self, within: chrono::Duration) -> Result<Vec<SiteId>, StorageError> {
        let mut due = Vec::new();

        for site in self.list_sites()? {
            match self.load_certificate(&site) {
                Ok(Some(info)) if info.expires_within(within) => {
                    info!(site = %site, expires = %info.not_after, "Certificate due for renewal");
                    due.push(site);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(site = %site, error = %e, "Failed to read stored certificate");
                }
            }
        }

        Ok(due)
    }
}
