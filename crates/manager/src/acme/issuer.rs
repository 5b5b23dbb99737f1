//! Certificate request, renewal, append and revocation for one site
//!
//! Each call runs `resolve hostnames → issue → install` to completion on the
//! calling thread. Results are tagged: "nothing to request" is reported
//! separately from a failure.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use certkeep_common::SiteId;
use tracing::{debug, error, info, warn};

use super::account::AcmeAccountRegistry;
use super::authority::CaIdentityChecker;
use super::certificate::CertificateInfo;
use super::client::{AcmeClientAdapter, AcmeCommand};
use super::error::AcmeError;
use super::hostname::{HostSpec, HostnameResolver, ResolveOptions, Resolution};
use crate::platform::{CertificateStore, Installer, Notifier, SiteDirectory, SiteProfile};

/// Settings shared by every issuer
#[derive(Debug, Clone)]
pub struct IssuerSettings {
    /// Active ACME directory URL
    pub server_url: String,
    /// Short server name used in notifications
    pub server_name: String,
    /// Web root for HTTP-01 challenge files
    pub challenge_path: PathBuf,
    /// Request the www/non-www variant of each hostname
    pub alt_form: bool,
    /// Global switch; verification happens only when this and the per-call flag are set
    pub verify_ip: bool,
    /// Whether the platform version supports ACME certificates
    pub supported: bool,
}

/// Collaborators shared by every issuer
pub struct IssuerContext {
    pub settings: IssuerSettings,
    pub sites: Arc<dyn SiteDirectory>,
    pub hostnames: HostnameResolver,
    pub client: Arc<AcmeClientAdapter>,
    pub accounts: Arc<AcmeAccountRegistry>,
    pub authority: CaIdentityChecker,
    pub store: Arc<dyn CertificateStore>,
    pub installer: Arc<dyn Installer>,
    pub notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for IssuerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerContext")
            .field("settings", &self.settings)
            .field("accounts", &self.accounts)
            .field("authority", &self.authority)
            .finish_non_exhaustive()
    }
}

/// Per-call flags for [`CertificateIssuer::request`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    pub verify_ip: bool,
    pub strict: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            verify_ip: true,
            strict: false,
        }
    }
}

/// Result of a certificate request
#[derive(Debug)]
pub enum RequestOutcome {
    /// Issued and installed for these hostnames
    Installed { hostnames: Vec<String> },
    /// No hostname survived validation and verification; nothing was requested
    NoEligibleHosts,
    Failed(AcmeError),
}

impl RequestOutcome {
    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Result of a renewal
#[derive(Debug)]
pub enum RenewOutcome {
    Renewed { hostnames: Vec<String> },
    /// The installed certificate was not issued by the managed CA; left alone
    NotManaged { reason: String },
    /// None of the certificate's hostnames could be requested again
    NoEligibleHosts,
    Failed(AcmeError),
}

impl RenewOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Storage and installation state of a site, for display
#[derive(Debug, Clone)]
pub struct SiteStatus {
    pub site: SiteId,
    pub storage_path: PathBuf,
    pub storage_exists: bool,
    pub issued: bool,
    pub installed: Option<CertificateInfo>,
    pub managed: bool,
}

/// Lifecycle operations for a single site
#[derive(Debug, Clone)]
pub struct CertificateIssuer {
    site: SiteId,
    ctx: Arc<IssuerContext>,
}

impl CertificateIssuer {
    pub fn new(site: SiteId, ctx: Arc<IssuerContext>) -> Self {
        Self { site, ctx }
    }

    pub fn site(&self) -> &SiteId {
        &self.site
    }

    fn profile(&self) -> Result<SiteProfile, AcmeError> {
        if !self.ctx.settings.supported {
            return Err(AcmeError::Unsupported);
        }
        if self.site.is_system() {
            return Ok(SiteProfile {
                id: self.site.clone(),
                admin_email: None,
                active: true,
                ssl: true,
            });
        }
        self.ctx
            .sites
            .site(&self.site)
            .ok_or_else(|| AcmeError::UnknownSite(self.site.clone()))
    }

    /// Profile of a site that may hold an ACME certificate
    fn ssl_profile(&self) -> Result<SiteProfile, AcmeError> {
        let profile = self.profile()?;
        if !profile.ssl {
            warn!(site = %self.site, "SSL is disabled for site");
            return Err(AcmeError::SslDisabled(self.site.clone()));
        }
        Ok(profile)
    }

    /// Request and install a certificate covering `hosts`
    pub fn request(&self, hosts: &[HostSpec], opts: RequestOptions) -> RequestOutcome {
        match self.try_request(hosts, opts) {
            Ok(Some(hostnames)) => RequestOutcome::Installed { hostnames },
            Ok(None) => RequestOutcome::NoEligibleHosts,
            Err(e) => {
                error!(site = %self.site, error = %e, "Certificate request failed");
                RequestOutcome::Failed(e)
            }
        }
    }

    fn try_request(
        &self,
        hosts: &[HostSpec],
        opts: RequestOptions,
    ) -> Result<Option<Vec<String>>, AcmeError> {
        let profile = self.ssl_profile()?;

        let resolve = ResolveOptions {
            verify_ip: self.ctx.settings.verify_ip && opts.verify_ip,
            strict: opts.strict,
            alt_form: self.ctx.settings.alt_form,
        };
        let hostnames = match self.ctx.hostnames.resolve(&self.site, hosts, resolve)? {
            Resolution::NoHostnames => return Ok(None),
            resolution => resolution.hostnames(),
        };

        self.ctx
            .accounts
            .ensure_registered(profile.admin_email.as_deref())?;

        self.issue(&hostnames)?;
        info!(
            site = %self.site,
            "Reminder: the CA limits how many certificates may be issued per domain each week"
        );

        self.install_issued()?;
        Ok(Some(hostnames))
    }

    /// Run the client's `issue` command for exactly `hostnames`.
    ///
    /// No validation or verification is applied.
    pub fn issue(&self, hostnames: &[String]) -> Result<(), AcmeError> {
        if !self.ctx.settings.supported {
            return Err(AcmeError::Unsupported);
        }

        info!(site = %self.site, hostnames = ?hostnames, "Requesting certificate");

        let command = AcmeCommand::new("issue")
            .flag("-s", &self.ctx.settings.server_url)
            .flag(
                "--storage",
                self.ctx.store.account_storage_dir().to_string_lossy(),
            )
            .flag("--name", self.site.as_str())
            .flag("--domains", hostnames.join(","))
            .flag(
                "--path",
                self.ctx.settings.challenge_path.to_string_lossy(),
            );

        self.ctx.client.run(&command)?;
        Ok(())
    }

    /// Install the artifacts the client left in storage
    pub fn install_issued(&self) -> Result<(), AcmeError> {
        let components = self.ctx.store.certificate_components(&self.site);
        self.ctx.installer.install(&self.site, &components)?;
        Ok(())
    }

    /// Parsed certificate currently installed for the site
    pub fn installed(&self) -> Result<Option<CertificateInfo>, AcmeError> {
        match self.ctx.installer.installed_certificate(&self.site)? {
            Some(pem) => Ok(Some(CertificateInfo::from_pem(&pem)?)),
            None => Ok(None),
        }
    }

    /// SANs of the installed certificate; empty when none is installed
    pub fn current_sans(&self) -> Result<Vec<String>, AcmeError> {
        Ok(self.installed()?.map(|info| info.sans).unwrap_or_default())
    }

    /// Renew the installed certificate for the same hostnames
    pub fn renew(&self, verify_ip: bool) -> RenewOutcome {
        let profile = match self.ssl_profile() {
            Ok(profile) => profile,
            Err(e) => return RenewOutcome::Failed(e),
        };
        if !profile.active {
            error!(site = %self.site, "site is inactive - not renewing SSL");
            return RenewOutcome::Failed(AcmeError::InactiveSite(self.site.clone()));
        }

        let info = match self.installed() {
            Ok(Some(info)) => info,
            Ok(None) => {
                error!(site = %self.site, "No certificates installed on account");
                return RenewOutcome::Failed(AcmeError::NoCertificateInstalled);
            }
            Err(e) => return RenewOutcome::Failed(e),
        };

        if !self.ctx.authority.matches(&info) {
            warn!(
                site = %self.site,
                authority = ?info.authority_key_id,
                "Installed certificate is not issued by the managed CA, not renewing"
            );
            return RenewOutcome::NotManaged {
                reason: format!(
                    "certificate for `{}' is not provided by the managed CA",
                    self.site
                ),
            };
        }

        let hosts: Vec<HostSpec> = info.sans.iter().cloned().map(HostSpec::Raw).collect();
        let opts = RequestOptions {
            verify_ip,
            strict: false,
        };

        match self.request(&hosts, opts) {
            RequestOutcome::Installed { hostnames } => {
                info!(site = %self.site, "Successfully renewed certificate for 90 days");
                RenewOutcome::Renewed { hostnames }
            }
            RequestOutcome::NoEligibleHosts => {
                warn!(site = %self.site, "Request failed, lack of valid hostnames to renew");
                RenewOutcome::NoEligibleHosts
            }
            RequestOutcome::Failed(e) => {
                self.notify_renewal_failure(&info.sans, &e);
                RenewOutcome::Failed(e)
            }
        }
    }

    fn notify_renewal_failure(&self, sans: &[String], err: &AcmeError) {
        let body = format!(
            "{}: {}\r\n\r\n{}\r\n\r\nError: {}\r\n\r\nRun 'certkeep renew {}' from the command line to retry.",
            self.ctx.settings.server_name,
            self.site,
            sans.join("\r\n"),
            err,
            self.site
        );
        if !self.ctx.notifier.send_admin("renewal failed", &body) {
            warn!(site = %self.site, "Failed to notify administrator of renewal failure");
        }
    }

    /// Add `hosts` to the certificate, keeping every hostname it already covers
    pub fn append(&self, hosts: &[String], verify_ip: bool) -> RequestOutcome {
        if let Err(e) = self.ssl_profile() {
            return RequestOutcome::Failed(e);
        }
        let existing = match self.current_sans() {
            Ok(sans) => sans,
            Err(e) => return RequestOutcome::Failed(e),
        };

        let union = merge_hostnames(&existing, hosts);
        debug!(site = %self.site, hostnames = ?union, "Appending hostnames");

        let specs: Vec<HostSpec> = union.into_iter().map(HostSpec::Raw).collect();
        self.request(
            &specs,
            RequestOptions {
                verify_ip,
                strict: false,
            },
        )
    }

    /// Revoke the issued certificate and remove its storage
    pub fn revoke(&self) -> Result<(), AcmeError> {
        self.profile()?;

        if !self.ctx.store.certificate_issued(&self.site) {
            error!(site = %self.site, "No certificate issued to revoke");
            return Err(AcmeError::NothingToRevoke);
        }

        let command = AcmeCommand::new("revoke")
            .flag("--name", self.site.as_str())
            .flag("-s", &self.ctx.settings.server_url)
            .flag(
                "--storage",
                self.ctx.store.account_storage_dir().to_string_lossy(),
            );

        if let Err(e) = self.ctx.client.run(&command) {
            error!(site = %self.site, error = %e, "Revocation failed");
            return Err(e.into());
        }

        self.ctx.store.delete_site(&self.site)?;
        info!(site = %self.site, "Revoked certificate");
        Ok(())
    }

    /// Remove stored artifacts without contacting the CA
    pub fn delete(&self) -> Result<(), AcmeError> {
        self.profile()?;
        self.ctx.store.delete_site(&self.site)?;
        Ok(())
    }

    /// Whether per-site ACME storage exists
    pub fn exists(&self) -> bool {
        self.storage_path().exists()
    }

    /// Absolute path of per-site ACME storage
    pub fn storage_path(&self) -> PathBuf {
        self.ctx.store.site_storage_dir(&self.site)
    }

    pub fn status(&self) -> Result<SiteStatus, AcmeError> {
        self.profile()?;
        let installed = self.installed()?;
        let managed = installed
            .as_ref()
            .is_some_and(|info| self.ctx.authority.matches(info));

        Ok(SiteStatus {
            site: self.site.clone(),
            storage_path: self.storage_path(),
            storage_exists: self.exists(),
            issued: self.ctx.store.certificate_issued(&self.site),
            installed,
            managed,
        })
    }
}

/// `existing` followed by new entries of `added`, lowercased, without duplicates
pub fn merge_hostnames(existing: &[String], added: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    existing
        .iter()
        .chain(added)
        .map(|h| h.trim().trim_end_matches('.').to_ascii_lowercase())
        .filter(|h| !h.is_empty() && seen.insert(h.clone()))
        .collect()
}
