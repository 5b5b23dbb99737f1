//! Periodic certificate housekeeping
//!
//! One housekeeping pass ensures the ACME account exists, renews site
//! certificates that are due and keeps the server's own certificate current.
//! Passes are idempotent and meant to be run from cron or a systemd timer.

use std::sync::Arc;

use certkeep_common::SiteId;
use tracing::{debug, error, info, warn};

use super::certificate::CertificateInfo;
use super::error::{AcmeError, StorageError};
use super::issuer::{CertificateIssuer, IssuerContext, RenewOutcome};
use crate::platform::ExpiryTracker;

/// Hostnames the server's own certificate must cover
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerIdentity {
    /// Configured server name; always the first SAN
    pub primary: String,
    /// Current machine hostname
    pub machine: Option<String>,
    /// Extra configured names
    pub additional: Vec<String>,
}

impl ServerIdentity {
    /// Identity with the machine hostname read from the operating system
    pub fn detect(primary: impl Into<String>, additional: Vec<String>) -> Self {
        let machine = match hostname::get() {
            Ok(name) => Some(name.to_string_lossy().to_string()),
            Err(e) => {
                warn!(error = %e, "Failed to read machine hostname");
                None
            }
        };

        Self {
            primary: primary.into(),
            machine,
            additional,
        }
    }

    /// Primary name, machine hostname when different, then additional names
    pub fn system_hostnames(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let candidates = std::iter::once(self.primary.as_str())
            .chain(self.machine.as_deref())
            .chain(self.additional.iter().map(String::as_str));

        for name in candidates {
            let name = name.trim().trim_end_matches('.').to_ascii_lowercase();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// What housekeeping did with the server's own certificate
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SystemCertificateAction {
    /// Housekeeping stopped before checking it
    #[default]
    NotChecked,
    /// Present, covers the primary name and not due
    Current,
    Issued { hostnames: Vec<String>, reason: String },
    Failed { reason: String, error: String },
}

/// Summary of one housekeeping pass
#[derive(Debug, Clone, Default)]
pub struct HousekeepingReport {
    pub supported: bool,
    /// An account was created during this pass
    pub registered: bool,
    pub renewed: Vec<SiteId>,
    /// Sites with SSL disabled whose stored certificate was removed
    pub pruned: Vec<SiteId>,
    pub skipped: Vec<(SiteId, String)>,
    pub failed: Vec<(SiteId, String)>,
    pub system_certificate: SystemCertificateAction,
}

impl HousekeepingReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
            || matches!(self.system_certificate, SystemCertificateAction::Failed { .. })
    }
}

/// Drives renewal of expiring certificates and the system certificate
pub struct RenewalScheduler {
    ctx: Arc<IssuerContext>,
    expiry: Arc<dyn ExpiryTracker>,
    identity: ServerIdentity,
    renew_before: chrono::Duration,
}

impl RenewalScheduler {
    pub fn new(
        ctx: Arc<IssuerContext>,
        expiry: Arc<dyn ExpiryTracker>,
        identity: ServerIdentity,
        renew_before: chrono::Duration,
    ) -> Self {
        Self {
            ctx,
            expiry,
            identity,
            renew_before,
        }
    }

    /// Run one pass.
    ///
    /// Fails only when the account cannot be registered; per-site failures
    /// are collected in the report.
    pub fn housekeeping(&self) -> Result<HousekeepingReport, AcmeError> {
        let mut report = HousekeepingReport::default();

        if !self.ctx.settings.supported {
            info!("ACME certificates not supported on this platform, skipping housekeeping");
            return Ok(report);
        }
        report.supported = true;

        if !self.ctx.accounts.registered() {
            if let Err(e) = self.ctx.accounts.register(None) {
                error!(error = %e, "Failed to register ACME account");
                return Err(e.into());
            }
            report.registered = true;
        }

        self.prune_disabled(&mut report);
        self.renew_expiring(&mut report);
        report.system_certificate = self.ensure_system_certificate();

        info!(
            renewed = report.renewed.len(),
            pruned = report.pruned.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            system = ?report.system_certificate,
            "Housekeeping complete"
        );
        Ok(report)
    }

    /// Drop stored certificates of sites that no longer use SSL
    fn prune_disabled(&self, report: &mut HousekeepingReport) {
        for profile in self.ctx.sites.sites().into_iter().filter(|p| !p.ssl) {
            let issuer = CertificateIssuer::new(profile.id.clone(), Arc::clone(&self.ctx));
            if !issuer.exists() {
                continue;
            }
            match issuer.delete() {
                Ok(()) => {
                    info!(site = %profile.id, "Removed certificate storage of SSL-disabled site");
                    report.pruned.push(profile.id);
                }
                Err(e) => {
                    warn!(site = %profile.id, error = %e, "Failed to remove certificate storage");
                    report.failed.push((profile.id, e.to_string()));
                }
            }
        }
    }

    fn renew_expiring(&self, report: &mut HousekeepingReport) {
        let due = match self.expiry.sites_due(self.renew_before) {
            Ok(due) => due,
            Err(e) => {
                warn!(error = %e, "Failed to determine expiring certificates");
                return;
            }
        };

        info!(site_count = due.len(), "Checking certificates for renewal");

        for site in due.into_iter().filter(|s| !s.is_system()) {
            let issuer = CertificateIssuer::new(site.clone(), Arc::clone(&self.ctx));
            match issuer.renew(true) {
                RenewOutcome::Renewed { .. } => report.renewed.push(site),
                RenewOutcome::NotManaged { reason } => report.skipped.push((site, reason)),
                RenewOutcome::NoEligibleHosts => report
                    .skipped
                    .push((site, "no valid hostnames to renew".to_string())),
                RenewOutcome::Failed(e) => {
                    // Continue with other sites
                    report.failed.push((site, e.to_string()));
                }
            }
        }
    }

    /// Reason the system certificate must be (re)issued, if any
    fn system_reissue_reason(&self) -> Option<String> {
        let system = SiteId::system();
        if !self.ctx.store.certificate_issued(&system) {
            return Some("no system certificate".to_string());
        }

        let path = self.ctx.store.certificate_components(&system).crt_path;
        let info = match std::fs::read_to_string(&path)
            .map_err(StorageError::from)
            .and_then(|pem| CertificateInfo::from_pem(&pem))
        {
            Ok(info) => info,
            Err(e) => return Some(format!("unreadable system certificate: {}", e)),
        };

        let primary = self.identity.primary.to_ascii_lowercase();
        if !info.sans.contains(&primary) {
            return Some(format!("primary hostname {} not covered", primary));
        }
        if info.expires_within(self.renew_before) {
            return Some(format!("system certificate expires {}", info.not_after));
        }

        debug!(expires = %info.not_after, "System certificate is current");
        None
    }

    fn ensure_system_certificate(&self) -> SystemCertificateAction {
        if self.identity.primary.trim().is_empty() {
            warn!("No server name configured, skipping system certificate");
            return SystemCertificateAction::NotChecked;
        }

        let Some(reason) = self.system_reissue_reason() else {
            return SystemCertificateAction::Current;
        };

        let hostnames = self.identity.system_hostnames();
        info!(reason = %reason, hostnames = ?hostnames, "Issuing system certificate");

        let issuer = CertificateIssuer::new(SiteId::system(), Arc::clone(&self.ctx));
        match issuer.issue(&hostnames).and_then(|()| issuer.install_issued()) {
            Ok(()) => {
                info!("Installed system certificate");
                SystemCertificateAction::Issued { hostnames, reason }
            }
            Err(e) => {
                error!(error = %e, "Failed to issue system certificate");
                SystemCertificateAction::Failed {
                    reason,
                    error: e.to_string(),
                }
            }
        }
    }
}

impl std::fmt::Debug for RenewalScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewalScheduler")
            .field("identity", &self.identity)
            .field("renew_before_days", &self.renew_before.num_days())
            .finish_non_exhaustive()
    }
}
