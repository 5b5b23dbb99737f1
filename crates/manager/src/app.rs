//! Wiring of configuration and platform collaborators into the certificate
//! lifecycle.

use std::sync::Arc;
use std::time::Duration;

use certkeep_common::SiteId;
use certkeep_config::Config;
use tracing::{debug, info};

use crate::acme::client::DEFAULT_RETRY_BACKOFF;
use crate::acme::support::platform_supported;
use crate::acme::{
    AcmeAccount, AcmeAccountRegistry, AcmeClientAdapter, AcmeError, CaIdentityChecker,
    CertificateIssuer, FsCertificateStore, HostnameResolver, IssuerContext, IssuerSettings,
    OwnershipVerifier, RenewalScheduler, ServerIdentity,
};
use crate::platform::{
    CertificateStore, ConfiguredSites, DomainRegistry, ExpiryTracker, FileInstaller,
    HickoryNetworkResolver, Installer, LogNotifier, NetworkResolver, Notifier, ProcessExecutor,
    SiteDirectory, SystemProcessExecutor,
};

/// Platform collaborators used by the manager
#[derive(Clone)]
pub struct Collaborators {
    pub sites: Arc<dyn SiteDirectory>,
    pub domains: Arc<dyn DomainRegistry>,
    pub resolver: Arc<dyn NetworkResolver>,
    pub executor: Arc<dyn ProcessExecutor>,
    pub store: Arc<dyn CertificateStore>,
    pub expiry: Arc<dyn ExpiryTracker>,
    pub installer: Arc<dyn Installer>,
    pub notifier: Arc<dyn Notifier>,
    /// Delay between nonce retries
    pub retry_backoff: Duration,
}

impl Collaborators {
    /// Default implementations backed by the configuration file, the system
    /// resolver, the filesystem and the log
    pub fn from_config(config: &Config) -> Self {
        let sites = Arc::new(ConfiguredSites::new(&config.sites));
        let store = Arc::new(FsCertificateStore::new(
            &config.acme.storage,
            config.acme.active_server(),
        ));
        let executor = SystemProcessExecutor::new()
            .with_timeout(Duration::from_secs(config.acme.client_timeout_secs));

        Self {
            sites: sites.clone(),
            domains: sites,
            resolver: Arc::new(HickoryNetworkResolver::new(config.server.public_ip)),
            executor: Arc::new(executor),
            store: store.clone(),
            expiry: store,
            installer: Arc::new(FileInstaller::new(&config.acme.install_root)),
            notifier: Arc::new(LogNotifier::new(&config.server.name)),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Entry point for every certificate operation
pub struct CertManager {
    ctx: Arc<IssuerContext>,
    expiry: Arc<dyn ExpiryTracker>,
    identity: ServerIdentity,
    renew_before: chrono::Duration,
}

impl CertManager {
    /// Manager using the default platform collaborators
    pub fn from_config(config: &Config) -> Result<Self, AcmeError> {
        let identity = ServerIdentity::detect(
            &config.server.name,
            config.server.additional_names.clone(),
        );
        Self::with_collaborators(config, identity, Collaborators::from_config(config))
    }

    pub fn with_collaborators(
        config: &Config,
        identity: ServerIdentity,
        collaborators: Collaborators,
    ) -> Result<Self, AcmeError> {
        let acme = &config.acme;
        let server_url = acme.active_server();

        let client = Arc::new(
            AcmeClientAdapter::new(&acme.client, collaborators.executor)?
                .with_max_attempts(acme.max_attempts)
                .with_retry_backoff(collaborators.retry_backoff),
        );

        let accounts = Arc::new(
            AcmeAccountRegistry::new(
                server_url,
                Arc::clone(&collaborators.store),
                Arc::clone(&client),
            )
            .with_fallback_emails(
                config.server.admin_email.clone(),
                acme.default_email.clone(),
            ),
        );

        let settings = IssuerSettings {
            server_url: server_url.to_string(),
            server_name: config.server.name.clone(),
            challenge_path: acme.challenge_path.clone(),
            alt_form: acme.alt_form,
            verify_ip: acme.verify_ip,
            supported: platform_supported(&acme.platform_version),
        };
        debug!(
            server = %settings.server_url,
            supported = settings.supported,
            "Certificate manager configured"
        );

        let hostnames = HostnameResolver::new(
            collaborators.domains,
            OwnershipVerifier::new(collaborators.resolver),
        );

        let ctx = IssuerContext {
            settings,
            sites: collaborators.sites,
            hostnames,
            client,
            accounts,
            authority: CaIdentityChecker::new(&acme.fingerprint),
            store: collaborators.store,
            installer: collaborators.installer,
            notifier: collaborators.notifier,
        };

        Ok(Self {
            ctx: Arc::new(ctx),
            expiry: collaborators.expiry,
            identity,
            renew_before: chrono::Duration::days(i64::from(acme.renew_before_days)),
        })
    }

    /// Whether the platform version supports ACME certificates
    pub fn supported(&self) -> bool {
        self.ctx.settings.supported
    }

    /// Whether certificate operations are allowed for `site`
    pub fn permitted(&self, site: &SiteId) -> bool {
        if !self.supported() {
            return false;
        }
        match self.ctx.sites.site(site) {
            Some(profile) => profile.active && profile.ssl,
            None => {
                info!(site = %site, "Unknown site");
                false
            }
        }
    }

    pub fn issuer(&self, site: SiteId) -> CertificateIssuer {
        CertificateIssuer::new(site, Arc::clone(&self.ctx))
    }

    pub fn scheduler(&self) -> RenewalScheduler {
        RenewalScheduler::new(
            Arc::clone(&self.ctx),
            Arc::clone(&self.expiry),
            self.identity.clone(),
            self.renew_before,
        )
    }

    /// ACME account for the active server
    pub fn account(&self) -> AcmeAccount {
        self.ctx.accounts.account()
    }

    pub fn context(&self) -> &Arc<IssuerContext> {
        &self.ctx
    }
}

impl std::fmt::Debug for CertManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertManager")
            .field("ctx", &self.ctx)
            .field("identity", &self.identity)
            .field("renew_before_days", &self.renew_before.num_days())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("retry_backoff", &self.retry_backoff)
            .finish_non_exhaustive()
    }
}
