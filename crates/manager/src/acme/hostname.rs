//! Derivation of SAN candidates from requested hostnames
//!
//! Each requested hostname is split against the site's domains, checked for
//! HTTP host syntax, optionally paired with its www/non-www alternate form,
//! and optionally verified to resolve to this server. Failures drop the
//! hostname, or abort the whole request in strict mode.

use std::net::IpAddr;
use std::sync::Arc;

use certkeep_common::SiteId;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use super::error::HostnameError;
use super::ownership::OwnershipVerifier;
use crate::platform::{DomainRegistry, HostParts};

const WWW_PREFIX: &str = "www.";
const MAX_HOST_LEN: usize = 253;

static HTTP_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$")
        .expect("HTTP host pattern is valid")
});

/// Whether `host` is a syntactically valid, fully qualified HTTP host
pub fn is_valid_http_host(host: &str) -> bool {
    host.len() <= MAX_HOST_LEN && HTTP_HOST.is_match(host)
}

/// The complementary www form: `www.foo.com` ⇄ `foo.com`
pub fn alt_form(host: &str) -> String {
    match host.strip_prefix(WWW_PREFIX) {
        Some(bare) => bare.to_string(),
        None => format!("{}{}", WWW_PREFIX, host),
    }
}

/// A hostname as given by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSpec {
    /// Full hostname, split against the site's domains
    Raw(String),
    /// Already split into domain and subdomain
    Split(HostParts),
}

impl From<&str> for HostSpec {
    fn from(host: &str) -> Self {
        Self::Raw(host.to_string())
    }
}

impl From<String> for HostSpec {
    fn from(host: String) -> Self {
        Self::Raw(host)
    }
}

impl From<HostParts> for HostSpec {
    fn from(parts: HostParts) -> Self {
        Self::Split(parts)
    }
}

/// Which form of a requested hostname a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanSource {
    Primary,
    AltForm,
}

/// A hostname accepted for the certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSan {
    pub hostname: String,
    pub source: SanSource,
}

/// Flags controlling resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Require each hostname to resolve to this server
    pub verify_ip: bool,
    /// Abort on the first rejected hostname instead of dropping it
    pub strict: bool,
    /// Also request the www/non-www variant (only with `verify_ip`)
    pub alt_form: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            verify_ip: true,
            strict: false,
            alt_form: true,
        }
    }
}

/// Result of resolving a hostname list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Hostnames to request, in order, without duplicates
    Candidates(Vec<CandidateSan>),
    /// Nothing survived validation and verification
    NoHostnames,
}

impl Resolution {
    /// Hostnames of the candidates; empty for [`Resolution::NoHostnames`]
    pub fn hostnames(&self) -> Vec<String> {
        match self {
            Self::Candidates(c) => c.iter().map(|c| c.hostname.clone()).collect(),
            Self::NoHostnames => Vec::new(),
        }
    }
}

/// Turns requested hostnames into SAN candidates
#[derive(Clone)]
pub struct HostnameResolver {
    registry: Arc<dyn DomainRegistry>,
    verifier: OwnershipVerifier,
}

impl HostnameResolver {
    pub fn new(registry: Arc<dyn DomainRegistry>, verifier: OwnershipVerifier) -> Self {
        Self { registry, verifier }
    }

    pub fn resolve(
        &self,
        site: &SiteId,
        hosts: &[HostSpec],
        opts: ResolveOptions,
    ) -> Result<Resolution, HostnameError> {
        let my_ip = if opts.verify_ip {
            Some(self.verifier.public_ip().ok_or(HostnameError::NoPublicIp)?)
        } else {
            None
        };

        let mut candidates: Vec<CandidateSan> = Vec::new();
        let mut push = |hostname: String, source: SanSource| {
            if !candidates.iter().any(|c| c.hostname == hostname) {
                candidates.push(CandidateSan { hostname, source });
            }
        };

        for spec in hosts {
            let host = match self.canonical_host(site, spec) {
                Ok(host) => host,
                Err(e) if opts.strict => return Err(e),
                Err(e) => {
                    warn!(site = %site, error = %e, "Skipping hostname");
                    continue;
                }
            };

            let Some(my_ip) = my_ip else {
                push(host, SanSource::Primary);
                continue;
            };

            if opts.alt_form {
                let alt = alt_form(&host);
                if self.verifier.verify(&alt, my_ip) {
                    push(alt, SanSource::AltForm);
                } else if opts.strict {
                    return Err(HostnameError::AltFormMismatch {
                        host,
                        alt,
                        expected: my_ip.to_string(),
                    });
                } else {
                    info!(
                        site = %site,
                        hostname = %alt,
                        expected = %my_ip,
                        "Skipping alternative hostname form, IP does not resolve here"
                    );
                }
            }

            if !self.verifier.verify(&host, my_ip) {
                let err = self.mismatch(&host, my_ip);
                if opts.strict {
                    return Err(err);
                }
                warn!(site = %site, error = %err, "Skipping hostname");
                continue;
            }

            push(host, SanSource::Primary);
        }

        if candidates.is_empty() {
            warn!(site = %site, "No hostnames to register");
            return Ok(Resolution::NoHostnames);
        }

        debug!(
            site = %site,
            hostnames = ?candidates.iter().map(|c| c.hostname.as_str()).collect::<Vec<_>>(),
            "Resolved certificate hostnames"
        );
        Ok(Resolution::Candidates(candidates))
    }

    fn canonical_host(&self, site: &SiteId, spec: &HostSpec) -> Result<String, HostnameError> {
        let parts = match spec {
            HostSpec::Raw(raw) => {
                self.registry
                    .split_host(site, raw)
                    .ok_or_else(|| HostnameError::UnknownDomain {
                        host: raw.clone(),
                    })?
            }
            HostSpec::Split(parts) => parts.clone(),
        };

        if !self.registry.domain_exists(site, &parts.domain) {
            return Err(HostnameError::UnknownDomain {
                host: parts.domain.clone(),
            });
        }

        let host = parts.host().to_ascii_lowercase();
        if !is_valid_http_host(&host) {
            return Err(HostnameError::InvalidHost { host });
        }
        Ok(host)
    }

    fn mismatch(&self, host: &str, my_ip: IpAddr) -> HostnameError {
        HostnameError::Mismatch {
            host: host.to_string(),
            resolved: self
                .verifier
                .resolve(host)
                .map_or_else(|| "nothing".to_string(), |ip| ip.to_string()),
            expected: my_ip.to_string(),
        }
    }
}

impl std::fmt::Debug for HostnameResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostnameResolver")
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::NetworkResolver;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::time::Duration;

    const MY_IP: &str = "203.0.113.10";
    const OTHER_IP: &str = "198.51.100.7";

    struct Fixture {
        domains: Vec<&'static str>,
    }

    impl DomainRegistry for Fixture {
        fn domain_exists(&self, _site: &SiteId, domain: &str) -> bool {
            self.domains.iter().any(|d| *d == domain)
        }

        fn split_host(&self, _site: &SiteId, host: &str) -> Option<HostParts> {
            if host.is_empty() {
                return None;
            }
            let host = host.to_ascii_lowercase();
            for domain in &self.domains {
                if host == *domain {
                    return Some(HostParts::new(*domain, ""));
                }
                if let Some(sub) = host.strip_suffix(&format!(".{}", domain)) {
                    return Some(HostParts::new(*domain, sub));
                }
            }
            Some(HostParts::new(host.as_str(), ""))
        }
    }

    struct Dns {
        records: HashMap<String, IpAddr>,
        public: Option<IpAddr>,
    }

    impl NetworkResolver for Dns {
        fn lookup(&self, host: &str, _timeout: Duration) -> Option<IpAddr> {
            self.records.get(host).copied()
        }

        fn public_ip(&self) -> Option<IpAddr> {
            self.public
        }
    }

    fn resolver(records: &[(&str, &str)]) -> HostnameResolver {
        let dns = Dns {
            records: records
                .iter()
                .map(|(h, ip)| (h.to_string(), ip.parse().unwrap()))
                .collect(),
            public: Some(MY_IP.parse().unwrap()),
        };
        HostnameResolver::new(
            Arc::new(Fixture {
                domains: vec!["foo.com", "bar.org"],
            }),
            OwnershipVerifier::new(Arc::new(dns)),
        )
    }

    fn site() -> SiteId {
        SiteId::new("site1")
    }

    fn specs(hosts: &[&str]) -> Vec<HostSpec> {
        hosts.iter().map(|h| HostSpec::from(*h)).collect()
    }

    #[test]
    fn test_alt_form() {
        assert_eq!(alt_form("foo.com"), "www.foo.com");
        assert_eq!(alt_form("www.foo.com"), "foo.com");
        assert_eq!(alt_form("wwwfoo.com"), "www.wwwfoo.com");
    }

    #[test]
    fn test_http_host_syntax() {
        assert!(is_valid_http_host("foo.com"));
        assert!(is_valid_http_host("a-b.c1.foo.com"));
        assert!(!is_valid_http_host("foo"));
        assert!(!is_valid_http_host("-foo.com"));
        assert!(!is_valid_http_host("foo..com"));
        assert!(!is_valid_http_host("foo_bar.com"));
        assert!(!is_valid_http_host(&format!("{}.com", "a.".repeat(130))));
    }

    #[test]
    fn test_both_forms_verified() {
        let resolver = resolver(&[("foo.com", MY_IP), ("www.foo.com", MY_IP)]);
        let resolution = resolver
            .resolve(&site(), &specs(&["foo.com"]), ResolveOptions::default())
            .unwrap();

        assert_eq!(
            resolution,
            Resolution::Candidates(vec![
                CandidateSan {
                    hostname: "www.foo.com".to_string(),
                    source: SanSource::AltForm
                },
                CandidateSan {
                    hostname: "foo.com".to_string(),
                    source: SanSource::Primary
                },
            ])
        );
    }

    #[test]
    fn test_primary_dropped_alt_form_kept() {
        let resolver = resolver(&[("foo.com", OTHER_IP), ("www.foo.com", MY_IP)]);
        let resolution = resolver
            .resolve(&site(), &specs(&["foo.com"]), ResolveOptions::default())
            .unwrap();

        assert_eq!(resolution.hostnames(), vec!["www.foo.com"]);
    }

    #[test]
    fn test_strict_primary_mismatch_names_addresses() {
        let resolver = resolver(&[("foo.com", OTHER_IP), ("www.foo.com", MY_IP)]);
        let opts = ResolveOptions {
            strict: true,
            ..Default::default()
        };

        let err = resolver
            .resolve(&site(), &specs(&["foo.com"]), opts)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("foo.com resolves to {}, expected {}", OTHER_IP, MY_IP)
        );
    }

    #[test]
    fn test_strict_alt_form_mismatch() {
        let resolver = resolver(&[("foo.com", MY_IP)]);
        let opts = ResolveOptions {
            strict: true,
            ..Default::default()
        };

        let err = resolver
            .resolve(&site(), &specs(&["foo.com"]), opts)
            .unwrap_err();
        assert!(matches!(err, HostnameError::AltFormMismatch { ref alt, .. } if alt == "www.foo.com"));
    }

    #[test]
    fn test_unknown_domain_skipped_or_aborts() {
        let resolver = resolver(&[("foo.com", MY_IP)]);
        let opts = ResolveOptions {
            alt_form: false,
            ..Default::default()
        };

        let resolution = resolver
            .resolve(&site(), &specs(&["elsewhere.net", "foo.com"]), opts)
            .unwrap();
        assert_eq!(resolution.hostnames(), vec!["foo.com"]);

        let strict = ResolveOptions { strict: true, ..opts };
        let err = resolver
            .resolve(&site(), &specs(&["elsewhere.net", "foo.com"]), strict)
            .unwrap_err();
        assert!(matches!(err, HostnameError::UnknownDomain { .. }));
    }

    #[test]
    fn test_unsplittable_host_is_unknown_domain() {
        let resolver = resolver(&[]);
        let strict = ResolveOptions {
            verify_ip: false,
            strict: true,
            ..Default::default()
        };

        let err = resolver
            .resolve(&site(), &[HostSpec::Raw(String::new())], strict)
            .unwrap_err();
        assert!(matches!(err, HostnameError::UnknownDomain { ref host } if host.is_empty()));
    }

    #[test]
    fn test_invalid_syntax_skipped() {
        let resolver = resolver(&[]);
        let opts = ResolveOptions {
            verify_ip: false,
            ..Default::default()
        };

        let resolution = resolver
            .resolve(
                &site(),
                &[
                    HostSpec::Split(HostParts::new("foo.com", "bad_label")),
                    HostSpec::Split(HostParts::new("foo.com", "ok")),
                ],
                opts,
            )
            .unwrap();
        assert_eq!(resolution.hostnames(), vec!["ok.foo.com"]);
    }

    #[test]
    fn test_no_verification_skips_alt_form_and_dns() {
        let resolver = resolver(&[]);
        let opts = ResolveOptions {
            verify_ip: false,
            ..Default::default()
        };

        let resolution = resolver
            .resolve(&site(), &specs(&["Foo.com", "mail.bar.org", "foo.com"]), opts)
            .unwrap();
        assert_eq!(resolution.hostnames(), vec!["foo.com", "mail.bar.org"]);
    }

    #[test]
    fn test_nothing_survives() {
        let resolver = resolver(&[("foo.com", OTHER_IP)]);
        let resolution = resolver
            .resolve(&site(), &specs(&["foo.com"]), ResolveOptions::default())
            .unwrap();
        assert_eq!(resolution, Resolution::NoHostnames);
        assert!(resolution.hostnames().is_empty());

        let empty = resolver
            .resolve(&site(), &[], ResolveOptions::default())
            .unwrap();
        assert_eq!(empty, Resolution::NoHostnames);
    }

    #[test]
    fn test_missing_public_ip() {
        let resolver = HostnameResolver::new(
            Arc::new(Fixture {
                domains: vec!["foo.com"],
            }),
            OwnershipVerifier::new(Arc::new(Dns {
                records: HashMap::new(),
                public: None,
            })),
        );

        assert!(matches!(
            resolver.resolve(&site(), &specs(&["foo.com"]), ResolveOptions::default()),
            Err(HostnameError::NoPublicIp)
        ));
    }

    proptest! {
        #[test]
        fn prop_alt_form_round_trips(labels in prop::collection::vec("[a-z][a-z0-9]{0,8}", 2..5)) {
            prop_assume!(labels[0] != "www");
            let host = labels.join(".");
            prop_assert_eq!(alt_form(&alt_form(&host)), host.clone());
            prop_assert_ne!(alt_form(&host), host);
        }
    }
}
