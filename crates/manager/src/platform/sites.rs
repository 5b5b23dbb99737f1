//! Site and domain lookups backed by the configuration file

use std::collections::{BTreeSet, HashMap};

use certkeep_common::SiteId;
use certkeep_config::SiteConfig;
use tracing::trace;

use super::{DomainRegistry, HostParts, SiteDirectory, SiteProfile};

#[derive(Debug, Clone)]
struct SiteEntry {
    profile: SiteProfile,
    domains: BTreeSet<String>,
}

/// Sites and their domains as declared in `site` blocks
#[derive(Debug, Clone, Default)]
pub struct ConfiguredSites {
    sites: HashMap<SiteId, SiteEntry>,
}

impl ConfiguredSites {
    pub fn new(sites: &[SiteConfig]) -> Self {
        let sites = sites
            .iter()
            .map(|site| {
                let id = SiteId::new(&site.id);
                let entry = SiteEntry {
                    profile: SiteProfile {
                        id: id.clone(),
                        admin_email: site.admin_email.clone(),
                        active: site.active,
                        ssl: site.ssl,
                    },
                    domains: site.domains().map(str::to_ascii_lowercase).collect(),
                };
                (id, entry)
            })
            .collect();

        Self { sites }
    }

    fn domains(&self, site: &SiteId) -> Option<&BTreeSet<String>> {
        self.sites.get(site).map(|e| &e.domains)
    }
}

impl DomainRegistry for ConfiguredSites {
    fn domain_exists(&self, site: &SiteId, domain: &str) -> bool {
        self.domains(site)
            .is_some_and(|d| d.contains(&domain.to_ascii_lowercase()))
    }

    /// Walks label boundaries left to right so the longest owned suffix wins.
    ///
    /// A host outside every owned domain comes back whole as the domain, which
    /// `domain_exists` then rejects.
    fn split_host(&self, site: &SiteId, host: &str) -> Option<HostParts> {
        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return None;
        }

        let Some(domains) = self.domains(site) else {
            return Some(HostParts::new(host, ""));
        };

        if domains.contains(&host) {
            return Some(HostParts::new(host, ""));
        }

        for (idx, _) in host.match_indices('.') {
            let candidate = &host[idx + 1..];
            if domains.contains(candidate) {
                trace!(site = %site, host = %host, domain = %candidate, "Split host");
                return Some(HostParts::new(candidate, &host[..idx]));
            }
        }

        Some(HostParts::new(host, ""))
    }
}

impl SiteDirectory for ConfiguredSites {
    fn site(&self, id: &SiteId) -> Option<SiteProfile> {
        self.sites.get(id).map(|e| e.profile.clone())
    }

    fn sites(&self) -> Vec<SiteProfile> {
        let mut profiles: Vec<SiteProfile> =
            self.sites.values().map(|e| e.profile.clone()).collect();
        profiles.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sites() -> ConfiguredSites {
        let mut site = SiteConfig::new("site1", "example.com");
        site.aliases.push("shop.example.com".to_string());
        site.aliases.push("example.co.uk".to_string());
        let mut other = SiteConfig::new("site2", "other.test");
        other.active = false;
        ConfiguredSites::new(&[site, other])
    }

    #[test]
    fn test_split_bare_domain() {
        let parts = sites()
            .split_host(&SiteId::new("site1"), "example.com")
            .unwrap();
        assert_eq!(parts, HostParts::new("example.com", ""));
    }

    #[test]
    fn test_split_prefers_longest_domain() {
        let registry = sites();
        let site = SiteId::new("site1");

        assert_eq!(
            registry.split_host(&site, "a.b.shop.example.com").unwrap(),
            HostParts::new("shop.example.com", "a.b")
        );
        assert_eq!(
            registry.split_host(&site, "WWW.Example.co.uk").unwrap(),
            HostParts::new("example.co.uk", "www")
        );
    }

    #[test]
    fn test_split_foreign_host() {
        let registry = sites();
        let site = SiteId::new("site1");

        let parts = registry.split_host(&site, "www.elsewhere.net").unwrap();
        assert_eq!(parts.domain, "www.elsewhere.net");
        assert!(!registry.domain_exists(&site, &parts.domain));
    }

    #[test]
    fn test_domain_exists_scoped_to_site() {
        let registry = sites();
        assert!(registry.domain_exists(&SiteId::new("site1"), "example.com"));
        assert!(!registry.domain_exists(&SiteId::new("site2"), "example.com"));
        assert!(!registry.domain_exists(&SiteId::new("missing"), "example.com"));
    }

    #[test]
    fn test_site_profile() {
        let registry = sites();
        let profile = registry.site(&SiteId::new("site2")).unwrap();
        assert!(!profile.active);
        assert!(profile.ssl);
        assert!(registry.site(&SiteId::new("nope")).is_none());
    }

    #[test]
    fn test_sites_ordered_by_id() {
        let mut third = SiteConfig::new("site0", "third.test");
        third.ssl = false;
        let mut list = vec![SiteConfig::new("site1", "example.com")];
        list.push(SiteConfig::new("site2", "other.test"));
        list.push(third);

        let profiles = ConfiguredSites::new(&list).sites();
        let ids: Vec<&str> = profiles.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["site0", "site1", "site2"]);
        assert!(!profiles[0].ssl);
        assert!(profiles[1].ssl);
    }
}
