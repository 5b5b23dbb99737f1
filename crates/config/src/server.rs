//! Host identity and hosted-site configuration.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Identity of the machine running the manager
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Primary server name, always the first SAN of the system certificate
    pub name: String,

    /// Public address hostnames must resolve to; detected when unset
    pub public_ip: Option<IpAddr>,

    /// Extra hostnames added to the system certificate
    pub additional_names: Vec<String>,

    /// Appliance administrator email, used for ACME registration
    pub admin_email: Option<String>,
}

/// A hosted site and the domains it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site identifier (also the certificate name)
    pub id: String,

    /// Primary domain
    pub domain: String,

    /// Additional domains attached to the site
    pub aliases: Vec<String>,

    /// Site administrator email
    pub admin_email: Option<String>,

    /// Inactive sites are never renewed
    pub active: bool,

    /// Whether SSL is enabled for the site
    pub ssl: bool,
}

impl SiteConfig {
    pub fn new(id: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            domain: domain.into(),
            aliases: Vec::new(),
            admin_email: None,
            active: true,
            ssl: true,
        }
    }

    /// All domains owned by the site, primary first
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.domain.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Split a free-form hostname list on commas and whitespace
pub fn split_names(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_domains() {
        let mut site = SiteConfig::new("site1", "example.com");
        site.aliases.push("example.org".to_string());

        let domains: Vec<_> = site.domains().collect();
        assert_eq!(domains, vec!["example.com", "example.org"]);
    }

    #[test]
    fn test_split_names() {
        assert_eq!(
            split_names("a.example.com, b.example.com  c.example.com,,"),
            vec!["a.example.com", "b.example.com", "c.example.com"]
        );
        assert!(split_names(" , ").is_empty());
    }
}
