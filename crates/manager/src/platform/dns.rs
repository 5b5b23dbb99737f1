//! DNS lookups through hickory-resolver

use std::net::{IpAddr, UdpSocket};
use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::Resolver;
use tracing::{debug, trace, warn};

use super::NetworkResolver;

/// Address used only to pick the outbound interface; nothing is sent
const ROUTE_PROBE: &str = "192.0.2.1:53";

/// Resolves hostnames with the system resolver configuration
pub struct HickoryNetworkResolver {
    config: ResolverConfig,
    public_ip: Option<IpAddr>,
}

impl HickoryNetworkResolver {
    /// Use `/etc/resolv.conf`, falling back to the library defaults.
    ///
    /// `public_ip` overrides detection of this server's address.
    pub fn new(public_ip: Option<IpAddr>) -> Self {
        let config = match hickory_resolver::system_conf::read_system_conf() {
            Ok((config, _)) => config,
            Err(e) => {
                warn!(error = %e, "Failed to read system resolver configuration, using defaults");
                ResolverConfig::default()
            }
        };

        Self { config, public_ip }
    }

    fn resolver(&self, timeout: Duration) -> Option<Resolver> {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;

        match Resolver::new(self.config.clone(), opts) {
            Ok(resolver) => Some(resolver),
            Err(e) => {
                warn!(error = %e, "Failed to construct DNS resolver");
                None
            }
        }
    }

    /// Local address of the interface that routes to the internet
    fn detect_public_ip() -> Option<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect(ROUTE_PROBE).ok()?;
        let ip = socket.local_addr().ok()?.ip();
        (!ip.is_unspecified()).then_some(ip)
    }
}

impl std::fmt::Debug for HickoryNetworkResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryNetworkResolver")
            .field("nameservers", &self.config.name_servers().len())
            .field("public_ip", &self.public_ip)
            .finish()
    }
}

impl NetworkResolver for HickoryNetworkResolver {
    fn lookup(&self, host: &str, timeout: Duration) -> Option<IpAddr> {
        let resolver = self.resolver(timeout)?;

        let answers = match resolver.lookup_ip(host) {
            Ok(answers) => answers,
            Err(e) => {
                debug!(hostname = %host, error = %e, "DNS lookup failed");
                return None;
            }
        };

        let addresses: Vec<IpAddr> = answers.iter().collect();
        trace!(hostname = %host, addresses = ?addresses, "DNS lookup");

        addresses
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addresses.first())
            .copied()
    }

    fn public_ip(&self) -> Option<IpAddr> {
        self.public_ip.or_else(Self::detect_public_ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_public_ip_wins() {
        let ip: IpAddr = "203.0.113.10".parse().unwrap();
        let resolver = HickoryNetworkResolver::new(Some(ip));
        assert_eq!(resolver.public_ip(), Some(ip));
    }

    #[test]
    fn test_invalid_hostname_yields_none() {
        let resolver = HickoryNetworkResolver::new(None);
        assert!(resolver
            .lookup("invalid..host..name", Duration::from_millis(200))
            .is_none());
    }
}
