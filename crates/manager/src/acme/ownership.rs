//! DNS ownership checks for requested hostnames

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::platform::NetworkResolver;

/// Per-lookup DNS timeout
pub const LOOKUP_TIMEOUT: Duration = Duration::from_millis(1500);

/// Confirms a hostname currently points at this server
#[derive(Clone)]
pub struct OwnershipVerifier {
    resolver: Arc<dyn NetworkResolver>,
    timeout: Duration,
}

impl OwnershipVerifier {
    pub fn new(resolver: Arc<dyn NetworkResolver>) -> Self {
        Self {
            resolver,
            timeout: LOOKUP_TIMEOUT,
        }
    }

    /// Address `host` resolves to, if any
    pub fn resolve(&self, host: &str) -> Option<IpAddr> {
        self.resolver.lookup(host, self.timeout)
    }

    /// Whether `host` resolves to `my_ip`; lookup failures count as a mismatch
    pub fn verify(&self, host: &str, my_ip: IpAddr) -> bool {
        let resolved = self.resolve(host);
        trace!(hostname = %host, resolved = ?resolved, expected = %my_ip, "Verified hostname ownership");
        resolved == Some(my_ip)
    }

    /// This server's public address
    pub fn public_ip(&self) -> Option<IpAddr> {
        self.resolver.public_ip()
    }
}

impl std::fmt::Debug for OwnershipVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnershipVerifier")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
