//! Error types for certificate lifecycle operations

use std::path::PathBuf;

use certkeep_common::SiteId;
use thiserror::Error;

/// Hostname validation and ownership verification failures
#[derive(Debug, Error)]
pub enum HostnameError {
    #[error("'{host}' is not a domain on this account")]
    UnknownDomain { host: String },

    #[error("'{host}' is not a valid HTTP host")]
    InvalidHost { host: String },

    #[error("{host} resolves to {resolved}, expected {expected}")]
    Mismatch {
        host: String,
        resolved: String,
        expected: String,
    },

    #[error("alternate form {alt} of {host} does not resolve to {expected}")]
    AltFormMismatch {
        host: String,
        alt: String,
        expected: String,
    },

    #[error("public IP address of this server is unknown")]
    NoPublicIp,
}

/// Failures talking to the external ACME client
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Failed to launch ACME client: {0}")]
    Launch(String),

    #[error("ACME client error: {0}")]
    Client(String),

    #[error("Anti-replay nonce retries exhausted after {attempts} attempts")]
    NonceExhausted { attempts: u32 },

    #[error("ACME client exited unsuccessfully (status {})", display_code(.code))]
    Exit { code: Option<i32> },
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Account registration failures
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("No email address available for ACME registration; set 'admin-email' in the server block or 'default-email' in the acme block")]
    NoEmail,

    #[error("ACME account setup failed: {0}")]
    Setup(#[from] ProtocolError),

    #[error("Failed to record ACME account: {0}")]
    Storage(#[from] StorageError),
}

/// Account and certificate storage failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PEM parse error: {0}")]
    Pem(String),

    #[error("X.509 parse error: {0}")]
    X509(String),

    #[error("No certificate found in {0}")]
    Empty(PathBuf),
}

/// Failures installing an issued certificate
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Issued artifact missing: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("Installation failed: {0}")]
    Failed(String),
}

/// Errors surfaced by certificate operations
#[derive(Debug, Error)]
pub enum AcmeError {
    #[error("ACME certificates are not supported on this platform version")]
    Unsupported,

    #[error("Unknown site: {0}")]
    UnknownSite(SiteId),

    #[error("site is inactive - not renewing SSL")]
    InactiveSite(SiteId),

    #[error("SSL is disabled for site {0}")]
    SslDisabled(SiteId),

    #[error("no certificate issued to revoke")]
    NothingToRevoke,

    #[error("no certificates installed on account")]
    NoCertificateInstalled,

    #[error(transparent)]
    Hostname(#[from] HostnameError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Install(#[from] InstallError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_display() {
        assert_eq!(
            ProtocolError::Exit { code: Some(2) }.to_string(),
            "ACME client exited unsuccessfully (status 2)"
        );
        assert_eq!(
            ProtocolError::Exit { code: None }.to_string(),
            "ACME client exited unsuccessfully (status none)"
        );
    }

    #[test]
    fn test_transparent_wrapping() {
        let err: AcmeError = HostnameError::NoPublicIp.into();
        assert_eq!(err.to_string(), "public IP address of this server is unknown");

        let err: AcmeError = RegistrationError::NoEmail.into();
        assert!(err.to_string().contains("default-email"));
    }
}
