//! Certkeep Manager Library
//!
//! Automated TLS certificate lifecycle for hosted sites, driven through an
//! external ACME command-line client.
//!
//! This library provides:
//!
//! - **Hostname resolution**: SAN candidates with www/non-www expansion and
//!   DNS ownership checks
//! - **Issuance**: request, renew, append and revoke per site
//! - **Housekeeping**: account registration, renewal of expiring
//!   certificates and the server's own certificate
//! - **Platform seams**: traits for DNS, processes, storage, installation
//!   and notification with filesystem-backed defaults
//!
//! # Example
//!
//! ```ignore
//! use certkeep_config::Config;
//! use certkeep_manager::{CertManager, HostSpec, RequestOptions};
//!
//! let config = Config::from_file("/etc/certkeep/certkeep.kdl")?;
//! let manager = CertManager::from_config(&config)?;
//!
//! let outcome = manager
//!     .issuer("site12".into())
//!     .request(&[HostSpec::from("example.com")], RequestOptions::default());
//! ```


// ============================================================================
// Module Declarations
// ============================================================================

pub mod acme;
pub mod app;
pub mod platform;

// ============================================================================
// Public API Re-exports
// ============================================================================

// Wiring
pub use app::{CertManager, Collaborators};

// Lifecycle
pub use acme::{
    CertificateIssuer, HostSpec, HousekeepingReport, RenewOutcome, RenewalScheduler,
    RequestOptions, RequestOutcome, ServerIdentity, SiteStatus, SystemCertificateAction,
};

// Errors
pub use acme::AcmeError;

// Re-export common types
pub use certkeep_common::SiteId;
