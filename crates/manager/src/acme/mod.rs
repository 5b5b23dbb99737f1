//! ACME certificate lifecycle
//!
//! Issuance, renewal and revocation are delegated to an external ACME
//! command-line client; this module decides what to ask for and what to do
//! with the result.
//!
//! # Architecture
//!
//! - [`HostnameResolver`] - turns requested hostnames into SAN candidates
//! - [`OwnershipVerifier`] - checks a hostname resolves to this server
//! - [`AcmeClientAdapter`] - runs the client with bounded nonce retry
//! - [`AcmeAccountRegistry`] - tracks and creates the ACME account
//! - [`CaIdentityChecker`] - recognizes certificates from the managed CA
//! - [`CertificateIssuer`] - request, renew, append and revoke for one site
//! - [`RenewalScheduler`] - periodic housekeeping across all sites
//!
//! # Flow
//!
//! ```text
//! RenewalScheduler ─▶ AcmeAccountRegistry (ensure registered)
//!        │
//!        ▼
//! CertificateIssuer.renew/request ─▶ HostnameResolver ─▶ OwnershipVerifier
//!        │
//!        ▼
//! AcmeClientAdapter (issue) ─▶ Installer
//! ```

pub mod account;
pub mod authority;
pub mod certificate;
pub mod client;
pub mod error;
pub mod hostname;
pub mod issuer;
pub mod output;
pub mod ownership;
pub mod scheduler;
pub mod storage;
pub mod support;

pub use account::{canonicalize_server, AccountRecord, AcmeAccount, AcmeAccountRegistry};
pub use authority::CaIdentityChecker;
pub use certificate::CertificateInfo;
pub use client::{AcmeClientAdapter, AcmeCommand, ExecOutcome};
pub use error::{
    AcmeError, HostnameError, InstallError, ProtocolError, RegistrationError, StorageError,
};
pub use hostname::{
    alt_form, CandidateSan, HostSpec, HostnameResolver, Resolution, ResolveOptions, SanSource,
};
pub use issuer::{
    CertificateIssuer, IssuerContext, IssuerSettings, RenewOutcome, RequestOptions,
    RequestOutcome, SiteStatus,
};
pub use output::ClientEvent;
pub use ownership::OwnershipVerifier;
pub use scheduler::{HousekeepingReport, RenewalScheduler, ServerIdentity, SystemCertificateAction};
pub use storage::FsCertificateStore;
