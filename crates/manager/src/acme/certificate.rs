//! X.509 inspection of issued certificates

use chrono::{DateTime, Utc};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::parse_x509_certificate;

use super::error::StorageError;

/// The parts of a certificate the lifecycle cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// DNS names from the subjectAltName extension, in certificate order
    pub sans: Vec<String>,
    /// Expiry of the leaf certificate
    pub not_after: DateTime<Utc>,
    /// Authority key identifier rendered as `keyid:AA:BB:..`
    pub authority_key_id: Option<String>,
}

impl CertificateInfo {
    /// Parse the first certificate of a PEM bundle
    pub fn from_pem(pem_text: &str) -> Result<Self, StorageError> {
        let blocks = pem::parse_many(pem_text).map_err(|e| StorageError::Pem(e.to_string()))?;
        let leaf = blocks
            .iter()
            .find(|b| b.tag() == "CERTIFICATE")
            .ok_or_else(|| StorageError::Pem("no CERTIFICATE block".to_string()))?;

        let (_, cert) = parse_x509_certificate(leaf.contents())
            .map_err(|e| StorageError::X509(e.to_string()))?;

        let not_after = DateTime::<Utc>::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| StorageError::X509("notAfter out of range".to_string()))?;

        Ok(Self {
            sans: subject_alt_names(&cert),
            not_after,
            authority_key_id: authority_key_id(&cert),
        })
    }

    /// Whether the certificate expires before `now + within`
    pub fn expires_within(&self, within: chrono::Duration) -> bool {
        self.not_after <= Utc::now() + within
    }
}

fn subject_alt_names(cert: &X509Certificate<'_>) -> Vec<String> {
    let Ok(Some(san)) = cert.subject_alternative_name() else {
        return Vec::new();
    };
    san.value
        .general_names
        .iter()
        .filter_map(|name| match name {
            GeneralName::DNSName(dns) => Some(dns.to_ascii_lowercase()),
            _ => None,
        })
        .collect()
}

fn authority_key_id(cert: &X509Certificate<'_>) -> Option<String> {
    cert.extensions().iter().find_map(|ext| match ext.parsed_extension() {
        ParsedExtension::AuthorityKeyIdentifier(aki) => aki
            .key_identifier
            .as_ref()
            .map(|kid| format!("keyid:{}", colon_hex(kid.0))),
        _ => None,
    })
}

/// Upper-case hex octets joined by colons
pub fn colon_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}
