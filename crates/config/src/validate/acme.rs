//! ACME settings validation

use validator::ValidateEmail;

use super::{ErrorCategory, ValidationError, ValidationResult};
use crate::Config;

/// Validate the acme and server blocks
pub fn validate_acme(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();
    let acme = &config.acme;

    if acme.client.first().map_or(true, |p| p.trim().is_empty()) {
        result.add_error(ValidationError::new(
            ErrorCategory::Acme,
            "ACME client command is empty",
        ));
    }

    if acme.max_attempts == 0 {
        result.add_error(ValidationError::new(
            ErrorCategory::Acme,
            "max-attempts must be at least 1",
        ));
    }

    if acme.fingerprint.trim().is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Acme,
            "CA fingerprint is empty; no certificate could ever be renewed",
        ));
    }

    if url::Url::parse(acme.active_server()).is_err() {
        result.add_error(ValidationError::new(
            ErrorCategory::Acme,
            format!("Invalid ACME directory URL: {}", acme.active_server()),
        ));
    }

    let emails = [
        ("acme default-email", acme.default_email.as_ref()),
        ("server admin-email", config.server.admin_email.as_ref()),
    ];
    for (label, email) in emails {
        if let Some(email) = email {
            if !email.validate_email() {
                result.add_error(ValidationError::new(
                    ErrorCategory::Email,
                    format!("{} '{}' is not a valid address", label, email),
                ));
            }
        }
    }

    if config.server.name.trim().is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Server,
            "server 'name' is required for the system certificate",
        ));
    }

    result
}
